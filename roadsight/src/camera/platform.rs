//! Ports to the device camera/AR platform.
//!
//! The controller never talks to camera hardware directly. Hosts implement
//! [`CameraPlatform`] over their native AR stack; frames flow back through
//! a [`FrameProcessor`] registered with a cancellable [`FrameSubscription`].

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::config::SessionConfig;
use crate::poi::BoxFuture;

/// What the platform reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub name: String,
    pub os_major_version: u32,
    /// Whether world tracking is available at all.
    pub ar_supported: bool,
}

/// Which side of the device a camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPosition {
    Back,
    Front,
}

/// Lens type of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraLens {
    WideAngle,
    UltraWide,
    Telephoto,
}

/// A camera the platform can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub id: String,
    pub position: CameraPosition,
    pub lens: CameraLens,
}

impl CameraDevice {
    pub fn new(id: impl Into<String>, position: CameraPosition, lens: CameraLens) -> Self {
        Self {
            id: id.into(),
            position,
            lens,
        }
    }
}

/// Pick the back wide-angle camera, else any back camera.
pub fn select_camera(devices: &[CameraDevice]) -> Option<&CameraDevice> {
    devices
        .iter()
        .find(|d| d.position == CameraPosition::Back && d.lens == CameraLens::WideAngle)
        .or_else(|| devices.iter().find(|d| d.position == CameraPosition::Back))
}

/// Frame metadata delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraFrame {
    pub sequence: u64,
    pub timestamp: Instant,
    pub width: u32,
    pub height: u32,
}

/// Pixels returned by a photo capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub width: u32,
    pub height: u32,
    /// Encoded image bytes, format chosen by the platform.
    pub data: Vec<u8>,
}

/// Receives frames from the platform's frame callback.
///
/// Called on the platform's delivery thread; implementations must return
/// quickly.
pub trait FrameProcessor: Send + Sync {
    fn on_frame(&self, frame: CameraFrame);
}

/// Handle for a registered frame processor.
///
/// Cancelling it detaches the processor: platforms must stop delivering
/// once [`FrameSubscription::is_cancelled`] returns `true`.
#[derive(Debug, Clone, Default)]
pub struct FrameSubscription {
    token: CancellationToken,
}

impl FrameSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the subscription is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Device camera and AR capabilities.
pub trait CameraPlatform: Send + Sync {
    fn platform_info(&self) -> PlatformInfo;

    /// Ask the user for camera access. Resolves to `true` when granted.
    fn request_camera_permission(&self) -> BoxFuture<'_, bool>;

    fn available_devices(&self) -> Vec<CameraDevice>;

    /// Battery level in percent, if known.
    fn battery_level(&self) -> Option<f64>;

    /// Device temperature in °C, if known.
    fn device_temperature(&self) -> Option<f64>;

    /// Start world tracking with the given camera and configuration.
    fn start_tracking(&self, device: &CameraDevice, config: &SessionConfig);

    fn stop_tracking(&self);

    /// Register the frame processor for the current session.
    fn attach_frame_processor(&self, processor: Arc<dyn FrameProcessor>, subscription: FrameSubscription);

    /// Capture a full-resolution still.
    fn capture_photo(&self) -> BoxFuture<'_, Result<CapturedImage, String>>;
}
