//! Voice narration forwarding
//!
//! The visibility engine picks at most one landmark per update cycle to
//! announce. [`Narrator`] turns it into a spoken line and hands it to the
//! host's [`VoiceSink`] from a background task, so the frame path never
//! waits on speech.
//!
//! ```text
//! pipeline ──try_send──► [bounded queue] ──► narration task ──► VoiceSink::announce
//!                 │ full
//!                 └──► dropped (debug log)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::landmark::{Landmark, LandmarkCategory};
use crate::overlay::format_distance;

/// Default number of announcements waiting for the voice sink.
pub const DEFAULT_NARRATION_QUEUE: usize = 4;

/// How urgently the host should speak a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AnnouncementPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// A line for the voice sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub text: String,
    pub priority: AnnouncementPriority,
    /// Whether a later line may cut this one off.
    pub interruptible: bool,
}

impl Announcement {
    /// Spoken line for a landmark coming into view.
    pub fn for_landmark(landmark: &Landmark) -> Self {
        let priority = match landmark.category {
            LandmarkCategory::Historical | LandmarkCategory::Landmark => AnnouncementPriority::Normal,
            _ => AnnouncementPriority::Low,
        };
        Self {
            text: format!("{} ahead, {}", landmark.name, format_distance(landmark.distance_meters)),
            priority,
            interruptible: true,
        }
    }
}

/// Host text-to-speech.
///
/// One-way: implementations must return promptly and never report
/// failure back to the core.
pub trait VoiceSink: Send + Sync {
    fn announce(&self, text: &str, priority: AnnouncementPriority, interruptible: bool);
}

/// Sink that discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentVoiceSink;

impl VoiceSink for SilentVoiceSink {
    fn announce(&self, _text: &str, _priority: AnnouncementPriority, _interruptible: bool) {}
}

/// Fire-and-forget forwarder to a [`VoiceSink`].
#[derive(Debug)]
pub struct Narrator {
    sender: mpsc::Sender<Announcement>,
    dropped: AtomicU64,
    shutdown: CancellationToken,
}

impl Narrator {
    /// Start the narration task on the current runtime.
    pub fn spawn(sink: Arc<dyn VoiceSink>, queue: usize) -> (Arc<Self>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(queue.max(1));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_narration(sink, receiver, shutdown.clone()));
        (
            Arc::new(Self {
                sender,
                dropped: AtomicU64::new(0),
                shutdown,
            }),
            handle,
        )
    }

    /// Queue a line. Returns false if it was dropped.
    pub fn announce(&self, announcement: Announcement) -> bool {
        match self.sender.try_send(announcement) {
            Ok(()) => true,
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "Narration queue unavailable, announcement dropped");
                false
            }
        }
    }

    pub fn announce_landmark(&self, landmark: &Landmark) -> bool {
        self.announce(Announcement::for_landmark(landmark))
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop the narration task. Queued lines are discarded.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for Narrator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_narration(
    sink: Arc<dyn VoiceSink>,
    mut receiver: mpsc::Receiver<Announcement>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = receiver.recv() => match next {
                Some(line) => {
                    trace!(text = %line.text, "Announcing");
                    sink.announce(&line.text, line.priority, line.interruptible);
                }
                None => break,
            },
        }
    }
    debug!("Narration task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<(String, AnnouncementPriority, bool)>>,
    }

    impl VoiceSink for RecordingSink {
        fn announce(&self, text: &str, priority: AnnouncementPriority, interruptible: bool) {
            self.lines.lock().push((text.to_string(), priority, interruptible));
        }
    }

    fn landmark(category: LandmarkCategory, distance: f64) -> Landmark {
        let mut l = Landmark::new("old-mill", "Old Mill", category, GeoPoint::new(0.0, 0.0));
        l.distance_meters = distance;
        l
    }

    #[test]
    fn test_announcement_text_and_priority() {
        let a = Announcement::for_landmark(&landmark(LandmarkCategory::Historical, 350.0));
        assert_eq!(a.text, "Old Mill ahead, 350 m");
        assert_eq!(a.priority, AnnouncementPriority::Normal);
        assert!(a.interruptible);

        let b = Announcement::for_landmark(&landmark(LandmarkCategory::Restaurant, 1500.0));
        assert_eq!(b.priority, AnnouncementPriority::Low);
    }

    #[tokio::test]
    async fn test_lines_reach_sink() {
        let sink = Arc::new(RecordingSink::default());
        let (narrator, _handle) = Narrator::spawn(sink.clone(), DEFAULT_NARRATION_QUEUE);

        assert!(narrator.announce_landmark(&landmark(LandmarkCategory::Landmark, 120.0)));

        for _ in 0..50 {
            if !sink.lines.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let lines = sink.lines.lock();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, "Old Mill ahead, 120 m");
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        // current-thread runtime: the narration task cannot drain until we yield
        let sink = Arc::new(RecordingSink::default());
        let (narrator, _handle) = Narrator::spawn(sink, 1);

        assert!(narrator.announce_landmark(&landmark(LandmarkCategory::Landmark, 10.0)));
        assert!(!narrator.announce_landmark(&landmark(LandmarkCategory::Landmark, 20.0)));
        assert_eq!(narrator.dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let (narrator, handle) = Narrator::spawn(Arc::new(SilentVoiceSink), 2);
        narrator.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
