//! Converts the overlay pool into draw commands.
//!
//! The renderer never touches pixels. Each frame it emits an ordered
//! command list (background card, border, type-specific icon and text) and
//! hands it to a [`DrawSurface`].

use super::model::{Overlay, OverlayContent};
use super::pool::OverlayModel;

/// RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Same color with alpha scaled by `opacity`.
    pub fn with_opacity(self, opacity: f64) -> Self {
        let a = (self.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

/// One drawing instruction for the surface.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    RoundedRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        radius: f64,
        fill: Rgba,
        border: Option<(Rgba, f64)>,
        shadow: bool,
        blur: bool,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        size: f64,
        color: Rgba,
    },
    Icon {
        x: f64,
        y: f64,
        size: f64,
        glyph: String,
        color: Rgba,
    },
}

/// Receives one ordered command list per frame.
pub trait DrawSurface {
    fn submit_frame(&mut self, commands: &[DrawCommand]);
}

/// Colors and metrics used when building commands.
#[derive(Debug, Clone)]
pub struct RendererStyle {
    pub card_fill: Rgba,
    pub card_border: Rgba,
    pub border_width: f64,
    pub corner_radius: f64,
    pub title_color: Rgba,
    pub detail_color: Rgba,
    pub title_size: f64,
    pub detail_size: f64,
    pub icon_size: f64,
}

impl Default for RendererStyle {
    fn default() -> Self {
        Self {
            card_fill: Rgba::new(20, 24, 32, 200),
            card_border: Rgba::new(255, 255, 255, 90),
            border_width: 1.0,
            corner_radius: 12.0,
            title_color: Rgba::new(255, 255, 255, 255),
            detail_color: Rgba::new(200, 206, 214, 255),
            title_size: 15.0,
            detail_size: 12.0,
            icon_size: 24.0,
        }
    }
}

/// Builds per-frame draw commands from the overlay model.
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    style: RendererStyle,
}

impl OverlayRenderer {
    pub fn new(style: RendererStyle) -> Self {
        Self { style }
    }

    /// Draw the model onto the surface. Returns the number of overlays drawn.
    pub fn render(&self, model: &OverlayModel, surface: &mut dyn DrawSurface) -> usize {
        let order = model.render_order();
        let commands = self.build_commands(model, &order);
        surface.submit_frame(&commands);
        order.len()
    }

    fn build_commands(&self, model: &OverlayModel, order: &[&Overlay]) -> Vec<DrawCommand> {
        let mode = model.performance_mode();
        let mut commands = Vec::with_capacity(order.len() * 4);

        for overlay in order {
            let opacity = overlay.opacity();
            let scale = overlay.scale();
            let (cx, cy) = overlay.position();
            let width = overlay.size.width * scale;
            let height = overlay.size.height * scale;
            let left = cx - width / 2.0;
            let top = cy - height / 2.0;

            commands.push(DrawCommand::RoundedRect {
                x: left,
                y: top,
                width,
                height,
                radius: self.style.corner_radius * scale,
                fill: self.style.card_fill.with_opacity(opacity),
                border: Some((
                    self.style.card_border.with_opacity(opacity),
                    self.style.border_width,
                )),
                shadow: mode.shadows_enabled(),
                blur: mode.blur_enabled(),
            });

            let padding = 8.0 * scale;
            let icon_size = self.style.icon_size * scale;
            let (glyph, title, detail) = describe(&overlay.content);

            commands.push(DrawCommand::Icon {
                x: left + padding + icon_size / 2.0,
                y: cy,
                size: icon_size,
                glyph,
                color: self.style.title_color.with_opacity(opacity),
            });

            let text_x = left + padding * 2.0 + icon_size;
            commands.push(DrawCommand::Text {
                x: text_x,
                y: top + padding + self.style.title_size * scale,
                text: title,
                size: self.style.title_size * scale,
                color: self.style.title_color.with_opacity(opacity),
            });
            if let Some(detail) = detail {
                commands.push(DrawCommand::Text {
                    x: text_x,
                    y: top + height - padding,
                    text: detail,
                    size: self.style.detail_size * scale,
                    color: self.style.detail_color.with_opacity(opacity),
                });
            }
        }

        commands
    }
}

/// Icon glyph, title line and optional detail line for a content payload.
fn describe(content: &OverlayContent) -> (String, String, Option<String>) {
    match content {
        OverlayContent::Landmark(c) => {
            let mut detail = format_distance(c.distance_meters);
            if let Some(rating) = c.rating {
                detail.push_str(&format!(" · ★ {:.1}", rating));
            }
            (c.category.icon().to_string(), c.name.clone(), Some(detail))
        }
        OverlayContent::Navigation(c) => (
            direction_arrow(c.direction_degrees).to_string(),
            c.instruction.clone(),
            Some(format_distance(c.distance_meters)),
        ),
        OverlayContent::Game(c) => (
            "target".to_string(),
            c.title.clone(),
            Some(format!("{} pts · {:.0}%", c.score, c.progress)),
        ),
        OverlayContent::Photo(c) => (
            "camera".to_string(),
            c.caption.clone(),
            (c.landmark_count > 0).then(|| format!("{} landmarks", c.landmark_count)),
        ),
    }
}

/// Eight-way arrow glyph name for a relative direction.
fn direction_arrow(degrees: f64) -> &'static str {
    const ARROWS: [&str; 8] = [
        "arrow-up",
        "arrow-up-right",
        "arrow-right",
        "arrow-down-right",
        "arrow-down",
        "arrow-down-left",
        "arrow-left",
        "arrow-up-left",
    ];
    let wrapped = degrees.rem_euclid(360.0);
    let index = ((wrapped + 22.5) / 45.0) as usize % 8;
    ARROWS[index]
}

/// Human-readable distance: meters below 1 km, tenths of km above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1_000.0 {
        format!("{:.0} m", meters)
    } else {
        format!("{:.1} km", meters / 1_000.0)
    }
}

/// Surface that keeps every submitted frame. Used by photo composition and
/// tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    frames: Vec<Vec<DrawCommand>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Vec<DrawCommand>] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&[DrawCommand]> {
        self.frames.last().map(Vec::as_slice)
    }
}

impl DrawSurface for RecordingSurface {
    fn submit_frame(&mut self, commands: &[DrawCommand]) {
        self.frames.push(commands.to_vec());
    }
}
