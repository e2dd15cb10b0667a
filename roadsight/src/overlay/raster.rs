//! Raster drawing surface backed by a `tiny_skia::Pixmap`.
//!
//! Cards and borders are rasterized; icons become filled discs. Text
//! commands are counted but not rasterized (glyph shaping belongs to the
//! host's text stack).

use tiny_skia::{Color, FillRule, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};
use tracing::debug;

use super::renderer::{DrawCommand, DrawSurface, Rgba};

/// Offset of the drop shadow under cards, in pixels.
const SHADOW_OFFSET: f32 = 3.0;

/// Draw surface rendering into an owned pixmap.
pub struct PixmapSurface {
    pixmap: Pixmap,
    frames: u64,
    text_commands: u64,
}

impl std::fmt::Debug for PixmapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixmapSurface")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .field("frames", &self.frames)
            .finish()
    }
}

impl PixmapSurface {
    /// Create a transparent surface. Returns `None` for a zero-sized area.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            pixmap: Pixmap::new(width, height)?,
            frames: 0,
            text_commands: 0,
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Text commands seen across all frames.
    pub fn text_commands(&self) -> u64 {
        self.text_commands
    }

    /// Alpha at a pixel, or `None` outside the surface.
    pub fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        self.pixmap.pixel(x, y).map(|p| p.alpha())
    }

    fn draw(&mut self, command: &DrawCommand) {
        match command {
            DrawCommand::RoundedRect {
                x,
                y,
                width,
                height,
                radius,
                fill,
                border,
                shadow,
                ..
            } => {
                let (x, y, w, h, r) = (*x as f32, *y as f32, *width as f32, *height as f32, *radius as f32);

                if *shadow {
                    if let Some(path) = rounded_rect(x + SHADOW_OFFSET, y + SHADOW_OFFSET, w, h, r) {
                        let shadow_color = Rgba::new(0, 0, 0, fill.a / 3);
                        self.pixmap.fill_path(
                            &path,
                            &paint(shadow_color),
                            FillRule::Winding,
                            Transform::identity(),
                            None,
                        );
                    }
                }

                let Some(path) = rounded_rect(x, y, w, h, r) else {
                    debug!(x, y, w, h, "Skipping degenerate card");
                    return;
                };
                self.pixmap
                    .fill_path(&path, &paint(*fill), FillRule::Winding, Transform::identity(), None);

                if let Some((color, stroke_width)) = border {
                    let stroke = Stroke {
                        width: *stroke_width as f32,
                        ..Stroke::default()
                    };
                    self.pixmap
                        .stroke_path(&path, &paint(*color), &stroke, Transform::identity(), None);
                }
            }
            DrawCommand::Icon { x, y, size, color, .. } => {
                if let Some(path) = PathBuilder::from_circle(*x as f32, *y as f32, (*size / 2.0) as f32) {
                    self.pixmap
                        .fill_path(&path, &paint(*color), FillRule::Winding, Transform::identity(), None);
                }
            }
            DrawCommand::Text { .. } => {
                self.text_commands += 1;
            }
        }
    }
}

impl DrawSurface for PixmapSurface {
    fn submit_frame(&mut self, commands: &[DrawCommand]) {
        self.pixmap.fill(Color::TRANSPARENT);
        for command in commands {
            self.draw(command);
        }
        self.frames += 1;
    }
}

fn paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

/// Rounded rectangle path; the radius is clamped to half the short side.
fn rounded_rect(x: f32, y: f32, w: f32, h: f32, radius: f32) -> Option<Path> {
    if !(w > 0.0 && h > 0.0) || !x.is_finite() || !y.is_finite() {
        return None;
    }
    let r = radius.max(0.0).min(w / 2.0).min(h / 2.0);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}
