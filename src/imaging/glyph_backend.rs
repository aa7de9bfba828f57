//! Production rasterizer — pure Rust, no system font stack.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Canvas + blit resize | `image` (`RgbaImage`, `imageops::resize`, `imageops::overlay`) |
//! | Rect / line drawing | `imageproc::drawing` |
//! | Text | `imageproc::drawing::draw_text_mut` + `ab_glyph::FontVec` |
//!
//! The font is loaded once from a TTF/OTF path at construction. A missing or
//! unparsable font is a mount failure ([`RasterError::FontUnavailable`]) —
//! the pipeline then skips the rendered artifacts instead of aborting.

use super::backend::{DrawOp, RasterBackend, RasterError, Scene};
use ab_glyph::{FontVec, PxScale};
use image::RgbaImage;
use image::imageops::FilterType;
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

/// Scene rasterizer over the `image`/`imageproc` stack.
pub struct GlyphBackend {
    font: FontVec,
}

impl GlyphBackend {
    /// Load the stamping font. Fails with `FontUnavailable` when the file is
    /// missing or not a parsable font.
    pub fn from_font_path(path: &Path) -> Result<Self, RasterError> {
        let bytes = std::fs::read(path).map_err(|e| {
            RasterError::FontUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| RasterError::FontUnavailable(format!("{}: {}", path.display(), e)))?;
        Ok(Self { font })
    }
}

impl RasterBackend for GlyphBackend {
    fn rasterize(&self, scene: &Scene) -> Result<RgbaImage, RasterError> {
        let mut canvas = RgbaImage::from_pixel(
            scene.width.max(1),
            scene.height.max(1),
            scene.background,
        );

        for op in &scene.ops {
            match op {
                DrawOp::FillRect {
                    x,
                    y,
                    width,
                    height,
                    color,
                } => {
                    if *width == 0 || *height == 0 {
                        continue;
                    }
                    draw_filled_rect_mut(
                        &mut canvas,
                        Rect::at(*x, *y).of_size(*width, *height),
                        *color,
                    );
                }
                DrawOp::Line { from, to, color } => {
                    draw_line_segment_mut(&mut canvas, *from, *to, *color);
                }
                DrawOp::Text {
                    x,
                    y,
                    size,
                    color,
                    text,
                } => {
                    draw_text_mut(
                        &mut canvas,
                        *color,
                        *x,
                        *y,
                        PxScale::from(*size),
                        &self.font,
                        text,
                    );
                }
                DrawOp::Blit {
                    x,
                    y,
                    width,
                    height,
                    image,
                } => {
                    if *width == 0 || *height == 0 {
                        continue;
                    }
                    let resized = if image.dimensions() == (*width, *height) {
                        image.clone()
                    } else {
                        image::imageops::resize(image, *width, *height, FilterType::Triangle)
                    };
                    image::imageops::overlay(&mut canvas, &resized, *x, *y);
                }
            }
        }

        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_is_a_mount_failure() {
        let result = GlyphBackend::from_font_path(Path::new("/nonexistent/font.ttf"));
        assert!(matches!(result, Err(RasterError::FontUnavailable(_))));
    }

    #[test]
    fn garbage_font_bytes_are_a_mount_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.ttf");
        std::fs::write(&path, b"not a font").unwrap();

        let result = GlyphBackend::from_font_path(&path);
        assert!(matches!(result, Err(RasterError::FontUnavailable(_))));
    }
}
