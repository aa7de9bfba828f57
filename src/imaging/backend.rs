//! Rasterization backend trait and shared scene types.
//!
//! The snapshot and composite generators never touch pixels directly: they
//! build a [`Scene`] — a display list of fills, lines, text, and photo blits —
//! and hand it to a [`RasterBackend`]. The production implementation is
//! [`GlyphBackend`](super::glyph_backend::GlyphBackend); tests use a mock that
//! records scenes without rasterizing.
//!
//! This keeps the snapshot contract portable: any host that can turn a scene
//! into pixels (headless raster, server-side renderer) satisfies it.

use image::{Rgba, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("font unavailable: {0}")]
    FontUnavailable(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("raster failed: {0}")]
    Failed(String),
}

/// One drawing operation, in paint order.
#[derive(Debug, Clone)]
pub enum DrawOp {
    FillRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: Rgba<u8>,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        color: Rgba<u8>,
    },
    Text {
        x: i32,
        y: i32,
        size: f32,
        color: Rgba<u8>,
        text: String,
    },
    /// Resize `image` to `width`×`height` and draw it at `(x, y)`.
    Blit {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        image: RgbaImage,
    },
}

/// A complete display list for one canvas.
#[derive(Debug, Clone)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub background: Rgba<u8>,
    pub ops: Vec<DrawOp>,
}

/// Trait for scene rasterizers.
///
/// Implementations must be deterministic: rasterizing the same scene twice
/// yields identical pixels. The snapshot renderer relies on this for its
/// settle check.
pub trait RasterBackend: Sync {
    fn rasterize(&self, scene: &Scene) -> Result<RgbaImage, RasterError>;
}
