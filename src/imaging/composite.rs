//! Contact-sheet composition and per-photo stamping.
//!
//! The composite lays every photo of a job onto one canvas — a near-square
//! grid sized by photo count — with the job header (receipt, site, item)
//! stamped directly on the image, and encodes JPEG at a fixed quality.
//! Per-photo stamping produces the same header on each individual photo for
//! the archive's stamped mode.

use super::backend::{DrawOp, RasterBackend, RasterError, Scene};
use super::layout::{fit_dimensions, grid_layout};
use crate::types::Photo;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgba, RgbaImage};

const SHEET_BACKGROUND: Rgba<u8> = Rgba([245, 245, 245, 255]);
const HEADER_BAND: Rgba<u8> = Rgba([40, 40, 40, 255]);
const HEADER_TEXT: Rgba<u8> = Rgba([255, 255, 255, 255]);

const CELL: (u32, u32) = (320, 240);
const HEADER_HEIGHT: u32 = 32;
const HEADER_TEXT_SIZE: f32 = 18.0;

/// The header line stamped on composites and stamped photos.
pub fn header_line(receipt: &str, site: &str, item: &str) -> String {
    format!("{receipt} | {site} | {item}")
}

/// Compose all photos into one labeled contact sheet, encoded as JPEG.
/// `Ok(None)` when the photo list is empty.
pub fn compose_contact_sheet(
    backend: &impl RasterBackend,
    photos: &[Photo],
    header: &str,
    jpeg_quality: u8,
) -> Result<Option<Vec<u8>>, RasterError> {
    if photos.is_empty() {
        return Ok(None);
    }

    let layout = grid_layout(photos.len(), CELL, HEADER_HEIGHT);
    let mut ops = vec![
        DrawOp::FillRect {
            x: 0,
            y: 0,
            width: layout.width,
            height: layout.header_height,
            color: HEADER_BAND,
        },
        DrawOp::Text {
            x: 8,
            y: 6,
            size: HEADER_TEXT_SIZE,
            color: HEADER_TEXT,
            text: header.to_string(),
        },
    ];

    for (index, photo) in photos.iter().enumerate() {
        let decoded = decode(photo)?;
        let (cell_x, cell_y) = layout.cell_origin(index);
        let (w, h) = fit_dimensions(decoded.dimensions(), CELL);
        // Center inside the cell.
        let x = cell_x + (layout.cell_width - w) / 2;
        let y = cell_y + (layout.cell_height - h) / 2;
        ops.push(DrawOp::Blit {
            x: x as i64,
            y: y as i64,
            width: w,
            height: h,
            image: decoded,
        });
    }

    let frame = backend.rasterize(&Scene {
        width: layout.width,
        height: layout.height,
        background: SHEET_BACKGROUND,
        ops,
    })?;
    Ok(Some(encode_jpeg(frame, jpeg_quality)?))
}

/// Stamp the job header onto one photo, encoded as JPEG at its original size.
pub fn stamp_photo(
    backend: &impl RasterBackend,
    photo: &Photo,
    header: &str,
    jpeg_quality: u8,
) -> Result<Vec<u8>, RasterError> {
    let decoded = decode(photo)?;
    let (width, height) = decoded.dimensions();
    let band_height = HEADER_HEIGHT.min(height);

    let ops = vec![
        DrawOp::Blit {
            x: 0,
            y: 0,
            width,
            height,
            image: decoded,
        },
        DrawOp::FillRect {
            x: 0,
            y: 0,
            width,
            height: band_height,
            color: HEADER_BAND,
        },
        DrawOp::Text {
            x: 8,
            y: 6,
            size: HEADER_TEXT_SIZE,
            color: HEADER_TEXT,
            text: header.to_string(),
        },
    ];

    let frame = backend.rasterize(&Scene {
        width,
        height,
        background: SHEET_BACKGROUND,
        ops,
    })?;
    encode_jpeg(frame, jpeg_quality)
}

fn decode(photo: &Photo) -> Result<RgbaImage, RasterError> {
    let decoded = image::load_from_memory(&photo.bytes).map_err(|e| {
        RasterError::Failed(format!("decoding photo {}: {e}", photo.file_name))
    })?;
    Ok(decoded.to_rgba8())
}

fn encode_jpeg(frame: RgbaImage, quality: u8) -> Result<Vec<u8>, RasterError> {
    let rgb = DynamicImage::ImageRgba8(frame).to_rgb8();
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    rgb.write_with_encoder(encoder)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockRaster;
    use std::io::Cursor;

    pub fn tiny_photo(name: &str, width: u32, height: u32) -> Photo {
        let img = RgbaImage::from_pixel(width, height, Rgba([120, 130, 140, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        Photo {
            bytes,
            mime: "image/png".into(),
            file_name: name.into(),
        }
    }

    #[test]
    fn empty_photo_list_produces_no_artifact() {
        let backend = MockRaster::new();
        let result = compose_contact_sheet(&backend, &[], "R1 | Bay | A", 85).unwrap();
        assert!(result.is_none());
        assert!(backend.recorded().is_empty());
    }

    #[test]
    fn sheet_blits_every_photo_and_stamps_header() {
        let backend = MockRaster::new();
        let photos = vec![
            tiny_photo("a.png", 40, 30),
            tiny_photo("b.png", 30, 40),
            tiny_photo("c.png", 10, 10),
        ];

        let jpeg = compose_contact_sheet(&backend, &photos, "R1 | Bay 3 | A", 85)
            .unwrap()
            .unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let scene = &backend.recorded()[0];
        assert_eq!(scene.blit_ops, 3);
        assert!(scene.texts.iter().any(|t| t == "R1 | Bay 3 | A"));
    }

    #[test]
    fn sheet_grows_with_photo_count() {
        let backend = MockRaster::new();
        let two: Vec<Photo> = (0..2).map(|i| tiny_photo(&format!("{i}.png"), 20, 20)).collect();
        let six: Vec<Photo> = (0..6).map(|i| tiny_photo(&format!("{i}.png"), 20, 20)).collect();

        compose_contact_sheet(&backend, &two, "h", 85).unwrap();
        compose_contact_sheet(&backend, &six, "h", 85).unwrap();

        let recorded = backend.recorded();
        assert!(recorded[1].height > recorded[0].height);
    }

    #[test]
    fn undecodable_photo_is_a_render_failure() {
        let backend = MockRaster::new();
        let photos = vec![Photo {
            bytes: vec![0, 1, 2, 3],
            mime: "image/jpeg".into(),
            file_name: "broken.jpg".into(),
        }];

        let result = compose_contact_sheet(&backend, &photos, "h", 85);
        assert!(matches!(result, Err(RasterError::Failed(_))));
    }

    #[test]
    fn stamped_photo_keeps_original_size() {
        let backend = MockRaster::new();
        let photo = tiny_photo("a.png", 64, 48);

        let jpeg = stamp_photo(&backend, &photo, "R1 | Bay | A", 85).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let scene = &backend.recorded()[0];
        assert_eq!((scene.width, scene.height), (64, 48));
        assert_eq!(scene.blit_ops, 1);
    }

    #[test]
    fn header_line_joins_job_metadata() {
        assert_eq!(header_line("R1", "Bay 3", "A/B"), "R1 | Bay 3 | A/B");
    }
}
