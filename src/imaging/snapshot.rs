//! Table snapshot rendering — the PNG rasterization of the entry table.
//!
//! The table is laid out by [`layout::table_layout`](super::layout::table_layout)
//! at a fixed logical width and 2x scale, painted as a [`Scene`], and captured
//! only once the render has settled: two successive rasterization passes must
//! produce identical pixels. That models the host's "layout stabilized" signal
//! without a sleep, and holds trivially for deterministic backends.
//!
//! Returns `Ok(None)` ("no artifact") when every entry is empty — a bare grid
//! is not worth attaching.

use super::backend::{DrawOp, RasterBackend, RasterError, Scene};
use super::layout::{SNAPSHOT_SCALE, TableLayout, table_layout};
use crate::types::Job;
use image::{DynamicImage, ImageFormat, Rgba};
use std::io::Cursor;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const HEADER_FILL: Rgba<u8> = Rgba([235, 235, 235, 255]);
const GRID: Rgba<u8> = Rgba([180, 180, 180, 255]);
const INK: Rgba<u8> = Rgba([20, 20, 20, 255]);

/// Passes allowed for the settle check before the render is declared unstable.
const SETTLE_PASS_CAP: usize = 4;

/// Render the entry table to PNG bytes. `Ok(None)` when all entries are empty.
pub fn render_snapshot(
    backend: &impl RasterBackend,
    job: &Job,
    logical_width: u32,
) -> Result<Option<Vec<u8>>, RasterError> {
    if job.entries.iter().all(|e| e.is_empty()) {
        return Ok(None);
    }

    let scene = build_scene(job, logical_width);
    let frame = rasterize_settled(backend, &scene)?;

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(frame).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(Some(bytes))
}

/// Rasterize until two successive passes agree, within the pass cap.
fn rasterize_settled(
    backend: &impl RasterBackend,
    scene: &Scene,
) -> Result<image::RgbaImage, RasterError> {
    let mut previous: Option<image::RgbaImage> = None;
    for _ in 0..SETTLE_PASS_CAP {
        let frame = backend.rasterize(scene)?;
        if let Some(prev) = &previous
            && prev.dimensions() == frame.dimensions()
            && prev.as_raw() == frame.as_raw()
        {
            return Ok(frame);
        }
        previous = Some(frame);
    }
    Err(RasterError::Failed(format!(
        "render did not settle within {SETTLE_PASS_CAP} passes"
    )))
}

fn columns_for(job: &Job) -> Vec<&'static str> {
    if job.is_dual_mode() {
        vec!["#", "Time", "ID", "Value A", "Value B"]
    } else {
        vec!["#", "Time", "ID", "Value"]
    }
}

fn build_scene(job: &Job, logical_width: u32) -> Scene {
    let headers = columns_for(job);
    let layout = table_layout(job.entries.len(), headers.len(), logical_width);
    let mut ops = Vec::new();

    let title = format!(
        "{}  {}  {}",
        job.receipt_number, job.site_location, job.selected_item
    );
    ops.push(text(&layout, 0, 4, &title, 12.0));

    // Column header band
    ops.push(DrawOp::FillRect {
        x: 0,
        y: layout.title_height as i32,
        width: layout.width,
        height: layout.header_height,
        color: HEADER_FILL,
    });
    for (col, header) in headers.iter().enumerate() {
        ops.push(cell_text(&layout, col, layout.title_height, header));
    }

    for (row, entry) in job.entries.iter().enumerate() {
        let top = layout.row_top(row);
        let number = (row + 1).to_string();
        let mut cells = vec![
            number.as_str(),
            entry.time.as_str(),
            entry.identifier.as_str(),
            entry.value.as_str(),
        ];
        if job.is_dual_mode() {
            cells.push(entry.value_secondary.as_str());
        }
        for (col, value) in cells.iter().enumerate() {
            if !value.is_empty() {
                ops.push(cell_text(&layout, col, top, value));
            }
        }
    }

    append_grid_lines(&layout, job.entries.len(), &mut ops);

    Scene {
        width: layout.width,
        height: layout.height,
        background: BACKGROUND,
        ops,
    }
}

fn cell_text(layout: &TableLayout, column: usize, top: u32, text_value: &str) -> DrawOp {
    text(
        layout,
        layout.column_edges[column] as i32,
        top as i32 + 2 * SNAPSHOT_SCALE as i32,
        text_value,
        10.0,
    )
}

fn text(_layout: &TableLayout, x: i32, y: i32, value: &str, logical_size: f32) -> DrawOp {
    DrawOp::Text {
        x: x + 2 * SNAPSHOT_SCALE as i32,
        y,
        size: logical_size * SNAPSHOT_SCALE as f32,
        color: INK,
        text: value.to_string(),
    }
}

fn append_grid_lines(layout: &TableLayout, rows: usize, ops: &mut Vec<DrawOp>) {
    let table_top = layout.title_height as f32;
    let bottom = layout.height as f32 - 1.0;

    // Horizontal rules: header boundary plus one under each row.
    for row in 0..=rows + 1 {
        let y = (layout.title_height + row as u32 * layout.row_height).min(layout.height - 1);
        ops.push(DrawOp::Line {
            from: (0.0, y as f32),
            to: (layout.width as f32 - 1.0, y as f32),
            color: GRID,
        });
    }
    for &edge in &layout.column_edges {
        let x = edge.min(layout.width - 1) as f32;
        ops.push(DrawOp::Line {
            from: (x, table_top),
            to: (x, bottom),
            color: GRID,
        });
    }
}
