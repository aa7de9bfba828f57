//! Pure layout calculations for the snapshot and composite canvases.
//!
//! Everything here is geometry only — no pixels, no I/O — so the layout rules
//! are testable without rasterizing anything.

/// Fixed rasterization scale for the table snapshot (logical px → device px).
pub const SNAPSHOT_SCALE: u32 = 2;

/// Geometry of the rendered entry table, in device pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub width: u32,
    pub height: u32,
    /// Job metadata band above the table.
    pub title_height: u32,
    /// Column header row.
    pub header_height: u32,
    pub row_height: u32,
    /// Left x coordinate of each column, plus a final sentinel at `width`.
    pub column_edges: Vec<u32>,
}

impl TableLayout {
    pub fn row_top(&self, row: usize) -> u32 {
        self.title_height + self.header_height + row as u32 * self.row_height
    }

    pub fn column_width(&self, column: usize) -> u32 {
        self.column_edges[column + 1] - self.column_edges[column]
    }
}

/// Lay out a table of `rows` data rows and `columns` columns at a fixed
/// logical width, scaled by [`SNAPSHOT_SCALE`]. Columns split the width
/// evenly; the last column absorbs the rounding remainder.
pub fn table_layout(rows: usize, columns: usize, logical_width: u32) -> TableLayout {
    let width = logical_width.max(1) * SNAPSHOT_SCALE;
    let title_height = 24 * SNAPSHOT_SCALE;
    let header_height = 16 * SNAPSHOT_SCALE;
    let row_height = 16 * SNAPSHOT_SCALE;

    let columns = columns.max(1) as u32;
    let base = width / columns;
    let mut column_edges: Vec<u32> = (0..columns).map(|c| c * base).collect();
    column_edges.push(width);

    TableLayout {
        width,
        height: title_height + header_height + rows as u32 * row_height,
        title_height,
        header_height,
        row_height,
        column_edges,
    }
}

/// Geometry of the photo contact sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
    pub width: u32,
    pub height: u32,
    pub header_height: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub gap: u32,
}

impl GridLayout {
    /// Top-left corner of the cell holding photo `index`.
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        let col = index % self.columns;
        let row = index / self.columns;
        (
            self.gap + col * (self.cell_width + self.gap),
            self.header_height + self.gap + row * (self.cell_height + self.gap),
        )
    }
}

/// Lay out `count` photos on one canvas: near-square grid
/// (`ceil(sqrt(count))` columns), fixed cell size, header band on top.
/// The canvas grows proportionally to the photo count.
pub fn grid_layout(count: usize, cell: (u32, u32), header_height: u32) -> GridLayout {
    let count = count.max(1) as u32;
    let columns = (count as f64).sqrt().ceil() as u32;
    let rows = count.div_ceil(columns);
    let (cell_width, cell_height) = cell;
    let gap = 8;

    GridLayout {
        columns,
        rows,
        width: gap + columns * (cell_width + gap),
        height: header_height + gap + rows * (cell_height + gap),
        header_height,
        cell_width,
        cell_height,
        gap,
    }
}

/// Fit `source` dimensions inside `bounds` preserving aspect ratio.
/// Never upscales.
pub fn fit_dimensions(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;
    if src_w == 0 || src_h == 0 {
        return (0, 0);
    }
    if src_w <= max_w && src_h <= max_h {
        return (src_w, src_h);
    }

    let ratio = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    (
        ((src_w as f64 * ratio).round() as u32).max(1),
        ((src_h as f64 * ratio).round() as u32).max(1),
    )
}
