//! Rasterized artifact generation: the table snapshot and the photo
//! contact sheet.
//!
//! Split the way the rest of the pipeline is split: pure layout math
//! ([`layout`]), a backend seam ([`backend`]) so generators never touch
//! pixels directly, the production rasterizer ([`glyph_backend`]), and the
//! two generators ([`snapshot`], [`composite`]).

pub mod backend;
pub mod composite;
pub mod glyph_backend;
pub mod layout;
pub mod snapshot;

pub use backend::{DrawOp, RasterBackend, RasterError, Scene};
pub use composite::{compose_contact_sheet, header_line, stamp_photo};
pub use glyph_backend::GlyphBackend;
pub use layout::{SNAPSHOT_SCALE, fit_dimensions, grid_layout, table_layout};
pub use snapshot::render_snapshot;
