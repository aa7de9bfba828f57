//! Deterministic artifact filenames.
//!
//! Every artifact attached to a submission is named by [`build_name`]: a pure
//! function over the job's receipt number, site, item, and the artifact kind.
//! Identical inputs always yield the identical string, so a "preview" call
//! before submission matches the name actually used on send.
//!
//! Unsafe filesystem characters are stripped rather than rejected — naming
//! never fails. Runs of separators collapse to a single underscore:
//! `build_name(Composite, "R/1", "Bay: 3", "A/B")` → `R_1_Bay_3_A_B_sheet.jpg`.

use std::fmt::Write as _;

/// The artifact kinds a submission can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// PNG rasterization of the entry table.
    TableSnapshot,
    /// Contact-sheet JPEG of all photos.
    Composite,
    /// Zip of per-photo images.
    Archive,
    /// One photo inside the archive, by position in the photo list (0-based).
    Photo(usize),
}

impl ArtifactKind {
    fn label(&self) -> String {
        match self {
            ArtifactKind::TableSnapshot => "table".into(),
            ArtifactKind::Composite => "sheet".into(),
            ArtifactKind::Archive => "photos".into(),
            ArtifactKind::Photo(index) => format!("photo{:02}", index + 1),
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::TableSnapshot => "png",
            ArtifactKind::Composite => "jpg",
            ArtifactKind::Archive => "zip",
            ArtifactKind::Photo(_) => "jpg",
        }
    }

    /// MIME type the upload phase declares for this kind.
    pub fn mime(&self) -> &'static str {
        match self {
            ArtifactKind::TableSnapshot => "image/png",
            ArtifactKind::Composite => "image/jpeg",
            ArtifactKind::Archive => "application/zip",
            ArtifactKind::Photo(_) => "image/jpeg",
        }
    }
}

/// Build the deterministic filename for one artifact.
///
/// Empty segments are omitted; everything else is sanitized and joined with
/// single underscores, ending in the kind label and extension.
pub fn build_name(kind: ArtifactKind, receipt: &str, site: &str, item: &str) -> String {
    let mut name = String::new();
    for segment in [receipt, site, item] {
        let clean = sanitize(segment);
        if clean.is_empty() {
            continue;
        }
        if !name.is_empty() {
            name.push('_');
        }
        name.push_str(&clean);
    }
    if !name.is_empty() {
        name.push('_');
    }
    let _ = write!(name, "{}.{}", kind.label(), kind.extension());
    name
}

/// Strip filesystem-reserved characters and collapse separator runs.
///
/// Reserved characters (`\ / : * ? " < > |`), control characters, and
/// whitespace all count as separators; a run of them becomes one underscore.
fn sanitize(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut pending_sep = false;
    for ch in segment.chars() {
        let is_sep = ch.is_whitespace()
            || ch.is_control()
            || matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '_');
        if is_sep {
            pending_sep = !out.is_empty();
        } else {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(ch);
        }
    }
    out
}
