//! Zip packaging of per-photo images.
//!
//! The archive is deterministic: entries appear in exactly the order of the
//! job's photo list and carry a fixed timestamp, so packing the same inputs
//! twice yields the same bytes. Zero photos means **no archive at all** — an
//! empty zip is never produced.
//!
//! Unlike the rendered artifacts, archive failures are fatal to the
//! submission: a partially built archive is not safe to send.

use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// What the archive holds: original photo bytes, or the per-photo
/// header-stamped JPEG derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveMode {
    Raw,
    #[default]
    Stamped,
}

/// Pack named files into a zip, preserving order. `Ok(None)` for no entries.
pub fn pack(entries: &[(String, Vec<u8>)]) -> Result<Option<Vec<u8>>, ArchiveError> {
    if entries.is_empty() {
        return Ok(None);
    }

    // Fixed timestamp keeps the output byte-identical across runs.
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(bytes)?;
    }
    let cursor = writer.finish()?;
    Ok(Some(cursor.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::ZipArchive;

    fn entry(name: &str, byte: u8) -> (String, Vec<u8>) {
        (name.to_string(), vec![byte; 16])
    }

    #[test]
    fn zero_entries_means_no_artifact_not_an_empty_zip() {
        assert!(pack(&[]).unwrap().is_none());
    }

    #[test]
    fn entry_order_matches_input_order() {
        let bytes = pack(&[
            entry("R1_photo01.jpg", 1),
            entry("R1_photo02.jpg", 2),
            entry("R1_photo03.jpg", 3),
        ])
        .unwrap()
        .unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["R1_photo01.jpg", "R1_photo02.jpg", "R1_photo03.jpg"]
        );
    }

    #[test]
    fn packing_is_deterministic() {
        let entries = vec![entry("a.jpg", 9), entry("b.jpg", 7)];
        assert_eq!(pack(&entries).unwrap(), pack(&entries).unwrap());
    }

    #[test]
    fn round_trips_file_bytes() {
        use std::io::Read;

        let bytes = pack(&[entry("a.jpg", 42)]).unwrap().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_index(0).unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, vec![42u8; 16]);
    }
}
