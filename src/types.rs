//! Shared types used across all pipeline stages.
//!
//! These types move between the store, the artifact generators, the payload
//! mapper, and the submission client, and are serialized to JSON at the CLI
//! boundary (job files) — so they live in one place.

use serde::{Deserialize, Serialize};

/// One transcribed instrument reading.
///
/// The time/value invariant is enforced by the store's editing operations:
/// `time` is non-empty iff `value` or `value_secondary` is non-empty.
/// Clearing both values clears `time`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entry {
    pub id: u32,
    /// Measurement channel tag from the fixed vocabulary (e.g. "Z1", "M1").
    /// Empty when the row has not been tagged yet.
    #[serde(default)]
    pub identifier: String,
    /// Capture timestamp as a display string. Empty when the row holds no value.
    #[serde(default)]
    pub time: String,
    /// Primary channel value as entered (blur-formatted to the job's decimal places).
    #[serde(default)]
    pub value: String,
    /// Secondary channel value; only meaningful for dual-mode items.
    #[serde(default)]
    pub value_secondary: String,
}

impl Entry {
    /// A row counts as empty when neither channel holds a value.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.value_secondary.is_empty()
    }
}

/// A supporting photograph, immutable once captured.
///
/// Deduplication by `(file_name, size, last_modified)` happens at ingestion,
/// upstream of the pipeline.
#[derive(Debug, Clone)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: String,
}

/// A generated file attached to one submission attempt.
///
/// Produced by the generators, never mutated; its lifetime is one attempt.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Submission state machine: `Idle → Sending → Success | Error`.
///
/// `Sending` doubles as the single-flight mutex — a second submission for the
/// same job is rejected while one is in flight. `Error` is terminal until an
/// edit re-arms the job to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Sending,
    Success,
    Error,
}

/// One inspection record in progress — the unit of submission.
///
/// Owned by the caller's [`JobStore`](crate::store::JobStore); the pipeline
/// never retains a job beyond one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub receipt_number: String,
    pub site_location: String,
    #[serde(default)]
    pub details: String,
    /// Selected test type. Dual-mode items carry two value channels per entry
    /// and are written `"A/B"`.
    pub selected_item: String,
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u8,
    /// Decimal places for the secondary channel (dual-mode only).
    #[serde(default)]
    pub decimal_places_secondary: Option<u8>,
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(skip)]
    pub photos: Vec<Photo>,
    #[serde(skip)]
    pub status: SubmissionStatus,
    #[serde(skip)]
    pub status_message: String,
}

fn default_decimal_places() -> u8 {
    2
}

/// Manual impl so the in-memory default matches the serde default for
/// `decimal_places` (2, not the derived 0).
impl Default for Job {
    fn default() -> Self {
        Self {
            receipt_number: String::new(),
            site_location: String::new(),
            details: String::new(),
            selected_item: String::new(),
            decimal_places: default_decimal_places(),
            decimal_places_secondary: None,
            entries: Vec::new(),
            photos: Vec::new(),
            status: SubmissionStatus::default(),
            status_message: String::new(),
        }
    }
}

impl Job {
    /// Dual-mode items encode both channels as `"A/B"` in the item name.
    pub fn is_dual_mode(&self) -> bool {
        self.selected_item.contains('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_emptiness_tracks_both_channels() {
        let mut entry = Entry::default();
        assert!(entry.is_empty());

        entry.value = "1.0".into();
        assert!(!entry.is_empty());

        entry.value.clear();
        entry.value_secondary = "0.5".into();
        assert!(!entry.is_empty());
    }

    #[test]
    fn dual_mode_detected_from_item_name() {
        let mut job = Job {
            selected_item: "A/B".into(),
            ..Job::default()
        };
        assert!(job.is_dual_mode());

        job.selected_item = "A".into();
        assert!(!job.is_dual_mode());
    }

    #[test]
    fn job_file_parses_with_sparse_fields() {
        let json = r#"{
            "receipt_number": "R2026-0115",
            "site_location": "Bay 3",
            "selected_item": "A/B",
            "entries": [{"id": 1, "identifier": "Z1", "value": "1.23", "time": "10:02:11"}]
        }"#;

        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.decimal_places, 2);
        assert_eq!(job.entries.len(), 1);
        assert_eq!(job.entries[0].identifier, "Z1");
        assert_eq!(job.status, SubmissionStatus::Idle);
    }
}
