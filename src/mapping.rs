//! Canonical mapping of entries into the KTL wire schema.
//!
//! [`build_payload`] is pure given `(job, operator, artifact names, rules)` —
//! no network, no I/O — so the mapping is auditable and testable on its own.
//!
//! ## Channel rules
//!
//! Which identifiers may do what is declarative data ([`CHANNEL_RULES`]), not
//! inline branching:
//!
//! - ordinary channels contribute the **leading numeric token** of their value
//!   (optional sign, digits, optional decimal fraction); entries whose value
//!   has no such token are silently dropped — free text never reaches the
//!   wire;
//! - the `RT` timing channels may carry an **encoded composite reading**
//!   (reserved leading `[` marker) which bypasses numeric extraction and is
//!   round-tripped verbatim;
//! - dual-mode secondary values map only for identifiers in the caller's
//!   explicit allow-list, under the `_B`-suffixed key;
//! - photo cross-links are **positional**: the nth name in the configured
//!   identifier-naming list is paired with the nth produced photo filename,
//!   never by string matching.

use crate::types::Job;
use serde::Serialize;
use std::collections::BTreeMap;

/// Constant record-class tag the `/env` endpoint expects.
pub const CATEGORY_TAG: &str = "env";

/// Reserved marker opening an encoded composite reading.
pub const COMPOSITE_MARKER: char = '[';

/// What an identifier prefix is allowed to contribute to the wire map.
#[derive(Debug, Clone, Copy)]
pub struct ChannelRule {
    pub prefix: &'static str,
    /// Bracket-marked values are round-tripped verbatim.
    pub composite_passthrough: bool,
    /// The identifier may carry a dual-mode secondary value.
    pub secondary_channel: bool,
}

/// The fixed channel vocabulary. Longest prefix wins.
pub const CHANNEL_RULES: &[ChannelRule] = &[
    ChannelRule {
        prefix: "RT",
        composite_passthrough: true,
        secondary_channel: false,
    },
    ChannelRule {
        prefix: "Z",
        composite_passthrough: false,
        secondary_channel: true,
    },
    ChannelRule {
        prefix: "M",
        composite_passthrough: false,
        secondary_channel: true,
    },
];

fn rule_for(identifier: &str) -> Option<&'static ChannelRule> {
    CHANNEL_RULES
        .iter()
        .filter(|rule| identifier.starts_with(rule.prefix))
        .max_by_key(|rule| rule.prefix.len())
}

/// Caller-configured mapping inputs.
#[derive(Debug, Clone, Default)]
pub struct MappingRules {
    /// Identifiers whose dual-mode secondary value is mapped (under `_B`).
    pub secondary_identifiers: Vec<String>,
    /// Ordered identifier names cross-linked to photo filenames by position.
    pub photo_identifiers: Vec<String>,
}

/// Filenames produced by the artifact generators for one attempt.
#[derive(Debug, Clone, Default)]
pub struct ArtifactNames {
    pub snapshot: Option<String>,
    pub composite: Option<String>,
    pub archive: Option<String>,
    /// Per-photo names inside the archive, in photo-list order.
    pub photos: Vec<String>,
}

impl ArtifactNames {
    /// Names in upload order: snapshot → composite → archive.
    pub fn produced(&self) -> Vec<&str> {
        [&self.snapshot, &self.composite, &self.archive]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect()
    }
}

/// The canonical remote-schema object, built once per submission attempt and
/// immutable after construction.
#[derive(Debug, Clone)]
pub struct Payload {
    pub receipt_number: String,
    pub site_location: String,
    pub selected_item: String,
    pub decimal_places: u8,
    pub decimal_places_secondary: Option<u8>,
    pub operator: String,
    /// Identifier-keyed value map.
    pub items: BTreeMap<String, String>,
    /// Descriptive comment synthesized for audit purposes.
    pub comment: String,
}

/// Wire envelope for the JSON phase (`POST {base}/env`).
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "receiptno")]
    pub receipt_no: String,
    /// The items map, JSON-encoded as a string.
    #[serde(rename = "envdata")]
    pub env_data: String,
    pub category: String,
    pub username: String,
    /// The comment, JSON-encoded as a string.
    pub comment: String,
}

impl Payload {
    pub fn envelope(&self) -> Envelope {
        // Both nested values ride as JSON-encoded strings; a BTreeMap and a
        // String always serialize, so the fallbacks are unreachable.
        Envelope {
            receipt_no: self.receipt_number.clone(),
            env_data: serde_json::to_string(&self.items).unwrap_or_default(),
            category: CATEGORY_TAG.to_string(),
            username: self.operator.clone(),
            comment: serde_json::to_string(&self.comment).unwrap_or_default(),
        }
    }
}

/// Build the payload for one submission attempt.
pub fn build_payload(
    job: &Job,
    operator: &str,
    names: &ArtifactNames,
    rules: &MappingRules,
) -> Payload {
    let mut items = BTreeMap::new();
    let dual = job.is_dual_mode();

    for entry in &job.entries {
        if entry.identifier.is_empty() {
            continue;
        }
        let rule = rule_for(&entry.identifier);

        if entry.value.starts_with(COMPOSITE_MARKER)
            && rule.is_some_and(|r| r.composite_passthrough)
        {
            items.insert(entry.identifier.clone(), entry.value.clone());
        } else if let Some(token) = leading_numeric_token(&entry.value) {
            items.insert(entry.identifier.clone(), token.to_string());
        }

        if dual
            && rule.is_some_and(|r| r.secondary_channel)
            && rules.secondary_identifiers.contains(&entry.identifier)
            && let Some(token) = leading_numeric_token(&entry.value_secondary)
        {
            items.insert(format!("{}_B", entry.identifier), token.to_string());
        }
    }

    for (position, link_name) in rules.photo_identifiers.iter().enumerate() {
        if let Some(photo_name) = names.photos.get(position) {
            items.insert(format!("{link_name}_FILE"), photo_name.clone());
        }
    }

    Payload {
        receipt_number: job.receipt_number.clone(),
        site_location: job.site_location.clone(),
        selected_item: job.selected_item.clone(),
        decimal_places: job.decimal_places,
        decimal_places_secondary: job.decimal_places_secondary,
        operator: operator.to_string(),
        items,
        comment: format!("{} {}", job.selected_item, job.site_location),
    }
}

/// Extract the leading numeric token: optional sign, digits, optional
/// fractional part. `"12.5V"` → `"12.5"`, `"-3dB"` → `"-3"`, `"n/a"` → none.
pub fn leading_numeric_token(value: &str) -> Option<&str> {
    let bytes = value.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let fraction_start = end + 1;
        let mut fraction_end = fraction_start;
        while fraction_end < bytes.len() && bytes[fraction_end].is_ascii_digit() {
            fraction_end += 1;
        }
        if fraction_end > fraction_start {
            end = fraction_end;
        }
    }
    Some(&value[..end])
}
