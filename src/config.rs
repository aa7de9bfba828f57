//! Tool configuration.
//!
//! Loaded from a sparse `config.toml`: stock defaults underneath, user values
//! on top, unknown keys rejected to catch typos early.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! base_url = "http://localhost:8080"   # KTL service root
//! operator = "inspector"               # Reported as the submitting user
//!
//! [retry]
//! attempts = 3          # Attempt cap per phase
//! base_delay_ms = 500   # First backoff delay
//! factor = 2            # Backoff multiplier
//!
//! [imaging]
//! table_width = 640     # Logical width of the entry-table snapshot
//! jpeg_quality = 85     # Contact sheet / stamped photo quality (1-100)
//! # font_path = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
//!
//! [mapping]
//! archive_mode = "stamped"      # "stamped" or "raw" photo archive
//! secondary_identifiers = []    # Identifiers whose dual-mode B value maps
//! photo_identifiers = []        # Ordered names cross-linked to photos
//! ```
//!
//! Without `font_path` no rasterizer can mount, so the snapshot and contact
//! sheet are skipped and only the photo archive is uploaded.

use crate::archive::ArchiveMode;
use crate::mapping::MappingRules;
use crate::pipeline::PipelineOptions;
use crate::submit::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubmitConfig {
    /// KTL service root; phases POST to `{base_url}/uploadfiles` and `{base_url}/env`.
    pub base_url: String,
    /// Operator name reported in the envelope.
    pub operator: String,
    pub retry: RetryConfig,
    pub imaging: ImagingConfig,
    pub mapping: MappingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub factor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagingConfig {
    pub table_width: u32,
    pub jpeg_quality: u8,
    /// TTF/OTF used for all stamped text. `None` skips rendered artifacts.
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MappingConfig {
    pub archive_mode: ArchiveMode,
    pub secondary_identifiers: Vec<String>,
    pub photo_identifiers: Vec<String>,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            operator: "inspector".to_string(),
            retry: RetryConfig::default(),
            imaging: ImagingConfig::default(),
            mapping: MappingConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 500,
            factor: 2,
        }
    }
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            table_width: 640,
            jpeg_quality: 85,
            font_path: None,
        }
    }
}

#[allow(clippy::derivable_impls)]
impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            archive_mode: ArchiveMode::default(),
            secondary_identifiers: Vec::new(),
            photo_identifiers: Vec::new(),
        }
    }
}

impl SubmitConfig {
    /// Load from a `config.toml`, falling back to stock defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: SubmitConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.attempts == 0 || self.retry.attempts > 10 {
            return Err(ConfigError::Validation(format!(
                "retry.attempts must be 1-10, got {}",
                self.retry.attempts
            )));
        }
        if self.retry.factor == 0 {
            return Err(ConfigError::Validation(
                "retry.factor must be at least 1".to_string(),
            ));
        }
        if self.imaging.jpeg_quality == 0 || self.imaging.jpeg_quality > 100 {
            return Err(ConfigError::Validation(format!(
                "imaging.jpeg_quality must be 1-100, got {}",
                self.imaging.jpeg_quality
            )));
        }
        if self.imaging.table_width == 0 {
            return Err(ConfigError::Validation(
                "imaging.table_width must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry.attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            factor: self.retry.factor,
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            operator: self.operator.clone(),
            table_width: self.imaging.table_width,
            jpeg_quality: self.imaging.jpeg_quality,
            archive_mode: self.mapping.archive_mode,
            rules: MappingRules {
                secondary_identifiers: self.mapping.secondary_identifiers.clone(),
                photo_identifiers: self.mapping.photo_identifiers.clone(),
            },
        }
    }
}

/// The documented stock config, printed by `ktl-submit gen-config`.
pub fn stock_config_toml() -> &'static str {
    r#"# ktl-submit configuration. All options are optional - defaults shown below.

base_url = "http://localhost:8080"   # KTL service root
operator = "inspector"               # Reported as the submitting user

[retry]
attempts = 3          # Attempt cap per phase
base_delay_ms = 500   # First backoff delay
factor = 2            # Backoff multiplier

[imaging]
table_width = 640     # Logical width of the entry-table snapshot
jpeg_quality = 85     # Contact sheet / stamped photo quality (1-100)
# font_path = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"

[mapping]
archive_mode = "stamped"      # "stamped" or "raw" photo archive
secondary_identifiers = []    # Identifiers whose dual-mode B value maps
photo_identifiers = []        # Ordered names cross-linked to photo files
"#
}
