//! Submission orchestration.
//!
//! One attempt runs the three generators in order (snapshot → composite →
//! archive), collects the produced filenames, builds the payload, and drives
//! the two-phase client — mirroring the caller contract:
//!
//! - each generator yields an explicit [`Generated`] outcome; rendered
//!   artifacts that fail are logged and **omitted**, a failed archive
//!   **aborts** (a partially built archive is not safe to send);
//! - artifacts and payload are captured synchronously in [`begin`], before
//!   any suspension — edits made to the job while the request is in flight
//!   do not affect the attempt;
//! - the job's status acts as the single-flight mutex: `begin` rejects a job
//!   already `Sending`, refuses an `Error` job until an edit re-arms it, and
//!   [`finish`] resolves every attempt to `Success` or `Error`.

use crate::archive::{self, ArchiveError, ArchiveMode};
use crate::imaging::{RasterBackend, RasterError, compose_contact_sheet, header_line,
    render_snapshot, stamp_photo};
use crate::mapping::{ArtifactNames, MappingRules, Payload, build_payload};
use crate::naming::{ArtifactKind, build_name};
use crate::store::{JobId, JobStore, StoreError};
use crate::submit::{HttpTransport, SubmissionClient, SubmitError};
use crate::types::{Artifact, Job, SubmissionStatus};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("a submission is already in flight for this job")]
    AlreadySending,
    #[error("the last submission failed; edit the job to re-arm it")]
    ErrorNotCleared,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("archive generation failed: {0}")]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// Knobs one attempt needs, extracted from the loaded config.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub operator: String,
    /// Logical width of the rendered entry table.
    pub table_width: u32,
    pub jpeg_quality: u8,
    pub archive_mode: ArchiveMode,
    pub rules: MappingRules,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            operator: String::new(),
            table_width: 640,
            jpeg_quality: 85,
            archive_mode: ArchiveMode::default(),
            rules: MappingRules::default(),
        }
    }
}

/// Outcome of one artifact generator.
#[derive(Debug)]
pub enum Generated {
    Produced(Artifact),
    Skipped,
    Failed(RasterError),
}

impl Generated {
    fn from_render(result: Result<Option<Vec<u8>>, RasterError>, name: String, mime: &str) -> Self {
        match result {
            Ok(Some(bytes)) => Generated::Produced(Artifact {
                name,
                bytes,
                mime: mime.to_string(),
            }),
            Ok(None) => Generated::Skipped,
            Err(err) => Generated::Failed(err),
        }
    }

    /// Downgrade policy for rendered artifacts: a failure is logged and the
    /// artifact omitted rather than aborting the attempt.
    fn into_omittable(self, what: &str) -> Option<Artifact> {
        match self {
            Generated::Produced(artifact) => Some(artifact),
            Generated::Skipped => {
                info!(artifact = what, "nothing to render, artifact skipped");
                None
            }
            Generated::Failed(err) => {
                warn!(artifact = what, error = %err, "render failed, artifact omitted");
                None
            }
        }
    }
}

/// Everything captured for one submission attempt.
#[derive(Debug)]
pub struct Attempt {
    pub artifacts: Vec<Artifact>,
    pub payload: Payload,
}

/// Capture an attempt and mark the job `Sending`.
///
/// Fully synchronous: by the time this returns, later edits to the job can
/// no longer influence the attempt.
pub fn begin(
    store: &mut JobStore,
    id: JobId,
    raster: Option<&impl RasterBackend>,
    opts: &PipelineOptions,
) -> Result<Attempt, PipelineError> {
    let job = store.get(id)?;
    match job.status {
        SubmissionStatus::Sending => return Err(PipelineError::AlreadySending),
        // Error is terminal until a store edit re-arms the job to Idle.
        SubmissionStatus::Error => return Err(PipelineError::ErrorNotCleared),
        SubmissionStatus::Idle | SubmissionStatus::Success => {}
    }

    let attempt = match generate(job, raster, opts) {
        Ok(attempt) => attempt,
        Err(err) => {
            let job = store.get_mut(id)?;
            job.status = SubmissionStatus::Error;
            job.status_message = format!("archive generation failed: {err}");
            return Err(err.into());
        }
    };

    let job = store.get_mut(id)?;
    job.status = SubmissionStatus::Sending;
    job.status_message.clear();
    Ok(attempt)
}

/// Record the outcome of the network phases on the job.
pub fn finish(
    store: &mut JobStore,
    id: JobId,
    outcome: Result<(), SubmitError>,
) -> Result<(), PipelineError> {
    let job = store.get_mut(id)?;
    match outcome {
        Ok(()) => {
            job.status = SubmissionStatus::Success;
            job.status_message = "submitted".to_string();
            Ok(())
        }
        Err(err) => {
            job.status = SubmissionStatus::Error;
            job.status_message = err.to_string();
            Err(err.into())
        }
    }
}

/// Run one complete attempt: capture, transmit, record.
pub async fn submit_job<R: RasterBackend, T: HttpTransport>(
    store: &mut JobStore,
    id: JobId,
    raster: Option<&R>,
    client: &SubmissionClient<T>,
    opts: &PipelineOptions,
) -> Result<(), PipelineError> {
    let attempt = begin(store, id, raster, opts)?;
    info!(
        artifacts = attempt.artifacts.len(),
        receipt = %attempt.payload.receipt_number,
        "submitting"
    );
    let envelope = attempt.payload.envelope();
    let outcome = client.submit(&attempt.artifacts, &envelope).await;
    finish(store, id, outcome)
}

/// Run the generators in order and build the payload. Pure except for logging.
pub fn generate(
    job: &Job,
    raster: Option<&impl RasterBackend>,
    opts: &PipelineOptions,
) -> Result<Attempt, ArchiveError> {
    let receipt = job.receipt_number.as_str();
    let site = job.site_location.as_str();
    let item = job.selected_item.as_str();
    let header = header_line(receipt, site, item);

    let snapshot = match raster {
        Some(backend) => Generated::from_render(
            render_snapshot(backend, job, opts.table_width),
            build_name(ArtifactKind::TableSnapshot, receipt, site, item),
            ArtifactKind::TableSnapshot.mime(),
        ),
        None => Generated::Skipped,
    };
    let composite = match raster {
        Some(backend) => Generated::from_render(
            compose_contact_sheet(backend, &job.photos, &header, opts.jpeg_quality),
            build_name(ArtifactKind::Composite, receipt, site, item),
            ArtifactKind::Composite.mime(),
        ),
        None => Generated::Skipped,
    };

    let photo_names: Vec<String> = (0..job.photos.len())
        .map(|index| build_name(ArtifactKind::Photo(index), receipt, site, item))
        .collect();
    let archive = pack_photos(job, raster, opts, &header, &photo_names)?;

    let mut names = ArtifactNames {
        photos: photo_names,
        ..ArtifactNames::default()
    };
    let mut artifacts = Vec::new();

    if let Some(artifact) = snapshot.into_omittable("table snapshot") {
        names.snapshot = Some(artifact.name.clone());
        artifacts.push(artifact);
    }
    if let Some(artifact) = composite.into_omittable("contact sheet") {
        names.composite = Some(artifact.name.clone());
        artifacts.push(artifact);
    }
    if let Some(artifact) = archive {
        names.archive = Some(artifact.name.clone());
        artifacts.push(artifact);
    }

    let payload = build_payload(job, &opts.operator, &names, &opts.rules);
    Ok(Attempt { artifacts, payload })
}

/// Build the photo archive. Stamping falls back to the raw photo when the
/// raster is unavailable or a single stamp fails; zip errors abort.
fn pack_photos(
    job: &Job,
    raster: Option<&impl RasterBackend>,
    opts: &PipelineOptions,
    header: &str,
    photo_names: &[String],
) -> Result<Option<Artifact>, ArchiveError> {
    let entries: Vec<(String, Vec<u8>)> = job
        .photos
        .iter()
        .zip(photo_names)
        .map(|(photo, name)| {
            let bytes = match (opts.archive_mode, raster) {
                (ArchiveMode::Stamped, Some(backend)) => {
                    match stamp_photo(backend, photo, header, opts.jpeg_quality) {
                        Ok(stamped) => stamped,
                        Err(err) => {
                            warn!(photo = %photo.file_name, error = %err,
                                "stamping failed, archiving raw photo");
                            photo.bytes.clone()
                        }
                    }
                }
                _ => photo.bytes.clone(),
            };
            (name.clone(), bytes)
        })
        .collect();

    Ok(archive::pack(&entries)?.map(|bytes| Artifact {
        name: build_name(
            ArtifactKind::Archive,
            &job.receipt_number,
            &job.site_location,
            &job.selected_item,
        ),
        bytes,
        mime: ArtifactKind::Archive.mime().to_string(),
    }))
}
