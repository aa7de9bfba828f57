//! # ktl-submit
//!
//! Submission pipeline for lab inspection records. An inspector transcribes
//! instrument readings into a [`Job`](types::Job) — an ordered entry table
//! plus supporting photographs — and this crate turns it into a KTL
//! submission: deterministic artifacts, the canonical wire mapping, and the
//! two-phase HTTP protocol with retry.
//!
//! # Architecture: Capture, Then Transmit
//!
//! One submission attempt runs through two strictly ordered halves:
//!
//! ```text
//! 1. Capture    job  →  artifacts + payload   (pure, synchronous)
//!               snapshot.png → sheet.jpg → photos.zip → payload
//! 2. Transmit   artifacts → POST /uploadfiles (multipart, skipped if empty)
//!               payload   → POST /env         (JSON, always)
//! ```
//!
//! The split is deliberate:
//!
//! - **Determinism**: artifact names and payload are pure functions of the
//!   job, so a preview before submission matches what is actually sent.
//! - **Capture-before-suspend**: the payload is fixed before the first await
//!   point; edits made while a submission is in flight cannot leak into it.
//! - **Testability**: generators and mapper run against recorded backends,
//!   the protocol runs against scripted transports — no network, no fonts,
//!   no filesystem in unit tests.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Shared data model: `Job`, `Entry`, `Photo`, `Artifact`, status |
//! | [`store`] | Job arena + editing ops enforcing the time/value invariant |
//! | [`naming`] | Deterministic, sanitized artifact filenames |
//! | [`imaging`] | Table snapshot (PNG) and contact sheet (JPEG) behind a raster seam |
//! | [`archive`] | Deterministic zip of per-photo images |
//! | [`mapping`] | Entries → KTL wire schema, declarative channel rules |
//! | [`submit`] | Two-phase client, retry policy, response contract |
//! | [`pipeline`] | Orchestration and the status state machine |
//! | [`config`] | Sparse `config.toml` with stock defaults |
//!
//! # Design Decisions
//!
//! ## Render Failures Downgrade, Archive Failures Abort
//!
//! A snapshot or contact sheet that cannot be rendered is logged and omitted:
//! a submission without an illustration is still a valid record. A zip that
//! fails mid-build is different — a truncated archive on the server is worse
//! than none — so [`archive`] errors abort the attempt.
//!
//! ## Settled Rendering, Not Sleeps
//!
//! The table snapshot is captured only after two successive rasterization
//! passes produce identical pixels. Hosts whose layout needs time to
//! stabilize repeat passes until they agree; deterministic headless rasters
//! settle on the second pass. No fixed sleep anywhere.
//!
//! ## Declarative Channel Rules
//!
//! Which identifiers may pass composite readings through verbatim and which
//! may carry a dual-mode secondary value is a const table in [`mapping`],
//! not a pile of conditionals — the mapping is auditable in one screen.
//!
//! ## No Rollback Between Phases
//!
//! If the upload phase succeeds and the data phase fails, the uploaded
//! artifacts stay on the server. The job ends in `Error` naming the failed
//! phase; re-submission after an edit re-runs both phases.

pub mod archive;
pub mod config;
pub mod imaging;
pub mod mapping;
pub mod naming;
pub mod pipeline;
pub mod store;
pub mod submit;
pub mod types;
