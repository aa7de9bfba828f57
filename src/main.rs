use clap::{Parser, Subcommand};
use ktl_submit::imaging::GlyphBackend;
use ktl_submit::naming::{ArtifactKind, build_name};
use ktl_submit::store::JobStore;
use ktl_submit::submit::{ReqwestTransport, SubmissionClient};
use ktl_submit::types::{Job, Photo};
use ktl_submit::{config, pipeline};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Shared flags for commands that operate on one job.
#[derive(clap::Args, Clone)]
struct JobArgs {
    /// Job file (JSON)
    job: PathBuf,

    /// Directory of photos to attach (jpg/png, sorted by filename)
    #[arg(long)]
    photos: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "ktl-submit")]
#[command(about = "Submit lab inspection records to a KTL service")]
#[command(long_about = "\
Submit lab inspection records to a KTL service

A job file is the data source: a JSON document holding the receipt number,
site location, inspected item and the entry table. Photos are attached from
a directory, ordered by filename.

Job file structure:

  {
    \"receipt_number\": \"R2026-001\",
    \"site_location\": \"Bay 3\",
    \"selected_item\": \"Airflow\",
    \"decimal_places\": 2,
    \"entries\": [
      { \"id\": 1, \"identifier\": \"Z1\", \"time\": \"10:02:40\", \"value\": \"1.23\" }
    ]
  }

One submission runs two phases against the service root:
  1. POST {base_url}/uploadfiles — generated artifacts (multipart)
  2. POST {base_url}/env        — the record envelope (JSON)

Artifacts (table snapshot, contact sheet, photo archive) are generated
deterministically from the job; 'names' previews their filenames and
'render' writes them to disk without touching the network.

Run 'ktl-submit gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the artifact names a job would produce
    Names(JobArgs),
    /// Generate artifacts and write them to a directory
    Render {
        #[command(flatten)]
        job: JobArgs,

        /// Output directory
        #[arg(long, default_value = "artifacts")]
        out: PathBuf,
    },
    /// Run the full submission: generate, upload, submit envelope
    Submit(JobArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::SubmitConfig::load(&cli.config)?;

    match cli.command {
        Command::Names(args) => {
            let job = load_job_with_photos(&args)?;
            let receipt = job.receipt_number.as_str();
            let site = job.site_location.as_str();
            let item = job.selected_item.as_str();
            println!(
                "{}",
                build_name(ArtifactKind::TableSnapshot, receipt, site, item)
            );
            println!("{}", build_name(ArtifactKind::Composite, receipt, site, item));
            if !job.photos.is_empty() {
                println!("{}", build_name(ArtifactKind::Archive, receipt, site, item));
                for index in 0..job.photos.len() {
                    println!(
                        "  {}",
                        build_name(ArtifactKind::Photo(index), receipt, site, item)
                    );
                }
            }
        }
        Command::Render { job: args, out } => {
            let job = load_job_with_photos(&args)?;
            let raster = mount_raster(&config);
            let opts = config.pipeline_options();
            let attempt = pipeline::generate(&job, raster.as_ref(), &opts)?;
            std::fs::create_dir_all(&out)?;
            for artifact in &attempt.artifacts {
                let path = out.join(&artifact.name);
                std::fs::write(&path, &artifact.bytes)?;
                println!("{} ({} bytes)", path.display(), artifact.bytes.len());
            }
            println!("==> {} artifacts written", attempt.artifacts.len());
        }
        Command::Submit(args) => {
            let job = load_job_with_photos(&args)?;
            let raster = mount_raster(&config);
            let opts = config.pipeline_options();

            let mut store = JobStore::default();
            let id = store.add(job);

            let transport = ReqwestTransport::new(Duration::from_secs(30))?;
            let client = SubmissionClient::new(transport, &config.base_url, config.retry_policy());

            let result =
                pipeline::submit_job(&mut store, id, raster.as_ref(), &client, &opts).await;
            let job = store.get(id)?;
            match result {
                Ok(()) => println!("==> {}", job.status_message),
                Err(err) => {
                    eprintln!("==> submission failed: {}", job.status_message);
                    return Err(err.into());
                }
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Mount the font-backed rasterizer, or run without rendered artifacts.
///
/// A missing or unreadable font is a degraded mode, not a failure: the
/// submission still carries the photo archive and the envelope.
fn mount_raster(config: &config::SubmitConfig) -> Option<GlyphBackend> {
    let path = match &config.imaging.font_path {
        Some(path) => path,
        None => {
            warn!("no font_path configured; snapshot and contact sheet will be skipped");
            return None;
        }
    };
    match GlyphBackend::from_font_path(path) {
        Ok(backend) => Some(backend),
        Err(err) => {
            warn!(font = %path.display(), %err, "font unavailable; rendered artifacts skipped");
            None
        }
    }
}

/// Parse the job file and attach photos from the optional directory.
fn load_job_with_photos(args: &JobArgs) -> Result<Job, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(&args.job)?;
    let mut job: Job = serde_json::from_str(&content)?;
    if let Some(dir) = &args.photos {
        job.photos = load_photos(dir)?;
    }
    Ok(job)
}

/// Collect jpg/png files from a directory, sorted by filename.
///
/// A file appearing twice with the same name, size, and mtime (symlinked
/// trees, re-scanned directories) is attached once.
fn load_photos(dir: &Path) -> Result<Vec<Photo>, std::io::Error> {
    let mut photos: Vec<Photo> = Vec::new();
    let mut seen: Vec<(String, u64, Option<std::time::SystemTime>)> = Vec::new();
    let mut entries: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .collect();
    entries.sort_by_key(|entry| entry.file_name().to_os_string());

    for entry in entries {
        let mime = match entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            _ => continue,
        };
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let metadata = entry.path().metadata()?;
        let key = (file_name.clone(), metadata.len(), metadata.modified().ok());
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        let bytes = std::fs::read(entry.path())?;
        photos.push(Photo {
            bytes,
            mime: mime.to_string(),
            file_name,
        });
    }
    Ok(photos)
}
