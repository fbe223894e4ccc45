//! ReelVault CLI: run the ingestion pipeline on local files.
//!
//! Storage and tool settings come from the environment or a `.env` file
//! (`STORAGE_BACKEND`, `S3_BUCKET`, `LOCAL_STORAGE_PATH`, `FFPROBE_PATH`, ...).
//! Media records live in a JSON file, `reelvault-records.json` by default.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reelvault_cli::{content_type_for_path, truncate_string, JsonFileRecordStore};
use reelvault_core::{Config, ErrorMetadata, MediaRecord};
use reelvault_infra::{cancel_on_shutdown, init_telemetry, LogFormat};
use reelvault_processing::{IngestError, IngestionOrchestrator, ThumbnailUpload, VideoUpload};
use reelvault_storage::create_storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "reelvault", about = "ReelVault video ingestion CLI")]
struct Cli {
    /// JSON file holding media records
    #[arg(long, global = true, default_value = "reelvault-records.json")]
    records: PathBuf,

    /// Output format: json or table
    #[arg(long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty media record to upload into
    CreateRecord {
        /// Title of the record
        #[arg(long)]
        title: String,
        /// Owner of the record (random if omitted)
        #[arg(long, value_name = "UUID")]
        owner: Option<Uuid>,
    },
    /// List media records
    ListRecords,
    /// Ingest a video file into a record
    IngestVideo {
        /// Path to the video file
        file: PathBuf,
        #[arg(long, value_name = "UUID")]
        record: Uuid,
        /// Declared content type (guessed from the extension if omitted)
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Ingest a thumbnail image into a record
    IngestThumbnail {
        /// Path to the image file
        file: PathBuf,
        #[arg(long, value_name = "UUID")]
        record: Uuid,
        #[arg(long)]
        content_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env();
    let log_format = match &config {
        Ok(config) => config.log_format.parse::<LogFormat>()?,
        Err(_) => LogFormat::Text,
    };
    init_telemetry(log_format)?;

    let records = Arc::new(JsonFileRecordStore::new(&cli.records));
    tracing::debug!(path = %cli.records.display(), "Using record store");
    let json = cli.format == "json";

    match cli.command {
        Commands::CreateRecord { title, owner } => {
            let record = MediaRecord::new(owner.unwrap_or_else(Uuid::new_v4), title);
            records.insert(record.clone()).await?;
            print_records(&[record], json)
        }
        Commands::ListRecords => {
            let all = records.list().await?;
            print_records(&all, json)
        }
        Commands::IngestVideo {
            file,
            record,
            content_type,
        } => {
            let config = config.context("Failed to load configuration")?;
            ingest_video(config, records, &file, record, content_type, json).await
        }
        Commands::IngestThumbnail {
            file,
            record,
            content_type,
        } => {
            let config = config.context("Failed to load configuration")?;
            ingest_thumbnail(config, records, &file, record, content_type, json).await
        }
    }
}

async fn build_orchestrator(
    config: Config,
    records: Arc<JsonFileRecordStore>,
) -> anyhow::Result<IngestionOrchestrator> {
    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage")?;
    let orchestrator = IngestionOrchestrator::from_config(config.ingest, storage, records)
        .context("Invalid media tool configuration")?;
    Ok(orchestrator)
}

fn resolve_content_type(file: &Path, content_type: Option<String>) -> anyhow::Result<String> {
    match content_type {
        Some(ct) => Ok(ct),
        None => match content_type_for_path(file) {
            Some(ct) => Ok(ct.to_string()),
            None => bail!(
                "Cannot guess the content type of {}; pass --content-type",
                file.display()
            ),
        },
    }
}

/// Print the client-facing summary; internal details only outside production.
fn report_failure(err: IngestError, production: bool) -> anyhow::Error {
    eprintln!(
        "Error [{} at {}]: {}",
        err.error_code(),
        err.stage,
        err.client_message()
    );
    if production {
        anyhow::anyhow!("ingestion failed")
    } else {
        err.into()
    }
}

async fn ingest_video(
    config: Config,
    records: Arc<JsonFileRecordStore>,
    file: &Path,
    record_id: Uuid,
    content_type: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let content_type = resolve_content_type(file, content_type)?;
    let body = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("Failed to open {}", file.display()))?;

    let production = config.is_production();
    let orchestrator = build_orchestrator(config, records).await?;
    let outcome = orchestrator
        .ingest_video(
            VideoUpload::new(record_id, content_type, body),
            cancel_on_shutdown(),
        )
        .await
        .map_err(|e| report_failure(e, production))?;

    if json {
        let output = serde_json::json!({
            "record_id": outcome.record.id,
            "key": outcome.key,
            "video_url": outcome.reference,
            "classification": outcome.classification,
            "width": outcome.dimensions.width,
            "height": outcome.dimensions.height,
            "size_bytes": outcome.size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Record:         {}", outcome.record.id);
        println!(
            "Dimensions:     {}x{} ({})",
            outcome.dimensions.width, outcome.dimensions.height, outcome.classification
        );
        println!("Size:           {} bytes", outcome.size_bytes);
        println!("Key:            {}", outcome.key);
        println!("Video URL:      {}", outcome.reference);
    }

    Ok(())
}

async fn ingest_thumbnail(
    config: Config,
    records: Arc<JsonFileRecordStore>,
    file: &Path,
    record_id: Uuid,
    content_type: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let content_type = resolve_content_type(file, content_type)?;
    let body = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("Failed to open {}", file.display()))?;

    let production = config.is_production();
    let orchestrator = build_orchestrator(config, records).await?;
    let outcome = orchestrator
        .ingest_thumbnail(
            ThumbnailUpload::new(record_id, content_type, body),
            cancel_on_shutdown(),
        )
        .await
        .map_err(|e| report_failure(e, production))?;

    if json {
        let output = serde_json::json!({
            "record_id": outcome.record.id,
            "key": outcome.key,
            "thumbnail_url": outcome.reference,
            "size_bytes": outcome.size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Record:         {}", outcome.record.id);
        println!("Size:           {} bytes", outcome.size_bytes);
        println!("Key:            {}", outcome.key);
        println!("Thumbnail URL:  {}", outcome.reference);
    }

    Ok(())
}

fn print_records(records: &[MediaRecord], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    println!("{:<36}  {:<24}  {:<5}  {:<5}", "ID", "Title", "Video", "Thumb");
    println!("{}", "-".repeat(76));
    for record in records {
        println!(
            "{:<36}  {:<24}  {:<5}  {:<5}",
            record.id,
            truncate_string(&record.title, 24),
            if record.video_url.is_some() { "yes" } else { "no" },
            if record.thumbnail_url.is_some() { "yes" } else { "no" },
        );
    }
    Ok(())
}
