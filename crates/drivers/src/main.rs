mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use config::AppConfig;
use gallery_ingest_adapters::{
    present_reconcile, present_status, present_submission, ExifMetadataExtractor,
    FsArtifactStore, ImageCrateCompressor, ImageCrateDecoder, InProcessJobChannel,
    SnowflakeIdGenerator, SqliteJobStatusStore, SqlitePhotoRepository, SystemClock,
};
use gallery_ingest_application::{
    ApplicationError, ArtifactStore, BootstrapCatalogCommand, IngestionPorts, IngestionService,
    JobHandler, JobStatusQuery, ReconcileCommand, SubmitIngestionCommand, WorkerPool,
};
use gallery_ingest_domain::JobPhase;
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "gallery-ingest", version, about = "Photo ingestion pipeline")]
struct Cli {
    /// TOML configuration file; defaults apply when absent.
    #[arg(long, env = "GALLERY_INGEST_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// Run one ingestion job over a staging directory and wait for it.
    Ingest {
        staging_dir: PathBuf,
        /// File to ingest; repeat for several. Defaults to every supported
        /// image in the staging directory.
        #[arg(long = "file")]
        files: Vec<String>,
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(0..=1))]
        rating: i64,
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        message_id: Option<String>,
    },
    /// Print the last recorded status of a job.
    Status { message_id: String },
    /// List stored renditions that have no photo record.
    Reconcile,
}

#[derive(Debug, Clone)]
enum CommandError {
    Usage(String),
    Runtime(String),
}

impl CommandError {
    fn from_application(context: &str, error: ApplicationError) -> Self {
        match error {
            ApplicationError::Validation(_) => Self::Usage(format!("{context}: {error}")),
            other => Self::Runtime(format!("{context}: {other}")),
        }
    }
}

struct App {
    service: Arc<IngestionService>,
    channel: InProcessJobChannel,
    consumers: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::from(2);
        }
    };
    logging::init_logging(&config.log_level);

    match run(cli.command, &config) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(CommandError::Usage(msg)) => {
            error!(reason = %msg, "command rejected");
            eprintln!("{msg}");
            ExitCode::from(2)
        }
        Err(CommandError::Runtime(msg)) => {
            error!(reason = %msg, "command failed");
            eprintln!("{msg}");
            ExitCode::from(1)
        }
    }
}

fn build_app(config: &AppConfig) -> Result<App, ApplicationError> {
    let channel = InProcessJobChannel::new();
    let ports = IngestionPorts {
        ids: Box::new(SnowflakeIdGenerator::new(
            config.ids.machine_id,
            config.ids.datacenter_id,
            Box::new(SystemClock),
        )?),
        extractor: Box::new(ExifMetadataExtractor::new(
            config.pipeline.capture_time_offset_hours,
        )?),
        decoder: Box::new(ImageCrateDecoder),
        compressor: Box::new(ImageCrateCompressor),
        store: Box::new(FsArtifactStore),
        photos: Box::new(SqlitePhotoRepository::new(config.catalog_path.clone())),
        statuses: Box::new(SqliteJobStatusStore::new(
            config.catalog_path.clone(),
            config.status_ttl(),
            Box::new(SystemClock),
        )),
        publisher: Box::new(channel.publisher()),
        clock: Box::new(SystemClock),
    };
    let pool = WorkerPool::new(config.pipeline.workers)?;
    let service = IngestionService::new(ports, pool, config.pipeline_config());
    service.bootstrap_catalog(BootstrapCatalogCommand)?;

    Ok(App {
        service: Arc::new(service),
        channel,
        consumers: config.channel.consumers,
    })
}

fn run(command: Command, config: &AppConfig) -> Result<Vec<String>, CommandError> {
    let app = build_app(config)
        .map_err(|error| CommandError::from_application("start-up failed", error))?;

    match command {
        Command::Ingest {
            staging_dir,
            files,
            rating,
            overwrite,
            message_id,
        } => {
            let file_names = if files.is_empty() {
                FsArtifactStore
                    .list_images(&staging_dir)
                    .map_err(|error| CommandError::from_application("ingest failed", error))?
            } else {
                files
            };
            ingest(
                &app,
                SubmitIngestionCommand {
                    message_id,
                    file_names,
                    staging_dir,
                    default_rating: rating,
                    overwrite,
                },
            )
        }
        Command::Status { message_id } => {
            let status = app
                .service
                .status(JobStatusQuery { message_id })
                .map_err(|error| CommandError::from_application("status failed", error))?;
            Ok(vec![present_status(&status)])
        }
        Command::Reconcile => {
            let report = app
                .service
                .reconcile(ReconcileCommand)
                .map_err(|error| CommandError::from_application("reconcile failed", error))?;
            Ok(present_reconcile(&report))
        }
    }
}

/// Submits through the channel, drains it, then reports the final status.
fn ingest(app: &App, command: SubmitIngestionCommand) -> Result<Vec<String>, CommandError> {
    let files = command.file_names.len();
    let handler: Arc<dyn JobHandler> = app.service.clone();
    app.channel
        .start_consumers(app.consumers, handler, Arc::new(SystemClock))
        .map_err(|error| CommandError::from_application("ingest failed", error))?;

    let submitted = app.service.submit(command);
    let drained = app.channel.shutdown();
    let message_id =
        submitted.map_err(|error| CommandError::from_application("ingest failed", error))?;
    drained.map_err(|error| CommandError::from_application("ingest failed", error))?;

    let status = app
        .service
        .status(JobStatusQuery {
            message_id: message_id.clone(),
        })
        .map_err(|error| CommandError::from_application("ingest failed", error))?;
    if status.phase == JobPhase::Failed || !status.phase.is_terminal() {
        return Err(CommandError::Runtime(format!(
            "ingest failed: {}",
            present_status(&status)
        )));
    }
    Ok(vec![
        present_submission(&message_id, files),
        present_status(&status),
    ])
}
