use std::collections::HashSet;
use std::path::{Path, PathBuf};

use gallery_ingest_domain::{
    derived_file_name, detect_image_format, validate_file_name, CaptureMetadata, DecodedImage,
    DomainError, ImageFormat, IngestionJob, JobPhase, JobStatus, PhotoRecord,
};
use tracing::{debug, error, info, warn};

use crate::{
    ApplicationError, ArtifactStore, BootstrapCatalogCommand, Clock, CompressionOutcome,
    CompressionRequest, Compressor, CopyOutcome, IdGenerator, ImageDecoder, IngestionReport,
    JobHandler, JobPublisher, JobStatusQuery, JobStatusStore, MetadataExtractor,
    OrphanedArtifacts, PhotoRepository, ReconcileCommand, ReconcileReport, SaveOutcome,
    SubmitIngestionCommand, WorkerPool,
};

/// Sub-directory of the staging directory that holds stage-1 renditions.
pub const MEDIUM_STAGING_DIR: &str = "1000K";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub full_size_dir: PathBuf,
    pub medium_dir: PathBuf,
    pub thumbnail_dir: PathBuf,
}

impl StorageLayout {
    pub fn directories(&self) -> [&Path; 3] {
        [&self.full_size_dir, &self.medium_dir, &self.thumbnail_dir]
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub layout: StorageLayout,
    pub medium_budget_bytes: u64,
    pub thumbnail_budget_bytes: u64,
    pub default_author: String,
}

pub struct IngestionPorts {
    pub ids: Box<dyn IdGenerator>,
    pub extractor: Box<dyn MetadataExtractor>,
    pub decoder: Box<dyn ImageDecoder>,
    pub compressor: Box<dyn Compressor>,
    pub store: Box<dyn ArtifactStore>,
    pub photos: Box<dyn PhotoRepository>,
    pub statuses: Box<dyn JobStatusStore>,
    pub publisher: Box<dyn JobPublisher>,
    pub clock: Box<dyn Clock>,
}

/// Drives ingestion jobs: submission, the six processing stages with their
/// status checkpoints and rollback, status queries and storage reconciliation.
pub struct IngestionService {
    ids: Box<dyn IdGenerator>,
    extractor: Box<dyn MetadataExtractor>,
    decoder: Box<dyn ImageDecoder>,
    compressor: Box<dyn Compressor>,
    store: Box<dyn ArtifactStore>,
    photos: Box<dyn PhotoRepository>,
    statuses: Box<dyn JobStatusStore>,
    publisher: Box<dyn JobPublisher>,
    clock: Box<dyn Clock>,
    pool: WorkerPool,
    config: PipelineConfig,
}

struct BatchFile {
    file_name: String,
    source: PathBuf,
    output_format: ImageFormat,
}

/// A permanent file written by this job and the file it replaced, if any.
struct Placement {
    destination: PathBuf,
    backup: Option<PathBuf>,
}

struct FileMetadata {
    decoded: Option<DecodedImage>,
    capture: CaptureMetadata,
    extracted: bool,
}

impl IngestionService {
    pub fn new(ports: IngestionPorts, pool: WorkerPool, config: PipelineConfig) -> Self {
        Self {
            ids: ports.ids,
            extractor: ports.extractor,
            decoder: ports.decoder,
            compressor: ports.compressor,
            store: ports.store,
            photos: ports.photos,
            statuses: ports.statuses,
            publisher: ports.publisher,
            clock: ports.clock,
            pool,
            config,
        }
    }

    pub fn bootstrap_catalog(
        &self,
        _command: BootstrapCatalogCommand,
    ) -> Result<(), ApplicationError> {
        self.photos.initialize()?;
        self.statuses.initialize()
    }

    /// Records the job as queued and hands it to the channel. Returns the
    /// message id without waiting for processing.
    pub fn submit(&self, command: SubmitIngestionCommand) -> Result<String, ApplicationError> {
        if command.file_names.is_empty() {
            return Err(ApplicationError::Validation(
                "file list must not be empty".to_string(),
            ));
        }
        if !self.store.is_dir(&command.staging_dir) {
            return Err(ApplicationError::Validation(format!(
                "staging directory does not exist: {}",
                command.staging_dir.display()
            )));
        }

        let now = self.clock.now_millis();
        let message_id = command
            .message_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| now.to_string());
        let job = IngestionJob {
            message_id: message_id.clone(),
            file_names: command.file_names,
            staging_dir: command.staging_dir,
            default_rating: command.default_rating,
            overwrite: command.overwrite,
            submitted_at: now,
        };

        self.statuses
            .set(&JobStatus::new(&message_id, JobPhase::Received, 0, "queued", now))?;
        if let Err(err) = self.publisher.publish(&job) {
            self.record_failure(&message_id, &err);
            return Err(err);
        }
        info!(
            message_id = %message_id,
            files = job.file_names.len(),
            "ingestion job submitted"
        );
        Ok(message_id)
    }

    pub fn status(&self, query: JobStatusQuery) -> Result<JobStatus, ApplicationError> {
        self.statuses.get(&query.message_id)?.ok_or_else(|| {
            ApplicationError::NotFound(format!("no status for message id={}", query.message_id))
        })
    }

    /// Lists stored images that have no photo record. Derived renditions of
    /// PNG originals carry a `.jpg` name, so both spellings are checked.
    pub fn reconcile(
        &self,
        _command: ReconcileCommand,
    ) -> Result<ReconcileReport, ApplicationError> {
        let mut report = ReconcileReport {
            record_count: self.photos.count()?,
            orphans: Vec::new(),
        };

        for directory in self.config.layout.directories() {
            if !self.store.is_dir(directory) {
                continue;
            }
            let mut file_names = Vec::new();
            for file_name in self.store.list_images(directory)? {
                if !self.has_record_for(&file_name)? {
                    file_names.push(file_name);
                }
            }
            report.orphans.push(OrphanedArtifacts {
                directory: directory.to_path_buf(),
                file_names,
            });
        }

        Ok(report)
    }

    fn has_record_for(&self, file_name: &str) -> Result<bool, ApplicationError> {
        if self.photos.exists_by_file_name(file_name)? {
            return Ok(true);
        }
        match detect_image_format(Path::new(file_name)) {
            ImageFormat::Jpeg => {
                let stem = Path::new(file_name)
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or(file_name);
                self.photos.exists_by_file_name(&format!("{stem}.png"))
            }
            _ => Ok(false),
        }
    }

    /// Runs all stages for one job. On failure the job is marked FAILED with
    /// the causal message and the error is returned to the channel.
    pub fn process(&self, job: &IngestionJob) -> Result<IngestionReport, ApplicationError> {
        let started = self.clock.now_millis();
        info!(
            message_id = %job.message_id,
            files = job.file_names.len(),
            overwrite = job.overwrite,
            "ingestion job received"
        );

        match self.run(job, started) {
            Ok(report) => Ok(report),
            Err(err) => {
                self.record_failure(&job.message_id, &err);
                Err(err)
            }
        }
    }

    fn record_failure(&self, message_id: &str, err: &ApplicationError) {
        error!(message_id = %message_id, error = %err, "ingestion job failed");
        let failed = JobStatus::new(
            message_id,
            JobPhase::Failed,
            0,
            err.to_string(),
            self.clock.now_millis(),
        );
        if let Err(status_err) = self.statuses.set(&failed) {
            error!(
                message_id = %message_id,
                error = %status_err,
                "could not record failed status"
            );
        }
    }

    fn run(&self, job: &IngestionJob, started: i64) -> Result<IngestionReport, ApplicationError> {
        let batch = self.validate(job)?;
        self.checkpoint(job, JobPhase::Processing, 10, "processing started")?;

        let mut placed = Vec::new();
        let mut report = match self.place_and_record(job, &batch, &mut placed) {
            Ok(report) => report,
            Err(err) => {
                self.rollback(job, &placed);
                return Err(err);
            }
        };
        self.discard_backups(job, &placed);

        // records are committed; later status failures are only logged
        self.report_progress(job, JobPhase::Processing, 90, "cleaning up staging area");
        match self.store.remove_dir_all(&job.staging_dir) {
            Ok(()) => debug!(message_id = %job.message_id, "staging directory removed"),
            Err(err) => warn!(
                message_id = %job.message_id,
                dir = %job.staging_dir.display(),
                error = %err,
                "staging cleanup failed"
            ),
        }

        report.elapsed_ms = self.clock.now_millis() - started;
        self.report_progress(
            job,
            JobPhase::Completed,
            100,
            format!("ingestion finished in {}ms", report.elapsed_ms),
        );
        info!(
            message_id = %job.message_id,
            elapsed_ms = report.elapsed_ms,
            inserted = report.inserted,
            updated = report.updated,
            "ingestion job completed"
        );
        Ok(report)
    }

    fn validate(&self, job: &IngestionJob) -> Result<Vec<BatchFile>, ApplicationError> {
        if job.file_names.is_empty() {
            return Err(ApplicationError::Validation(
                "file list must not be empty".to_string(),
            ));
        }
        if !self.store.is_dir(&job.staging_dir) {
            return Err(ApplicationError::Validation(format!(
                "staging directory does not exist: {}",
                job.staging_dir.display()
            )));
        }
        if !(0..=1).contains(&job.default_rating) {
            return Err(DomainError::InvalidRating(job.default_rating).into());
        }

        let mut derived_names = HashSet::new();
        let mut batch = Vec::with_capacity(job.file_names.len());
        for file_name in &job.file_names {
            validate_file_name(file_name)?;
            let derived = derived_file_name(file_name)?;
            if !derived_names.insert(derived.to_ascii_lowercase()) {
                return Err(ApplicationError::Validation(format!(
                    "{file_name} collides with another file as {derived}"
                )));
            }
            let source = job.staging_dir.join(file_name);
            if !self.store.is_file(&source) {
                return Err(ApplicationError::Validation(format!(
                    "{file_name} is missing from the staging directory"
                )));
            }
            batch.push(BatchFile {
                file_name: file_name.clone(),
                output_format: detect_image_format(&source).derived(),
                source,
            });
        }
        Ok(batch)
    }

    /// Stages 1 to 5. Every permanent copy made here is pushed to `placed`
    /// so the caller can undo it.
    fn place_and_record(
        &self,
        job: &IngestionJob,
        batch: &[BatchFile],
        placed: &mut Vec<Placement>,
    ) -> Result<IngestionReport, ApplicationError> {
        let layout = &self.config.layout;
        let mut report = IngestionReport {
            message_id: job.message_id.clone(),
            files: batch.len(),
            ..IngestionReport::default()
        };

        self.checkpoint(job, JobPhase::Processing, 30, "compressing renditions")?;
        let medium_staging = job.staging_dir.join(MEDIUM_STAGING_DIR);
        self.store.ensure_dir(&medium_staging)?;
        let sources: Vec<(PathBuf, ImageFormat)> = batch
            .iter()
            .map(|file| (file.source.clone(), file.output_format))
            .collect();
        let medium = self.compress_all(
            &sources,
            &medium_staging,
            self.config.medium_budget_bytes,
            job.overwrite,
        )?;
        tally_compression(&mut report, &medium);
        info!(message_id = %job.message_id, files = medium.len(), "medium renditions ready");

        self.store.ensure_dir(&layout.thumbnail_dir)?;
        let intermediates: Vec<(PathBuf, ImageFormat)> = medium
            .iter()
            .zip(batch)
            .map(|(outcome, file)| (outcome.destination().to_path_buf(), file.output_format))
            .collect();
        let thumbnails = self.compress_all(
            &intermediates,
            &layout.thumbnail_dir,
            self.config.thumbnail_budget_bytes,
            job.overwrite,
        )?;
        tally_compression(&mut report, &thumbnails);
        info!(message_id = %job.message_id, files = thumbnails.len(), "thumbnails ready");

        self.store.ensure_dir(&layout.medium_dir)?;
        for outcome in &medium {
            self.place(outcome.destination(), &layout.medium_dir, job, placed, &mut report)?;
        }
        info!(message_id = %job.message_id, "medium renditions placed");

        self.store.ensure_dir(&layout.full_size_dir)?;
        for file in batch {
            self.place(&file.source, &layout.full_size_dir, job, placed, &mut report)?;
        }
        info!(message_id = %job.message_id, "originals placed");

        self.checkpoint(job, JobPhase::Processing, 60, "extracting metadata")?;
        let metadata = self.pool.map(batch, |file| self.read_metadata(job, file));
        let mut records = Vec::with_capacity(batch.len());
        for (file, metadata) in batch.iter().zip(metadata) {
            if !metadata.extracted {
                report.metadata_missing += 1;
            }
            let id = self.ids.next_id()?;
            records.push(
                PhotoRecord::new(
                    id,
                    &file.file_name,
                    &self.config.default_author,
                    job.default_rating,
                )?
                .with_dimensions(metadata.decoded)
                .with_capture(metadata.capture),
            );
        }
        for outcome in self.photos.save_all(&records)? {
            match outcome {
                SaveOutcome::Inserted(_) => report.inserted += 1,
                SaveOutcome::Updated(_) => report.updated += 1,
            }
        }
        self.report_progress(
            job,
            JobPhase::Processing,
            80,
            format!(
                "records saved: {} new, {} updated",
                report.inserted, report.updated
            ),
        );

        Ok(report)
    }

    fn compress_all(
        &self,
        sources: &[(PathBuf, ImageFormat)],
        destination_dir: &Path,
        max_bytes: u64,
        overwrite: bool,
    ) -> Result<Vec<CompressionOutcome>, ApplicationError> {
        let requests: Vec<CompressionRequest> = sources
            .iter()
            .map(|(source, output_format)| CompressionRequest {
                source: source.clone(),
                destination_dir: destination_dir.to_path_buf(),
                max_bytes,
                output_format: *output_format,
                overwrite,
            })
            .collect();
        self.pool
            .map(&requests, |request| self.compressor.compress(request))
            .into_iter()
            .collect()
    }

    /// Copies `source` into `dest_dir`. A file it overwrites is first moved
    /// aside so that rollback can put it back.
    fn place(
        &self,
        source: &Path,
        dest_dir: &Path,
        job: &IngestionJob,
        placed: &mut Vec<Placement>,
        report: &mut IngestionReport,
    ) -> Result<(), ApplicationError> {
        let file_name = source.file_name().ok_or_else(|| {
            ApplicationError::Validation(format!("not a file path: {}", source.display()))
        })?;
        let destination = dest_dir.join(file_name);
        let backup = if job.overwrite && self.store.is_file(&destination) {
            let backup = backup_path(&destination);
            self.store.rename(&destination, &backup)?;
            Some(backup)
        } else {
            None
        };

        match self.store.copy_into(source, dest_dir, job.overwrite) {
            Ok(CopyOutcome::Copied(destination)) => {
                debug!(
                    message_id = %job.message_id,
                    file = %destination.display(),
                    replaced = backup.is_some(),
                    "file placed"
                );
                placed.push(Placement {
                    destination,
                    backup,
                });
                report.copied += 1;
            }
            Ok(CopyOutcome::Skipped(destination)) => {
                debug!(
                    message_id = %job.message_id,
                    file = %destination.display(),
                    "destination exists, skipped"
                );
                report.skipped += 1;
            }
            Err(err) => {
                if backup.is_some() {
                    placed.push(Placement {
                        destination,
                        backup,
                    });
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn read_metadata(&self, job: &IngestionJob, file: &BatchFile) -> FileMetadata {
        let decoded = match self.decoder.read_header(&file.source) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(
                    message_id = %job.message_id,
                    file = %file.source.display(),
                    error = %err,
                    "dimensions unavailable"
                );
                None
            }
        };
        match self.extractor.extract(&file.source) {
            Ok(capture) => FileMetadata {
                decoded,
                capture,
                extracted: true,
            },
            Err(err) => {
                warn!(
                    message_id = %job.message_id,
                    file = %file.source.display(),
                    error = %err,
                    "metadata extraction skipped"
                );
                FileMetadata {
                    decoded,
                    capture: CaptureMetadata::default(),
                    extracted: false,
                }
            }
        }
    }

    fn rollback(&self, job: &IngestionJob, placed: &[Placement]) {
        for placement in placed.iter().rev() {
            match self.store.remove_file(&placement.destination) {
                Ok(()) => info!(
                    message_id = %job.message_id,
                    file = %placement.destination.display(),
                    "rolled back"
                ),
                Err(err) => error!(
                    message_id = %job.message_id,
                    file = %placement.destination.display(),
                    error = %err,
                    "rollback could not remove file"
                ),
            }
            let Some(backup) = &placement.backup else {
                continue;
            };
            match self.store.rename(backup, &placement.destination) {
                Ok(()) => info!(
                    message_id = %job.message_id,
                    file = %placement.destination.display(),
                    "previous file restored"
                ),
                Err(err) => error!(
                    message_id = %job.message_id,
                    file = %placement.destination.display(),
                    backup = %backup.display(),
                    error = %err,
                    "rollback could not restore previous file"
                ),
            }
        }
    }

    fn discard_backups(&self, job: &IngestionJob, placed: &[Placement]) {
        for backup in placed.iter().filter_map(|placement| placement.backup.as_ref()) {
            if let Err(err) = self.store.remove_file(backup) {
                warn!(
                    message_id = %job.message_id,
                    file = %backup.display(),
                    error = %err,
                    "replaced file could not be removed"
                );
            }
        }
    }

    fn report_progress(
        &self,
        job: &IngestionJob,
        phase: JobPhase,
        percent: u8,
        message: impl Into<String>,
    ) {
        if let Err(err) = self.checkpoint(job, phase, percent, message) {
            warn!(
                message_id = %job.message_id,
                percent,
                error = %err,
                "status update lost"
            );
        }
    }

    fn checkpoint(
        &self,
        job: &IngestionJob,
        phase: JobPhase,
        percent: u8,
        message: impl Into<String>,
    ) -> Result<(), ApplicationError> {
        let status = JobStatus::new(
            &job.message_id,
            phase,
            percent,
            message,
            self.clock.now_millis(),
        );
        debug!(
            message_id = %job.message_id,
            phase = %status.phase,
            percent = status.percent,
            "checkpoint"
        );
        self.statuses.set(&status)
    }
}

/// Hidden sibling that holds a file while its replacement is in flight.
fn backup_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{name}.replaced"))
}

fn tally_compression(report: &mut IngestionReport, outcomes: &[CompressionOutcome]) {
    for outcome in outcomes {
        if outcome.was_written() {
            report.compressed += 1;
        } else {
            report.skipped += 1;
        }
    }
}

impl JobHandler for IngestionService {
    fn handle(&self, job: &IngestionJob) -> Result<IngestionReport, ApplicationError> {
        self.process(job)
    }
}
