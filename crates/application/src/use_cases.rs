use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct BootstrapCatalogCommand;

#[derive(Debug, Clone)]
pub struct SubmitIngestionCommand {
    pub message_id: Option<String>,
    pub file_names: Vec<String>,
    pub staging_dir: PathBuf,
    pub default_rating: i64,
    pub overwrite: bool,
}

#[derive(Debug, Clone)]
pub struct JobStatusQuery {
    pub message_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileCommand;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub message_id: String,
    pub files: usize,
    pub compressed: usize,
    pub copied: usize,
    pub skipped: usize,
    pub inserted: usize,
    pub updated: usize,
    pub metadata_missing: usize,
    pub elapsed_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedArtifacts {
    pub directory: PathBuf,
    pub file_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub record_count: u64,
    pub orphans: Vec<OrphanedArtifacts>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphans.iter().all(|entry| entry.file_names.is_empty())
    }
}
