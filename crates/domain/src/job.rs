use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// One ingestion request. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionJob {
    pub message_id: String,
    pub file_names: Vec<String>,
    pub staging_dir: PathBuf,
    pub default_rating: i64,
    pub overwrite: bool,
    /// Epoch milliseconds at submission.
    pub submitted_at: i64,
}

/// Wire shape of a job on the message channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub start_rating: i64,
    #[serde(default)]
    pub overwrite: bool,
    pub file_names: Vec<String>,
    pub temp_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<i64>,
}

impl JobMessage {
    /// Turns a decoded message into a job. A missing message id falls back to
    /// the submission timestamp; `received_at_millis` stands in for it only
    /// when the producer did not stamp one.
    pub fn into_job(self, received_at_millis: i64) -> IngestionJob {
        let submitted_at = self.submitted_at.unwrap_or(received_at_millis);
        let message_id = self
            .message_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| submitted_at.to_string());
        IngestionJob {
            message_id,
            file_names: self.file_names,
            staging_dir: PathBuf::from(self.temp_dir),
            default_rating: self.start_rating,
            overwrite: self.overwrite,
            submitted_at,
        }
    }
}

impl From<&IngestionJob> for JobMessage {
    fn from(job: &IngestionJob) -> Self {
        Self {
            message_id: Some(job.message_id.clone()),
            start_rating: job.default_rating,
            overwrite: job.overwrite,
            file_names: job.file_names.clone(),
            temp_dir: job.staging_dir.to_string_lossy().to_string(),
            submitted_at: Some(job.submitted_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    Received,
    Processing,
    Completed,
    Failed,
}

impl JobPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(self, next: JobPhase) -> bool {
        match (self, next) {
            (Self::Received, Self::Processing) => true,
            (Self::Processing, Self::Processing | Self::Completed | Self::Failed) => true,
            // validation failures are reported before processing starts
            (Self::Received, Self::Failed) => true,
            _ => false,
        }
    }
}

impl Display for JobPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobPhase {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "RECEIVED" => Ok(Self::Received),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(DomainError::InvalidJobMessage(format!(
                "unknown job phase {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub message_id: String,
    pub phase: JobPhase,
    pub percent: u8,
    pub message: String,
    pub updated_at: i64,
}

impl JobStatus {
    pub fn new(
        message_id: impl Into<String>,
        phase: JobPhase,
        percent: u8,
        message: impl Into<String>,
        updated_at: i64,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            phase,
            percent: percent.min(100),
            message: message.into(),
            updated_at,
        }
    }
}
