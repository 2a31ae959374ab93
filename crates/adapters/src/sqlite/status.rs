use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use gallery_ingest_application::{ApplicationError, Clock, JobStatusStore};
use gallery_ingest_domain::{JobPhase, JobStatus};
use tracing::debug;

use super::{initialize_schema, open_connection, queries};

/// Job progress keyed by message id. Rows older than the TTL are purged on
/// read and reported as absent.
pub struct SqliteJobStatusStore {
    path: PathBuf,
    ttl_millis: i64,
    clock: Box<dyn Clock>,
}

impl SqliteJobStatusStore {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration, clock: Box<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            ttl_millis: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
        }
    }
}

impl JobStatusStore for SqliteJobStatusStore {
    fn initialize(&self) -> Result<(), ApplicationError> {
        initialize_schema(&self.path)
    }

    fn set(&self, status: &JobStatus) -> Result<(), ApplicationError> {
        let conn = open_connection(&self.path)?;
        queries::upsert_status(
            &conn,
            &status.message_id,
            status.phase.as_str(),
            status.percent,
            &status.message,
            status.updated_at,
        )
        .map_err(|error| ApplicationError::Persistence(error.to_string()))
    }

    fn get(&self, message_id: &str) -> Result<Option<JobStatus>, ApplicationError> {
        let conn = open_connection(&self.path)?;
        let cutoff = self.clock.now_millis().saturating_sub(self.ttl_millis);
        let purged = queries::purge_statuses_before(&conn, cutoff)
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        if purged > 0 {
            debug!(purged, "expired job statuses removed");
        }

        let Some((phase, percent, message, updated_at)) = queries::find_status(&conn, message_id)
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?
        else {
            return Ok(None);
        };

        let percent = u8::try_from(percent).map_err(|_| {
            ApplicationError::Persistence(format!("stored percent {percent} is out of range"))
        })?;
        Ok(Some(JobStatus::new(
            message_id,
            JobPhase::from_str(&phase)?,
            percent,
            message,
            updated_at,
        )))
    }
}
