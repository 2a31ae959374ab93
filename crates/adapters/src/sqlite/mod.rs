mod photos;
mod queries;
mod status;

use std::fs;
use std::path::Path;

use gallery_ingest_application::ApplicationError;
use rusqlite::Connection;

use crate::migrations::MIGRATIONS;

pub use photos::SqlitePhotoRepository;
pub use status::SqliteJobStatusStore;

fn open_connection(path: &Path) -> Result<Connection, ApplicationError> {
    let conn =
        Connection::open(path).map_err(|error| ApplicationError::Persistence(error.to_string()))?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
    Ok(conn)
}

/// Creates the database file and its parent directory if needed and applies
/// every migration. Safe to call from both stores.
fn initialize_schema(path: &Path) -> Result<(), ApplicationError> {
    if path.as_os_str().is_empty() {
        return Err(ApplicationError::Configuration(
            "catalog path must not be empty".to_string(),
        ));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|error| ApplicationError::Io(error.to_string()))?;
        }
    }

    let conn = open_connection(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

    for migration in MIGRATIONS {
        conn.execute_batch(migration)
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
    }

    Ok(())
}
