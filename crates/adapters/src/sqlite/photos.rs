use std::path::PathBuf;

use gallery_ingest_application::{ApplicationError, PhotoRepository, SaveOutcome};
use gallery_ingest_domain::{PhotoId, PhotoRecord};
use rusqlite::Connection;

use super::{initialize_schema, open_connection, queries};

#[derive(Debug, Clone)]
pub struct SqlitePhotoRepository {
    path: PathBuf,
}

impl SqlitePhotoRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn stored_id(value: i64) -> Result<PhotoId, ApplicationError> {
    let value = u64::try_from(value).map_err(|_| {
        ApplicationError::Persistence(format!("stored photo id {value} is negative"))
    })?;
    Ok(PhotoId::new(value)?)
}

fn save_one(conn: &Connection, record: &PhotoRecord) -> Result<SaveOutcome, ApplicationError> {
    let existing = queries::find_id_by_file_name(conn, &record.file_name)
        .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
    match existing {
        Some(id) => {
            queries::refresh_photo(conn, record)
                .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
            Ok(SaveOutcome::Updated(stored_id(id)?))
        }
        None => {
            let id = i64::try_from(record.id.get()).map_err(|_| {
                ApplicationError::Persistence(format!(
                    "photo id {} does not fit the catalog",
                    record.id.get()
                ))
            })?;
            queries::insert_photo(conn, id, record)
                .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
            Ok(SaveOutcome::Inserted(record.id))
        }
    }
}

impl PhotoRepository for SqlitePhotoRepository {
    fn initialize(&self) -> Result<(), ApplicationError> {
        initialize_schema(&self.path)
    }

    fn save_all(&self, records: &[PhotoRecord]) -> Result<Vec<SaveOutcome>, ApplicationError> {
        let mut conn = open_connection(&self.path)?;
        let tx = conn
            .transaction()
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        let outcomes = records
            .iter()
            .map(|record| save_one(&tx, record))
            .collect::<Result<Vec<_>, _>>()?;

        tx.commit()
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        Ok(outcomes)
    }

    fn exists_by_file_name(&self, file_name: &str) -> Result<bool, ApplicationError> {
        let conn = open_connection(&self.path)?;
        let found = queries::find_id_by_file_name(&conn, file_name)
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        Ok(found.is_some())
    }

    fn count(&self) -> Result<u64, ApplicationError> {
        let conn = open_connection(&self.path)?;
        let count = queries::count_photos(&conn)
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
