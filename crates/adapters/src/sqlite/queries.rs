use gallery_ingest_domain::PhotoRecord;
use rusqlite::{params, Connection, Result};

pub fn find_id_by_file_name(conn: &Connection, file_name: &str) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM photos WHERE file_name = ?1")?;
    let mut rows = stmt.query(params![file_name])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(row.get(0)?));
    }
    Ok(None)
}

pub fn insert_photo(conn: &Connection, id: i64, record: &PhotoRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO photos
         (id, file_name, author, width, height, title, introduce, rating,
          capture_time, camera, lens, aperture, shutter, iso)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            id,
            record.file_name,
            record.author,
            record.width,
            record.height,
            record.title,
            record.introduce,
            record.rating,
            record.capture_time,
            record.camera,
            record.lens,
            record.aperture,
            record.shutter,
            record.iso,
        ],
    )?;
    Ok(())
}

/// Refreshes image and capture columns of an existing row. Id, author,
/// title, introduce and rating belong to the existing record and stay.
pub fn refresh_photo(conn: &Connection, record: &PhotoRecord) -> Result<()> {
    conn.execute(
        "UPDATE photos SET
            width = ?2,
            height = ?3,
            capture_time = ?4,
            camera = ?5,
            lens = ?6,
            aperture = ?7,
            shutter = ?8,
            iso = ?9,
            updated_at = CURRENT_TIMESTAMP
         WHERE file_name = ?1",
        params![
            record.file_name,
            record.width,
            record.height,
            record.capture_time,
            record.camera,
            record.lens,
            record.aperture,
            record.shutter,
            record.iso,
        ],
    )?;
    Ok(())
}

pub fn count_photos(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
}

pub fn upsert_status(
    conn: &Connection,
    message_id: &str,
    phase: &str,
    percent: u8,
    message: &str,
    updated_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO job_status (message_id, phase, percent, message, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(message_id) DO UPDATE SET
            phase = excluded.phase,
            percent = excluded.percent,
            message = excluded.message,
            updated_at = excluded.updated_at",
        params![message_id, phase, percent, message, updated_at],
    )?;
    Ok(())
}

pub fn purge_statuses_before(conn: &Connection, cutoff: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM job_status WHERE updated_at < ?1",
        params![cutoff],
    )
}

pub fn find_status(
    conn: &Connection,
    message_id: &str,
) -> Result<Option<(String, i64, String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT phase, percent, message, updated_at
         FROM job_status
         WHERE message_id = ?1",
    )?;
    let mut rows = stmt.query(params![message_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)));
    }
    Ok(None)
}
