/// Schema statements applied in order on every start-up. Each one is
/// idempotent.
pub const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS photos (
        id INTEGER PRIMARY KEY,
        file_name TEXT NOT NULL UNIQUE,
        author TEXT NOT NULL,
        width INTEGER,
        height INTEGER,
        title TEXT,
        introduce TEXT,
        rating INTEGER NOT NULL DEFAULT 0,
        capture_time TEXT,
        camera TEXT,
        lens TEXT,
        aperture TEXT,
        shutter TEXT,
        iso TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS job_status (
        message_id TEXT PRIMARY KEY,
        phase TEXT NOT NULL,
        percent INTEGER NOT NULL,
        message TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_job_status_updated_at ON job_status(updated_at)",
];
