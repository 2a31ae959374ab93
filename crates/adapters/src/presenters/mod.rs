use gallery_ingest_application::{IngestionReport, ReconcileReport};
use gallery_ingest_domain::JobStatus;

pub fn present_status(status: &JobStatus) -> String {
    format!(
        "{}\t{}\t{}%\t{}\t{}",
        status.message_id, status.phase, status.percent, status.updated_at, status.message
    )
}

pub fn present_submission(message_id: &str, files: usize) -> String {
    format!("submitted job {message_id} ({files} files)")
}

pub fn present_report(report: &IngestionReport) -> String {
    format!(
        "job {} finished in {}ms: files={} compressed={} copied={} skipped={} inserted={} updated={} metadata_missing={}",
        report.message_id,
        report.elapsed_ms,
        report.files,
        report.compressed,
        report.copied,
        report.skipped,
        report.inserted,
        report.updated,
        report.metadata_missing
    )
}

pub fn present_reconcile(report: &ReconcileReport) -> Vec<String> {
    let mut lines = vec![format!("records\t{}", report.record_count)];
    for entry in &report.orphans {
        if entry.file_names.is_empty() {
            lines.push(format!("{}\tclean", entry.directory.display()));
            continue;
        }
        for file_name in &entry.file_names {
            lines.push(format!("{}\torphan\t{file_name}", entry.directory.display()));
        }
    }
    lines
}
