//! Filename derivation and export writers (single file and zip bundle).

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::PipelineError;
use crate::record::ImageRecord;

/// Filename a record exports under: the suggested name when present,
/// otherwise a fallback built from the record id.
pub fn archive_filename(record: &ImageRecord) -> String {
    match record.suggested_name.as_deref() {
        Some(name) if !name.is_empty() => format!("{name}.jpg"),
        _ => format!("img-{}.jpg", record.id.short_prefix()),
    }
}

/// Sanitize a local file stem into a filename-safe suggested name:
/// everything outside `[a-zA-Z0-9-]` collapses to `-`, lowercased.
pub fn sanitize_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// Deterministic stem for an AI-generated record: the first `max_len`
/// characters of the prompt, lowercased, non-alphanumerics collapsed.
pub fn prompt_slug(prompt: &str, max_len: usize) -> String {
    prompt
        .chars()
        .take(max_len)
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Default bundle name for a zip export.
pub fn default_bundle_name() -> String {
    format!(
        "catalog_export_{}.zip",
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    )
}

/// Bundle every record that has a buffer into a zip archive at `path`.
/// Records without a buffer are skipped, never aborting the export.
/// Returns the number of entries written.
pub fn write_zip(records: &[&ImageRecord], path: &Path) -> Result<usize, PipelineError> {
    let file = File::create(path)?;
    let mut writer = ZipWriter::new(file);
    // JPEG payloads are already compressed
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    let mut written = 0;
    for record in records {
        let Some(buffer) = record.buffer.as_ref() else {
            tracing::debug!(record = %record.id, "skipping record without pixel data");
            continue;
        };
        writer.start_file(archive_filename(record), options)?;
        writer.write_all(buffer)?;
        written += 1;
    }
    writer.finish()?;

    tracing::info!(count = written, path = %path.display(), "zip export written");
    Ok(written)
}

/// Write one record's buffer into `dir` under its derived filename.
/// Returns `None` when the record has no buffer.
pub fn write_single(record: &ImageRecord, dir: &Path) -> Result<Option<PathBuf>, PipelineError> {
    let Some(buffer) = record.buffer.as_ref() else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)?;
    let target = dir.join(archive_filename(record));
    std::fs::write(&target, buffer)?;
    Ok(Some(target))
}
