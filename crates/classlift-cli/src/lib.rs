use anyhow::{bail, Result};
use classlift_core::{format_size, ObjectType, UploadRecord, UploadStatus};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// One object id per file: the explicit id for a single file, fresh UUIDs otherwise.
pub fn assign_object_ids(file_count: usize, explicit: Option<&str>) -> Result<Vec<String>> {
    match explicit {
        Some(_) if file_count > 1 => {
            bail!("--object-id can only be used with a single file")
        }
        Some(id) if id.trim().is_empty() => bail!("--object-id must not be empty"),
        Some(id) => Ok(vec![id.to_string()]),
        None => Ok((0..file_count)
            .map(|_| uuid::Uuid::new_v4().to_string())
            .collect()),
    }
}

pub fn ensure_uploadable(object_type: ObjectType) -> Result<()> {
    if !object_type.is_uploadable() {
        bail!(
            "Object type {} cannot receive uploads, use it as --parent-type",
            object_type
        );
    }
    Ok(())
}

/// Single status line for a record, e.g. `id1  lesson.mp4 (2Kb)  UPLOADING 42%`.
pub fn render_record(record: &UploadRecord) -> String {
    let mut line = format!(
        "{}  {} ({})  {}",
        record.object_id,
        truncate_string(&record.file.name, 40),
        format_size(record.file.size()),
        record.status
    );
    if record.status == UploadStatus::Uploading || record.status == UploadStatus::Success {
        line.push_str(&format!(" {}%", record.progress));
    }
    if let Some(message) = &record.message {
        line.push_str(&format!(": {}", message));
    }
    line
}

/// Non-zero when any attempt ended in an error state.
pub fn exit_code<'a>(records: impl IntoIterator<Item = &'a UploadRecord>) -> i32 {
    if records.into_iter().any(|r| r.status.is_error()) {
        1
    } else {
        0
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
