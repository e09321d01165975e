use crate::mirror::{keys, Mirror};
use crate::session::SessionState;
use anyhow::Context;
use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Bundles the persisted student collection, the attendance log and the
/// settings document into one snapshot. Students come from the mirror on
/// purpose: the snapshot captures what would survive a reload.
pub fn build_snapshot(mirror: &Mirror, session: &SessionState) -> anyhow::Result<serde_json::Value> {
    let students: serde_json::Value = mirror
        .get_json(keys::STUDENTS)
        .unwrap_or(None)
        .unwrap_or_else(|| json!([]));

    Ok(json!({
        "students": students,
        "attendance": session.attendance_records,
        "settings": session.settings,
        "exportDate": Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    }))
}

pub fn default_snapshot_path(workspace: &Path) -> PathBuf {
    workspace.join(format!(
        "studysync-backup-{}.json",
        Utc::now().format("%Y-%m-%d")
    ))
}

pub fn default_csv_path(workspace: &Path) -> PathBuf {
    workspace.join(format!("students-{}.csv", Utc::now().format("%Y-%m-%d")))
}

pub fn write_snapshot(path: &Path, snapshot: &serde_json::Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let text = serde_json::to_string_pretty(snapshot).context("failed to serialize snapshot")?;
    std::fs::write(path, text)
        .with_context(|| format!("failed to write snapshot {}", path.to_string_lossy()))?;
    Ok(())
}

pub fn read_snapshot(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.to_string_lossy()))?;
    serde_json::from_str(&text).context("snapshot is not valid JSON")
}

pub fn write_text_file(path: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    std::fs::write(path, text)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
    Ok(())
}
