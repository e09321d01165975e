use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{App, AppState, Request};
use crate::roster::Student;
use crate::session::{AttendanceRecord, NotificationKind, SettingsPatch};
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_export(app: &mut App, workspace: &Path, req: &Request) -> serde_json::Value {
    let snapshot = match backup::build_snapshot(&app.mirror, app.session.state()) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "export_failed", format!("{e:?}"), None),
    };

    let out_path = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .unwrap_or_else(|| backup::default_snapshot_path(workspace));
    if let Err(e) = backup::write_snapshot(&out_path, &snapshot) {
        return err(&req.id, "export_failed", format!("{e:?}"), None);
    }

    app.session.add_notification(
        &app.mirror,
        "Data Exported",
        "System data has been exported successfully.",
        NotificationKind::Success,
    );
    ok(&req.id, json!({ "path": out_path.to_string_lossy() }))
}

fn import_failed(app: &mut App, req: &Request, detail: String) -> serde_json::Value {
    app.session.add_notification(
        &app.mirror,
        "Import Failed",
        "Failed to import data. Please check the file format.",
        NotificationKind::Error,
    );
    err(&req.id, "import_failed", detail, None)
}

/// Best effort, in order students -> attendance -> settings. The first
/// parse error stops the import and leaves already-applied parts in place;
/// there is no rollback.
fn handle_import(app: &mut App, req: &Request) -> serde_json::Value {
    let doc = if let Some(data) = req.params.get("data") {
        data.clone()
    } else if let Some(path) = req.params.get("path").and_then(|v| v.as_str()) {
        match backup::read_snapshot(Path::new(path)) {
            Ok(doc) => doc,
            Err(e) => return import_failed(app, req, format!("{e:?}")),
        }
    } else {
        return err(&req.id, "bad_params", "missing params.data or params.path", None);
    };

    let mut applied: Vec<&str> = Vec::new();

    if let Some(raw) = doc.get("students") {
        let students: Vec<Student> = match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => return import_failed(app, req, format!("invalid students: {}", e)),
        };
        app.roster.set_students(&app.mirror, students);
        applied.push("students");
    }

    if let Some(raw) = doc.get("attendance") {
        let records: Vec<AttendanceRecord> = match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => return import_failed(app, req, format!("invalid attendance: {}", e)),
        };
        app.session.set_attendance(&app.mirror, records);
        applied.push("attendance");
    }

    if let Some(raw) = doc.get("settings") {
        let patch: SettingsPatch = match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => return import_failed(app, req, format!("invalid settings: {}", e)),
        };
        app.session.merge_settings(&app.mirror, patch);
        applied.push("settings");
    }

    app.session.add_notification(
        &app.mirror,
        "Data Imported",
        "System data has been imported successfully.",
        NotificationKind::Success,
    );
    ok(&req.id, json!({ "applied": applied }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if !req.method.starts_with("backup.") {
        return None;
    }
    let workspace = state.workspace.clone();
    let Some(app) = state.app.as_mut() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };

    match req.method.as_str() {
        "backup.export" => {
            let workspace = workspace.unwrap_or_else(|| PathBuf::from("."));
            Some(handle_export(app, &workspace, req))
        }
        "backup.import" => Some(handle_import(app, req)),
        _ => None,
    }
}
