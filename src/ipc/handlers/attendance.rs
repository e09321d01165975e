use crate::ipc::error::{err, ok};
use crate::ipc::types::{App, AppState, Request};
use crate::session::AttendanceStatus;
use chrono::NaiveDate;
use serde_json::json;

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| format!("missing {}", key))
}

fn parse_status(params: &serde_json::Value) -> Result<AttendanceStatus, String> {
    match params.get("status").and_then(|v| v.as_str()) {
        Some("present") => Ok(AttendanceStatus::Present),
        Some("absent") => Ok(AttendanceStatus::Absent),
        Some("late") => Ok(AttendanceStatus::Late),
        Some(other) => Err(format!("status must be present, absent or late: {}", other)),
        None => Err("missing status".to_string()),
    }
}

/// Optional backfill override; day granularity, `YYYY-MM-DD`.
fn parse_date_override(params: &serde_json::Value) -> Result<Option<String>, String> {
    let Some(raw) = params.get("date") else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    let Some(s) = raw.as_str() else {
        return Err("date must be a string".to_string());
    };
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| "date must be YYYY-MM-DD".to_string())?;
    Ok(Some(s.to_string()))
}

fn handle_mark(app: &mut App, req: &Request) -> serde_json::Value {
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let status = match parse_status(&req.params) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let date = match parse_date_override(&req.params) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let remarks = req
        .params
        .get("remarks")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let record = match date {
        Some(date) => {
            app.session
                .mark_attendance_on(&app.mirror, &student_id, &date, status, remarks)
        }
        None => app
            .session
            .mark_attendance(&app.mirror, &student_id, status, remarks),
    };
    ok(&req.id, json!({ "record": record }))
}

fn handle_list(app: &mut App, req: &Request) -> serde_json::Value {
    let records = &app.session.state().attendance_records;
    let records: Vec<_> = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(student_id) => records
            .iter()
            .filter(|r| r.student_id == student_id)
            .collect(),
        None => records.iter().collect(),
    };
    ok(&req.id, json!({ "records": records }))
}

fn handle_percentage(app: &mut App, req: &Request) -> serde_json::Value {
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    ok(
        &req.id,
        json!({ "percentage": app.session.attendance_percentage(&student_id) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if !req.method.starts_with("attendance.") {
        return None;
    }
    let Some(app) = state.app.as_mut() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };

    match req.method.as_str() {
        "attendance.mark" => Some(handle_mark(app, req)),
        "attendance.list" => Some(handle_list(app, req)),
        "attendance.percentage" => Some(handle_percentage(app, req)),
        _ => None,
    }
}
