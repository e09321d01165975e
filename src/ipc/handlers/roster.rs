use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{App, AppState, Request};
use crate::roster::{grade, FilterOptions, NewStudent, Student, UpdateOutcome};
use crate::session::NotificationKind;
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn bad_params(message: impl Into<String>) -> HandlerErr {
    HandlerErr {
        code: "bad_params",
        message: message.into(),
        details: None,
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| bad_params(format!("missing {}", key)))
}

fn require_non_empty(value: &str, field: &str) -> Result<(), HandlerErr> {
    if value.trim().is_empty() {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("{} must not be empty", field),
            details: Some(json!({ "field": field })),
        });
    }
    Ok(())
}

fn require_marks_in_range(marks: f64) -> Result<(), HandlerErr> {
    if !(0.0..=100.0).contains(&marks) || !marks.is_finite() {
        return Err(HandlerErr {
            code: "bad_params",
            message: "marks must be between 0 and 100".to_string(),
            details: Some(json!({ "marks": marks })),
        });
    }
    Ok(())
}

fn parse_new_student(params: &serde_json::Value) -> Result<NewStudent, HandlerErr> {
    let Some(raw) = params.get("student") else {
        return Err(bad_params("missing params.student"));
    };
    let draft: NewStudent = serde_json::from_value(raw.clone())
        .map_err(|e| bad_params(format!("invalid student: {}", e)))?;
    require_non_empty(&draft.name, "name")?;
    require_non_empty(&draft.roll_no, "rollNo")?;
    require_non_empty(&draft.course, "course")?;
    require_non_empty(&draft.contact_info, "contactInfo")?;
    require_marks_in_range(draft.marks)?;
    Ok(draft)
}

fn parse_full_student(params: &serde_json::Value) -> Result<Student, HandlerErr> {
    let Some(raw) = params.get("student") else {
        return Err(bad_params("missing params.student"));
    };
    let student: Student = serde_json::from_value(raw.clone())
        .map_err(|e| bad_params(format!("invalid student: {}", e)))?;
    require_non_empty(&student.id, "id")?;
    require_non_empty(&student.name, "name")?;
    require_non_empty(&student.roll_no, "rollNo")?;
    require_non_empty(&student.course, "course")?;
    require_non_empty(&student.contact_info, "contactInfo")?;
    require_marks_in_range(student.marks)?;
    Ok(student)
}

fn roster_json(app: &App) -> serde_json::Value {
    let state = app.roster.state();
    json!({
        "students": state.students,
        "filteredStudents": state.filtered_students,
        "darkMode": state.dark_mode,
        "error": state.error,
    })
}

fn handle_list(app: &mut App, req: &Request) -> serde_json::Value {
    ok(&req.id, roster_json(app))
}

fn handle_add(app: &mut App, req: &Request) -> serde_json::Value {
    let draft = match parse_new_student(&req.params) {
        Ok(d) => d,
        Err(e) => return e.response(&req.id),
    };
    match app.roster.add(&app.mirror, draft) {
        Some(student) => {
            app.session.add_notification(
                &app.mirror,
                "Success",
                "Student added successfully!",
                NotificationKind::Success,
            );
            ok(&req.id, json!({ "student": student }))
        }
        None => {
            app.session.add_notification(
                &app.mirror,
                "Error",
                "Roll number already exists!",
                NotificationKind::Error,
            );
            err(
                &req.id,
                "duplicate_roll_no",
                "roll number already exists",
                None,
            )
        }
    }
}

fn handle_update(app: &mut App, req: &Request) -> serde_json::Value {
    let student = match parse_full_student(&req.params) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match app.roster.update(&app.mirror, student) {
        UpdateOutcome::Updated => {
            app.session.add_notification(
                &app.mirror,
                "Success",
                "Student updated successfully!",
                NotificationKind::Success,
            );
            ok(&req.id, json!({ "updated": true }))
        }
        UpdateOutcome::NotFound => err(&req.id, "not_found", "student not found", None),
        UpdateOutcome::DuplicateRollNo => {
            app.session.add_notification(
                &app.mirror,
                "Error",
                "Roll number already exists!",
                NotificationKind::Error,
            );
            err(
                &req.id,
                "duplicate_roll_no",
                "roll number already exists",
                None,
            )
        }
    }
}

fn handle_delete(app: &mut App, req: &Request) -> serde_json::Value {
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    app.roster.delete(&app.mirror, &student_id);
    app.session.add_notification(
        &app.mirror,
        "Success",
        "Student deleted successfully!",
        NotificationKind::Success,
    );
    ok(&req.id, json!({ "deleted": true }))
}

fn handle_filter(app: &mut App, req: &Request) -> serde_json::Value {
    let filters: FilterOptions = match serde_json::from_value(req.params.clone()) {
        Ok(f) => f,
        Err(e) => return err(&req.id, "bad_params", format!("invalid filters: {}", e), None),
    };
    app.roster.apply_filter(&filters);
    ok(
        &req.id,
        json!({ "filteredStudents": app.roster.state().filtered_students }),
    )
}

fn handle_is_roll_no_unique(app: &mut App, req: &Request) -> serde_json::Value {
    let roll_no = match get_required_str(&req.params, "rollNo") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let exclude_id = req.params.get("excludeId").and_then(|v| v.as_str());
    ok(
        &req.id,
        json!({ "unique": app.roster.is_roll_no_unique(&roll_no, exclude_id) }),
    )
}

fn handle_stats(app: &mut App, req: &Request) -> serde_json::Value {
    match serde_json::to_value(app.roster.stats()) {
        Ok(stats) => ok(&req.id, stats),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

fn handle_grade(req: &Request) -> serde_json::Value {
    let Some(marks) = req.params.get("marks").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "missing marks", None);
    };
    if let Err(e) = require_marks_in_range(marks) {
        return e.response(&req.id);
    }
    ok(&req.id, json!({ "grade": grade(marks).letter() }))
}

fn handle_export_csv(
    app: &mut App,
    workspace: &std::path::Path,
    req: &Request,
) -> serde_json::Value {
    let Some(csv) = app.roster.to_csv() else {
        app.session.add_notification(
            &app.mirror,
            "No Data",
            "No students to export!",
            NotificationKind::Warning,
        );
        return err(&req.id, "empty_roster", "no students to export", None);
    };

    let out_path = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| backup::default_csv_path(workspace));
    if let Err(e) = backup::write_text_file(&out_path, &csv) {
        return err(&req.id, "export_failed", format!("{e:?}"), None);
    }

    app.session.add_notification(
        &app.mirror,
        "Success",
        "Students data exported successfully!",
        NotificationKind::Success,
    );
    ok(
        &req.id,
        json!({
            "path": out_path.to_string_lossy(),
            "rows": app.roster.state().students.len(),
        }),
    )
}

fn handle_clear_all(app: &mut App, req: &Request) -> serde_json::Value {
    app.roster.clear_all(&app.mirror);
    app.session.add_notification(
        &app.mirror,
        "Success",
        "All student data cleared!",
        NotificationKind::Success,
    );
    ok(&req.id, json!({ "cleared": true }))
}

fn handle_toggle_dark_mode(app: &mut App, req: &Request) -> serde_json::Value {
    let dark_mode = app.roster.toggle_dark_mode(&app.mirror);
    ok(&req.id, json!({ "darkMode": dark_mode }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if !req.method.starts_with("roster.") {
        return None;
    }
    let workspace = state.workspace.clone();
    let Some(app) = state.app.as_mut() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };

    match req.method.as_str() {
        "roster.list" => Some(handle_list(app, req)),
        "roster.add" => Some(handle_add(app, req)),
        "roster.update" => Some(handle_update(app, req)),
        "roster.delete" => Some(handle_delete(app, req)),
        "roster.filter" => Some(handle_filter(app, req)),
        "roster.isRollNoUnique" => Some(handle_is_roll_no_unique(app, req)),
        "roster.stats" => Some(handle_stats(app, req)),
        "roster.grade" => Some(handle_grade(req)),
        "roster.exportCsv" => {
            let workspace = workspace.unwrap_or_else(|| std::path::PathBuf::from("."));
            Some(handle_export_csv(app, &workspace, req))
        }
        "roster.clearAll" => Some(handle_clear_all(app, req)),
        "roster.toggleDarkMode" => Some(handle_toggle_dark_mode(app, req)),
        _ => None,
    }
}
