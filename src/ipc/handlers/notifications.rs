use crate::ipc::error::{err, ok};
use crate::ipc::types::{App, AppState, Request};
use crate::session::NotificationKind;
use serde_json::json;

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| format!("missing {}", key))
}

fn parse_kind(params: &serde_json::Value) -> Result<NotificationKind, String> {
    match params.get("type").and_then(|v| v.as_str()) {
        Some("success") => Ok(NotificationKind::Success),
        Some("error") => Ok(NotificationKind::Error),
        Some("warning") => Ok(NotificationKind::Warning),
        Some("info") => Ok(NotificationKind::Info),
        Some(other) => Err(format!(
            "type must be success, error, warning or info: {}",
            other
        )),
        None => Err("missing type".to_string()),
    }
}

fn handle_list(app: &mut App, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({ "notifications": app.session.state().notifications }),
    )
}

fn handle_add(app: &mut App, req: &Request) -> serde_json::Value {
    let title = match get_required_str(&req.params, "title") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let message = match get_required_str(&req.params, "message") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let kind = match parse_kind(&req.params) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let notification = app
        .session
        .add_notification(&app.mirror, &title, &message, kind);
    ok(&req.id, json!({ "notification": notification }))
}

fn handle_mark_read(app: &mut App, req: &Request) -> serde_json::Value {
    let id = match get_required_str(&req.params, "notificationId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    app.session.mark_notification_read(&app.mirror, &id);
    ok(&req.id, json!({ "marked": true }))
}

fn handle_clear(app: &mut App, req: &Request) -> serde_json::Value {
    app.session.clear_notifications(&app.mirror);
    ok(&req.id, json!({ "cleared": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if !req.method.starts_with("notifications.") {
        return None;
    }
    let Some(app) = state.app.as_mut() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };

    match req.method.as_str() {
        "notifications.list" => Some(handle_list(app, req)),
        "notifications.add" => Some(handle_add(app, req)),
        "notifications.markRead" => Some(handle_mark_read(app, req)),
        "notifications.clear" => Some(handle_clear(app, req)),
        _ => None,
    }
}
