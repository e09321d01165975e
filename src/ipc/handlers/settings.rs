use crate::ipc::error::{err, ok};
use crate::ipc::types::{App, AppState, Request};
use crate::session::SettingsPatch;
use serde_json::json;

fn handle_get(app: &mut App, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "settings": app.session.state().settings }))
}

fn handle_update(app: &mut App, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("patch") else {
        return err(&req.id, "bad_params", "missing params.patch", None);
    };
    let patch: SettingsPatch = match serde_json::from_value(raw.clone()) {
        Ok(p) => p,
        Err(e) => return err(&req.id, "bad_params", format!("invalid patch: {}", e), None),
    };
    app.session.update_settings(&app.mirror, patch);
    ok(&req.id, json!({ "settings": app.session.state().settings }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if !req.method.starts_with("settings.") {
        return None;
    }
    let Some(app) = state.app.as_mut() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };

    match req.method.as_str() {
        "settings.get" => Some(handle_get(app, req)),
        "settings.update" => Some(handle_update(app, req)),
        _ => None,
    }
}
