use crate::identity::LocalIdentity;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{App, AppState, Request};
use crate::mirror::Mirror;
use crate::roster::RosterStore;
use crate::session::SessionStore;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let mirror = match Mirror::open(&path) {
        Ok(m) => m,
        Err(e) => return err(&req.id, "mirror_open_failed", format!("{e:?}"), None),
    };
    let identity = match LocalIdentity::open(&path) {
        Ok(i) => i,
        Err(e) => return err(&req.id, "identity_open_failed", format!("{e:?}"), None),
    };

    // Rehydrate both stores from the mirror; from here on the in-memory
    // state is authoritative and the mirror is write-through only.
    let roster = RosterStore::rehydrate(&mirror);
    let mut session = SessionStore::rehydrate(&mirror);
    session.restore_session(&identity);

    state.workspace = Some(path.clone());
    state.app = Some(App {
        mirror,
        roster,
        session,
        identity,
    });

    ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
