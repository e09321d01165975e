use crate::identity::Role;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{App, AppState, Request};
use serde_json::json;

const DEFAULT_USER_AGENT: &str = "studysyncd";

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| format!("missing {}", key))
}

fn user_agent(params: &serde_json::Value) -> String {
    params
        .get("userAgent")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_USER_AGENT)
        .to_string()
}

fn session_json(app: &App) -> serde_json::Value {
    let state = app.session.state();
    json!({
        "user": state.user,
        "isAuthenticated": state.is_authenticated,
        "isLoading": state.is_loading,
    })
}

fn handle_sign_in(app: &mut App, req: &Request) -> serde_json::Value {
    let (email, password) = match (
        get_required_str(&req.params, "email"),
        get_required_str(&req.params, "password"),
    ) {
        (Ok(e), Ok(p)) => (e, p),
        (Err(m), _) | (_, Err(m)) => return err(&req.id, "bad_params", m, None),
    };

    let agent = user_agent(&req.params);
    let signed_in = app
        .session
        .sign_in(&mut app.identity, &app.mirror, &email, &password, &agent);

    if signed_in {
        ok(&req.id, session_json(app))
    } else {
        // The failure detail already went out as an error notification.
        err(&req.id, "auth_failed", "sign in failed", None)
    }
}

fn handle_sign_up(app: &mut App, req: &Request) -> serde_json::Value {
    let (name, email, password) = match (
        get_required_str(&req.params, "name"),
        get_required_str(&req.params, "email"),
        get_required_str(&req.params, "password"),
    ) {
        (Ok(n), Ok(e), Ok(p)) => (n, e, p),
        (Err(m), _, _) | (_, Err(m), _) | (_, _, Err(m)) => {
            return err(&req.id, "bad_params", m, None)
        }
    };
    let role = match req.params.get("role").and_then(|v| v.as_str()) {
        None => None,
        Some("admin") => Some(Role::Admin),
        Some("student") => Some(Role::Student),
        Some(other) => {
            return err(
                &req.id,
                "bad_params",
                format!("unknown role: {}", other),
                None,
            )
        }
    };

    let agent = user_agent(&req.params);
    let created = app.session.sign_up(
        &mut app.identity,
        &app.mirror,
        &name,
        &email,
        &password,
        role,
        &agent,
    );

    if created {
        ok(&req.id, json!({ "registered": true }))
    } else {
        err(&req.id, "auth_failed", "sign up failed", None)
    }
}

fn handle_sign_out(app: &mut App, req: &Request) -> serde_json::Value {
    app.session.sign_out(&mut app.identity, &app.mirror);
    ok(&req.id, session_json(app))
}

fn handle_session(app: &mut App, req: &Request) -> serde_json::Value {
    ok(&req.id, session_json(app))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if !req.method.starts_with("auth.") {
        return None;
    }
    let Some(app) = state.app.as_mut() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };

    match req.method.as_str() {
        "auth.signIn" => Some(handle_sign_in(app, req)),
        "auth.signUp" => Some(handle_sign_up(app, req)),
        "auth.signOut" => Some(handle_sign_out(app, req)),
        "auth.session" => Some(handle_session(app, req)),
        _ => None,
    }
}
