use std::path::PathBuf;

use crate::identity::LocalIdentity;
use crate::mirror::Mirror;
use crate::roster::RosterStore;
use crate::session::SessionStore;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything owned by an open workspace: both stores, their mirror, and
/// the identity provider. Constructed once at `workspace.select`; handlers
/// receive it by reference, never through a static.
pub struct App {
    pub mirror: Mirror,
    pub roster: RosterStore,
    pub session: SessionStore,
    pub identity: LocalIdentity,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub app: Option<App>,
}
