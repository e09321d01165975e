use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug)]
pub enum IdentityError {
    InvalidCredentials,
    EmailTaken,
    Service(String),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::InvalidCredentials => write!(f, "Invalid email or password."),
            IdentityError::EmailTaken => write!(f, "An account with this email already exists."),
            IdentityError::Service(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for IdentityError {}

/// Opaque authentication boundary. Any implementation satisfying this
/// contract can back the session store; failures never cross it unconverted.
pub trait IdentityService {
    fn sign_in(&mut self, email: &str, password: &str) -> Result<Identity, IdentityError>;
    fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        name: &str,
        role: Option<Role>,
    ) -> Result<Identity, IdentityError>;
    fn sign_out(&mut self) -> Result<(), IdentityError>;
    fn current_session(&self) -> Option<Identity>;
    /// Errors degrade to false: an unverifiable role is no role.
    fn has_role(&self, user_id: &str, role: &str) -> bool;
    /// Audit trail; callers swallow failures.
    fn record_login_attempt(
        &mut self,
        user_id: Option<&str>,
        email: &str,
        role: &str,
        user_agent: &str,
    ) -> Result<(), IdentityError>;
}

/// Workspace-local provider: accounts and a login audit in the workspace
/// sqlite file, the current session held in memory only.
pub struct LocalIdentity {
    conn: Connection,
    current: Option<Identity>,
}

fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn service_err(e: impl fmt::Display) -> IdentityError {
    IdentityError::Service(e.to_string())
}

impl LocalIdentity {
    pub fn open(workspace: &Path) -> anyhow::Result<LocalIdentity> {
        let conn = Connection::open(crate::mirror::db_path(workspace))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts(
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                pass_salt TEXT NOT NULL,
                pass_digest TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS login_attempts(
                id TEXT PRIMARY KEY,
                user_id TEXT,
                email TEXT NOT NULL,
                role TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                attempted_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(LocalIdentity {
            conn,
            current: None,
        })
    }
}

impl IdentityService for LocalIdentity {
    fn sign_in(&mut self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        let row: Option<(String, String, String, String, String)> = self
            .conn
            .query_row(
                "SELECT id, name, pass_salt, pass_digest, created_at
                 FROM accounts WHERE email = ?",
                [email],
                |r| {
                    Ok((
                        r.get(0)?,
                        r.get(1)?,
                        r.get(2)?,
                        r.get(3)?,
                        r.get(4)?,
                    ))
                },
            )
            .optional()
            .map_err(service_err)?;

        let Some((id, name, salt, digest, created_at)) = row else {
            return Err(IdentityError::InvalidCredentials);
        };
        if password_digest(&salt, password) != digest {
            return Err(IdentityError::InvalidCredentials);
        }

        let identity = Identity {
            user_id: id,
            email: email.to_string(),
            name,
            created_at,
        };
        self.current = Some(identity.clone());
        Ok(identity)
    }

    fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        name: &str,
        role: Option<Role>,
    ) -> Result<Identity, IdentityError> {
        let taken: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM accounts WHERE email = ?", [email], |r| {
                r.get(0)
            })
            .optional()
            .map_err(service_err)?;
        if taken.is_some() {
            return Err(IdentityError::EmailTaken);
        }

        let id = Uuid::new_v4().to_string();
        let salt = Uuid::new_v4().to_string();
        let created_at = now_iso();
        let role_name = match role {
            Some(Role::Admin) => "admin",
            _ => "user",
        };
        self.conn
            .execute(
                "INSERT INTO accounts(id, email, name, role, pass_salt, pass_digest, created_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    email,
                    name,
                    role_name,
                    &salt,
                    &password_digest(&salt, password),
                    &created_at,
                ),
            )
            .map_err(service_err)?;

        Ok(Identity {
            user_id: id,
            email: email.to_string(),
            name: name.to_string(),
            created_at,
        })
    }

    fn sign_out(&mut self) -> Result<(), IdentityError> {
        self.current = None;
        Ok(())
    }

    fn current_session(&self) -> Option<Identity> {
        self.current.clone()
    }

    fn has_role(&self, user_id: &str, role: &str) -> bool {
        self.conn
            .query_row(
                "SELECT 1 FROM accounts WHERE id = ? AND role = ?",
                (user_id, role),
                |r| r.get::<_, i64>(0),
            )
            .optional()
            .ok()
            .flatten()
            .is_some()
    }

    fn record_login_attempt(
        &mut self,
        user_id: Option<&str>,
        email: &str,
        role: &str,
        user_agent: &str,
    ) -> Result<(), IdentityError> {
        self.conn
            .execute(
                "INSERT INTO login_attempts(id, user_id, email, role, user_agent, attempted_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (
                    Uuid::new_v4().to_string(),
                    user_id,
                    email,
                    role,
                    user_agent,
                    now_iso(),
                ),
            )
            .map_err(service_err)?;
        Ok(())
    }
}
