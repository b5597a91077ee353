//! Sign-in, token restore and sign-out on top of the session store.
//!
//! The bearer token is persisted in the workspace database when one is open.
//! Any authentication failure forces a full logout and forgets the token.
use rusqlite::Connection;
use serde::Deserialize;

use crate::access::Role;
use crate::db;
use crate::error::ApiError;
use crate::session::{Identity, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub token: String,
    pub identity: Identity,
}

pub trait AuthApi {
    fn login(&self, email: &str, password: &str) -> Result<LoginGrant, ApiError>;
    fn validate_token(&self, token: &str) -> Result<Identity, ApiError>;
    /// Token sent on every later request; `None` after sign-out.
    fn set_token(&mut self, token: Option<String>);
}

/// User object as the auth endpoints return it. Backends differ on the key
/// names, and some send both spellings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireUser {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    user_type: Option<String>,
}

impl WireUser {
    pub(crate) fn into_identity(self) -> Result<Identity, ApiError> {
        let role: Role = self
            .role
            .or(self.user_type)
            .ok_or_else(|| ApiError::Decode("user has no role".to_string()))?
            .parse()
            .map_err(ApiError::Decode)?;
        let named = |n: &String| !n.trim().is_empty();
        let display_name = match self.display_name.filter(named).or(self.name.filter(named)) {
            Some(n) => n,
            None => [self.first_name, self.last_name]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" "),
        };
        Ok(Identity {
            id: self.id,
            display_name,
            email: self.email,
            role,
        })
    }
}

fn forget_token(db: Option<&Connection>) {
    if let Some(conn) = db {
        if let Err(e) = db::session_delete(conn) {
            tracing::warn!(error = %e, "failed to delete persisted session");
        }
    }
}

/// Clears identity and scope and drops the persisted token.
pub fn logout(session: &mut SessionStore, db: Option<&Connection>, api: &mut dyn AuthApi) {
    session.logout();
    api.set_token(None);
    forget_token(db);
}

pub fn login(
    session: &mut SessionStore,
    db: Option<&Connection>,
    api: &mut dyn AuthApi,
    email: &str,
    password: &str,
) -> Result<Identity, ApiError> {
    let grant = match api.login(email, password) {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!(error = %e, "login failed");
            if matches!(e, ApiError::Auth { .. }) {
                logout(session, db, api);
            }
            return Err(e);
        }
    };
    if let Some(conn) = db {
        if let Err(e) = db::session_save(conn, &grant.token, &grant.identity) {
            tracing::warn!(error = %e, "failed to persist session");
        }
    }
    api.set_token(Some(grant.token));
    session.set_identity(grant.identity.clone());
    tracing::info!(user = %grant.identity.id, role = %grant.identity.role, "signed in");
    Ok(grant.identity)
}

/// Revalidates a persisted token. `Ok(None)` when there is nothing to
/// restore. A transport failure keeps the token for a later retry.
pub fn restore(
    session: &mut SessionStore,
    db: Option<&Connection>,
    api: &mut dyn AuthApi,
) -> Result<Option<Identity>, ApiError> {
    let Some(conn) = db else {
        return Ok(None);
    };
    let stored = match db::session_load(conn) {
        Ok(Some(s)) => s,
        Ok(None) => return Ok(None),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read persisted session");
            return Ok(None);
        }
    };
    match api.validate_token(&stored.token) {
        Ok(identity) => {
            if identity != stored.identity {
                if let Err(e) = db::session_save(conn, &stored.token, &identity) {
                    tracing::warn!(error = %e, "failed to refresh persisted identity");
                }
            }
            api.set_token(Some(stored.token));
            session.set_identity(identity.clone());
            tracing::info!(user = %identity.id, "session restored");
            Ok(Some(identity))
        }
        Err(e @ ApiError::Auth { .. }) => {
            tracing::info!("persisted token rejected; signing out");
            logout(session, db, api);
            Err(e)
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not validate persisted token");
            Err(e)
        }
    }
}
