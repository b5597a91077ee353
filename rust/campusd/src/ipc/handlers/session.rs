use serde_json::json;

use crate::auth;
use crate::db;
use crate::error::ApiError;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::notices::{NoticeKind, Notifier};

pub const LAST_PAGE_KEY: &str = "nav.current";

pub fn snapshot(state: &AppState) -> serde_json::Value {
    json!({
        "authenticated": state.session.is_authenticated(),
        "identity": state.session.identity(),
        "scope": state.session.scope(),
        "currentPage": state.navigator.current(),
    })
}

/// Fresh identity: nothing from the previous one may leak through.
fn after_identity_change(state: &mut AppState) {
    state.payments.reset();
    state.reconcile_nav();
}

fn handle_login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let email = get_required_str(&req.params, "email")?;
    let password = get_required_str(&req.params, "password")?;
    if email.trim().is_empty() || password.is_empty() {
        return Err(HandlerErr::new("bad_params", "email and password are required"));
    }
    let before = state.session.ticket(false);
    let result = auth::login(
        &mut state.session,
        state.db.as_ref(),
        &mut state.api,
        email.trim(),
        &password,
    );
    if !state.session.is_current(&before) {
        after_identity_change(state);
    }
    match result {
        Ok(identity) => {
            state.notices.notify(
                NoticeKind::Success,
                format!("Signed in as {}", identity.display_name),
            );
            Ok(snapshot(state))
        }
        Err(e @ ApiError::Auth { .. }) => {
            state.notices.notify(NoticeKind::Error, "Sign-in failed.".to_string());
            Err(HandlerErr::new("auth_failed", e.to_string()))
        }
        Err(e) => {
            state.notices.notify(NoticeKind::Error, e.to_string());
            Err(e.into())
        }
    }
}

fn restore_last_page(state: &mut AppState) {
    let saved = match state.db.as_ref() {
        Some(conn) => db::settings_get_json(conn, LAST_PAGE_KEY).ok().flatten(),
        None => None,
    };
    let Some(page) = saved.as_ref().and_then(|v| v.as_str()).map(str::to_string) else {
        return;
    };
    if let Err(e) = state.navigate(&page) {
        tracing::debug!(page = %page, reason = %e, "saved page not restorable");
    }
}

fn handle_restore(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    if state.db.is_none() {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    }
    let before = state.session.ticket(false);
    let result = auth::restore(&mut state.session, state.db.as_ref(), &mut state.api);
    if !state.session.is_current(&before) {
        after_identity_change(state);
    }
    match result {
        Ok(Some(identity)) => {
            state.notices.notify(
                NoticeKind::Info,
                format!("Welcome back, {}", identity.display_name),
            );
            restore_last_page(state);
            Ok(json!({ "restored": true, "session": snapshot(state) }))
        }
        Ok(None) => Ok(json!({ "restored": false, "session": snapshot(state) })),
        Err(e) => {
            if matches!(e, ApiError::Auth { .. }) {
                state.notices.notify(
                    NoticeKind::Error,
                    "Your session has expired. Please sign in again.".to_string(),
                );
            }
            Err(e.into())
        }
    }
}

fn handle_logout(state: &mut AppState) -> serde_json::Value {
    state.sign_out();
    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = db::settings_set_json(conn, LAST_PAGE_KEY, &serde_json::Value::Null) {
            tracing::warn!(error = %e, "failed to clear saved page");
        }
    }
    snapshot(state)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "session.login" => handle_login(state, req),
        "session.restore" => handle_restore(state),
        "session.logout" => Ok(handle_logout(state)),
        "session.get" => Ok(snapshot(state)),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
