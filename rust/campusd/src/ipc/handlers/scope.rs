use serde_json::json;

use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_optional_bool, get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::session::{FetchTicket, ScopeLevel, ScopeRef};

fn parse_level(params: &serde_json::Value) -> Result<ScopeLevel, HandlerErr> {
    get_required_str(params, "level")?
        .parse()
        .map_err(|e: String| HandlerErr::new("bad_params", e))
}

fn scope_result(state: &mut AppState) -> serde_json::Value {
    let moved_to = state.reconcile_nav();
    json!({
        "scope": state.session.scope(),
        "currentPage": state.navigator.current(),
        "redirected": moved_to.is_some(),
    })
}

fn handle_select(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let level = parse_level(&req.params)?;
    let id = get_required_str(&req.params, "id")?;
    if id.trim().is_empty() {
        return Err(HandlerErr::new("bad_params", "id must not be empty"));
    }
    let name = get_optional_str(&req.params, "name")?.unwrap_or_else(|| id.clone());
    state.session.select_scope(level, ScopeRef { id, name })?;
    Ok(scope_result(state))
}

fn handle_clear(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let level = parse_level(&req.params)?;
    if !state.session.is_authenticated() {
        return Err(HandlerErr::new("auth_required", "no identity is signed in"));
    }
    state.session.clear_scope(level);
    Ok(scope_result(state))
}

fn handle_clear_child(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    if !state.session.is_authenticated() {
        return Err(HandlerErr::new("auth_required", "no identity is signed in"));
    }
    state.session.clear_child();
    Ok(scope_result(state))
}

/// Ticket for a fetch the host is about to make. Scoped by default.
fn handle_ticket(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    if !state.session.is_authenticated() {
        return Err(HandlerErr::new("auth_required", "no identity is signed in"));
    }
    let scoped = match req.params.get("scoped") {
        None | Some(serde_json::Value::Null) => true,
        Some(_) => get_optional_bool(&req.params, "scoped")?,
    };
    let ticket = state.session.ticket(scoped);
    tracing::debug!(?ticket, "fetch ticket issued");
    Ok(json!({ "ticket": ticket }))
}

/// Whether a response fetched under `ticket` may still be applied.
fn handle_is_current(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let raw = req
        .params
        .get("ticket")
        .cloned()
        .ok_or_else(|| HandlerErr::new("bad_params", "missing ticket"))?;
    let ticket: FetchTicket = serde_json::from_value(raw)
        .map_err(|e| HandlerErr::new("bad_params", format!("invalid ticket: {e}")))?;
    Ok(json!({ "current": state.session.is_current(&ticket) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "scope.select" => handle_select(state, req),
        "scope.clear" => handle_clear(state, req),
        "scope.clearChild" => handle_clear_child(state),
        "scope.get" => Ok(json!({ "scope": state.session.scope() })),
        "scope.ticket" => handle_ticket(state, req),
        "scope.isCurrent" => handle_is_current(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
