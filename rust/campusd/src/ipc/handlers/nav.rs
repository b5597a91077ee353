use serde_json::json;

use super::session::LAST_PAGE_KEY;
use crate::db;
use crate::error::NavError;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::get_optional_str;
use crate::ipc::types::{AppState, Request};
use crate::nav::{find_entry, page_from_path, ENTRIES};

fn target(params: &serde_json::Value) -> Result<String, HandlerErr> {
    match (get_optional_str(params, "key")?, get_optional_str(params, "path")?) {
        (Some(k), _) => Ok(k),
        (None, Some(p)) => Ok(p),
        (None, None) => Err(HandlerErr::new("bad_params", "missing key or path")),
    }
}

fn handle_entries(state: &AppState) -> serde_json::Value {
    json!({
        "entries": state.composer().visible_entries(),
        "currentPage": state.navigator.current(),
    })
}

fn handle_selectable(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let key = target(&req.params)?;
    let composer = state.composer();
    let outcome = composer.resolve(&key).map(|_| ());
    Ok(match outcome {
        Ok(()) => json!({ "key": key, "selectable": true }),
        Err(e) => {
            let reason = HandlerErr::from(e).details;
            json!({ "key": key, "selectable": false, "reason": reason })
        }
    })
}

fn handle_navigate(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let to = target(&req.params)?;
    let entry = state.navigate(&to)?;
    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = db::settings_set_json(conn, LAST_PAGE_KEY, &json!(entry.key)) {
            tracing::warn!(error = %e, "failed to save current page");
        }
    }
    Ok(json!({ "page": entry.key, "route": entry.route }))
}

fn handle_current(state: &AppState) -> serde_json::Value {
    let entry = state
        .navigator
        .current()
        .and_then(|k| find_entry(ENTRIES, k));
    json!({
        "page": entry.map(|e| e.key),
        "route": entry.map(|e| e.route),
    })
}

/// Key to route, or path to key. No access check.
fn handle_route(req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let to = target(&req.params)?;
    let entry = if to.starts_with('/') {
        page_from_path(ENTRIES, &to)
    } else {
        find_entry(ENTRIES, &to)
    };
    let entry = entry.ok_or_else(|| HandlerErr::from(NavError::UnknownPage(to)))?;
    Ok(json!({ "page": entry.key, "route": entry.route }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "nav.entries" => Ok(handle_entries(state)),
        "nav.selectable" => handle_selectable(state, req),
        "nav.navigate" => handle_navigate(state, req),
        "nav.current" => Ok(handle_current(state)),
        "nav.route" => handle_route(req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
