use serde_json::json;

use crate::access::{AccessResolver, Capability};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};

fn handle_can(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let token = get_required_str(&req.params, "capability")?;
    let resolver = AccessResolver::new(&state.session, &state.matrix);
    // Unknown tokens are simply not granted.
    Ok(json!({ "capability": token, "allowed": resolver.can_access_token(&token) }))
}

fn handle_requires_scope(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let token = get_required_str(&req.params, "capability")?;
    let capability: Capability = token
        .parse()
        .map_err(|_| HandlerErr::new("bad_params", format!("unknown capability {:?}", token)))?;
    if !state.session.is_authenticated() {
        return Err(HandlerErr::new("auth_required", "no identity is signed in"));
    }
    let resolver = AccessResolver::new(&state.session, &state.matrix);
    Ok(json!({
        "capability": capability,
        "scopeFree": capability.is_scope_free(),
        "level": resolver.requires_scope(capability),
    }))
}

fn handle_has(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let role = get_required_str(&req.params, "role")?;
    let capability = get_required_str(&req.params, "capability")?;
    Ok(json!({ "allowed": state.matrix.has_permission_token(&role, &capability) }))
}

/// Capabilities the signed-in role holds in the matrix, before scope gating.
fn handle_granted(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let Some(role) = state.session.role() else {
        return Err(HandlerErr::new("auth_required", "no identity is signed in"));
    };
    Ok(json!({ "role": role, "capabilities": state.matrix.granted(role) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "access.can" => handle_can(state, req),
        "access.requiresScope" => handle_requires_scope(state, req),
        "access.has" => handle_has(state, req),
        "access.granted" => handle_granted(state),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
