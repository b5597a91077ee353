use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notices.drain" => Some(ok(&req.id, json!({ "notices": state.notices.drain() }))),
        _ => None,
    }
}
