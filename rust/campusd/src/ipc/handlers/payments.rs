use serde_json::json;
use std::path::PathBuf;

use crate::error::PaymentError;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{
    get_optional_bool, get_optional_str, get_optional_u32, get_required_str, get_text_or_number,
};
use crate::ipc::types::{AppState, Request};
use crate::notices::{NoticeKind, Notifier};
use crate::payments::{PaymentDraft, PaymentStatus};

fn require_identity(state: &AppState) -> Result<(), HandlerErr> {
    if state.session.is_authenticated() {
        Ok(())
    } else {
        Err(HandlerErr::new("auth_required", "no identity is signed in"))
    }
}

fn state_json(state: &AppState) -> serde_json::Value {
    json!({
        "submission": state.payments.state(),
        "attachment": state.payments.attachment(),
    })
}

/// Reports a failure to the user and ends the session on auth errors.
fn fail(state: &mut AppState, e: PaymentError) -> HandlerErr {
    if e.is_auth() {
        if let PaymentError::Api(api) = &e {
            state.note_api_error(api);
        }
        return e.into();
    }
    state.notices.notify(NoticeKind::Error, e.to_string());
    e.into()
}

fn handle_attach(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_identity(state)?;
    let path = PathBuf::from(get_required_str(&req.params, "path")?);
    let mime = get_optional_str(&req.params, "mimeType")?;
    if let Err(e) = state.payments.attach(&path, mime.as_deref()) {
        return Err(fail(state, e.into()));
    }
    Ok(state_json(state))
}

fn handle_detach(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    state.payments.detach();
    Ok(state_json(state))
}

fn draft_from(params: &serde_json::Value) -> Result<PaymentDraft, HandlerErr> {
    let amount = match params.get("amount") {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(_) => get_text_or_number(params, "amount")?,
    };
    Ok(PaymentDraft {
        amount,
        method: get_optional_str(params, "method")?.unwrap_or_default(),
        date: get_optional_str(params, "date")?.unwrap_or_default(),
        month: get_optional_str(params, "month")?.unwrap_or_default(),
        reference: get_optional_str(params, "reference")?,
        notes: get_optional_str(params, "notes")?,
    })
}

fn handle_submit(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let draft = draft_from(&req.params)?;
    let result = state.payments.submit(&state.session, &state.api, &draft);
    match result {
        Ok(receipt) => {
            state
                .notices
                .notify(NoticeKind::Success, "Payment submitted successfully".to_string());
            Ok(json!({ "receipt": receipt, "submission": state.payments.state() }))
        }
        Err(e) => Err(fail(state, e)),
    }
}

fn parse_status(raw: Option<String>) -> Result<Option<PaymentStatus>, HandlerErr> {
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e: String| HandlerErr::new("bad_params", e)),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let status = parse_status(get_optional_str(&req.params, "status")?)?;
    let refresh = get_optional_bool(&req.params, "refresh")?;
    let page = get_optional_u32(&req.params, "page")?;
    let result = state
        .payments
        .list_mine(&state.session, &state.api, status, page, refresh);
    match result {
        Ok(listing) => serde_json::to_value(listing)
            .map_err(|e| HandlerErr::new("internal", e.to_string())),
        Err(e) => Err(fail(state, e)),
    }
}

fn handle_counts(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    require_identity(state)?;
    Ok(json!({ "counts": state.payments.counts(&state.session) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "payments.attach" => handle_attach(state, req),
        "payments.detach" => handle_detach(state),
        "payments.submit" => handle_submit(state, req),
        "payments.list" => handle_list(state, req),
        "payments.counts" => handle_counts(state),
        "payments.state" => Ok(state_json(state)),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
