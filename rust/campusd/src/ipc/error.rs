use serde_json::json;

use crate::error::{ApiError, NavError, PaymentError, ScopeError, ValidationError};

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ValidationError> for HandlerErr {
    fn from(e: ValidationError) -> Self {
        let details = match &e {
            ValidationError::Field { field, .. } => json!({ "field": field }),
            ValidationError::TooLarge { size, limit } => {
                json!({ "field": "attachment", "size": size, "limit": limit })
            }
            _ => json!({ "field": "attachment" }),
        };
        HandlerErr::new(e.code(), e.to_string()).with_details(details)
    }
}

impl From<ApiError> for HandlerErr {
    fn from(e: ApiError) -> Self {
        let out = HandlerErr::new(e.code(), e.to_string());
        match e.status() {
            Some(status) => out.with_details(json!({ "status": status })),
            None => out,
        }
    }
}

impl From<PaymentError> for HandlerErr {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Validation(v) => v.into(),
            PaymentError::Api(a) => a.into(),
            other => HandlerErr::new(other.code(), other.to_string()),
        }
    }
}

impl From<ScopeError> for HandlerErr {
    fn from(e: ScopeError) -> Self {
        match &e {
            ScopeError::Unauthenticated => HandlerErr::new("auth_required", e.to_string()),
            ScopeError::MissingParent { level, parent } => HandlerErr::new("scope_invalid", e.to_string())
                .with_details(json!({ "level": level, "missing": parent })),
            ScopeError::ChildRequiresParent => HandlerErr::new("scope_invalid", e.to_string())
                .with_details(json!({ "level": "child" })),
        }
    }
}

impl From<NavError> for HandlerErr {
    fn from(e: NavError) -> Self {
        let details = match &e {
            NavError::Unauthenticated => return HandlerErr::new("auth_required", e.to_string()),
            NavError::UnknownPage(page) => json!({ "reason": "unknown_page", "page": page }),
            NavError::NotPermitted(page) => json!({ "reason": "not_permitted", "page": page }),
            NavError::ScopeRequired { page, level } => {
                json!({ "reason": "scope_required", "page": page, "level": level })
            }
        };
        HandlerErr::new("nav_blocked", e.to_string()).with_details(details)
    }
}
