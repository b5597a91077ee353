use super::error::HandlerErr;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::new("bad_params", format!("{} must be a string", key))),
    }
}

pub fn get_optional_bool(params: &serde_json::Value, key: &str) -> Result<bool, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(false),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(_) => Err(HandlerErr::new("bad_params", format!("{} must be a boolean", key))),
    }
}

pub fn get_optional_u32(params: &serde_json::Value, key: &str) -> Result<Option<u32>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .filter(|n| *n >= 1)
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be a positive integer", key))),
    }
}

/// Accepts a JSON string or number, since hosts send amounts either way.
pub fn get_text_or_number(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    match params.get(key) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(HandlerErr::new("bad_params", format!("missing {}", key))),
    }
}
