use thiserror::Error;

use crate::session::ScopeLevel;

/// Client-side field or attachment rule violations. Never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("attachment is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("attachment type {0:?} is not allowed; use PDF, JPEG or PNG")]
    UnsupportedType(String),
    #[error("attachment changed on disk after it was validated")]
    AttachmentChanged,
    #[error("{field}: {message}")]
    Field {
        field: &'static str,
        message: String,
    },
}

impl ValidationError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        ValidationError::Field {
            field,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::TooLarge { .. } => "too_large",
            ValidationError::UnsupportedType(_) => "unsupported_type",
            ValidationError::AttachmentChanged | ValidationError::Field { .. } => {
                "validation_failed"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },
    #[error("request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("no response from server: {0}")]
    Transport(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Auth { .. } => "auth_expired",
            _ => "network_error",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. } | ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("no identity is signed in")]
    Unauthenticated,
    #[error("cannot select {level} before {parent}")]
    MissingParent {
        level: ScopeLevel,
        parent: ScopeLevel,
    },
    #[error("child selection is only available to parents")]
    ChildRequiresParent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("unknown page {0:?}")]
    UnknownPage(String),
    #[error("page {0:?} is not available to this role")]
    NotPermitted(String),
    #[error("page {page:?} needs a selected {level}")]
    ScopeRequired { page: String, level: ScopeLevel },
    #[error("no identity is signed in")]
    Unauthenticated,
}

/// Fatal at startup; never reaches a user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("navigation entry {entry:?} references capability {capability:?} with no permission matrix row")]
    MissingCapability { entry: String, capability: String },
    #[error("permission matrix names unknown capability {0:?}")]
    UnknownCapability(String),
    #[error("permission matrix names unknown role {0:?}")]
    UnknownRole(String),
    #[error("permission matrix is not valid TOML: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("no identity is signed in")]
    Unauthenticated,
    #[error("a submission is already in progress")]
    Busy,
    #[error("the session changed while the request was in flight")]
    Superseded,
}

impl PaymentError {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::Validation(e) => e.code(),
            PaymentError::Api(e) => e.code(),
            PaymentError::Unauthenticated => "auth_required",
            PaymentError::Busy => "busy",
            PaymentError::Superseded => "superseded",
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, PaymentError::Api(ApiError::Auth { .. }))
    }
}
