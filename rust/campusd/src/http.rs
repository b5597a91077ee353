//! Blocking REST client for the institute backend.
use anyhow::{Context, Result};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::auth::{AuthApi, LoginGrant, WireUser};
use crate::config::CampusConfig;
use crate::error::ApiError;
use crate::payments::api::{PageQuery, PaymentsApi, SubmitForm};
use crate::payments::model::{CreatedPayment, PaymentPage};
use crate::session::Identity;

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    #[serde(alias = "access_token", alias = "token")]
    access_token: String,
    user: WireUser,
}

/// `GET /auth/me` answers either with the user itself or wrapped in `user`.
#[derive(Deserialize)]
#[serde(untagged)]
enum MeBody {
    Wrapped { user: WireUser },
    Bare(WireUser),
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match v.get("message") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            // Validation pipes report a list of messages.
            Some(serde_json::Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(|i| i.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => None,
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

fn transport(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Transport(format!("request timed out: {e}"))
    } else {
        ApiError::Transport(e.to_string())
    }
}

impl ApiClient {
    pub fn new(config: &CampusConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            token: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, method: &str, path: &str, builder: RequestBuilder) -> Result<Response, ApiError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut builder = builder.header("X-Request-Id", &request_id);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        tracing::debug!(method, path, request_id = %request_id, "api request");
        let resp = builder.send().map_err(|e| {
            tracing::warn!(method, path, error = %e, "api request failed");
            transport(e)
        })?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        let message = error_message(status, &body);
        tracing::warn!(method, path, status = status.as_u16(), %message, "api error response");
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(ApiError::Auth {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(ApiError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let body = resp.text().map_err(transport)?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl AuthApi for ApiClient {
    fn login(&self, email: &str, password: &str) -> Result<LoginGrant, ApiError> {
        let builder = self
            .client
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let body: LoginBody = Self::decode(self.send("POST", "/auth/login", builder)?)?;
        Ok(LoginGrant {
            token: body.access_token,
            identity: body.user.into_identity()?,
        })
    }

    fn validate_token(&self, token: &str) -> Result<Identity, ApiError> {
        let builder = self.client.get(self.url("/auth/me")).bearer_auth(token);
        // The candidate token replaces whatever `send` would attach.
        let probe = ApiClient {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: None,
        };
        let body: MeBody = Self::decode(probe.send("GET", "/auth/me", builder)?)?;
        match body {
            MeBody::Wrapped { user } | MeBody::Bare(user) => user.into_identity(),
        }
    }

    fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }
}

impl PaymentsApi for ApiClient {
    fn create_payment(&self, form: SubmitForm<'_>) -> Result<CreatedPayment, ApiError> {
        let mut multipart = multipart::Form::new();
        for (name, value) in form.text_fields() {
            multipart = multipart.text(name, value);
        }
        if let Some((att, bytes)) = form.slip {
            let part = multipart::Part::bytes(bytes)
                .file_name(att.filename.clone())
                .mime_str(&att.mime_type)
                .map_err(|e| ApiError::Transport(e.to_string()))?;
            multipart = multipart.part("paymentSlip", part);
        }
        let builder = self.client.post(self.url("/payment")).multipart(multipart);
        Self::decode(self.send("POST", "/payment", builder)?)
    }

    fn my_payments(&self, query: PageQuery) -> Result<PaymentPage, ApiError> {
        let builder = self
            .client
            .get(self.url("/payment/my-payments"))
            .query(&[("page", query.page), ("limit", query.limit)]);
        Self::decode(self.send("GET", "/payment/my-payments", builder)?)
    }
}
