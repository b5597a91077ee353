#![allow(dead_code)]

use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

#[derive(Default)]
pub struct BackendState {
    pub payments: Mutex<Vec<Value>>,
    pub uploads: Mutex<Vec<(String, String, usize)>>,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub expired: AtomicBool,
    pub fail_creates: AtomicBool,
    pub fail_logins: AtomicBool,
}

impl BackendState {
    pub fn calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst) + self.create_calls.load(Ordering::SeqCst)
    }

    pub fn seed(&self, owner: &str, id: &str, status: &str) {
        let reason = if status == "REJECTED" {
            json!("slip unreadable")
        } else {
            Value::Null
        };
        self.payments.lock().expect("lock").push(json!({
            "id": id,
            "userId": format!("u-{owner}"),
            "paymentAmount": "25.00",
            "paymentMethod": "CASH_DEPOSIT",
            "paymentReference": null,
            "paymentSlipUrl": null,
            "paymentSlipFilename": null,
            "status": status,
            "paymentDate": "2024-03-05",
            "paymentMonth": "2024-03",
            "verifiedBy": null,
            "verifiedAt": null,
            "rejectionReason": reason,
            "notes": "",
            "createdAt": "2024-03-05T09:00:00Z",
            "updatedAt": "2024-03-05T09:00:00Z"
        }));
    }
}

fn user_for(key: &str) -> Option<Value> {
    let role = match key {
        "student" => "Student",
        "parent" => "Parent",
        "teacher" => "Teacher",
        "admin" => "InstituteAdmin",
        "orgmanager" => "OrganizationManager",
        "marker" => "AttendanceMarker",
        _ => return None,
    };
    Some(json!({
        "id": format!("u-{key}"),
        "name": format!("Test {role}"),
        "email": format!("{key}@example.test"),
        "role": role,
    }))
}

fn unauthorized(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "statusCode": 401, "message": message })),
    )
}

fn authed(state: &BackendState, headers: &HeaderMap) -> Result<String, (StatusCode, Json<Value>)> {
    if state.expired.load(Ordering::SeqCst) {
        return Err(unauthorized("Token expired"));
    }
    let key = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer tok-"))
        .map(str::to_string)
        .ok_or_else(|| unauthorized("Missing token"))?;
    if user_for(&key).is_none() {
        return Err(unauthorized("Unknown token"));
    }
    Ok(key)
}

async fn login(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if state.fail_logins.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "statusCode": 503, "message": "auth service unavailable" })),
        );
    }
    let email = body.get("email").and_then(|v| v.as_str()).unwrap_or("");
    let password = body.get("password").and_then(|v| v.as_str()).unwrap_or("");
    let key = email.split('@').next().unwrap_or("");
    match user_for(key) {
        Some(user) if password == "secret" => (
            StatusCode::OK,
            Json(json!({ "accessToken": format!("tok-{key}"), "user": user })),
        ),
        _ => unauthorized("Invalid credentials"),
    }
}

async fn me(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match authed(&state, &headers) {
        Ok(key) => (StatusCode::OK, Json(json!({ "user": user_for(&key) }))),
        Err(e) => e,
    }
}

async fn create_payment(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    state.create_calls.fetch_add(1, Ordering::SeqCst);
    let key = match authed(&state, &headers) {
        Ok(k) => k,
        Err(e) => return e,
    };
    if state.fail_creates.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "statusCode": 500, "message": "database unavailable" })),
        );
    }
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut slip: Option<String> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        if name == "paymentSlip" {
            let filename = field.file_name().unwrap_or("").to_string();
            let content_type = field.content_type().unwrap_or("").to_string();
            let len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
            state
                .uploads
                .lock()
                .expect("lock")
                .push((filename.clone(), content_type, len));
            slip = Some(filename);
        } else {
            let text = field.text().await.unwrap_or_default();
            fields.insert(name, text);
        }
    }
    let Some(amount) = fields.get("paymentAmount").cloned() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": ["paymentAmount should not be empty"] })),
        );
    };
    let mut payments = state.payments.lock().expect("lock");
    let id = format!("pay-{}", payments.len() + 1);
    payments.push(json!({
        "id": id,
        "userId": format!("u-{key}"),
        "paymentAmount": amount,
        "paymentMethod": fields.get("paymentMethod"),
        "paymentReference": fields.get("paymentReference"),
        "paymentSlipUrl": slip.as_ref().map(|s| format!("https://files.example.test/{s}")),
        "paymentSlipFilename": slip,
        "status": "PENDING",
        "paymentDate": fields.get("paymentDate"),
        "paymentMonth": fields.get("paymentMonth"),
        "notes": fields.get("notes"),
    }));
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Payment submitted successfully",
            "data": { "paymentId": id, "status": "PENDING", "uploadedFile": null }
        })),
    )
}

async fn my_payments(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    let key = match authed(&state, &headers) {
        Ok(k) => k,
        Err(e) => return e,
    };
    let owner = format!("u-{key}");
    let page: usize = query.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);
    let limit: usize = query.get("limit").and_then(|v| v.parse().ok()).unwrap_or(10);
    let mine: Vec<Value> = state
        .payments
        .lock()
        .expect("lock")
        .iter()
        .filter(|p| p.get("userId").and_then(|v| v.as_str()) == Some(owner.as_str()))
        .cloned()
        .collect();
    let total = mine.len();
    let data: Vec<Value> = mine.into_iter().skip(page.saturating_sub(1) * limit).take(limit).collect();
    (
        StatusCode::OK,
        Json(json!({ "payments": data, "total": total, "page": page, "limit": limit })),
    )
}

/// In-process stand-in for the institute REST API.
pub struct FakeBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
    _rt: tokio::runtime::Runtime,
}

impl FakeBackend {
    pub fn start() -> Self {
        let state = Arc::new(BackendState::default());
        let router = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/me", get(me))
            .route("/payment", post(create_payment))
            .route("/payment/my-payments", get(my_payments))
            .with_state(state.clone());
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let listener = rt
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("backend addr");
        rt.spawn(async move {
            let _ = axum::serve(listener, router.into_make_service()).await;
        });
        Self {
            base_url: format!("http://{addr}"),
            state,
            _rt: rt,
        }
    }
}

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    next_id: usize,
}

pub fn sidecar_command(envs: &[(&str, String)]) -> Command {
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut cmd = Command::new(exe);
    for key in [
        "CAMPUSD_CONFIG",
        "CAMPUSD_API_BASE_URL",
        "CAMPUSD_HTTP_TIMEOUT_SECS",
        "CAMPUSD_PAGE_LIMIT",
        "CAMPUSD_PERMISSIONS",
        "CAMPUSD_WORKSPACE",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("CAMPUSD_HTTP_TIMEOUT_SECS", "5");
    cmd.env("RUST_LOG", "info");
    for (k, v) in envs {
        cmd.env(k, v);
    }
    cmd
}

pub fn spawn_sidecar(envs: &[(&str, String)]) -> Sidecar {
    let mut child = sidecar_command(envs)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn campusd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

pub fn spawn_against(backend: &FakeBackend) -> Sidecar {
    spawn_sidecar(&[("CAMPUSD_API_BASE_URL", backend.base_url.clone())])
}

impl Sidecar {
    pub fn send_raw(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: Value) -> Value {
        let value = self.request(method, params.clone());
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} {} failed: {}",
            method,
            params,
            value
        );
        value.get("result").cloned().unwrap_or(Value::Null)
    }

    /// Error code of a request that must fail.
    pub fn request_err(&mut self, method: &str, params: Value) -> (String, Value) {
        let value = self.request(method, params.clone());
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} {} unexpectedly succeeded: {}",
            method,
            params,
            value
        );
        let error = value.get("error").cloned().unwrap_or(Value::Null);
        let code = error
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        (code, error)
    }

    pub fn login(&mut self, who: &str) -> Value {
        self.request_ok(
            "session.login",
            json!({ "email": format!("{who}@example.test"), "password": "secret" }),
        )
    }

    pub fn nav_labels(&mut self) -> Vec<String> {
        let res = self.request_ok("nav.entries", json!({}));
        res.get("entries")
            .and_then(|v| v.as_array())
            .expect("entries")
            .iter()
            .filter_map(|e| e.get("label").and_then(|l| l.as_str()).map(str::to_string))
            .collect()
    }

    pub fn nav_keys(&mut self) -> Vec<String> {
        let res = self.request_ok("nav.entries", json!({}));
        res.get("entries")
            .and_then(|v| v.as_array())
            .expect("entries")
            .iter()
            .filter_map(|e| e.get("key").and_then(|l| l.as_str()).map(str::to_string))
            .collect()
    }

    pub fn shutdown(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}
