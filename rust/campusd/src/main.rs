mod access;
mod auth;
mod config;
mod db;
mod error;
mod http;
mod ipc;
mod nav;
mod notices;
mod observability;
mod payments;
mod session;

use anyhow::Context;
use std::io::{self, BufRead, Write};

use access::PermissionMatrix;
use config::CampusConfig;

fn load_matrix(config: &CampusConfig) -> anyhow::Result<PermissionMatrix> {
    let matrix = match &config.permissions_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read permission matrix {}", path.display()))?;
            PermissionMatrix::from_toml_str(&raw)
                .with_context(|| format!("load permission matrix {}", path.display()))?
        }
        None => PermissionMatrix::builtin(),
    };
    // A navigation entry pointing at a capability with no row is a broken
    // deployment, not something to discover at click time.
    matrix
        .ensure_covers(nav::capability_references(nav::ENTRIES))
        .context("permission matrix does not cover the navigation table")?;
    Ok(matrix)
}

fn startup() -> anyhow::Result<ipc::AppState> {
    let config = CampusConfig::from_env_or_toml().context("load configuration")?;
    let matrix = load_matrix(&config)?;
    let api = http::ApiClient::new(&config)?;
    tracing::info!(
        api = %config.api_base_url,
        matrix_version = matrix.version(),
        "campusd starting"
    );
    let mut state = ipc::AppState::new(matrix, api, config.page_limit);
    if let Some(path) = config.workspace.clone() {
        state.open_workspace(path)?;
    }
    Ok(state)
}

fn main() {
    observability::init_observability();

    let mut state = match startup() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("startup failed: {e:#}");
            std::process::exit(2);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
