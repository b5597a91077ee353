use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

// Sidecar configuration sourced from environment variables, then an optional
// TOML file named by CAMPUSD_CONFIG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampusConfig {
    pub api_base_url: String,
    pub http_timeout: Duration,
    pub page_limit: u32,
    pub permissions_path: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CampusConfigOverride {
    api_base_url: Option<String>,
    http_timeout_secs: Option<u64>,
    page_limit: Option<u32>,
    permissions: Option<PathBuf>,
    workspace: Option<PathBuf>,
}

impl CampusConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url =
            var("CAMPUSD_API_BASE_URL").unwrap_or_else(|| "http://localhost:3000".to_string());
        let timeout_secs: u64 = match var("CAMPUSD_HTTP_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| "parse CAMPUSD_HTTP_TIMEOUT_SECS")?,
            None => 30,
        };
        let page_limit: u32 = match var("CAMPUSD_PAGE_LIMIT") {
            Some(v) => v.trim().parse().with_context(|| "parse CAMPUSD_PAGE_LIMIT")?,
            None => 50,
        };
        let config = Self {
            api_base_url,
            http_timeout: Duration::from_secs(timeout_secs),
            page_limit,
            permissions_path: var("CAMPUSD_PERMISSIONS")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            workspace: var("CAMPUSD_WORKSPACE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        };
        config.checked()
    }

    pub fn from_env_or_toml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("CAMPUSD_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read CAMPUSD_CONFIG: {path}"))?;
            config = config.apply_toml(&contents)?;
        }
        Ok(config)
    }

    pub fn apply_toml(mut self, contents: &str) -> Result<Self> {
        let override_cfg: CampusConfigOverride =
            toml::from_str(contents).with_context(|| "parse campusd config toml")?;
        if let Some(value) = override_cfg.api_base_url {
            self.api_base_url = value;
        }
        if let Some(value) = override_cfg.http_timeout_secs {
            self.http_timeout = Duration::from_secs(value);
        }
        if let Some(value) = override_cfg.page_limit {
            self.page_limit = value;
        }
        if let Some(value) = override_cfg.permissions {
            self.permissions_path = Some(value);
        }
        if let Some(value) = override_cfg.workspace {
            self.workspace = Some(value);
        }
        self.checked()
    }

    fn checked(mut self) -> Result<Self> {
        if self.page_limit == 0 {
            anyhow::bail!("page limit must be at least 1");
        }
        if self.http_timeout.is_zero() {
            anyhow::bail!("http timeout must be at least 1 second");
        }
        let trimmed = self.api_base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            anyhow::bail!("api base url must start with http:// or https://: {trimmed}");
        }
        self.api_base_url = trimmed.to_string();
        Ok(self)
    }
}
