use std::path::PathBuf;

use anyhow::Context;
use rusqlite::Connection;
use serde::Deserialize;

use crate::access::{AccessResolver, PermissionMatrix};
use crate::auth;
use crate::db;
use crate::error::{ApiError, NavError};
use crate::http::ApiClient;
use crate::nav::{NavigationComposer, NavigationEntry, Navigator, ENTRIES};
use crate::notices::{NoticeKind, NoticeQueue, Notifier};
use crate::payments::PaymentManager;
use crate::session::SessionStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: SessionStore,
    pub matrix: PermissionMatrix,
    pub navigator: Navigator,
    pub payments: PaymentManager,
    pub api: ApiClient,
    pub notices: NoticeQueue,
}

impl AppState {
    pub fn new(matrix: PermissionMatrix, api: ApiClient, page_limit: u32) -> Self {
        Self {
            workspace: None,
            db: None,
            session: SessionStore::new(),
            matrix,
            navigator: Navigator::default(),
            payments: PaymentManager::new(page_limit),
            api,
            notices: NoticeQueue::default(),
        }
    }

    pub fn open_workspace(&mut self, path: PathBuf) -> anyhow::Result<()> {
        let conn = db::open_db(&path)
            .with_context(|| format!("open workspace database in {}", path.display()))?;
        tracing::info!(workspace = %path.display(), "workspace opened");
        self.workspace = Some(path);
        self.db = Some(conn);
        Ok(())
    }

    pub fn composer(&self) -> NavigationComposer<'_> {
        NavigationComposer::new(AccessResolver::new(&self.session, &self.matrix), ENTRIES)
    }

    /// Keeps the current page selectable after identity or scope changed.
    pub fn reconcile_nav(&mut self) -> Option<&'static str> {
        let composer =
            NavigationComposer::new(AccessResolver::new(&self.session, &self.matrix), ENTRIES);
        self.navigator.reconcile(&composer)
    }

    pub fn navigate(&mut self, target: &str) -> Result<&'static NavigationEntry, NavError> {
        let composer =
            NavigationComposer::new(AccessResolver::new(&self.session, &self.matrix), ENTRIES);
        self.navigator.navigate(&composer, target)
    }

    /// Everything tied to the identity goes: scope, caches, draft, token.
    pub fn sign_out(&mut self) {
        auth::logout(&mut self.session, self.db.as_ref(), &mut self.api);
        self.payments.reset();
        self.reconcile_nav();
    }

    /// Authentication failures end the session wherever they surface.
    pub fn note_api_error(&mut self, e: &ApiError) {
        if matches!(e, ApiError::Auth { .. }) {
            self.sign_out();
            self.notices.notify(
                NoticeKind::Error,
                "Your session has expired. Please sign in again.".to_string(),
            );
        }
    }
}
