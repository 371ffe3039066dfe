// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Signed-in identity lifecycle.
//!
//! A persisted session only keeps the UI continuous across restarts. It is
//! restored as [`SessionState::Provisional`] and only becomes
//! [`SessionState::Authenticated`] after [`SessionManager::validate`]
//! confirms it against `/users/me`.

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::MovieApi;
use crate::models::{LoginRequest, RegisterData, Role, Session, User};

pub const SESSION_FILE_NAME: &str = "moviehub_user.json";

/// Durable storage for the single serialized session entry.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>>;
    fn save(&self, session: &Session) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Keeps the session as a JSON file, the local-storage equivalent.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store under `dir` with the default file name.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(SESSION_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;

        let session: Session = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {}", self.path.display()))?;

        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create session directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string_pretty(session).with_context(|| "Failed to serialize session")?;

        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove session file: {}", self.path.display())
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entry: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            entry: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        let entry = self
            .entry
            .lock()
            .map_err(|_| anyhow::anyhow!("Session store lock poisoned"))?;
        Ok(entry.clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        let mut entry = self
            .entry
            .lock()
            .map_err(|_| anyhow::anyhow!("Session store lock poisoned"))?;
        *entry = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entry = self
            .entry
            .lock()
            .map_err(|_| anyhow::anyhow!("Session store lock poisoned"))?;
        *entry = None;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    /// Restored from storage, not yet confirmed by the server.
    Provisional(Session),
    Authenticated(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Anonymous => None,
            Self::Provisional(session) | Self::Authenticated(session) => Some(session),
        }
    }
}

pub struct SessionManager {
    api: Arc<MovieApi>,
    store: Arc<dyn SessionStore>,
    state: RwLock<SessionState>,
}

impl SessionManager {
    pub fn new(api: Arc<MovieApi>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            api,
            store,
            state: RwLock::new(SessionState::Anonymous),
        }
    }

    /// Load the persisted session as provisional state.
    ///
    /// A corrupt entry is removed and the manager stays anonymous.
    pub fn restore(&self) -> SessionState {
        match self.store.load() {
            Ok(Some(session)) => {
                debug!("Restored provisional session for {}", session.user.email);
                self.set_state(SessionState::Provisional(session));
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Discarding unreadable session: {:#}", e);
                if let Err(e) = self.store.clear() {
                    warn!("Failed to clear session store: {:#}", e);
                }
            }
        }
        self.state()
    }

    pub fn state(&self) -> SessionState {
        self.state
            .read()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    pub fn current(&self) -> Option<Session> {
        self.state().session().cloned()
    }

    /// Only a server-confirmed session counts.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state(), SessionState::Authenticated(_))
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.state(), SessionState::Authenticated(session) if session.role() == Role::Admin)
    }

    /// Sign in. Any failure is logged and reported as `false`; the prior
    /// session is left untouched in that case.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        let credentials = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = match self.api.login(&credentials).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Login failed for {}: {}", email, e);
                return false;
            }
        };

        let Some(user) = identity_from(response) else {
            warn!("Login response for {} carried no identity", email);
            return false;
        };

        let session = Session::from_user(user).with_last_login(Utc::now());
        info!("Signed in as {} ({})", session.user.email, session.role());
        self.establish(session);
        true
    }

    /// Create an account. Succeeds when the API accepts it; the caller is
    /// not signed in until the email is verified and they log in.
    pub async fn register(&self, data: &RegisterData) -> bool {
        if let Err(reason) = data.validate() {
            warn!("Registration rejected locally: {}", reason);
            return false;
        }

        let outbound = RegisterData::new(data.email.trim(), data.password.clone());
        match self.api.register(&outbound).await {
            Ok(_) => {
                info!("Registered {}; verification email pending", outbound.email);
                true
            }
            Err(e) => {
                warn!("Registration failed for {}: {}", outbound.email, e);
                false
            }
        }
    }

    /// Sign out. Local state is cleared even if the server call fails.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            warn!("Server logout failed: {}", e);
        }
        self.discard();
        info!("Signed out");
    }

    /// Confirm the session against the server and adopt its copy.
    pub async fn validate(&self) -> bool {
        match self.api.current_user().await {
            Ok(user) => {
                let last_login = self.current().and_then(|s| s.last_login);
                let mut session = Session::from_user(user);
                session.last_login = last_login;
                debug!("Session validated for {}", session.user.email);
                self.establish(session);
                true
            }
            Err(e) => {
                debug!("Session validation failed: {}", e);
                self.discard();
                false
            }
        }
    }

    fn establish(&self, session: Session) {
        if let Err(e) = self.store.save(&session) {
            warn!("Failed to persist session: {:#}", e);
        }
        self.set_state(SessionState::Authenticated(session));
    }

    fn discard(&self) {
        self.set_state(SessionState::Anonymous);
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear persisted session: {:#}", e);
        }
    }

    fn set_state(&self, next: SessionState) {
        match self.state.write() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

/// Identity fields sit at the top level of the login response.
fn identity_from(response: Value) -> Option<User> {
    let has_id = response
        .get("_id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());
    if !has_id {
        return None;
    }

    match serde_json::from_value(response) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!("Malformed identity in login response: {}", e);
            None
        }
    }
}
