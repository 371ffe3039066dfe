// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::api::MovieApi;
use crate::cache::Catalog;
use crate::config::Config;
use crate::credentials::{COOKIE_FILE_NAME, CookieFile};
use crate::http::{ApiClient, HttpTransport, LoginNotice, Transport, parse_base_url};
use crate::session::{FileSessionStore, SessionManager};

/// Everything a front end needs, built once per process and shared by
/// reference.
pub struct MovieHub {
    pub config: Config,
    pub api: Arc<MovieApi>,
    pub sessions: SessionManager,
    pub catalog: Catalog,
    pub login_notice: Arc<LoginNotice>,
    jar: Arc<Jar>,
    cookie_file: CookieFile,
    forgotten: AtomicBool,
}

impl MovieHub {
    pub fn from_config(config: Config) -> Result<Self> {
        let base_url = parse_base_url(&config.api.base_url)?;
        let data_dir = config.data_dir()?;

        let jar = Arc::new(Jar::default());
        let cookie_file = CookieFile::new(data_dir.join(COOKIE_FILE_NAME), base_url);
        if let Err(e) = cookie_file.load_into(&jar) {
            warn!("Ignoring saved cookies: {:#}", e);
        }

        let timeout = config.api.timeout();
        let transport: Arc<dyn Transport> = Arc::new(
            HttpTransport::with_credentials(
                &config.api.base_url,
                jar.clone(),
                timeout,
                &config.api.user_agent,
            )
            .with_context(|| "Failed to build HTTP client")?,
        );
        let public_transport: Arc<dyn Transport> = Arc::new(
            HttpTransport::public(&config.api.base_url, timeout, &config.api.user_agent)
                .with_context(|| "Failed to build public HTTP client")?,
        );

        let login_notice = Arc::new(LoginNotice::new());
        let client = ApiClient::new(transport, public_transport, login_notice.clone());
        let api = Arc::new(MovieApi::new(client));

        let store = Arc::new(FileSessionStore::new(config.session_file()?));
        let sessions = SessionManager::new(api.clone(), store);
        sessions.restore();

        let catalog = Catalog::new(api.clone(), &config.cache);

        Ok(Self {
            config,
            api,
            sessions,
            catalog,
            login_notice,
            jar,
            cookie_file,
            forgotten: AtomicBool::new(false),
        })
    }

    /// Save the cookie jar once a command has finished, successful or not,
    /// so the next run sends the same credentials.
    pub fn persist_after<T>(&self, outcome: Result<T>) -> Result<T> {
        if self.forgotten.load(Ordering::SeqCst) {
            return outcome;
        }
        self.cookie_file.save_after(&self.jar, outcome)
    }

    /// Remove saved credentials; nothing is persisted for the rest of the run.
    pub fn forget_credentials(&self) -> Result<()> {
        self.forgotten.store(true, Ordering::SeqCst);
        self.cookie_file.clear()
    }
}
