// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Cookie persistence between runs.
//!
//! The API keeps its credentials in cookies. A browser stores those
//! itself; a command-line process has to carry them across invocations.
//! Only the cookie header pairs are kept, never decoded token values.

use anyhow::{Context, Result};
use reqwest::cookie::{CookieStore, Jar};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use crate::http::REFRESH_TOKEN_PATH;

pub const COOKIE_FILE_NAME: &str = "cookies.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SavedCookie {
    pair: String,
    /// Path the cookie was scoped to, when narrower than the API root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CookieData {
    cookies: Vec<SavedCookie>,
}

#[derive(Debug, Clone)]
pub struct CookieFile {
    path: PathBuf,
    url: Url,
    /// Endpoints that may receive cookies the API root does not.
    scoped: Vec<Url>,
}

impl CookieFile {
    pub fn new<P: AsRef<Path>>(path: P, url: Url) -> Self {
        let scoped = endpoint_url(&url, REFRESH_TOKEN_PATH).into_iter().collect();
        Self {
            path: path.as_ref().to_path_buf(),
            url,
            scoped,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seed `jar` with the saved cookies; returns how many were loaded.
    pub fn load_into(&self, jar: &Jar) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read cookie file: {}", self.path.display()))?;
        let data: CookieData =
            serde_json::from_str(&content).with_context(|| "Failed to parse cookie file JSON")?;

        for cookie in &data.cookies {
            match &cookie.path {
                Some(path) => {
                    let mut url = self.url.clone();
                    url.set_path(path);
                    jar.add_cookie_str(&format!("{}; Path={}", cookie.pair, path), &url);
                }
                None => jar.add_cookie_str(&cookie.pair, &self.url),
            }
        }
        debug!("Loaded {} cookie(s) for {}", data.cookies.len(), self.url);
        Ok(data.cookies.len())
    }

    /// Write whatever the jar currently sends to the API, including cookies
    /// only sent to narrower endpoints such as the refresh route.
    pub fn save_from(&self, jar: &Jar) -> Result<()> {
        let mut seen = HashSet::new();
        let mut cookies = Vec::new();

        for pair in cookie_pairs(jar, &self.url) {
            if seen.insert(pair.clone()) {
                cookies.push(SavedCookie { pair, path: None });
            }
        }
        for url in &self.scoped {
            for pair in cookie_pairs(jar, url) {
                if seen.insert(pair.clone()) {
                    cookies.push(SavedCookie {
                        pair,
                        path: Some(url.path().to_string()),
                    });
                }
            }
        }

        if cookies.is_empty() {
            return self.clear();
        }

        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create credentials directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(&CookieData { cookies })
            .with_context(|| "Failed to serialize cookies")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write cookie file: {}", self.path.display()))?;
        Ok(())
    }

    /// Save the jar after a command, whether or not the command succeeded.
    ///
    /// A failed command may still have rotated credentials on the way. The
    /// command's own error wins over a failure to save.
    pub fn save_after<T>(&self, jar: &Jar, outcome: Result<T>) -> Result<T> {
        match (outcome, self.save_from(jar)) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), saved) => {
                if let Err(save_error) = saved {
                    tracing::warn!("Failed to save cookies: {:#}", save_error);
                }
                Err(e)
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove cookie file: {}", self.path.display()))?;
        }
        Ok(())
    }
}

fn endpoint_url(base: &Url, path: &str) -> Option<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).ok()
}

fn cookie_pairs(jar: &Jar, url: &Url) -> Vec<String> {
    jar.cookies(url)
        .and_then(|header| header.to_str().ok().map(split_cookie_header))
        .unwrap_or_default()
}

fn split_cookie_header(header: &str) -> Vec<String> {
    header
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(str::to_string)
        .collect()
}
