use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use moviehub::MovieHub;
use moviehub::models::Session;

pub mod auth;
pub mod bookmarks;
pub mod catalog;

pub use auth::AuthCommand;
pub use bookmarks::BookmarksCommand;
pub use catalog::CatalogCommand;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!("Invalid format: {}. Use 'text' or 'json'", s),
        }
    }
}

/// Shared state for one command invocation.
pub struct CommandContext {
    pub hub: Arc<MovieHub>,
    pub format: OutputFormat,
}

impl CommandContext {
    pub fn new(hub: Arc<MovieHub>, format: OutputFormat) -> Self {
        Self { hub, format }
    }

    /// Confirm the session with the server before acting on it.
    pub async fn require_session(&self) -> Result<Session> {
        if !self.hub.sessions.validate().await {
            anyhow::bail!("Not signed in. Run 'moviehub login' first.");
        }
        self.hub
            .sessions
            .current()
            .ok_or_else(|| anyhow::anyhow!("Session disappeared during validation"))
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Note on stderr when a catalog read fell back to cached or empty data.
    pub fn warn_degraded(&self, what: &str, degraded: bool) {
        if degraded {
            eprintln!(
                "Warning: could not reach the server; {} may be out of date",
                what
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_parses_case_insensitively() {
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert!(OutputFormat::from_str("m3u").is_err());
    }
}
