// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use thiserror::Error;

/// Errors surfaced by the API client.
///
/// The type is `Clone` because a single credential refresh outcome is
/// handed to every request that was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("HTTP request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (connect, DNS, body read).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded into the expected type.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 and 410 both mean the access credential has expired.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self.status(), Some(401) | Some(410))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
