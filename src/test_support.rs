// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! In-process transport for unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::MovieApi;
use crate::error::{ApiError, ApiResult};
use crate::http::{ApiClient, ApiRequest, ApiResponse, LoginNotice, REFRESH_TOKEN_PATH, Transport};

#[derive(Debug, Clone)]
enum Route {
    Fixed(ApiResponse),
    ExpireUntilRefreshed { status: u16, body: String },
    Unreachable,
}

#[derive(Debug, Default)]
struct State {
    routes: HashMap<String, Route>,
    calls: HashMap<String, usize>,
    bodies: HashMap<String, Value>,
    refresh_calls: usize,
    refreshed: bool,
    refresh_failure: Option<u16>,
    refresh_delay: Option<Duration>,
}

/// Answers requests from a script and counts every call.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(method: &str, path: &str) -> String {
        format!("{} {}", method, path)
    }

    pub fn respond(&self, method: &str, path: &str, status: u16, body: Value) {
        self.respond_raw(method, path, status, &body.to_string());
    }

    pub fn respond_raw(&self, method: &str, path: &str, status: u16, body: &str) {
        self.state.lock().unwrap().routes.insert(
            Self::key(method, path),
            Route::Fixed(ApiResponse::new(status, body)),
        );
    }

    /// Any method on `path` answers 401 until a refresh succeeds.
    pub fn expire_until_refreshed(&self, path: &str, body: Value) {
        self.expire_until_refreshed_with(path, 401, body);
    }

    pub fn expire_until_refreshed_with(&self, path: &str, status: u16, body: Value) {
        self.state.lock().unwrap().routes.insert(
            Self::key("*", path),
            Route::ExpireUntilRefreshed {
                status,
                body: body.to_string(),
            },
        );
    }

    /// Requests to `path` fail before a response is produced.
    pub fn unreachable(&self, method: &str, path: &str) {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert(Self::key(method, path), Route::Unreachable);
    }

    pub fn fail_refresh(&self, status: u16) {
        self.state.lock().unwrap().refresh_failure = Some(status);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.lock().unwrap().refresh_delay = Some(delay);
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.lock().unwrap().refresh_calls
    }

    /// Calls to `path` with any method.
    pub fn calls_to(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.values().sum::<usize>() + state.refresh_calls
    }

    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.state.lock().unwrap().bodies.get(path).cloned()
    }

    async fn refresh(&self) -> ApiResult<ApiResponse> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.refresh_calls += 1;
            state.refresh_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        match state.refresh_failure {
            Some(status) => Ok(ApiResponse::new(status, r#"{"message":"refresh rejected"}"#)),
            None => {
                state.refreshed = true;
                Ok(ApiResponse::new(200, "{}"))
            }
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> ApiResult<ApiResponse> {
        if request.path == REFRESH_TOKEN_PATH {
            return self.refresh().await;
        }

        let mut state = self.state.lock().unwrap();
        *state.calls.entry(request.path.clone()).or_insert(0) += 1;
        if let Some(body) = &request.body {
            state.bodies.insert(request.path.clone(), body.clone());
        }

        let route = state
            .routes
            .get(&Self::key(request.method.as_str(), &request.path))
            .or_else(|| state.routes.get(&Self::key("*", &request.path)))
            .cloned();

        match route {
            Some(Route::Fixed(response)) => Ok(response),
            Some(Route::ExpireUntilRefreshed { status, body }) => {
                if state.refreshed {
                    Ok(ApiResponse::new(200, body))
                } else {
                    Ok(ApiResponse::new(status, r#"{"message":"token expired"}"#))
                }
            }
            Some(Route::Unreachable) => Err(ApiError::Transport(format!(
                "connection refused: {}",
                request.path
            ))),
            None => Ok(ApiResponse::new(404, r#"{"message":"no route"}"#)),
        }
    }
}

/// Client whose authenticated and public transports are both `transport`.
pub fn client_with(transport: &ScriptedTransport) -> (ApiClient, Arc<LoginNotice>) {
    let notice = Arc::new(LoginNotice::new());
    let shared: Arc<dyn Transport> = Arc::new(transport.clone());
    let client = ApiClient::new(shared.clone(), shared, notice.clone());
    (client, notice)
}

pub fn api_with(transport: &ScriptedTransport) -> (Arc<MovieApi>, Arc<LoginNotice>) {
    let (client, notice) = client_with(transport);
    (Arc::new(MovieApi::new(client)), notice)
}
