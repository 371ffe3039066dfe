// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Outbound HTTP with transparent credential refresh.
//!
//! Every authenticated call goes through [`ApiClient::request`]. When the
//! server answers 401 or 410 the client performs one refresh round trip
//! (`PUT /users/refresh_token`) and replays the original call once.
//! Concurrent callers that hit an expired credential at the same time all
//! wait on the same refresh instead of starting their own.

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ApiError, ApiResult};

pub const REFRESH_TOKEN_PATH: &str = "/users/refresh_token";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }

    fn is_refresh(&self) -> bool {
        self.path.contains(REFRESH_TOKEN_PATH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn is_auth_expired(&self) -> bool {
        self.status == 401 || self.status == 410
    }

    fn into_error(self) -> ApiError {
        ApiError::Http {
            status: self.status,
            body: self.body,
        }
    }
}

/// Sends a single request and returns whatever status the server gave.
///
/// Non-2xx responses are returned as `Ok`; only failures to obtain a
/// response at all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> ApiResult<ApiResponse>;
}

/// Where to send the user when the session cannot be recovered.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self);
}

/// Logs the redirect and remembers that it happened, for front ends that
/// have no page to navigate to.
#[derive(Debug, Default)]
pub struct LoginNotice {
    redirects: AtomicUsize,
}

impl LoginNotice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect_count(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }

    pub fn was_redirected(&self) -> bool {
        self.redirect_count() > 0
    }
}

impl LoginRedirect for LoginNotice {
    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        warn!("Session expired; sign in again with `moviehub login`");
    }
}

/// reqwest-backed transport rooted at the API base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Transport that attaches and stores cookies through `jar`.
    pub fn with_credentials(
        base_url: &str,
        jar: Arc<Jar>,
        timeout: Option<Duration>,
        user_agent: &str,
    ) -> ApiResult<Self> {
        let builder = Self::builder(timeout, user_agent).cookie_provider(jar);
        Self::from_builder(base_url, builder)
    }

    /// Transport that never sends credentials.
    pub fn public(base_url: &str, timeout: Option<Duration>, user_agent: &str) -> ApiResult<Self> {
        Self::from_builder(base_url, Self::builder(timeout, user_agent))
    }

    fn builder(timeout: Option<Duration>, user_agent: &str) -> reqwest::ClientBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let builder = Client::builder()
            .default_headers(headers)
            .user_agent(user_agent.to_string());

        match timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    fn from_builder(base_url: &str, builder: reqwest::ClientBuilder) -> ApiResult<Self> {
        let base_url = parse_base_url(base_url)?;
        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Validate the base URL the way it will be joined with request paths.
pub fn parse_base_url(base_url: &str) -> ApiResult<Url> {
    Url::parse(base_url)
        .map_err(|e| ApiError::Transport(format!("Invalid API base URL '{}': {}", base_url, e)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> ApiResult<ApiResponse> {
        let url = self.url_for(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("Failed to send request to {}: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("Failed to read response body: {}", e)))?;

        debug!("{} {} -> {} ({} bytes)", request.method, url, status, body.len());
        Ok(ApiResponse { status, body })
    }
}

type RefreshFuture = Shared<BoxFuture<'static, ApiResult<()>>>;

/// Client for the movie API with the refresh interceptor.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    public_transport: Arc<dyn Transport>,
    redirect: Arc<dyn LoginRedirect>,
    in_flight_refresh: Arc<Mutex<Option<RefreshFuture>>>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        public_transport: Arc<dyn Transport>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Self {
        Self {
            transport,
            public_transport,
            redirect,
            in_flight_refresh: Arc::new(Mutex::new(None)),
        }
    }

    /// Authenticated request decoded as JSON.
    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send_authenticated(method, path, body).await?;
        decode(&response)
    }

    /// Authenticated request whose body is ignored (e.g. 204 responses).
    pub async fn request_empty(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<()> {
        self.send_authenticated(method, path, body).await?;
        Ok(())
    }

    /// Request without credentials and without the refresh interceptor.
    pub async fn public_request<T>(&self, method: Method, path: &str) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let request = ApiRequest::new(method, path, None);
        let response = self.public_transport.send(&request).await?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        decode(&response)
    }

    /// True while a refresh round trip is outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight_refresh
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    async fn send_authenticated(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<ApiResponse> {
        let request = ApiRequest::new(method, path, body);
        let response = self.transport.send(&request).await?;

        if response.is_success() {
            return Ok(response);
        }

        if !response.is_auth_expired() {
            return Err(response.into_error());
        }

        if request.is_refresh() {
            self.redirect.redirect_to_login();
            return Err(response.into_error());
        }

        debug!(
            "{} {} returned {}, refreshing credentials",
            request.method, request.path, response.status
        );
        self.refresh_credentials().await?;

        let replayed = self.transport.send(&request).await?;
        if replayed.is_success() {
            return Ok(replayed);
        }

        // Already retried once; a second expiry is terminal.
        if replayed.is_auth_expired() {
            warn!(
                "{} {} still unauthorized after refresh",
                request.method, request.path
            );
            self.redirect.redirect_to_login();
        }
        Err(replayed.into_error())
    }

    /// Join the in-flight refresh or start one.
    async fn refresh_credentials(&self) -> ApiResult<()> {
        let refresh = {
            let mut slot = self
                .in_flight_refresh
                .lock()
                .map_err(|_| ApiError::Transport("Refresh state poisoned".to_string()))?;

            match slot.as_ref() {
                Some(refresh) => {
                    debug!("Waiting on in-flight credential refresh");
                    refresh.clone()
                }
                None => {
                    let refresh = run_refresh(
                        self.transport.clone(),
                        self.redirect.clone(),
                        self.in_flight_refresh.clone(),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }
}

async fn run_refresh(
    transport: Arc<dyn Transport>,
    redirect: Arc<dyn LoginRedirect>,
    slot: Arc<Mutex<Option<RefreshFuture>>>,
) -> ApiResult<()> {
    let request = ApiRequest::new(
        Method::PUT,
        REFRESH_TOKEN_PATH,
        Some(Value::Object(Default::default())),
    );

    let outcome = match transport.send(&request).await {
        Ok(response) if response.is_success() => {
            debug!("Credential refresh succeeded");
            Ok(())
        }
        Ok(response) => Err(response.into_error()),
        Err(e) => Err(e),
    };

    if let Ok(mut slot) = slot.lock() {
        *slot = None;
    }

    if let Err(e) = &outcome {
        warn!("Credential refresh failed: {}", e);
        redirect.redirect_to_login();
    }

    outcome
}

fn decode<T>(response: &ApiResponse) -> ApiResult<T>
where
    T: DeserializeOwned,
{
    if response.body.trim().is_empty() {
        return Err(ApiError::Decode("Empty response from server".to_string()));
    }

    serde_json::from_str(&response.body).map_err(|e| {
        let preview = if response.body.len() > 200 {
            format!("{}... (truncated)", truncate(&response.body, 200))
        } else {
            response.body.clone()
        };
        warn!("JSON parsing error: {} in {}", e, preview);
        ApiError::Decode(e.to_string())
    })
}

fn truncate(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
