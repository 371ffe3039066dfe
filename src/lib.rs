// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod models;
pub mod session;

#[cfg(test)]
mod test_support;

pub use api::MovieApi;
pub use app::MovieHub;
pub use cache::Catalog;
pub use config::Config;
pub use error::ApiError;
pub use http::ApiClient;
pub use session::SessionManager;
