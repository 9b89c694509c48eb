use std::time::Duration;

use crate::badge::{code::CodeService, export::DEFAULT_TIMEOUT_MS, photo::PhotoStore};

/// Shared handles for the HTTP layer. Everything is env-configured with code
/// defaults; a missing variable never prevents startup.
#[derive(Clone)]
pub struct AppState {
    pub http: reqwest::Client,
    pub store: PhotoStore,
    pub code: CodeService,
    pub render_timeout: Duration,
}

impl AppState {
    pub fn load() -> Self {
        let render_timeout = std::env::var("RENDER_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Self {
            http: reqwest::Client::new(),
            store: PhotoStore::from_env(),
            code: CodeService::from_env(),
            render_timeout: Duration::from_millis(render_timeout),
        }
    }
}
