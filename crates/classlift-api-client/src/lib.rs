//! Shared HTTP client for the application server.
//!
//! Provides a minimal client with bearer authentication and the upload policy
//! negotiation (`initiate-upload`) used by the upload orchestrator.

pub mod policy;

use anyhow::{Context, Result};
use classlift_core::ClientConfig;
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use policy::{classify_policy_failure, initiate_upload_path, PolicyClient};

/// Supplies the current bearer token. Session handling lives with the implementor.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Authentication strategy for the API.
#[derive(Clone)]
pub enum Auth {
    /// Fixed `Authorization: Bearer {token}`
    Bearer(String),
    /// Token looked up on every request
    Provider(Arc<dyn TokenProvider>),
    /// No Authorization header
    Anonymous,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Bearer(_) => write!(f, "Auth::Bearer(***)"),
            Auth::Provider(_) => write!(f, "Auth::Provider"),
            Auth::Anonymous => write!(f, "Auth::Anonymous"),
        }
    }
}

/// HTTP client for the application server.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Result<Self> {
        Self::with_timeout(base_url, auth, Duration::from_secs(60))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        auth: Auth,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::with_timeout(
            config.api_url.clone(),
            Auth::Bearer(config.api_token.clone()),
            config.policy_timeout(),
        )
    }

    /// Create client from environment, see [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env()?;
        Self::from_config(&config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Provider(provider) => match provider.bearer_token() {
                Some(token) => request.bearer_auth(token),
                None => {
                    tracing::debug!("Token provider returned no token, sending unauthenticated");
                    request
                }
            },
            Auth::Anonymous => request,
        }
    }

    /// Raw client for custom requests.
    pub fn client(&self) -> &Client {
        &self.client
    }
}
