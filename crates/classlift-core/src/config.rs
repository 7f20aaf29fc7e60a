//! Configuration module
//!
//! Client-side settings for reaching the application server and object storage,
//! loaded from the environment (and a `.env` file when present).

use std::env;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8060/api";
const POLICY_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Application server base URL, including any API prefix (e.g. `https://host/api`).
    pub api_url: String,
    /// Bearer token sent with initiate-upload requests.
    pub api_token: String,
    pub policy_timeout_secs: u64,
    /// Transfers run without a timeout unless one is configured.
    pub transfer_timeout_secs: Option<u64>,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_token: api_token.into(),
            policy_timeout_secs: POLICY_TIMEOUT_SECS,
            transfer_timeout_secs: None,
        }
    }

    /// Load from CLASSLIFT_API_URL (or API_URL), CLASSLIFT_API_TOKEN (or JWT_TOKEN),
    /// CLASSLIFT_POLICY_TIMEOUT_SECS and CLASSLIFT_TRANSFER_TIMEOUT_SECS.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let api_url = env::var("CLASSLIFT_API_URL")
            .or_else(|_| env::var("API_URL"))
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let api_token = env::var("CLASSLIFT_API_TOKEN")
            .or_else(|_| env::var("JWT_TOKEN"))
            .map_err(|_| {
                anyhow::anyhow!("Missing API token. Set CLASSLIFT_API_TOKEN or JWT_TOKEN")
            })?;

        let policy_timeout_secs = match env::var("CLASSLIFT_POLICY_TIMEOUT_SECS") {
            Ok(value) => value.parse().map_err(|_| {
                anyhow::anyhow!("CLASSLIFT_POLICY_TIMEOUT_SECS must be a valid number")
            })?,
            Err(_) => POLICY_TIMEOUT_SECS,
        };

        let transfer_timeout_secs = match env::var("CLASSLIFT_TRANSFER_TIMEOUT_SECS") {
            Ok(value) if !value.trim().is_empty() => Some(value.parse().map_err(|_| {
                anyhow::anyhow!("CLASSLIFT_TRANSFER_TIMEOUT_SECS must be a valid number")
            })?),
            _ => None,
        };

        let config = Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
            policy_timeout_secs,
            transfer_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.api_token.trim().is_empty() {
            return Err(anyhow::anyhow!("API token must not be empty"));
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "API URL must start with http:// or https://, got {}",
                self.api_url
            ));
        }

        if self.policy_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Policy timeout must be greater than zero"));
        }

        Ok(())
    }

    pub fn policy_timeout(&self) -> Duration {
        Duration::from_secs(self.policy_timeout_secs)
    }

    pub fn transfer_timeout(&self) -> Option<Duration> {
        self.transfer_timeout_secs.map(Duration::from_secs)
    }
}
