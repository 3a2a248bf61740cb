//! Client configuration.
//!
//! # Design
//! `ClientConfig` is an immutable value built once and shared by the
//! executor. It can be assembled in code or read from the environment, the
//! same way the mock server picks its port from `PORT`.

use std::env;

/// Environment variable holding the service root URL.
pub const ENV_BASE_URL: &str = "ORC_BASE_URL";
/// Environment variable overriding the product name used in the user agent.
pub const ENV_PRODUCT_NAME: &str = "ORC_PRODUCT_NAME";
/// Environment variable replacing the generated user agent entirely.
pub const ENV_USER_AGENT: &str = "ORC_USER_AGENT";

pub const DEFAULT_PRODUCT_NAME: &str = "orc-core";
pub const DEFAULT_ODATA_VERSION: &str = "4.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    product_name: String,
    user_agent: Option<String>,
    odata_version: String,
    odata_max_version: String,
}

/// `from_env` failed because a required variable is missing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing environment variable {0}")]
pub struct MissingEnv(pub &'static str);

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
            user_agent: None,
            odata_version: DEFAULT_ODATA_VERSION.to_string(),
            odata_max_version: DEFAULT_ODATA_VERSION.to_string(),
        }
    }

    /// Build from `ORC_BASE_URL`, `ORC_PRODUCT_NAME` and `ORC_USER_AGENT`.
    pub fn from_env() -> Result<Self, MissingEnv> {
        let base_url = env::var(ENV_BASE_URL).map_err(|_| MissingEnv(ENV_BASE_URL))?;
        let mut config = Self::new(&base_url);
        if let Ok(product) = env::var(ENV_PRODUCT_NAME) {
            config.product_name = product;
        }
        config.user_agent = env::var(ENV_USER_AGENT).ok();
        Ok(config)
    }

    pub fn with_product_name(mut self, product_name: impl Into<String>) -> Self {
        self.product_name = product_name.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_odata_versions(mut self, version: impl Into<String>, max_version: impl Into<String>) -> Self {
        self.odata_version = version.into();
        self.odata_max_version = max_version.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn odata_version(&self) -> &str {
        &self.odata_version
    }

    pub fn odata_max_version(&self) -> &str {
        &self.odata_max_version
    }

    /// Agent string sent in `User-Agent` and the telemetry header.
    pub fn platform_user_agent(&self) -> String {
        match &self.user_agent {
            Some(agent) => agent.clone(),
            None => format!(
                "{}/{} (rust; {})",
                self.product_name,
                env!("CARGO_PKG_VERSION"),
                env::consts::OS
            ),
        }
    }
}
