//! Configuration Builder
//!
//! Fluent builder for Bullhorn configuration.

use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BullhornError, ConfigurationError};
use crate::resilience::RetryPolicy;
use crate::types::{BullhornConfig, Endpoints, Region};

/// Bullhorn configuration builder.
#[derive(Default)]
pub struct BullhornConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    username: Option<String>,
    password: Option<SecretString>,
    region: Region,
    authorize_url: Option<String>,
    token_url: Option<String>,
    login_url: Option<String>,
    rest_host: Option<String>,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    env_file: Option<PathBuf>,
}

impl BullhornConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set API username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set API password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::new(password.into()));
        self
    }

    /// Set region. Endpoints not set explicitly follow the region.
    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Override authorization endpoint.
    pub fn authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = Some(url.into());
        self
    }

    /// Override token endpoint.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Override REST login endpoint.
    pub fn login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = Some(url.into());
        self
    }

    /// Override the host used to build REST URLs from a corp token.
    pub fn rest_host(mut self, host: impl Into<String>) -> Self {
        self.rest_host = Some(host.into());
        self
    }

    /// Point every auth endpoint at one base URL.
    pub fn base_url(self, base: impl Into<String>) -> Self {
        let base = base.into();
        let base = base.trim_end_matches('/');
        self.authorize_url(format!("{}/oauth/authorize", base))
            .token_url(format!("{}/oauth/token", base))
            .login_url(format!("{}/rest-services/login", base))
            .rest_host(base.to_string())
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Set env file for credential write-back.
    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<BullhornConfig, BullhornError> {
        let client_id = required("CLIENT_ID", self.client_id)?;
        let client_secret = required("CLIENT_SECRET", self.client_secret)?;
        let username = required("BH_USERNAME", self.username)?;
        let password = required("BH_PASSWORD", self.password)?;

        let defaults = Endpoints::for_region(self.region);
        let endpoints = Endpoints {
            authorize_url: self.authorize_url.unwrap_or(defaults.authorize_url),
            token_url: self.token_url.unwrap_or(defaults.token_url),
            login_url: self.login_url.unwrap_or(defaults.login_url),
            rest_host: self.rest_host.unwrap_or(defaults.rest_host),
        };

        for url in [
            &endpoints.authorize_url,
            &endpoints.token_url,
            &endpoints.login_url,
            &endpoints.rest_host,
        ] {
            url::Url::parse(url).map_err(|_| {
                BullhornError::Configuration(ConfigurationError::InvalidEndpoint {
                    url: url.clone(),
                })
            })?;
        }

        Ok(BullhornConfig {
            client_id,
            client_secret,
            username,
            password,
            region: self.region,
            endpoints,
            timeout: self.timeout.unwrap_or(Duration::from_secs(30)),
            retry: self.retry.unwrap_or_default(),
            env_file: self.env_file,
        })
    }
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, BullhornError> {
    value.ok_or_else(|| {
        BullhornError::Configuration(ConfigurationError::MissingField {
            field: field.to_string(),
        })
    })
}

/// Create a configuration builder.
pub fn bullhorn_config() -> BullhornConfigBuilder {
    BullhornConfigBuilder::new()
}
