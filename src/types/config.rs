//! Configuration Types
//!
//! Client configuration and endpoint selection.

use secrecy::SecretString;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{BullhornError, ConfigurationError};
use crate::resilience::RetryPolicy;

/// Data-center region of the tenant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Region {
    #[default]
    Emea,
    Us,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emea => "EMEA",
            Self::Us => "US",
        }
    }

    /// OAuth host for the region.
    pub fn auth_host(&self) -> &'static str {
        match self {
            Self::Emea => "https://auth-emea.bullhornstaffing.com",
            Self::Us => "https://auth.bullhornstaffing.com",
        }
    }

    /// REST login host for the region.
    pub fn login_host(&self) -> &'static str {
        match self {
            Self::Emea => "https://rest-emea.bullhornstaffing.com",
            Self::Us => "https://rest.bullhornstaffing.com",
        }
    }
}

impl FromStr for Region {
    type Err = BullhornError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EMEA" => Ok(Self::Emea),
            "US" => Ok(Self::Us),
            other => Err(BullhornError::Configuration(
                ConfigurationError::InvalidValue {
                    field: "BH_REGION".to_string(),
                    message: format!("expected EMEA or US, got '{}'", other),
                },
            )),
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host that serves tenant REST traffic when only a corp token is known.
pub const DEFAULT_REST_HOST: &str = "https://rest21.bullhornstaffing.com";

/// Endpoint URLs used by the auth flows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    /// `GET` with username/password, answers with a redirect carrying `code`.
    pub authorize_url: String,
    /// OAuth2 token endpoint for refresh and code grants.
    pub token_url: String,
    /// REST session login.
    pub login_url: String,
    /// Base host used to derive the REST URL from a corp token.
    pub rest_host: String,
}

impl Endpoints {
    pub fn for_region(region: Region) -> Self {
        let auth = region.auth_host();
        Self {
            authorize_url: format!("{}/oauth/authorize", auth),
            token_url: format!("{}/oauth/token", auth),
            login_url: format!("{}/rest-services/login", region.login_host()),
            rest_host: DEFAULT_REST_HOST.to_string(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::for_region(Region::default())
    }
}

/// Bullhorn client configuration.
#[derive(Clone)]
pub struct BullhornConfig {
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: SecretString,
    /// API user for the authorization-code fallback.
    pub username: String,
    /// API user password.
    pub password: SecretString,
    /// Tenant region.
    pub region: Region,
    /// Endpoint URLs.
    pub endpoints: Endpoints,
    /// HTTP timeout.
    pub timeout: Duration,
    /// Retry policy for REST calls.
    pub retry: RetryPolicy,
    /// Env file that renewed credentials are written back to.
    pub env_file: Option<PathBuf>,
}

impl std::fmt::Debug for BullhornConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BullhornConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("region", &self.region)
            .field("endpoints", &self.endpoints)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("env_file", &self.env_file)
            .finish()
    }
}
