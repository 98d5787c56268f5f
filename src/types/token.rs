//! Token Types
//!
//! Wire types for the OAuth2 grants and the REST session login, and the
//! credential set they combine into.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{BullhornError, BullhornResult, ProtocolError};

/// Token response from the OAuth2 token endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,
    /// Expires in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Response from the REST session login.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionLogin {
    /// Session token required by every REST call.
    #[serde(rename = "BhRestToken")]
    pub bh_rest_token: String,
    /// Tenant-specific REST base URL.
    #[serde(rename = "restUrl")]
    pub rest_url: String,
}

impl SessionLogin {
    /// Corp identifier embedded in `restUrl`.
    pub fn corp_token(&self) -> BullhornResult<String> {
        corp_token_from_rest_url(&self.rest_url)
    }
}

/// Extract the corp token from a REST base URL such as
/// `https://rest21.bullhornstaffing.com/rest-services/abc123/`.
pub fn corp_token_from_rest_url(rest_url: &str) -> BullhornResult<String> {
    let invalid = || {
        BullhornError::Protocol(ProtocolError::InvalidRestUrl {
            rest_url: rest_url.to_string(),
        })
    };

    let (_, tail) = rest_url.split_once("/rest-services/").ok_or_else(invalid)?;
    let corp = tail.trim_end_matches('/');
    if corp.is_empty() || corp.contains('/') {
        return Err(invalid());
    }
    Ok(corp.to_string())
}

/// Build the REST base URL for a corp token on the given host.
pub fn rest_url_for_corp(rest_host: &str, corp_token: &str) -> String {
    format!(
        "{}/rest-services/{}/",
        rest_host.trim_end_matches('/'),
        corp_token
    )
}

/// The complete set of credentials needed to call the REST API.
///
/// Replaced wholesale on every renewal; never partially updated.
#[derive(Clone)]
pub struct CredentialSet {
    access_token: SecretString,
    refresh_token: SecretString,
    session_token: SecretString,
    rest_url: String,
}

impl CredentialSet {
    /// Create a credential set. `rest_url` is normalized to end in `/`.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        session_token: impl Into<String>,
        rest_url: impl Into<String>,
    ) -> Self {
        let mut rest_url = rest_url.into();
        if !rest_url.ends_with('/') {
            rest_url.push('/');
        }
        Self {
            access_token: SecretString::new(access_token.into()),
            refresh_token: SecretString::new(refresh_token.into()),
            session_token: SecretString::new(session_token.into()),
            rest_url,
        }
    }

    /// Combine a token grant with the session login that followed it.
    ///
    /// A grant without a refresh token keeps `previous_refresh`.
    pub fn from_grant(
        tokens: &TokenResponse,
        login: &SessionLogin,
        previous_refresh: Option<&str>,
    ) -> BullhornResult<Self> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .or(previous_refresh)
            .ok_or_else(|| {
                BullhornError::Protocol(ProtocolError::MissingField {
                    field: "refresh_token".to_string(),
                })
            })?;

        Ok(Self::new(
            tokens.access_token.clone(),
            refresh_token,
            login.bh_rest_token.clone(),
            login.rest_url.clone(),
        ))
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn refresh_token(&self) -> &str {
        self.refresh_token.expose_secret()
    }

    /// Session token (`BhRestToken`).
    pub fn session_token(&self) -> &str {
        self.session_token.expose_secret()
    }

    /// REST base URL, always ending in `/`.
    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    /// Corp identifier parsed from the REST base URL.
    pub fn corp_token(&self) -> BullhornResult<String> {
        corp_token_from_rest_url(&self.rest_url)
    }
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("rest_url", &self.rest_url)
            .finish()
    }
}
