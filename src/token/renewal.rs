//! Token Renewal
//!
//! The individual auth exchanges: refresh grant, REST session login,
//! authorization code via stored username/password, and code exchange.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use url::Url;

use crate::core::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{
    AuthenticationError, BullhornError, BullhornResult, ConfigurationError, RenewalStage,
};
use crate::types::{BullhornConfig, CredentialSet, SessionLogin, TokenResponse};

/// Renewal interface.
#[async_trait]
pub trait TokenRenewer: Send + Sync {
    /// Refresh grant followed by session login.
    async fn refresh(&self, current: &CredentialSet) -> BullhornResult<CredentialSet>;

    /// Authorization code from stored credentials, code exchange, then
    /// session login.
    async fn reauthenticate(&self) -> BullhornResult<CredentialSet>;
}

/// Renewer talking to the Bullhorn auth and login endpoints.
pub struct BullhornTokenRenewer {
    config: BullhornConfig,
    transport: Arc<dyn HttpTransport>,
}

impl BullhornTokenRenewer {
    pub fn new(config: BullhornConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> BullhornResult<TokenResponse> {
        let request = HttpRequest::post_form(
            &self.config.endpoints.token_url,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret().as_str()),
            ],
        )?;

        let response = self.send(request).await?;
        let tokens: TokenResponse = response.json()?;
        tracing::info!("Access token renewed");
        Ok(tokens)
    }

    /// Exchange an access token for a session token and REST URL.
    pub async fn session_login(&self, access_token: &str) -> BullhornResult<SessionLogin> {
        let url = with_query(
            &self.config.endpoints.login_url,
            &[("version", "2.0"), ("access_token", access_token)],
        )?;

        let response = self.send(HttpRequest::get(url)).await?;
        let login: SessionLogin = response.json()?;
        tracing::info!(rest_url = %login.rest_url, "BhRestToken retrieved");
        Ok(login)
    }

    /// Obtain an authorization code with the stored username and password.
    ///
    /// The endpoint answers with a redirect whose `Location` carries `code`.
    pub async fn authorization_code(&self) -> BullhornResult<String> {
        let url = with_query(
            &self.config.endpoints.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.expose_secret().as_str()),
                ("action", "Login"),
            ],
        )?;

        let response = self.transport.send(HttpRequest::get(url.clone())).await?;
        if !response.is_redirect() {
            if !response.is_success() {
                return Err(response.error());
            }
            return Err(AuthenticationError::MissingAuthorizationCode { location: None }.into());
        }

        let location = response.header("location").map(str::to_string);
        let code = location
            .as_deref()
            .and_then(|loc| code_from_location(&url, loc));

        match code {
            Some(code) => {
                tracing::info!("Authorization code obtained");
                Ok(code)
            }
            None => Err(AuthenticationError::MissingAuthorizationCode { location }.into()),
        }
    }

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str) -> BullhornResult<TokenResponse> {
        let request = HttpRequest::post_form(
            &self.config.endpoints.token_url,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret().as_str()),
            ],
        )?;

        let response = self.send(request).await?;
        let tokens: TokenResponse = response.json()?;
        tracing::info!("Tokens obtained from authorization code");
        Ok(tokens)
    }

    async fn send(&self, request: HttpRequest) -> BullhornResult<HttpResponse> {
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(response.error());
        }
        Ok(response)
    }
}

#[async_trait]
impl TokenRenewer for BullhornTokenRenewer {
    async fn refresh(&self, current: &CredentialSet) -> BullhornResult<CredentialSet> {
        let tokens = self
            .refresh_access_token(current.refresh_token())
            .await
            .map_err(at(RenewalStage::Refresh))?;
        let login = self
            .session_login(&tokens.access_token)
            .await
            .map_err(at(RenewalStage::SessionLogin))?;

        CredentialSet::from_grant(&tokens, &login, Some(current.refresh_token()))
            .map_err(at(RenewalStage::Refresh))
    }

    async fn reauthenticate(&self) -> BullhornResult<CredentialSet> {
        let code = self
            .authorization_code()
            .await
            .map_err(at(RenewalStage::AuthorizationCode))?;
        let tokens = self
            .exchange_code(&code)
            .await
            .map_err(at(RenewalStage::CodeExchange))?;
        let login = self
            .session_login(&tokens.access_token)
            .await
            .map_err(at(RenewalStage::SessionLogin))?;

        CredentialSet::from_grant(&tokens, &login, None).map_err(at(RenewalStage::CodeExchange))
    }
}

/// Tag an error with the renewal step it came from.
fn at(stage: RenewalStage) -> impl Fn(BullhornError) -> BullhornError {
    move |error| match error {
        BullhornError::Authentication(AuthenticationError::StepFailed { .. }) => error,
        other => AuthenticationError::StepFailed {
            stage,
            message: other.to_string(),
        }
        .into(),
    }
}

fn with_query(base: &str, params: &[(&str, &str)]) -> BullhornResult<String> {
    let mut url = Url::parse(base).map_err(|_| {
        BullhornError::Configuration(ConfigurationError::InvalidEndpoint {
            url: base.to_string(),
        })
    })?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url.into())
}

/// Pull `code` out of a redirect target, resolving relative locations.
fn code_from_location(request_url: &str, location: &str) -> Option<String> {
    let target = Url::parse(location)
        .or_else(|_| Url::parse(request_url).and_then(|base| base.join(location)))
        .ok()?;
    target
        .query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
}

/// Mock renewer for testing. Results are served in FIFO order; an empty
/// queue fails the step.
#[derive(Default)]
pub struct MockTokenRenewer {
    refresh_results: Mutex<VecDeque<BullhornResult<CredentialSet>>>,
    reauth_results: Mutex<VecDeque<BullhornResult<CredentialSet>>>,
    refresh_calls: AtomicU32,
    reauth_calls: AtomicU32,
    delay: Mutex<Option<Duration>>,
}

impl MockTokenRenewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_refresh(&self, result: BullhornResult<CredentialSet>) -> &Self {
        self.refresh_results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
        self
    }

    pub fn queue_reauth(&self, result: BullhornResult<CredentialSet>) -> &Self {
        self.reauth_results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
        self
    }

    /// Sleep this long inside every step, to widen race windows in tests.
    pub fn set_delay(&self, delay: Duration) -> &Self {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
        self
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn reauth_calls(&self) -> u32 {
        self.reauth_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn next(
        queue: &Mutex<VecDeque<BullhornResult<CredentialSet>>>,
        stage: RenewalStage,
    ) -> BullhornResult<CredentialSet> {
        queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(AuthenticationError::StepFailed {
                    stage,
                    message: "no mock result queued".to_string(),
                }
                .into())
            })
    }
}

#[async_trait]
impl TokenRenewer for MockTokenRenewer {
    async fn refresh(&self, _current: &CredentialSet) -> BullhornResult<CredentialSet> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::next(&self.refresh_results, RenewalStage::Refresh)
    }

    async fn reauthenticate(&self) -> BullhornResult<CredentialSet> {
        self.reauth_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::next(&self.reauth_results, RenewalStage::AuthorizationCode)
    }
}
