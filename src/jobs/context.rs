//! Shared setup for the maintenance jobs.

use std::path::Path;
use std::sync::Arc;

use crate::builders::EnvSettings;
use crate::cancellation::StopSignal;
use crate::client::BullhornClient;
use crate::core::{HttpTransport, ReqwestHttpTransport};
use crate::error::BullhornResult;
use crate::runner::BatchRunner;
use crate::token::{BullhornTokenRenewer, CredentialPersistence, EnvFileStore, TokenRenewer};
use crate::types::BullhornConfig;

/// Client plus stop signal, shared by every record a job processes.
pub struct JobContext {
    client: BullhornClient,
    stop: StopSignal,
}

impl JobContext {
    pub fn new(client: BullhornClient, stop: StopSignal) -> Self {
        Self { client, stop }
    }

    /// Load settings from `path`, connect, and request stop on Ctrl+C.
    pub async fn load(path: impl AsRef<Path>) -> BullhornResult<Self> {
        let settings = EnvSettings::load(path)?;
        let config = settings.config()?;
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestHttpTransport::new(config.timeout)?);

        let context = Self::connect(&settings, config, transport).await?;
        context.stop.install_ctrl_c_handler();
        Ok(context)
    }

    /// Build a client from stored credentials. Without a stored session the
    /// full username/password flow runs first and its result is persisted.
    pub async fn connect(
        settings: &EnvSettings,
        config: BullhornConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> BullhornResult<Self> {
        let renewer = Arc::new(BullhornTokenRenewer::new(config.clone(), transport.clone()));
        let persistence = config
            .env_file
            .clone()
            .map(|path| Arc::new(EnvFileStore::new(path)) as Arc<dyn CredentialPersistence>);

        let initial = match settings.credentials(&config.endpoints.rest_host) {
            Some(credentials) => credentials,
            None => {
                tracing::warn!("No stored session, authenticating with username and password");
                let credentials = renewer.reauthenticate().await?;
                if let Some(persistence) = &persistence {
                    if let Err(error) = persistence.persist(&credentials).await {
                        tracing::error!(error = %error, "Failed to persist initial credentials");
                    }
                }
                credentials
            }
        };

        let client =
            BullhornClient::with_components(config, transport, renewer, initial, persistence);
        Ok(Self::new(client, StopSignal::new()))
    }

    pub fn client(&self) -> &BullhornClient {
        &self.client
    }

    pub fn stop(&self) -> &StopSignal {
        &self.stop
    }

    /// Runner processing one record at a time.
    pub fn sequential(&self) -> BatchRunner {
        BatchRunner::sequential(self.stop.clone())
    }

    /// Runner with the default fan-out.
    pub fn fan_out(&self) -> BatchRunner {
        BatchRunner::new(self.stop.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::keys;
    use crate::core::MockHttpTransport;
    use serde_json::json;

    fn settings() -> EnvSettings {
        EnvSettings::from_values([
            (keys::CLIENT_ID, "client"),
            (keys::CLIENT_SECRET, "secret"),
            (keys::USERNAME, "user"),
            (keys::PASSWORD, "pw"),
        ])
    }

    #[tokio::test]
    async fn test_connect_with_stored_session_makes_no_requests() {
        let mut settings = settings();
        settings.set(keys::REFRESH_TOKEN, "r");
        settings.set(keys::REST_TOKEN, "s");
        settings.set(keys::CORP_TOKEN, "abc");
        let transport = Arc::new(MockHttpTransport::new());
        let config = settings.config_builder().unwrap().base_url("https://bh.test").build().unwrap();

        let context = JobContext::connect(&settings, config, transport.clone())
            .await
            .unwrap();

        assert!(transport.get_requests().is_empty());
        assert_eq!(
            context.client().credentials().rest_url(),
            "https://bh.test/rest-services/abc/"
        );
    }

    #[tokio::test]
    async fn test_connect_without_session_authenticates() {
        let settings = settings();
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_redirect(302, "https://app.test/callback?code=C1");
        transport.queue_json_response(
            200,
            &json!({"access_token": "a1", "refresh_token": "r1", "token_type": "Bearer", "expires_in": 600}),
        );
        transport.queue_json_response(
            200,
            &json!({"BhRestToken": "s1", "restUrl": "https://rest99.test/rest-services/xyz/"}),
        );
        let config = settings.config_builder().unwrap().base_url("https://bh.test").build().unwrap();

        let context = JobContext::connect(&settings, config, transport.clone())
            .await
            .unwrap();

        let credentials = context.client().credentials();
        assert_eq!(credentials.session_token(), "s1");
        assert_eq!(credentials.refresh_token(), "r1");
        assert_eq!(transport.get_requests().len(), 3);
    }
}
