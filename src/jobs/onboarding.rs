//! Onboarding a new tenant and auth diagnostics.

use std::path::Path;
use std::sync::Arc;

use crate::builders::{keys, EnvSettings};
use crate::core::{HttpTransport, ReqwestHttpTransport};
use crate::error::BullhornResult;
use crate::jobs::JobOutcome;
use crate::prompt::Prompter;
use crate::token::{credential_entries, BullhornTokenRenewer, EnvFileStore, TokenRenewer};
use crate::types::{BullhornConfig, CredentialSet};

/// How an onboarding value is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    Plain,
    Masked,
}

/// Settings asked for when missing, with their prompt labels.
pub const ONBOARDING_PROMPTS: [(&str, &str, Input); 5] = [
    (keys::CLIENT_ID, "Client ID", Input::Plain),
    (keys::CLIENT_SECRET, "Client secret", Input::Masked),
    (keys::USERNAME, "API username", Input::Plain),
    (keys::PASSWORD, "API password", Input::Masked),
    (keys::REGION, "Region (EMEA or US, blank for EMEA)", Input::Plain),
];

/// Prompt for every onboarding setting not already present.
pub async fn collect_settings(
    mut settings: EnvSettings,
    prompter: &dyn Prompter,
) -> BullhornResult<EnvSettings> {
    for (key, label, input) in ONBOARDING_PROMPTS {
        if settings.get(key).is_some() {
            continue;
        }
        let value = match input {
            Input::Plain => prompter.value(label).await?,
            Input::Masked => prompter.secret(label).await?,
        };
        if !value.is_empty() {
            settings.set(key, value);
        }
    }
    // Reject a bad region before any request is made.
    settings.region()?;
    Ok(settings)
}

/// Run the username/password flow and write settings plus credentials to
/// the env file.
pub async fn onboard(
    settings: &EnvSettings,
    config: BullhornConfig,
    transport: Arc<dyn HttpTransport>,
    store: &EnvFileStore,
) -> BullhornResult<CredentialSet> {
    let region = config.region;
    let renewer = BullhornTokenRenewer::new(config, transport);
    let credentials = renewer.reauthenticate().await?;

    let mut entries: Vec<(&str, String)> = ONBOARDING_PROMPTS
        .iter()
        .filter(|(key, _, _)| *key != keys::REGION)
        .filter_map(|(key, _, _)| settings.get(key).map(|value| (*key, value.to_string())))
        .collect();
    entries.push((keys::REGION, region.as_str().to_string()));
    entries.extend(credential_entries(&credentials));

    store.update(&entries).await?;
    tracing::info!(
        path = %store.path().display(),
        rest_url = credentials.rest_url(),
        "Tenant onboarded"
    );
    Ok(credentials)
}

/// Interactive onboarding against the env file at `path`.
pub async fn onboard_client(path: &Path, prompter: &dyn Prompter) -> BullhornResult<JobOutcome> {
    let settings = collect_settings(EnvSettings::load(path)?, prompter).await?;
    let config = settings.config()?;
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestHttpTransport::new(config.timeout)?);

    onboard(&settings, config, transport, &EnvFileStore::new(path)).await?;
    Ok(JobOutcome::done())
}

/// Obtain an authorization code and log it.
pub async fn auth_code(config: BullhornConfig, transport: Arc<dyn HttpTransport>) -> BullhornResult<String> {
    let code = BullhornTokenRenewer::new(config, transport)
        .authorization_code()
        .await?;
    tracing::info!(code = %code, "Authorization code");
    Ok(code)
}

/// Load configuration from `path` and log an authorization code.
pub async fn run_auth_code(path: &Path) -> BullhornResult<JobOutcome> {
    let config = BullhornConfig::from_env_file(path)?;
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestHttpTransport::new(config.timeout)?);
    auth_code(config, transport).await?;
    Ok(JobOutcome::done())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MockHttpTransport;
    use crate::prompt::MockPrompter;
    use serde_json::json;

    fn mock_auth_flow(transport: &MockHttpTransport) {
        transport.queue_redirect(302, "https://app.test/cb?code=abc%3D%3D&client_id=x");
        transport.queue_json_response(
            200,
            &json!({"access_token": "a1", "refresh_token": "r1", "expires_in": 600}),
        );
        transport.queue_json_response(
            200,
            &json!({"BhRestToken": "s1", "restUrl": "https://rest42.test/rest-services/corp9/"}),
        );
    }

    #[tokio::test]
    async fn test_collect_settings_prompts_only_for_missing() {
        let settings = EnvSettings::from_values([(keys::CLIENT_ID, "id")]);
        let prompter = MockPrompter::new();
        prompter.answer("secret").answer("user").answer("pw").answer("");

        let settings = collect_settings(settings, &prompter).await.unwrap();

        assert_eq!(prompter.asked().len(), 4);
        assert_eq!(prompter.masked(), vec!["Client secret", "API password"]);
        assert_eq!(settings.get(keys::CLIENT_SECRET), Some("secret"));
        assert_eq!(settings.get(keys::PASSWORD), Some("pw"));
        assert_eq!(settings.get(keys::REGION), None);
    }

    #[tokio::test]
    async fn test_collect_settings_rejects_unknown_region() {
        let settings = EnvSettings::from_values([
            (keys::CLIENT_ID, "id"),
            (keys::CLIENT_SECRET, "s"),
            (keys::USERNAME, "u"),
            (keys::PASSWORD, "p"),
        ]);
        let prompter = MockPrompter::new();
        prompter.answer("APAC");

        assert!(collect_settings(settings, &prompter).await.is_err());
    }

    #[tokio::test]
    async fn test_onboard_writes_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "# tenant\nCLIENT_ID=id\n").unwrap();

        let settings = EnvSettings::from_values([
            (keys::CLIENT_ID, "id"),
            (keys::CLIENT_SECRET, "secret"),
            (keys::USERNAME, "user"),
            (keys::PASSWORD, "pw"),
        ]);
        let config = settings
            .config_builder()
            .unwrap()
            .base_url("https://bh.test")
            .build()
            .unwrap();
        let transport = Arc::new(MockHttpTransport::new());
        mock_auth_flow(&transport);

        let credentials = onboard(&settings, config, transport.clone(), &EnvFileStore::new(&path))
            .await
            .unwrap();
        assert_eq!(credentials.corp_token().unwrap(), "corp9");

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# tenant\nCLIENT_ID=id\n"));
        for line in [
            "CLIENT_SECRET=secret",
            "BH_USERNAME=user",
            "BH_REGION=EMEA",
            "REFRESH_TOKEN=r1",
            "BH_REST_TOKEN=s1",
            "CORP_TOKEN=corp9",
            "REST_URL=https://rest42.test/rest-services/corp9/",
        ] {
            assert!(written.contains(line), "missing {line} in {written}");
        }

        let exchange = &transport.get_requests()[1];
        assert!(exchange.body.as_deref().unwrap().contains("code=abc%3D%3D"));
    }

    #[tokio::test]
    async fn test_auth_code() {
        let settings = EnvSettings::from_values([
            (keys::CLIENT_ID, "id"),
            (keys::CLIENT_SECRET, "secret"),
            (keys::USERNAME, "user"),
            (keys::PASSWORD, "pw"),
        ]);
        let config = settings
            .config_builder()
            .unwrap()
            .base_url("https://bh.test")
            .build()
            .unwrap();
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_redirect(302, "/cb?code=xyz");

        let code = auth_code(config, transport.clone()).await.unwrap();

        assert_eq!(code, "xyz");
        let request = transport.get_last_request().unwrap();
        assert!(request.url.starts_with("https://bh.test/oauth/authorize?"));
        assert!(request.url.contains("action=Login"));
    }
}
