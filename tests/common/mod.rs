//! Shared setup for the HTTP-level tests.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use bullhorn_sync::{bullhorn_config, BullhornClient, BullhornConfig, CredentialSet, RetryPolicy};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CORP: &str = "corp1";

/// REST base URL served by `server`.
pub fn rest_url(server: &MockServer) -> String {
    format!("{}/rest-services/{}/", server.uri(), CORP)
}

/// Configuration pointing every endpoint at `server`, with fast backoff.
pub fn config(server: &MockServer, env_file: Option<&Path>) -> BullhornConfig {
    let mut builder = bullhorn_config()
        .client_id("client-id")
        .client_secret("client-secret")
        .username("api.user")
        .password("s3cret pass")
        .base_url(server.uri())
        .timeout(Duration::from_secs(5))
        .retry_policy(RetryPolicy {
            base_delay: Duration::from_millis(10),
            ..RetryPolicy::default()
        });
    if let Some(env_file) = env_file {
        builder = builder.env_file(env_file);
    }
    builder.build().expect("valid test configuration")
}

/// Client holding a session the server will reject.
pub fn stale_client(server: &MockServer, env_file: Option<&Path>) -> BullhornClient {
    let credentials = CredentialSet::new("a0", "r0", "stale", rest_url(server));
    BullhornClient::new(config(server, env_file), credentials).expect("client")
}

/// 401 for any REST call made with the stale session.
pub async fn reject_stale_session(server: &MockServer) {
    Mock::given(method("GET"))
        .and(query_param("BhRestToken", "stale"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"errorMessage": "Bad 'BhRestToken' or timed-out."})),
        )
        .mount(server)
        .await;
}

/// Refresh grant succeeds, expected exactly `times` times.
pub async fn refresh_succeeds(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "access_token": "a1",
                    "refresh_token": "r1",
                    "token_type": "Bearer",
                    "expires_in": 600
                }))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Refresh grant rejected as expired.
pub async fn refresh_rejected(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid, expired, or revoked refresh token."
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Session login hands out `session` on this server's REST URL.
pub async fn login_succeeds(server: &MockServer, session: &str) {
    Mock::given(method("GET"))
        .and(path("/rest-services/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "BhRestToken": session,
            "restUrl": rest_url(server)
        })))
        .mount(server)
        .await;
}
