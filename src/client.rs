//! Bullhorn Client
//!
//! REST client combining the transport, credential store, call wrapper and
//! paginator. Every request goes through the call wrapper and reads the
//! session token from the credentials it is handed.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

use crate::core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport};
use crate::error::{BullhornError, BullhornResult, ProtocolError};
use crate::pagination::{fetch_all, Paginated, SEARCH_PAGE_SIZE};
use crate::query::SearchQuery;
use crate::resilience::CallWrapper;
use crate::token::{
    BullhornTokenRenewer, CredentialPersistence, CredentialStore, EnvFileStore,
    RenewalCoordinator, TokenRenewer,
};
use crate::types::{BullhornConfig, CredentialSet, EntityEvent, EventsPage, ListPage};

/// Bullhorn REST client.
pub struct BullhornClient {
    config: BullhornConfig,
    transport: Arc<dyn HttpTransport>,
    calls: Arc<CallWrapper>,
}

impl BullhornClient {
    /// Create a client with the reqwest transport. Renewed credentials are
    /// written to `config.env_file` when set.
    pub fn new(config: BullhornConfig, initial: CredentialSet) -> BullhornResult<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestHttpTransport::new(config.timeout)?);
        let renewer = Arc::new(BullhornTokenRenewer::new(config.clone(), transport.clone()));
        let persistence = config
            .env_file
            .clone()
            .map(|path| Arc::new(EnvFileStore::new(path)) as Arc<dyn CredentialPersistence>);

        Ok(Self::with_components(
            config,
            transport,
            renewer,
            initial,
            persistence,
        ))
    }

    /// Create a client with custom components.
    pub fn with_components(
        config: BullhornConfig,
        transport: Arc<dyn HttpTransport>,
        renewer: Arc<dyn TokenRenewer>,
        initial: CredentialSet,
        persistence: Option<Arc<dyn CredentialPersistence>>,
    ) -> Self {
        let store = Arc::new(CredentialStore::new(initial));
        let mut coordinator = RenewalCoordinator::new(store, renewer);
        if let Some(persistence) = persistence {
            coordinator = coordinator.with_persistence(persistence);
        }
        let calls = Arc::new(CallWrapper::new(
            Arc::new(coordinator),
            config.retry.clone(),
        ));

        Self {
            config,
            transport,
            calls,
        }
    }

    pub fn config(&self) -> &BullhornConfig {
        &self.config
    }

    /// The call wrapper, for running custom operations.
    pub fn calls(&self) -> &Arc<CallWrapper> {
        &self.calls
    }

    /// Current credentials.
    pub fn credentials(&self) -> Arc<CredentialSet> {
        self.calls.credentials()
    }

    // ========== Search ==========

    /// One page of `search/{entity}`.
    pub async fn search<T: DeserializeOwned>(
        &self,
        entity: &str,
        query: &SearchQuery,
        start: u32,
        count: u32,
    ) -> BullhornResult<ListPage<T>> {
        let path = format!("search/{}", entity);
        let params = query.params(start, count);
        tracing::debug!(entity, start, count, "Searching");

        self.get(&path, &params).await?.json()
    }

    /// Every record matching `query`, 200 per page.
    pub async fn search_all<T: DeserializeOwned>(
        &self,
        entity: &str,
        query: &SearchQuery,
    ) -> BullhornResult<Paginated<T>> {
        tracing::info!(entity, query = %query.predicate, "Fetching all records");
        fetch_all(SEARCH_PAGE_SIZE, |cursor| {
            self.search(entity, query, cursor.start, cursor.count)
        })
        .await
    }

    // ========== Associations ==========

    /// One page of `entity/{entity}/{id}/{association}`.
    pub async fn to_many<T: DeserializeOwned>(
        &self,
        entity: &str,
        id: i64,
        association: &str,
        fields: &str,
        start: u32,
        count: u32,
    ) -> BullhornResult<ListPage<T>> {
        let path = format!("entity/{}/{}/{}", entity, id, association);
        let params = [
            ("fields", fields.to_string()),
            ("start", start.to_string()),
            ("count", count.to_string()),
        ];

        self.get(&path, &params).await?.json()
    }

    /// Every record of an association.
    pub async fn to_many_all<T: DeserializeOwned>(
        &self,
        entity: &str,
        id: i64,
        association: &str,
        fields: &str,
        page_size: u32,
    ) -> BullhornResult<Vec<T>> {
        let all = fetch_all(page_size, |cursor| {
            self.to_many(entity, id, association, fields, cursor.start, cursor.count)
        })
        .await?;
        Ok(all.records)
    }

    // ========== Updates ==========

    /// `POST entity/{entity}/{id}` with a partial payload.
    ///
    /// Retried like any other call; payloads must be idempotent.
    pub async fn update_entity<P: Serialize + ?Sized>(
        &self,
        entity: &str,
        id: i64,
        payload: &P,
    ) -> BullhornResult<serde_json::Value> {
        let path = format!("entity/{}/{}", entity, id);
        let body = to_json(payload)?;

        let response = self
            .calls
            .call(|creds| self.execute(creds, HttpMethod::Post, &path, &[], Some(&body)))
            .await?;
        tracing::info!(entity, id, "Entity updated");
        response.json()
    }

    /// `POST entity/{entity}/{id}` with a payload that adds records, such as
    /// a to-many entry without an id.
    ///
    /// Transient failures are returned rather than retried; the caller must
    /// check whether the write landed before sending it again.
    pub async fn create_on_entity<P: Serialize + ?Sized>(
        &self,
        entity: &str,
        id: i64,
        payload: &P,
    ) -> BullhornResult<serde_json::Value> {
        let path = format!("entity/{}/{}", entity, id);
        let body = to_json(payload)?;

        let response = self
            .calls
            .call_without_transient_retry(|creds| {
                self.execute(creds, HttpMethod::Post, &path, &[], Some(&body))
            })
            .await?;
        tracing::info!(entity, id, "Records added to entity");
        response.json()
    }

    // ========== Events ==========

    /// Poll an event subscription.
    pub async fn poll_events(
        &self,
        subscription: &str,
        max_events: u32,
    ) -> BullhornResult<Vec<EntityEvent>> {
        let path = format!("event/subscription/{}", subscription);
        let params = [("maxEvents", max_events.to_string())];

        let response = self.get(&path, &params).await?;
        if response.body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let page: EventsPage = response.json()?;
        Ok(page.events)
    }

    // ========== Transport ==========

    async fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> BullhornResult<HttpResponse> {
        self.calls
            .call(|creds| self.execute(creds, HttpMethod::Get, path, params, None))
            .await
    }

    async fn execute(
        &self,
        credentials: Arc<CredentialSet>,
        method: HttpMethod,
        path: &str,
        params: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> BullhornResult<HttpResponse> {
        let url = rest_url(&credentials, path, params)?;
        let request = match (method, body) {
            (HttpMethod::Get, _) => HttpRequest::get(url),
            (_, Some(body)) => {
                let mut request = HttpRequest::post_json(url, body)?;
                request.method = method;
                request
            }
            (_, None) => HttpRequest {
                method,
                ..HttpRequest::get(url)
            },
        };

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(response.error());
        }
        Ok(response)
    }
}

fn to_json<P: Serialize + ?Sized>(payload: &P) -> BullhornResult<serde_json::Value> {
    serde_json::to_value(payload).map_err(|e| {
        BullhornError::Protocol(ProtocolError::InvalidJson {
            message: e.to_string(),
        })
    })
}

/// `{restUrl}{path}?BhRestToken=..&params`.
fn rest_url(
    credentials: &CredentialSet,
    path: &str,
    params: &[(&str, String)],
) -> BullhornResult<String> {
    let base = Url::parse(credentials.rest_url()).map_err(|_| {
        BullhornError::Protocol(ProtocolError::InvalidRestUrl {
            rest_url: credentials.rest_url().to_string(),
        })
    })?;
    let mut url = base.join(path).map_err(|_| {
        BullhornError::Protocol(ProtocolError::InvalidRestUrl {
            rest_url: format!("{}{}", credentials.rest_url(), path),
        })
    })?;

    url.query_pairs_mut()
        .append_pair("BhRestToken", credentials.session_token())
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    Ok(url.into())
}

/// Create a Bullhorn client with the default transport.
pub fn bullhorn_client(
    config: BullhornConfig,
    initial: CredentialSet,
) -> BullhornResult<BullhornClient> {
    BullhornClient::new(config, initial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::bullhorn_config;
    use crate::core::MockHttpTransport;
    use crate::query::Predicate;
    use crate::token::MockTokenRenewer;
    use crate::types::{Candidate, FileAttachment};
    use serde_json::json;

    fn creds(tag: &str) -> CredentialSet {
        CredentialSet::new(
            format!("a-{tag}"),
            format!("r-{tag}"),
            format!("s-{tag}"),
            "https://rest21.test/rest-services/corp/",
        )
    }

    fn client(
        transport: Arc<MockHttpTransport>,
        renewer: Arc<MockTokenRenewer>,
    ) -> BullhornClient {
        let config = bullhorn_config()
            .client_id("client")
            .client_secret("secret")
            .username("user")
            .password("pw")
            .build()
            .unwrap();
        BullhornClient::with_components(config, transport, renewer, creds("0"), None)
    }

    #[test]
    fn test_rest_url() {
        let url = rest_url(
            &creds("0"),
            "search/Candidate",
            &[
                ("query", "isDeleted:0 AND !status:Archive".to_string()),
                ("start", "0".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://rest21.test/rest-services/corp/search/Candidate?BhRestToken=s-0&query=isDeleted%3A0+AND+%21status%3AArchive&start=0"
        );
    }

    #[tokio::test]
    async fn test_search_all_paginates() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"total": 3, "data": [{"id": 1}, {"id": 2}]}));
        transport.queue_json_response(200, &json!({"total": 3, "data": [{"id": 3}]}));
        transport.queue_json_response(200, &json!({"total": 3, "data": []}));
        let client = client(transport.clone(), Arc::new(MockTokenRenewer::new()));

        let query = SearchQuery::new(Predicate::not_deleted(), "id").sort("id");
        let result: Paginated<Candidate> = client.search_all("Candidate", &query).await.unwrap();

        assert_eq!(result.total, Some(3));
        let ids: Vec<i64> = result.records.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let requests = transport.get_requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].url.contains("start=2&count=200"));
        assert!(requests[2].url.contains("start=3&count=200"));
    }

    #[tokio::test]
    async fn test_expired_session_is_renewed_mid_enumeration() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"data": [{"id": 1, "type": "Resume", "dateAdded": 10}]}));
        transport.queue_json_response(401, &json!({"errorMessage": "Bad 'BhRestToken' or timed-out."}));
        transport.queue_json_response(200, &json!({"data": []}));
        let renewer = Arc::new(MockTokenRenewer::new());
        renewer.queue_refresh(Ok(creds("1")));
        let client = client(transport.clone(), renewer.clone());

        let files: Vec<FileAttachment> = client
            .to_many_all("Candidate", 5, "fileAttachments", "id,type,dateAdded", 100)
            .await
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(renewer.refresh_calls(), 1);
        let requests = transport.get_requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].url.contains("BhRestToken=s-0"));
        assert!(requests[2].url.contains("BhRestToken=s-1"));
        assert!(requests[2].url.contains("start=1"));
    }

    #[tokio::test]
    async fn test_update_entity_posts_json() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"changedEntityId": 5, "changeType": "UPDATE"}));
        let client = client(transport.clone(), Arc::new(MockTokenRenewer::new()));

        let response = client
            .update_entity("Candidate", 5, &json!({"customDate3": 1700000000000_i64}))
            .await
            .unwrap();
        assert_eq!(response["changedEntityId"], 5);

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.url,
            "https://rest21.test/rest-services/corp/entity/Candidate/5?BhRestToken=s-0"
        );
        assert_eq!(request.body.as_deref(), Some(r#"{"customDate3":1700000000000}"#));
    }

    #[tokio::test]
    async fn test_create_is_sent_once_on_gateway_timeout() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(504, &json!({}));
        transport.queue_json_response(200, &json!({"changedEntityId": 5}));
        let client = client(transport.clone(), Arc::new(MockTokenRenewer::new()));

        let error = client
            .create_on_entity("Candidate", 5, &json!({"customObject1s": [{"text2": "x"}]}))
            .await
            .unwrap_err();

        assert!(error.is_transient());
        assert_eq!(transport.get_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_update_rejected_is_not_retried() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(400, &json!({"errorMessage": "read-only field"}));
        let client = client(transport.clone(), Arc::new(MockTokenRenewer::new()));

        let result = client
            .update_entity("Candidate", 5, &json!({"id": 1}))
            .await;
        assert!(result.is_err());
        assert_eq!(transport.get_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_poll_events_empty_body() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(HttpResponse {
            status: 200,
            headers: Default::default(),
            body: String::new(),
        });
        let client = client(transport.clone(), Arc::new(MockTokenRenewer::new()));

        let events = client.poll_events("CandidateFileAlert", 100).await.unwrap();
        assert!(events.is_empty());
        assert!(transport
            .get_last_request()
            .unwrap()
            .url
            .ends_with("event/subscription/CandidateFileAlert?BhRestToken=s-0&maxEvents=100"));
    }

    #[tokio::test]
    async fn test_poll_events_parses_events() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &json!({
                "requestId": 3,
                "events": [{
                    "eventId": "ID:1",
                    "eventTimestamp": 1700000000123_i64,
                    "entityName": "Candidate",
                    "entityId": 9,
                    "entityEventType": "UPDATED",
                    "updatedProperties": ["description"]
                }]
            }),
        );
        let client = client(transport, Arc::new(MockTokenRenewer::new()));

        let events = client.poll_events("CandidateFileAlert", 100).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_update_of("Candidate", "description"));
    }
}
