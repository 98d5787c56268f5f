//! Bullhorn Sync
//!
//! Authenticated Bullhorn REST access for candidate maintenance jobs.
//!
//! # Features
//!
//! - Credential store with atomic replacement of the credential set
//! - Single-flight token renewal: refresh, then session login, falling back
//!   to the username/password authorization-code flow
//! - Call wrapper with transient retry and renewal on expired sessions
//! - `start`/`count` pagination that stops on the first empty page
//! - Graceful stop on Ctrl+C between records
//!
//! # Example
//!
//! ```rust,ignore
//! use bullhorn_sync::{BullhornClient, EnvSettings, Predicate, SearchQuery};
//! use bullhorn_sync::types::Candidate;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = EnvSettings::load(".env")?;
//!     let config = settings.config()?;
//!     let credentials = settings
//!         .credentials(&config.endpoints.rest_host)
//!         .ok_or("run onboard-client first")?;
//!
//!     let client = BullhornClient::new(config, credentials)?;
//!     let query = SearchQuery::new(Predicate::not_deleted(), "id,dateAdded").sort("id");
//!     let candidates = client.search_all::<Candidate>("Candidate", &query).await?;
//!
//!     println!("{} candidates", candidates.len());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, credential and record types
//! - `error`: error hierarchy and HTTP error mapping
//! - `core`: HTTP transport
//! - `token`: credential store, renewal, single-flight coordination, persistence
//! - `resilience`: retry policy and the call wrapper
//! - `pagination`: page enumeration
//! - `cancellation`: graceful-stop signal
//! - `runner`: bounded fan-out over records
//! - `client`: REST client combining the above
//! - `jobs`: the maintenance scripts behind `src/bin/`

pub mod builders;
pub mod cancellation;
pub mod client;
pub mod core;
pub mod error;
pub mod jobs;
pub mod pagination;
pub mod prompt;
pub mod query;
pub mod resilience;
pub mod runner;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{bullhorn_client, BullhornClient};

// Re-export builders
pub use builders::{bullhorn_config, keys, BullhornConfigBuilder, EnvSettings};

// Re-export errors
pub use error::{
    create_error_from_response, ApiError, AuthenticationError, BullhornError, BullhornResult,
    ConfigurationError, NetworkError, ProtocolError, RenewalStage, StorageError,
};

// Re-export types
pub use types::{
    // Config
    BullhornConfig, Endpoints, Region,
    // Token
    CredentialSet, SessionLogin, TokenResponse,
    // Records
    Candidate, CustomObject, EntityEvent, EventsPage, FileAttachment, ListPage,
};

// Re-export core components
pub use core::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport,
};

// Re-export token management
pub use token::{
    // Store
    CredentialSnapshot, CredentialStore,
    // Renewal
    BullhornTokenRenewer, MockTokenRenewer, RenewalCoordinator, RenewalState, TokenRenewer,
    // Persistence
    CredentialPersistence, EnvFileStore, InMemoryPersistence,
};

// Re-export resilience
pub use resilience::{CallWrapper, FailureClass, RetryPolicy, DEFAULT_RETRY_POLICY};

// Re-export pagination, cancellation and batching
pub use cancellation::StopSignal;
pub use pagination::{fetch_all, PageCursor, Paginated, Paginator};
pub use query::{Predicate, SearchQuery};
pub use runner::{BatchRunner, BatchSummary};
