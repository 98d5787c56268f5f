//! Token Management
//!
//! Credential lifecycle: storage, renewal and write-back.
//!
//! This module provides:
//!
//! - **Credential Store**: Atomic read and replace of the current credential set
//! - **Token Renewal**: Refresh, session login and full re-authentication
//! - **Renewal Coordinator**: Single-flight renewal shared by concurrent callers
//! - **Persistence**: Env-file write-back of renewed credentials

pub mod coordinator;
pub mod persistence;
pub mod renewal;
pub mod store;

// Credential Store
pub use store::{CredentialSnapshot, CredentialStore};

// Token Renewal
pub use renewal::{BullhornTokenRenewer, MockTokenRenewer, TokenRenewer};

// Renewal Coordinator
pub use coordinator::{RenewalCoordinator, RenewalFailure, RenewalState};

// Persistence
pub use persistence::{
    credential_entries, rewrite_env, CredentialPersistence, EnvFileStore, InMemoryPersistence,
};
