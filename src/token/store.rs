//! Credential Store
//!
//! Holds the current credential set behind a lock. Readers get an `Arc`
//! snapshot; renewal swaps the whole set in one write.

use std::sync::{Arc, PoisonError, RwLock};

use crate::types::CredentialSet;

/// A credential set together with the generation it was installed at.
#[derive(Clone, Debug)]
pub struct CredentialSnapshot {
    /// Incremented on every replace. Used to tell whether a renewal already
    /// happened since a caller last read the store.
    pub generation: u64,
    pub credentials: Arc<CredentialSet>,
}

/// Process-wide credential store.
#[derive(Debug)]
pub struct CredentialStore {
    current: RwLock<CredentialSnapshot>,
}

impl CredentialStore {
    /// Create a store seeded with initial credentials at generation 0.
    pub fn new(initial: CredentialSet) -> Self {
        Self {
            current: RwLock::new(CredentialSnapshot {
                generation: 0,
                credentials: Arc::new(initial),
            }),
        }
    }

    /// Latest credentials.
    pub fn read(&self) -> Arc<CredentialSet> {
        self.snapshot().credentials
    }

    /// Latest credentials with their generation.
    pub fn snapshot(&self) -> CredentialSnapshot {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn generation(&self) -> u64 {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Install a new credential set and return its generation.
    pub fn replace(&self, credentials: Arc<CredentialSet>) -> u64 {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        current.generation += 1;
        current.credentials = credentials;
        current.generation
    }
}
