//! Renewal Coordinator
//!
//! Single-flight renewal: however many callers observe an expired token at
//! once, one refresh runs and every caller receives its result.
//!
//! State transitions:
//!
//! ```text
//! Valid -> Renewing -> Valid
//!          Renewing -> FullReauth -> Valid
//!                      FullReauth -> FullReauthFailed (terminal)
//! ```

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{AuthenticationError, BullhornError, BullhornResult, RenewalStage};
use crate::token::{CredentialPersistence, CredentialStore, TokenRenewer};
use crate::types::CredentialSet;

/// Renewal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenewalState {
    Valid,
    Renewing,
    FullReauth,
    FullReauthFailed,
}

/// Terminal renewal failure, shared by every waiter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenewalFailure {
    pub stage: RenewalStage,
    pub message: String,
}

impl From<RenewalFailure> for BullhornError {
    fn from(failure: RenewalFailure) -> Self {
        AuthenticationError::Unrecoverable {
            stage: failure.stage,
            message: failure.message,
        }
        .into()
    }
}

impl RenewalFailure {
    fn from_error(error: &BullhornError) -> Self {
        match error {
            BullhornError::Authentication(AuthenticationError::StepFailed { stage, message }) => {
                Self {
                    stage: *stage,
                    message: message.clone(),
                }
            }
            other => Self {
                stage: RenewalStage::AuthorizationCode,
                message: other.to_string(),
            },
        }
    }
}

type RenewalOutcome = Result<Arc<CredentialSet>, RenewalFailure>;

struct InFlight {
    generation: u64,
    outcome: Shared<BoxFuture<'static, RenewalOutcome>>,
}

/// Coordinates renewals against a [`CredentialStore`].
pub struct RenewalCoordinator {
    store: Arc<CredentialStore>,
    renewer: Arc<dyn TokenRenewer>,
    persistence: Option<Arc<dyn CredentialPersistence>>,
    in_flight: Mutex<Option<InFlight>>,
    state: Arc<Mutex<RenewalState>>,
    renewals_started: Arc<AtomicU64>,
}

impl RenewalCoordinator {
    pub fn new(store: Arc<CredentialStore>, renewer: Arc<dyn TokenRenewer>) -> Self {
        Self {
            store,
            renewer,
            persistence: None,
            in_flight: Mutex::new(None),
            state: Arc::new(Mutex::new(RenewalState::Valid)),
            renewals_started: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Write every renewed credential set to `persistence`.
    pub fn with_persistence(mut self, persistence: Arc<dyn CredentialPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn state(&self) -> RenewalState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of renewal executions started so far.
    pub fn renewals_started(&self) -> u64 {
        self.renewals_started.load(Ordering::SeqCst)
    }

    /// Renew the credentials that were current at `observed_generation`.
    ///
    /// Returns immediately with the current set if the store has moved past
    /// that generation. Joins the running renewal if one exists for it.
    /// Otherwise starts one.
    pub async fn renew(&self, observed_generation: u64) -> BullhornResult<Arc<CredentialSet>> {
        let outcome = {
            let mut slot = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            let snapshot = self.store.snapshot();
            match slot.as_ref() {
                Some(in_flight) if in_flight.generation == snapshot.generation => {
                    in_flight.outcome.clone()
                }
                _ if snapshot.generation != observed_generation => {
                    return Ok(snapshot.credentials);
                }
                _ => {
                    let outcome = self.start(snapshot.credentials).boxed().shared();
                    *slot = Some(InFlight {
                        generation: snapshot.generation,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };

        outcome.await.map_err(BullhornError::from)
    }

    fn start(
        &self,
        current: Arc<CredentialSet>,
    ) -> impl std::future::Future<Output = RenewalOutcome> + Send + 'static {
        let store = self.store.clone();
        let renewer = self.renewer.clone();
        let persistence = self.persistence.clone();
        let state = self.state.clone();
        self.renewals_started.fetch_add(1, Ordering::SeqCst);

        async move {
            let set_state = |next: RenewalState| {
                *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
            };

            set_state(RenewalState::Renewing);
            tracing::info!("Token expired, renewing tokens");

            let renewed = match renewer.refresh(&current).await {
                Ok(set) => set,
                Err(error) => {
                    tracing::warn!(error = %error, "Refresh token failed, attempting full re-auth");
                    set_state(RenewalState::FullReauth);

                    match renewer.reauthenticate().await {
                        Ok(set) => {
                            tracing::info!("Full re-auth successful");
                            set
                        }
                        Err(error) => {
                            set_state(RenewalState::FullReauthFailed);
                            tracing::error!(error = %error, "Full re-auth failed");
                            return Err(RenewalFailure::from_error(&error));
                        }
                    }
                }
            };

            // Persist while this renewal still owns the in-flight slot, so a
            // later renewal cannot write the file until this one is done.
            if let Some(persistence) = persistence {
                if let Err(error) = persistence.persist(&renewed).await {
                    tracing::error!(
                        error = %error,
                        code = error.error_code(),
                        "Failed to persist renewed credentials"
                    );
                }
            }

            let renewed = Arc::new(renewed);
            let generation = store.replace(renewed.clone());
            set_state(RenewalState::Valid);
            tracing::info!(generation, "Tokens renewed successfully");

            Ok(renewed)
        }
    }
}
