//! Single-flight credential renewal
//!
//! At most one renewal call is in flight per process. Callers that need a
//! renewal while one is running join it and observe the same outcome.
//!
//! The renewal runs on its own task, so it completes even if every caller
//! that was waiting on it is cancelled.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{self, BoxFuture, Either, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::auth::AuthClient;
use super::errors::{ApiError, ApiErrorCategory};
use super::session::SessionStore;

type RenewalTicket = Shared<BoxFuture<'static, Result<String, ApiError>>>;

struct InFlight {
    id: u64,
    ticket: RenewalTicket,
}

pub struct SingleFlightRefresh {
    session: Arc<SessionStore>,
    auth: Arc<dyn AuthClient>,
    inflight: Arc<Mutex<Option<InFlight>>>,
    started: Arc<AtomicU64>,
}

impl SingleFlightRefresh {
    pub fn new(session: Arc<SessionStore>, auth: Arc<dyn AuthClient>) -> Self {
        Self {
            session,
            auth,
            inflight: Arc::new(Mutex::new(None)),
            started: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Join the renewal in flight or start one; resolves to the new bearer
    /// credential.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        self.ticket().await
    }

    /// Like [`refresh`](Self::refresh), but stop waiting once `cancelled`
    /// completes. The renewal itself is not affected.
    pub async fn refresh_until<X>(&self, cancelled: X) -> Result<String, ApiError>
    where
        X: Future<Output = ()> + Send,
    {
        let ticket = self.ticket();
        let cancelled = std::pin::pin!(cancelled);
        match future::select(cancelled, ticket).await {
            Either::Left(((), _)) => Err(ApiError::Cancelled),
            Either::Right((outcome, _)) => outcome,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.inflight.lock().is_some()
    }

    /// Renewal calls started since creation
    pub fn renewals_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    fn ticket(&self) -> RenewalTicket {
        let mut slot = self.inflight.lock();
        if let Some(inflight) = slot.as_ref() {
            debug!(renewal = inflight.id, "joining renewal in flight");
            return inflight.ticket.clone();
        }

        let Some(renewal) = self.session.renewal_credential() else {
            return future::ready(Err(ApiError::NotAuthenticated)).boxed().shared();
        };

        let id = self.started.fetch_add(1, Ordering::Relaxed) + 1;
        info!(renewal = id, "renewing session credentials");

        let task = tokio::spawn(renew(
            id,
            renewal,
            Arc::clone(&self.session),
            Arc::clone(&self.auth),
            Arc::clone(&self.inflight),
        ));
        let ticket = async move {
            task.await.unwrap_or_else(|err| {
                Err(ApiError::Internal(format!("renewal task failed: {err}")))
            })
        }
        .boxed()
        .shared();

        *slot = Some(InFlight { id, ticket: ticket.clone() });
        ticket
    }
}

async fn renew(
    id: u64,
    renewal: String,
    session: Arc<SessionStore>,
    auth: Arc<dyn AuthClient>,
    inflight: Arc<Mutex<Option<InFlight>>>,
) -> Result<String, ApiError> {
    let outcome = match auth.renew_token(&renewal).await {
        Ok(renewed) => {
            let bearer = renewed.access.clone();
            if session.apply_renewal(&renewal, renewed.access, renewed.refresh) {
                info!(renewal = id, "session credentials renewed");
                Ok(bearer)
            } else {
                session.bearer().ok_or(ApiError::NotAuthenticated)
            }
        }
        Err(err) => {
            let err = ApiError::classify_renewal(err);
            if err.category() == ApiErrorCategory::RenewalRejected {
                warn!(renewal = id, error = %err, "renewal credential rejected; signing out");
                session.expire(&renewal);
            } else {
                warn!(renewal = id, error = %err, "renewal failed; session kept");
            }
            Err(err)
        }
    };

    // Clear before settling so a caller woken by this outcome can start a
    // fresh renewal.
    let mut slot = inflight.lock();
    if slot.as_ref().is_some_and(|current| current.id == id) {
        *slot = None;
    }
    drop(slot);

    outcome
}

impl fmt::Debug for SingleFlightRefresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlightRefresh")
            .field("in_flight", &self.is_in_flight())
            .field("renewals_started", &self.renewals_started())
            .finish_non_exhaustive()
    }
}
