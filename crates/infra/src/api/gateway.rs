//! Single chokepoint for outbound API calls
//!
//! [`RequestGateway::call`] is an explicit pipeline: attach the bearer,
//! dispatch, and on a 401 recover once, either by re-using a bearer that a
//! concurrent renewal already installed or by joining the single-flight
//! renewal. Retry state lives in the call itself, so there is exactly one
//! retry per logical call.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use super::errors::ApiError;
use super::refresh::SingleFlightRefresh;
use super::session::SessionStore;
use super::transport::{ApiResponse, RequestSpec, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retried,
}

/// Sends every protected call with the current bearer and retries it once
/// after a shared renewal when the server answers 401
pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    refresher: Arc<SingleFlightRefresh>,
}

impl RequestGateway {
    /// Wire the gateway to a transport, the session it reads bearers from
    /// and the renewal it waits on.
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
        refresher: Arc<SingleFlightRefresh>,
    ) -> Self {
        Self { transport, session, refresher }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn refresher(&self) -> &Arc<SingleFlightRefresh> {
        &self.refresher
    }

    /// Send `spec`, renewing once on a 401 and retrying with the new bearer.
    ///
    /// # Errors
    ///
    /// A second 401 is returned as is. Renewal failures replace the original
    /// 401, and a cancelled token yields [`ApiError::Cancelled`].
    #[instrument(skip(self, spec), fields(method = %spec.method, path = %spec.path))]
    pub async fn call(&self, spec: RequestSpec) -> Result<ApiResponse, ApiError> {
        let mut attempt = Attempt::First;
        let mut bearer = self.session.bearer();

        loop {
            let err = match self.dispatch(&spec, bearer.as_deref()).await {
                Err(err) if err.is_unauthorized() && attempt == Attempt::First => err,
                outcome => return outcome,
            };
            attempt = Attempt::Retried;

            let Some(session) = self.session.current_session() else {
                debug!("401 without a session");
                return Err(err);
            };
            if session.renewal_credential.is_none() {
                debug!("401 without a renewal credential");
                return Err(err);
            }

            if bearer.as_deref() != Some(session.bearer_credential.as_str()) {
                debug!("bearer was renewed meanwhile; retrying with current credentials");
                bearer = Some(session.bearer_credential);
                continue;
            }

            bearer = Some(match &spec.cancel {
                // A cancelled call must not start or join a renewal.
                Some(token) if token.is_cancelled() => return Err(ApiError::Cancelled),
                Some(token) => {
                    debug!("401; waiting for credential renewal");
                    self.refresher.refresh_until(token.cancelled()).await?
                }
                None => {
                    debug!("401; waiting for credential renewal");
                    self.refresher.refresh().await?
                }
            });
        }
    }

    /// GET and decode
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call(RequestSpec::get(path)).await?.json()
    }

    /// Send a JSON body and decode the answer
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(RequestSpec::new(method, path).with_body(body)?).await?.json()
    }

    async fn dispatch(
        &self,
        spec: &RequestSpec,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        match &spec.cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(ApiError::Cancelled),
                outcome = self.transport.execute(spec, bearer) => outcome,
            },
            None => self.transport.execute(spec, bearer).await,
        }
    }
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("session", &self.session)
            .field("refresher", &self.refresher)
            .finish_non_exhaustive()
    }
}
