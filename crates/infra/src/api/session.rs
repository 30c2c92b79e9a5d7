//! Process-wide session state
//!
//! Holds zero or one [`Session`]. Every change goes through a write lock
//! that also persists the change, so memory and the durable slot agree and
//! readers observe changes in call order.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use warehouse_domain::Session;

use super::auth::AuthClient;
use super::errors::ApiError;
use super::storage::SessionStorage;

const EVENT_CAPACITY: usize = 16;

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// Explicit logout or sign-out
    UserRequested,
    /// The renewal credential was refused; collaborators should route the
    /// user back to the login entry point
    RenewalRejected,
}

/// Lifecycle notifications for collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { username: String },
    /// Credentials were replaced by a renewal
    Renewed,
    SignedOut { reason: SignOutReason },
}

/// The signed-in session, mirrored to a persistent slot
///
/// Reads are cheap clones under a read lock. Every change is persisted
/// before it becomes visible and is announced on [`subscribe`](Self::subscribe).
pub struct SessionStore {
    current: RwLock<Option<Session>>,
    storage: Arc<dyn SessionStorage>,
    auth: Arc<dyn AuthClient>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    /// Create the store, restoring a previously persisted session.
    ///
    /// An unreadable slot is logged and treated as signed out.
    pub fn new(storage: Arc<dyn SessionStorage>, auth: Arc<dyn AuthClient>) -> Self {
        let restored = match storage.load() {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "discarding unreadable persisted session");
                None
            }
        };
        if let Some(session) = &restored {
            info!(username = %session.identity.username, "restored persisted session");
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { current: RwLock::new(restored), storage, auth, events }
    }

    /// Exchange a username and secret for a session and persist it.
    ///
    /// A failed login leaves any existing session untouched.
    pub async fn login(&self, username: &str, secret: &str) -> Result<Session, ApiError> {
        let session = self.auth.obtain_token(username, secret).await.map_err(|err| {
            warn!(username, error = %err, "login failed");
            err
        })?;

        {
            let mut current = self.current.write();
            self.persist(&session);
            *current = Some(session.clone());
        }

        info!(username = %session.identity.username, groups = ?session.permission_groups, "signed in");
        self.emit(SessionEvent::SignedIn { username: session.identity.username.clone() });
        Ok(session)
    }

    /// Clear the session locally. Never fails; persistence errors are logged.
    pub fn logout(&self) {
        self.clear(SignOutReason::UserRequested);
    }

    /// Revoke the renewal credential on the server, then [`logout`](Self::logout).
    ///
    /// Revocation is best effort: the local session is cleared regardless.
    pub async fn sign_out(&self) {
        if let Some(renewal) = self.renewal_credential() {
            if let Err(err) = self.auth.revoke_token(&renewal).await {
                warn!(error = %err, "server-side sign-out failed; clearing local session anyway");
            }
        }
        self.logout();
    }

    /// Snapshot of the session, `None` when signed out
    pub fn current_session(&self) -> Option<Session> {
        self.current.read().clone()
    }

    /// Replace the credentials of the current session.
    ///
    /// `None` keeps the existing renewal credential. Ignored when signed out.
    pub fn update_credentials(&self, bearer: String, renewal: Option<String>) {
        let mut current = self.current.write();
        let Some(session) = current.as_mut() else {
            debug!("credential update ignored: no session");
            return;
        };
        session.renew(bearer, renewal);
        self.persist(session);
        drop(current);

        self.emit(SessionEvent::Renewed);
    }

    /// Apply a renewal only if the session still holds the renewal credential
    /// the renewal was made with. A logout or a new login in the meantime
    /// wins over a late renewal result.
    pub(crate) fn apply_renewal(&self, used: &str, bearer: String, renewal: Option<String>) -> bool {
        let mut current = self.current.write();
        match current.as_mut() {
            Some(session) if session.renewal_credential.as_deref() == Some(used) => {
                session.renew(bearer, renewal);
                self.persist(session);
            }
            _ => {
                debug!("renewal result discarded: session changed meanwhile");
                return false;
            }
        }
        drop(current);

        self.emit(SessionEvent::Renewed);
        true
    }

    /// End the session because its renewal credential was refused, unless it
    /// has been replaced meanwhile. The check and the removal happen under
    /// one write lock, so a login racing with this call always survives.
    pub(crate) fn expire(&self, used: &str) -> bool {
        self.clear_if(SignOutReason::RenewalRejected, |current| {
            current.is_some_and(|session| session.renewal_credential.as_deref() == Some(used))
        })
    }

    pub fn bearer(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.bearer_credential.clone())
    }

    pub fn renewal_credential(&self) -> Option<String> {
        self.current.read().as_ref().and_then(|s| s.renewal_credential.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    /// Server-side superuser flag; `false` when signed out
    pub fn is_privileged(&self) -> bool {
        self.current.read().as_ref().is_some_and(|s| s.is_privileged)
    }

    pub fn is_admin(&self) -> bool {
        self.current.read().as_ref().is_some_and(Session::is_admin)
    }

    pub fn can_edit(&self) -> bool {
        self.current.read().as_ref().is_some_and(Session::can_edit)
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.current.read().as_ref().is_some_and(|s| s.has_group(group))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn clear(&self, reason: SignOutReason) {
        self.clear_if(reason, |_| true);
    }

    /// Clear memory and the durable slot if `matches` accepts the current
    /// state, as one step under the write lock.
    fn clear_if(
        &self,
        reason: SignOutReason,
        matches: impl FnOnce(Option<&Session>) -> bool,
    ) -> bool {
        let previous = {
            let mut current = self.current.write();
            if !matches(current.as_ref()) {
                return false;
            }
            if let Err(err) = self.storage.clear() {
                warn!(error = %err, "failed to clear persisted session");
            }
            current.take()
        };

        if let Some(session) = previous {
            info!(username = %session.identity.username, ?reason, "signed out");
            self.emit(SessionEvent::SignedOut { reason });
        }
        true
    }

    fn persist(&self, session: &Session) {
        if let Err(err) = self.storage.save(session) {
            warn!(error = %err, "failed to persist session");
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;
    use warehouse_domain::Identity;

    use super::*;
    use crate::api::auth::RenewResponse;
    use crate::api::storage::MemorySessionStorage;

    /// Auth client answering from fixed data, counting calls
    #[derive(Default)]
    pub(crate) struct FakeAuth {
        pub renewals: AtomicUsize,
        pub revocations: AtomicUsize,
        pub fail_revoke: bool,
    }

    pub(crate) fn session_for(username: &str) -> Session {
        Session::new(
            format!("{username}-access"),
            Some(format!("{username}-refresh")),
            Identity { username: username.to_string(), ..Identity::default() },
            ["operator".to_string()],
            false,
        )
    }

    #[async_trait]
    impl AuthClient for FakeAuth {
        async fn obtain_token(&self, username: &str, secret: &str) -> Result<Session, ApiError> {
            if secret == "secret" {
                Ok(session_for(username))
            } else {
                Err(ApiError::Status { status: 401, path: "/token/".into(), payload: Value::Null })
            }
        }

        async fn renew_token(&self, _renewal: &str) -> Result<RenewResponse, ApiError> {
            self.renewals.fetch_add(1, Ordering::SeqCst);
            Ok(RenewResponse { access: "renewed".into(), refresh: None })
        }

        async fn revoke_token(&self, _renewal: &str) -> Result<(), ApiError> {
            self.revocations.fetch_add(1, Ordering::SeqCst);
            if self.fail_revoke {
                Err(ApiError::Network("offline".into()))
            } else {
                Ok(())
            }
        }
    }

    fn store_with(storage: Arc<MemorySessionStorage>, auth: FakeAuth) -> SessionStore {
        SessionStore::new(storage, Arc::new(auth))
    }

    #[tokio::test]
    async fn login_sets_and_persists_session() {
        let storage = Arc::new(MemorySessionStorage::new());
        let store = store_with(Arc::clone(&storage), FakeAuth::default());
        let mut events = store.subscribe();

        let session = store.login("ivan", "secret").await.unwrap();

        assert_eq!(store.current_session(), Some(session.clone()));
        assert_eq!(storage.load().unwrap(), Some(session));
        assert!(store.can_edit());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedIn { username: "ivan".into() });
    }

    #[tokio::test]
    async fn failed_login_leaves_state_untouched() {
        let store = store_with(Arc::new(MemorySessionStorage::new()), FakeAuth::default());

        let err = store.login("ivan", "wrong").await.unwrap_err();

        assert!(err.is_unauthorized());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn restart_restores_persisted_session() {
        let storage = Arc::new(MemorySessionStorage::with_session(session_for("olga")));
        let store = store_with(storage, FakeAuth::default());

        assert_eq!(store.bearer().as_deref(), Some("olga-access"));
        assert!(store.has_group("operator"));
    }

    #[test]
    fn logout_clears_memory_and_slot_and_never_fails() {
        let storage = Arc::new(MemorySessionStorage::with_session(session_for("olga")));
        let store = store_with(Arc::clone(&storage), FakeAuth::default());
        let mut events = store.subscribe();

        store.logout();
        store.logout();

        assert_eq!(store.current_session(), None);
        assert_eq!(storage.load().unwrap(), None);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::SignedOut { reason: SignOutReason::UserRequested }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn update_credentials_keeps_renewal_when_not_rotated() {
        let store = store_with(
            Arc::new(MemorySessionStorage::with_session(session_for("olga"))),
            FakeAuth::default(),
        );

        store.update_credentials("fresh".into(), None);

        let session = store.current_session().unwrap();
        assert_eq!(session.bearer_credential, "fresh");
        assert_eq!(session.renewal_credential.as_deref(), Some("olga-refresh"));
    }

    #[test]
    fn update_credentials_without_session_is_ignored() {
        let store = store_with(Arc::new(MemorySessionStorage::new()), FakeAuth::default());
        store.update_credentials("fresh".into(), Some("r".into()));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn stale_renewal_results_are_discarded() {
        let store = store_with(
            Arc::new(MemorySessionStorage::with_session(session_for("olga"))),
            FakeAuth::default(),
        );

        assert!(!store.apply_renewal("someone-else-refresh", "x".into(), None));
        assert!(!store.expire("someone-else-refresh"));
        assert_eq!(store.bearer().as_deref(), Some("olga-access"));

        assert!(store.expire("olga-refresh"));
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn expire_after_new_login_keeps_the_new_session() {
        let storage = Arc::new(MemorySessionStorage::with_session(session_for("olga")));
        let store = store_with(Arc::clone(&storage), FakeAuth::default());
        store.login("ivan", "secret").await.unwrap();
        let mut events = store.subscribe();

        assert!(!store.expire("olga-refresh"));

        assert_eq!(store.renewal_credential().as_deref(), Some("ivan-refresh"));
        assert!(storage.load().unwrap().is_some());
        assert!(events.try_recv().is_err(), "no sign-out for the new session");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn login_racing_with_expire_always_survives() {
        for _ in 0..200 {
            let storage = Arc::new(MemorySessionStorage::with_session(session_for("olga")));
            let store = Arc::new(store_with(Arc::clone(&storage), FakeAuth::default()));

            let expire = {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.expire("olga-refresh") })
            };
            let login = {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.login("ivan", "secret").await })
            };
            expire.await.unwrap();
            login.await.unwrap().unwrap();

            assert_eq!(store.renewal_credential().as_deref(), Some("ivan-refresh"));
            assert_eq!(
                storage.load().unwrap().and_then(|s| s.renewal_credential),
                Some("ivan-refresh".to_string())
            );
        }
    }

    #[tokio::test]
    async fn sign_out_revokes_then_clears_even_on_failure() {
        let auth = Arc::new(FakeAuth { fail_revoke: true, ..FakeAuth::default() });
        let store = SessionStore::new(
            Arc::new(MemorySessionStorage::with_session(session_for("olga"))),
            auth.clone(),
        );

        store.sign_out().await;

        assert_eq!(auth.revocations.load(Ordering::SeqCst), 1);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn permission_helpers_are_false_when_signed_out() {
        let store = store_with(Arc::new(MemorySessionStorage::new()), FakeAuth::default());
        assert!(!store.is_privileged());
        assert!(!store.is_admin());
        assert!(!store.can_edit());
        assert!(!store.has_group("operator"));
    }
}
