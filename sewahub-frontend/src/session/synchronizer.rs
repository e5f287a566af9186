//! The in-memory session holder sitting between the credential store and the
//! identity API.
//!
//! State is published through a `watch` channel. Every operation that changes
//! who is signed in bumps the session generation; network-bound operations
//! stamp the generation they started from and only apply their result if it
//! is still current, so a refresh that resolves after a logout cannot bring
//! the session back.

use crate::error::ApiError;
use crate::models::{ProfileUpdate, User};
use crate::session::identity::IdentitySource;
use crate::session::state::{Session, SessionEvent, SessionStatus};
use crate::session::store::{self, CredentialStore};
use tokio::sync::{broadcast, watch, Mutex};

/// Where consumers go after an explicit logout.
pub const SIGNED_OUT_PATH: &str = "/login";

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No token; nothing to refresh.
    Skipped,
    Refreshed(User),
    /// The session changed while the request was in flight; result dropped.
    Stale,
}

pub struct SessionSynchronizer<S, I> {
    store: S,
    identity: I,
    state: watch::Sender<Session>,
    events: broadcast::Sender<SessionEvent>,
    /// Serializes the store-writing commit phases so a logout cannot land
    /// between a refresh's store write and its publication.
    commit: Mutex<()>,
}

impl<S, I> SessionSynchronizer<S, I>
where
    S: CredentialStore,
    I: IdentitySource,
{
    pub fn new(store: S, identity: I) -> Self {
        let (state, _) = watch::channel(Session::unknown());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            identity,
            state,
            events,
            commit: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn current(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// One-shot startup transition out of `Unknown` from the credential
    /// store. Later calls leave the state untouched.
    pub async fn hydrate(&self) -> SessionStatus {
        let current = self.state.borrow().status();
        if current != SessionStatus::Unknown {
            return current;
        }

        let credentials = self.read_credentials().await;

        self.state.send_if_modified(|session| {
            if session.status() != SessionStatus::Unknown {
                return false;
            }
            match credentials {
                Some((token, user)) => session.authenticate(token, user),
                None => session.clear(),
            }
            true
        });

        let status = self.state.borrow().status();
        tracing::debug!(?status, "Session hydrated");
        status
    }

    /// Sets the session from a grant the caller obtained and persisted.
    /// Visible to consumers as soon as this returns.
    ///
    /// Runs under the commit lock and re-writes the user record; the stored
    /// user always matches the stored token afterwards. The token itself
    /// stays the caller's to persist.
    pub async fn login(&self, token: String, user: User) {
        let _guard = self.commit.lock().await;

        if let Err(e) = store::persist_user(&self.store, &user).await {
            tracing::warn!(error = %e, "Failed to re-write cached user on login");
        }

        let user_id = user.id.clone();
        self.state
            .send_modify(|session| session.authenticate(token, user));
        tracing::info!(user_id = %user_id, "Session started");
        self.emit(SessionEvent::LoggedIn { user_id });
    }

    /// Clears the store and the session. Local state is cleared even when
    /// the store fails. Returns where consumers should navigate.
    pub async fn logout(&self) -> &'static str {
        let _guard = self.commit.lock().await;

        if let Err(e) = store::clear_credentials(&self.store).await {
            tracing::error!(error = %e, "Failed to clear credential store during logout");
        }
        self.state.send_modify(Session::clear);

        tracing::info!("Session ended by logout");
        self.emit(SessionEvent::LoggedOut {
            redirect_to: SIGNED_OUT_PATH,
        });
        SIGNED_OUT_PATH
    }

    /// Re-reads the current user from the API. Authentication failures clear
    /// the session; other failures leave it as it was. Never retries.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ApiError> {
        let (stamp, token) = self.stamp();
        let Some(token) = token else {
            return Ok(RefreshOutcome::Skipped);
        };

        let result = match self.identity.who_am_i(&token).await {
            Ok(user) => user.validate().map(|_| user),
            Err(e) => Err(e),
        };

        match result {
            Ok(user) => {
                if self.commit_user(stamp, user.clone()).await? {
                    Ok(RefreshOutcome::Refreshed(user))
                } else {
                    tracing::debug!(stamp, "Discarding stale refresh result");
                    Ok(RefreshOutcome::Stale)
                }
            }
            Err(e) => Err(self.handle_failure(stamp, e).await),
        }
    }

    /// Sends a profile update with the current token and applies the
    /// returned record the same way a refresh does.
    pub async fn update_profile(&self, fields: &ProfileUpdate) -> Result<User, ApiError> {
        let (stamp, token) = self.stamp();
        let Some(token) = token else {
            return Err(ApiError::Authentication(
                "Sign in to update your profile".to_string(),
            ));
        };

        let result = match self.identity.update_profile(fields, &token).await {
            Ok(user) => user.validate().map(|_| user),
            Err(e) => Err(e),
        };

        match result {
            Ok(user) => {
                if !self.commit_user(stamp, user.clone()).await? {
                    tracing::debug!(stamp, "Profile update landed after the session changed");
                }
                Ok(user)
            }
            Err(e) => Err(self.handle_failure(stamp, e).await),
        }
    }

    /// In-place user replacement for callers that already hold a fresh
    /// record. Returns false when nobody is signed in.
    pub async fn apply_user_update(&self, user: User) -> Result<bool, ApiError> {
        user.validate()?;
        let (stamp, token) = self.stamp();
        if token.is_none() {
            return Ok(false);
        }
        self.commit_user(stamp, user).await
    }

    /// Current generation and token, read in one borrow.
    fn stamp(&self) -> (u64, Option<String>) {
        let session = self.state.borrow();
        (session.generation(), session.token().map(str::to_string))
    }

    /// Persists then publishes `user` if the session is still the one
    /// stamped. Returns false for a stale stamp.
    async fn commit_user(&self, stamp: u64, user: User) -> Result<bool, ApiError> {
        let _guard = self.commit.lock().await;

        let generation = self.state.borrow().generation();
        if generation != stamp {
            return Ok(false);
        }

        store::persist_user(&self.store, &user).await?;

        let previous_role = self.state.borrow().user().map(|u| u.role);
        if let Some(previous) = previous_role.filter(|r| *r != user.role) {
            tracing::warn!(
                user_id = %user.id,
                from = %previous,
                to = %user.role,
                "Role changed server-side"
            );
        }

        let user_id = user.id.clone();
        let applied = self.state.send_if_modified(|session| {
            session.generation() == stamp && session.replace_user(user)
        });
        if applied {
            self.emit(SessionEvent::UserUpdated { user_id });
        }
        Ok(applied)
    }

    /// Clears the session for authentication failures that still belong to
    /// the current generation, then hands the error back.
    async fn handle_failure(&self, stamp: u64, error: ApiError) -> ApiError {
        if !error.is_authentication() {
            tracing::warn!(error = %error, "Identity call failed; session unchanged");
            return error;
        }

        let _guard = self.commit.lock().await;
        let generation = self.state.borrow().generation();
        if generation != stamp {
            return error;
        }

        if let Err(e) = store::clear_credentials(&self.store).await {
            tracing::error!(error = %e, "Failed to clear credential store after expiry");
        }
        let cleared = self.state.send_if_modified(|session| {
            if session.generation() != stamp {
                return false;
            }
            session.clear();
            true
        });

        if cleared {
            tracing::info!(error = %error, "Session expired");
            self.emit(SessionEvent::Expired);
        }
        error
    }

    async fn read_credentials(&self) -> Option<(String, User)> {
        match store::load_credentials(&self.store).await {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!(error = %e, "Credential store unreadable; treating as signed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{AuthGrant, LoginRequest, Role};
    use crate::session::store::{MemoryCredentialStore, TOKEN_KEY, USER_KEY};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    type Reply = Result<User, ApiError>;

    /// Identity API whose replies are queued by the test. A queued
    /// `oneshot::Receiver` lets a test hold a response back.
    #[derive(Default)]
    struct ScriptedIdentity {
        replies: std::sync::Mutex<VecDeque<oneshot::Receiver<Reply>>>,
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl ScriptedIdentity {
        fn reply(&self, reply: Reply) {
            let (tx, rx) = oneshot::channel();
            tx.send(reply).unwrap();
            self.replies.lock().unwrap().push_back(rx);
        }

        fn deferred(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().unwrap().push_back(rx);
            tx
        }

        async fn next(&self, token: &str) -> Reply {
            self.calls.lock().unwrap().push(token.to_string());
            let rx = self.replies.lock().unwrap().pop_front().expect("unscripted call");
            rx.await.expect("reply dropped")
        }
    }

    #[async_trait]
    impl IdentitySource for ScriptedIdentity {
        async fn authenticate(&self, _credentials: &LoginRequest) -> Result<AuthGrant, ApiError> {
            unimplemented!("login is performed by the caller")
        }

        async fn who_am_i(&self, token: &str) -> Result<User, ApiError> {
            self.next(token).await
        }

        async fn update_profile(&self, _fields: &ProfileUpdate, token: &str) -> Result<User, ApiError> {
            self.next(token).await
        }
    }

    type TestSync = SessionSynchronizer<Arc<MemoryCredentialStore>, Arc<ScriptedIdentity>>;

    fn user(fullname: &str) -> User {
        User {
            id: "1".into(),
            fullname: fullname.into(),
            email: "jane@example.com".into(),
            role: Role::Customer,
            image_url: None,
            location: None,
        }
    }

    fn setup() -> (TestSync, Arc<MemoryCredentialStore>, Arc<ScriptedIdentity>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let identity = Arc::new(ScriptedIdentity::default());
        (
            SessionSynchronizer::new(store.clone(), identity.clone()),
            store,
            identity,
        )
    }

    async fn signed_in() -> (TestSync, Arc<MemoryCredentialStore>, Arc<ScriptedIdentity>) {
        let (sync, store, identity) = setup();
        store::persist_credentials(&*store, "abc", &user("Jane Doe"))
            .await
            .unwrap();
        sync.login("abc".into(), user("Jane Doe")).await;
        (sync, store, identity)
    }

    #[tokio::test]
    async fn starts_unknown() {
        let (sync, _, _) = setup();
        assert_eq!(sync.current().status(), SessionStatus::Unknown);
    }

    #[tokio::test]
    async fn hydrate_from_stored_credentials() {
        let (sync, store, _) = setup();
        store.set(TOKEN_KEY, "abc".into()).await.unwrap();
        store
            .set(
                USER_KEY,
                r#"{"id":"1","fullname":"Jane Doe","email":"jane@example.com","role":"customer"}"#
                    .into(),
            )
            .await
            .unwrap();

        assert_eq!(sync.hydrate().await, SessionStatus::Authenticated);
        let session = sync.current();
        assert_eq!(session.token(), Some("abc"));
        assert_eq!(session.user(), Some(&user("Jane Doe")));
    }

    #[tokio::test]
    async fn hydrate_with_empty_store_is_anonymous() {
        let (sync, _, _) = setup();
        assert_eq!(sync.hydrate().await, SessionStatus::Anonymous);
        assert!(sync.current().token().is_none());
    }

    #[tokio::test]
    async fn hydrate_is_idempotent() {
        let (sync, store, _) = setup();
        assert_eq!(sync.hydrate().await, SessionStatus::Anonymous);
        let first = sync.current();

        // Credentials appearing later do not change the outcome of hydrate.
        store::persist_credentials(&*store, "abc", &user("Jane Doe"))
            .await
            .unwrap();
        for _ in 0..3 {
            assert_eq!(sync.hydrate().await, SessionStatus::Anonymous);
        }
        assert_eq!(sync.current(), first);
    }

    #[tokio::test]
    async fn login_sets_authenticated() {
        let (sync, _, _) = setup();
        let mut events = sync.events();

        sync.login("t".into(), user("Jane Doe")).await;

        let session = sync.current();
        assert_eq!(session.status(), SessionStatus::Authenticated);
        assert_eq!(session.token(), Some("t"));
        assert_eq!(session.user(), Some(&user("Jane Doe")));
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::LoggedIn { user_id: "1".into() }
        );
    }

    #[tokio::test]
    async fn logout_clears_memory_and_store() {
        let (sync, store, _) = signed_in().await;
        let mut watcher = sync.subscribe();

        assert_eq!(sync.logout().await, SIGNED_OUT_PATH);

        assert_eq!(sync.current().status(), SessionStatus::Anonymous);
        assert!(store.get(TOKEN_KEY).await.unwrap().is_none());
        assert!(watcher.has_changed().unwrap());
        assert_eq!(watcher.borrow_and_update().status(), SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn refresh_without_token_is_noop() {
        let (sync, _, identity) = setup();
        sync.hydrate().await;
        let before = sync.current();

        assert_eq!(sync.refresh().await.unwrap(), RefreshOutcome::Skipped);
        assert_eq!(sync.current(), before);
        assert!(identity.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_replaces_user_keeps_token() {
        let (sync, store, identity) = signed_in().await;
        identity.reply(Ok(user("Jane Smith")));

        let outcome = sync.refresh().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Refreshed(user("Jane Smith")));
        let session = sync.current();
        assert_eq!(session.token(), Some("abc"));
        assert_eq!(session.user().unwrap().fullname, "Jane Smith");
        let (_, cached) = store::load_credentials(&*store).await.unwrap().unwrap();
        assert_eq!(cached.fullname, "Jane Smith");
        assert_eq!(identity.calls.lock().unwrap().as_slice(), ["abc"]);
    }

    #[tokio::test]
    async fn refresh_auth_failure_clears_session() {
        let (sync, store, identity) = signed_in().await;
        identity.reply(Err(ApiError::Authentication("Token expired".into())));
        let mut events = sync.events();

        let err = sync.refresh().await.unwrap_err();

        assert!(err.is_authentication());
        assert_eq!(sync.current().status(), SessionStatus::Anonymous);
        assert!(sync.current().user().is_none());
        assert!(store.is_empty());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Expired);
    }

    #[tokio::test]
    async fn refresh_network_failure_leaves_session() {
        let (sync, store, identity) = signed_in().await;
        identity.reply(Err(ApiError::Network("connection refused".into())));
        let before = sync.current();

        let err = sync.refresh().await.unwrap_err();

        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(sync.current(), before);
        assert!(store.get(TOKEN_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refresh_with_invalid_record_is_rejected_without_clearing() {
        let (sync, _, identity) = signed_in().await;
        let mut broken = user("Jane Doe");
        broken.email = "nope".into();
        identity.reply(Ok(broken));

        let err = sync.refresh().await.unwrap_err();

        assert!(matches!(err, ApiError::ServerRejected { .. }));
        assert!(sync.current().is_authenticated());
    }

    #[tokio::test]
    async fn stale_refresh_does_not_resurrect_after_logout() {
        let (sync, store, identity) = signed_in().await;
        let sync = Arc::new(sync);
        let pending = identity.deferred();

        let in_flight = tokio::spawn({
            let sync = sync.clone();
            async move { sync.refresh().await }
        });
        // Let the refresh reach the identity call.
        while identity.calls.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        sync.logout().await;
        pending.send(Ok(user("Jane Doe"))).unwrap();

        assert_eq!(in_flight.await.unwrap().unwrap(), RefreshOutcome::Stale);
        assert_eq!(sync.current().status(), SessionStatus::Anonymous);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn stale_auth_failure_does_not_clear_new_login() {
        let (sync, _, identity) = signed_in().await;
        let sync = Arc::new(sync);
        let pending = identity.deferred();

        let in_flight = tokio::spawn({
            let sync = sync.clone();
            async move { sync.refresh().await }
        });
        while identity.calls.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        sync.login("fresh".into(), user("Jane Doe")).await;
        pending
            .send(Err(ApiError::Authentication("Token expired".into())))
            .unwrap();

        assert!(in_flight.await.unwrap().is_err());
        let session = sync.current();
        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some("fresh"));
    }

    #[tokio::test]
    async fn profile_update_applies_returned_user() {
        let (sync, _, identity) = signed_in().await;
        identity.reply(Ok(user("Jane Smith")));

        let fields = ProfileUpdate {
            fullname: Some("Jane Smith".into()),
            ..Default::default()
        };
        let updated = sync.update_profile(&fields).await.unwrap();

        assert_eq!(updated.fullname, "Jane Smith");
        let session = sync.current();
        assert_eq!(session.user().unwrap().fullname, "Jane Smith");
        assert_eq!(session.token(), Some("abc"));
    }

    #[tokio::test]
    async fn profile_update_requires_session() {
        let (sync, _, _) = setup();
        sync.hydrate().await;
        let err = sync.update_profile(&ProfileUpdate::default()).await.unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn apply_user_update_ignored_when_signed_out() {
        let (sync, _, _) = setup();
        sync.hydrate().await;
        assert!(!sync.apply_user_update(user("Jane Smith")).await.unwrap());
        assert!(sync.current().user().is_none());
    }

    /// Memory store whose next user-record write can be held open.
    #[derive(Default)]
    struct GatedStore {
        inner: MemoryCredentialStore,
        gate: std::sync::Mutex<Option<oneshot::Receiver<()>>>,
        held: tokio::sync::Notify,
    }

    impl GatedStore {
        fn hold_next_user_write(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            *self.gate.lock().unwrap() = Some(rx);
            tx
        }
    }

    #[async_trait]
    impl CredentialStore for GatedStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
            if key == USER_KEY {
                let gate = self.gate.lock().unwrap().take();
                if let Some(gate) = gate {
                    self.held.notify_one();
                    let _ = gate.await;
                }
            }
            self.inner.set(key, value).await
        }

        async fn clear(&self, keys: &[&str]) -> Result<(), StoreError> {
            self.inner.clear(keys).await
        }
    }

    /// Store that fails reads or clears on demand.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryCredentialStore,
        fail_get: bool,
        fail_clear: bool,
    }

    #[async_trait]
    impl CredentialStore for FaultyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            if self.fail_get {
                return Err(StoreError(format!("cannot read '{}'", key)));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
            self.inner.set(key, value).await
        }

        async fn clear(&self, _keys: &[&str]) -> Result<(), StoreError> {
            if self.fail_clear {
                return Err(StoreError("storage locked".into()));
            }
            Ok(())
        }
    }

    fn faulty(store: FaultyStore) -> SessionSynchronizer<FaultyStore, Arc<ScriptedIdentity>> {
        SessionSynchronizer::new(store, Arc::new(ScriptedIdentity::default()))
    }

    #[tokio::test]
    async fn login_during_refresh_commit_leaves_store_on_new_user() {
        let store = Arc::new(GatedStore::default());
        let identity = Arc::new(ScriptedIdentity::default());
        let sync = Arc::new(SessionSynchronizer::new(store.clone(), identity.clone()));
        store::persist_credentials(&*store, "old", &user("Old Account"))
            .await
            .unwrap();
        sync.login("old".into(), user("Old Account")).await;

        identity.reply(Ok(user("Old Account")));
        let release = store.hold_next_user_write();
        let in_flight = tokio::spawn({
            let sync = sync.clone();
            async move { sync.refresh().await }
        });
        // The refresh is now inside its commit, writing the user record.
        store.held.notified().await;

        store::persist_credentials(&*store, "new", &user("New Account"))
            .await
            .unwrap();
        let login = tokio::spawn({
            let sync = sync.clone();
            async move { sync.login("new".into(), user("New Account")).await }
        });
        release.send(()).unwrap();

        in_flight.await.unwrap().unwrap();
        login.await.unwrap();

        let session = sync.current();
        assert_eq!(session.token(), Some("new"));
        assert_eq!(session.user().unwrap().fullname, "New Account");
        let (token, cached) = store::load_credentials(&*store).await.unwrap().unwrap();
        assert_eq!(token, "new");
        assert_eq!(cached.fullname, "New Account");
    }

    #[tokio::test]
    async fn logout_clears_memory_when_store_clear_fails() {
        let sync = faulty(FaultyStore {
            fail_clear: true,
            ..Default::default()
        });
        sync.login("abc".into(), user("Jane Doe")).await;
        let mut events = sync.events();

        assert_eq!(sync.logout().await, SIGNED_OUT_PATH);

        assert_eq!(sync.current().status(), SessionStatus::Anonymous);
        assert!(sync.current().token().is_none());
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::LoggedOut {
                redirect_to: SIGNED_OUT_PATH
            }
        );
    }

    #[tokio::test]
    async fn expiry_clears_memory_when_store_clear_fails() {
        let identity = Arc::new(ScriptedIdentity::default());
        let sync = SessionSynchronizer::new(
            FaultyStore {
                fail_clear: true,
                ..Default::default()
            },
            identity.clone(),
        );
        sync.login("abc".into(), user("Jane Doe")).await;
        identity.reply(Err(ApiError::Authentication("Token expired".into())));
        let mut events = sync.events();

        assert!(sync.refresh().await.unwrap_err().is_authentication());

        assert_eq!(sync.current().status(), SessionStatus::Anonymous);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Expired);
    }

    #[tokio::test]
    async fn unreadable_store_hydrates_anonymous() {
        let sync = faulty(FaultyStore {
            fail_get: true,
            ..Default::default()
        });

        assert_eq!(sync.hydrate().await, SessionStatus::Anonymous);
        assert!(sync.current().user().is_none());
    }
}
