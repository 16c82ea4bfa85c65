//! Session store: the single mutable owner of user, token, language, and
//! collection state.
//!
//! The store has an explicit lifecycle: `new` → [`SessionStore::hydrate`]
//! (restore from storage on launch) → mutations → [`SessionStore::logout`].
//! Writes follow a persist-then-update ordering - storage is written before
//! the in-memory state - so a crash between the two steps leaves storage as
//! the source of truth for the next launch.
//!
//! The bearer token lives in storage only; [`SessionStore::token`] reads it
//! on demand and converts any storage error into `None` rather than
//! propagating.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use mibu_core::{CollectionItem, Language, Role, User, merge_collection};

use crate::api::AuthApi;
use crate::error::ApiError;
use crate::storage::{self, KeyValueStore, StorageError, keys};

/// Best-effort push-token registration hooks.
///
/// The transport (APNs/FCM wiring) lives outside this crate; the store only
/// decides *when* to fire these, always fire-and-forget with failures
/// logged, never blocking the login/logout path.
#[async_trait]
pub trait PushRegistrar: Send + Sync {
    /// Bind this device's push token to the authenticated account.
    async fn register(&self, auth_token: &str) -> Result<(), ApiError>;

    /// Unbind this device's push token from the account.
    async fn unregister(&self, auth_token: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    language: Option<Language>,
    collection: Vec<CollectionItem>,
}

/// The session store.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn KeyValueStore>,
    push: Option<Arc<dyn PushRegistrar>>,
    state: RwLock<SessionState>,
    // Serializes role switches; overlapping calls queue instead of racing
    switch_lock: Mutex<()>,
}

impl SessionStore {
    /// Create a store over the given API and storage, with no push hooks.
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_push(api, storage, None)
    }

    /// Create a store with push-token registration hooks.
    #[must_use]
    pub fn with_push(
        api: Arc<dyn AuthApi>,
        storage: Arc<dyn KeyValueStore>,
        push: Option<Arc<dyn PushRegistrar>>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                api,
                storage,
                push,
                state: RwLock::new(SessionState::default()),
                switch_lock: Mutex::new(()),
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Restore persisted session state into memory (app launch).
    ///
    /// Corrupt or missing records hydrate as absent rather than failing the
    /// launch.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) {
        let store = self.inner.storage.as_ref();
        let user: Option<User> = storage::get_json(store, keys::USER).await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to hydrate user, starting signed out");
            None
        });
        let language: Option<Language> =
            storage::get_json(store, keys::LANGUAGE).await.unwrap_or_default();
        let collection: Vec<CollectionItem> = storage::get_json(store, keys::COLLECTION)
            .await
            .unwrap_or_default()
            .unwrap_or_default();

        let mut state = self.inner.state.write().await;
        state.user = user;
        state.language = language;
        state.collection = collection;
    }

    /// Set the current user, optionally with a fresh token.
    ///
    /// Persists user (and token, when given) before updating memory. A
    /// token triggers best-effort push registration in the background.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when persistence fails; in-memory state is
    /// left unchanged in that case.
    #[instrument(skip(self, user, token), fields(user_id = %user.id))]
    pub async fn set_user(&self, user: User, token: Option<SecretString>) -> Result<(), StorageError> {
        let store = self.inner.storage.as_ref();
        storage::set_json(store, keys::USER, &user).await?;
        if let Some(token) = &token {
            store.set(keys::AUTH_TOKEN, token.expose_secret()).await?;
        }

        self.inner.state.write().await.user = Some(user);

        if let (Some(push), Some(token)) = (&self.inner.push, token) {
            let push = Arc::clone(push);
            tokio::spawn(async move {
                if let Err(e) = push.register(token.expose_secret()).await {
                    warn!(error = %e, "push token registration failed");
                }
            });
        }

        Ok(())
    }

    /// End the session: best-effort push de-registration, then clear
    /// persisted and in-memory state.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        // De-register push while we still hold a token
        if let (Some(push), Some(token)) = (&self.inner.push, self.token().await) {
            let push = Arc::clone(push);
            tokio::spawn(async move {
                if let Err(e) = push.unregister(token.expose_secret()).await {
                    warn!(error = %e, "push token removal failed");
                }
            });
        }

        let store = self.inner.storage.as_ref();
        for key in [keys::AUTH_TOKEN, keys::USER, keys::COLLECTION] {
            if let Err(e) = store.remove(key).await {
                warn!(key, error = %e, "failed to clear persisted session key");
            }
        }

        let mut state = self.inner.state.write().await;
        state.user = None;
        state.collection.clear();
        info!("session cleared");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The persisted bearer token, or `None` on any storage error.
    pub async fn token(&self) -> Option<SecretString> {
        match self.inner.storage.get(keys::AUTH_TOKEN).await {
            Ok(value) => value.map(SecretString::from),
            Err(e) => {
                warn!(error = %e, "token read failed");
                None
            }
        }
    }

    /// The current in-memory user, if signed in.
    pub async fn user(&self) -> Option<User> {
        self.inner.state.read().await.user.clone()
    }

    /// Whether a user is signed in.
    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.read().await.user.is_some()
    }

    /// The current collection.
    pub async fn collection(&self) -> Vec<CollectionItem> {
        self.inner.state.read().await.collection.clone()
    }

    /// The persisted language preference, if any.
    pub async fn language(&self) -> Option<Language> {
        self.inner.state.read().await.language
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Switch the active role of a super-admin account.
    ///
    /// Strictly sequential: switch call → validate the server-confirmed
    /// `activeRole` exactly matches the request → merge the embedded user
    /// or re-fetch the full profile → persist → update memory. Returns
    /// `true` only if every step succeeds; any validation failure or error
    /// yields `false` and leaves state untouched. Never panics or
    /// propagates errors to the caller.
    #[instrument(skip(self), fields(role = %role))]
    pub async fn switch_role(&self, role: Role) -> bool {
        let _guard = self.inner.switch_lock.lock().await;

        match self.try_switch_role(role).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "role switch failed");
                false
            }
        }
    }

    async fn try_switch_role(&self, role: Role) -> Result<(), SwitchRoleError> {
        let token = self.token().await.ok_or(SwitchRoleError::NoToken)?;
        let token = token.expose_secret().to_string();

        let response = self.inner.api.switch_role(&token, role).await?;

        // The server's confirmation is authoritative; anything else is a
        // logical failure even though the HTTP call succeeded.
        let confirmed = response
            .active_role
            .ok_or_else(|| ApiError::Validation("switch response missing activeRole".to_string()))?;
        if confirmed != role {
            return Err(ApiError::Validation(format!(
                "requested {role} but server confirmed {confirmed}"
            ))
            .into());
        }

        let current = self.user().await.ok_or(SwitchRoleError::NoUser)?;

        // Embedded user payloads can be trimmed; fall back to a full fetch
        let mut user = match response.user.and_then(|partial| partial.merge_over(&current)) {
            Some(user) => user,
            None => self.inner.api.get_user(&token).await?,
        };
        user.active_role = Some(confirmed);

        storage::set_json(self.inner.storage.as_ref(), keys::USER, &user).await?;
        self.inner.state.write().await.user = Some(user);
        Ok(())
    }

    /// Merge items into the collection, de-duplicating by id.
    ///
    /// No-ops (no storage write) when every item is already present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when persisting the merged list fails; the
    /// in-memory collection is left unchanged in that case.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn add_to_collection(
        &self,
        items: Vec<CollectionItem>,
    ) -> Result<usize, StorageError> {
        let mut merged = self.collection().await;
        let appended = merge_collection(&mut merged, items);
        if appended == 0 {
            return Ok(0);
        }

        storage::set_json(self.inner.storage.as_ref(), keys::COLLECTION, &merged).await?;
        self.inner.state.write().await.collection = merged;
        Ok(appended)
    }

    /// Persist and apply a language preference.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when persistence fails.
    pub async fn set_language(&self, language: Language) -> Result<(), StorageError> {
        storage::set_json(self.inner.storage.as_ref(), keys::LANGUAGE, &language).await?;
        self.inner.state.write().await.language = Some(language);
        Ok(())
    }
}

/// Internal failure modes of a role switch; collapsed to `false` at the
/// public boundary.
#[derive(Debug, thiserror::Error)]
enum SwitchRoleError {
    #[error("no stored token")]
    NoToken,
    #[error("no signed-in user")]
    NoUser,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::api::{PartialUser, SwitchRoleResponse};
    use crate::storage::MemoryStore;
    use mibu_core::{ItemId, Provider, UserId};

    /// Stub auth backend with a scriptable switch-role answer.
    struct StubAuthApi {
        confirm_role: std::sync::Mutex<Option<Role>>,
        embed_user: bool,
        get_user_calls: AtomicUsize,
    }

    impl StubAuthApi {
        fn confirming(role: Role) -> Self {
            Self {
                confirm_role: std::sync::Mutex::new(Some(role)),
                embed_user: false,
                get_user_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthApi for StubAuthApi {
        async fn get_user(&self, _token: &str) -> Result<User, ApiError> {
            self.get_user_calls.fetch_add(1, Ordering::SeqCst);
            Ok(super_admin())
        }

        async fn switch_role(
            &self,
            _token: &str,
            _role: Role,
        ) -> Result<SwitchRoleResponse, ApiError> {
            let confirmed = *self.confirm_role.lock().unwrap();
            let user = self.embed_user.then(|| PartialUser {
                id: Some(UserId::new("u-1")),
                name: Some("Root".to_string()),
                email: None,
                avatar: None,
                role: None,
                active_role: confirmed,
                is_approved: None,
                is_super_admin: None,
                accessible_roles: None,
            });
            Ok(SwitchRoleResponse {
                active_role: confirmed,
                user,
            })
        }
    }

    fn super_admin() -> User {
        User {
            id: UserId::new("u-1"),
            name: "Root".to_string(),
            email: Some("root@mibu.app".to_string()),
            avatar: None,
            first_name: None,
            last_name: None,
            role: Role::Admin,
            active_role: Some(Role::Admin),
            is_approved: None,
            is_super_admin: true,
            accessible_roles: vec![],
            provider: Provider::Email,
            provider_id: None,
        }
    }

    fn item(id: &str) -> CollectionItem {
        CollectionItem {
            id: ItemId::new(id),
            name: format!("item {id}"),
            image: None,
            obtained_at: None,
        }
    }

    async fn signed_in_store(api: Arc<dyn AuthApi>) -> SessionStore {
        let store = SessionStore::new(api, Arc::new(MemoryStore::new()));
        store
            .set_user(super_admin(), Some(SecretString::from("tok-1")))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_set_user_persists_then_updates() {
        let storage = Arc::new(MemoryStore::new());
        let store = SessionStore::new(
            Arc::new(StubAuthApi::confirming(Role::Merchant)),
            storage.clone(),
        );
        store
            .set_user(super_admin(), Some(SecretString::from("tok-1")))
            .await
            .unwrap();

        assert!(store.is_authenticated().await);
        assert_eq!(storage.get(keys::AUTH_TOKEN).await.unwrap().as_deref(), Some("tok-1"));
        let persisted: Option<User> = storage::get_json(storage.as_ref(), keys::USER)
            .await
            .unwrap();
        assert_eq!(persisted.unwrap().id, UserId::new("u-1"));
    }

    #[tokio::test]
    async fn test_hydrate_restores_persisted_session() {
        let storage = Arc::new(MemoryStore::new());
        let api: Arc<dyn AuthApi> = Arc::new(StubAuthApi::confirming(Role::Merchant));

        let store = SessionStore::new(api.clone(), storage.clone());
        store
            .set_user(super_admin(), Some(SecretString::from("tok-1")))
            .await
            .unwrap();
        store.add_to_collection(vec![item("a")]).await.unwrap();

        // Fresh store over the same storage, as on next launch
        let relaunched = SessionStore::new(api, storage);
        relaunched.hydrate().await;
        assert!(relaunched.is_authenticated().await);
        assert_eq!(relaunched.collection().await.len(), 1);
        assert_eq!(
            relaunched.token().await.unwrap().expose_secret(),
            "tok-1"
        );
    }

    #[tokio::test]
    async fn test_hydrate_survives_corrupt_user_record() {
        // Run the warn path with a real subscriber installed, routed to the
        // test's captured output
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let storage = Arc::new(MemoryStore::new());
        storage.set(keys::USER, "{corrupt").await.unwrap();
        let store = SessionStore::new(
            Arc::new(StubAuthApi::confirming(Role::Merchant)),
            storage,
        );
        store.hydrate().await;
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_logout_clears_state_and_storage() {
        let storage = Arc::new(MemoryStore::new());
        let store = SessionStore::new(
            Arc::new(StubAuthApi::confirming(Role::Merchant)),
            storage.clone(),
        );
        store
            .set_user(super_admin(), Some(SecretString::from("tok-1")))
            .await
            .unwrap();

        store.logout().await;
        assert!(!store.is_authenticated().await);
        assert!(store.token().await.is_none());
        assert_eq!(storage.get(keys::USER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_switch_role_accepts_exact_confirmation() {
        let api = Arc::new(StubAuthApi::confirming(Role::Merchant));
        let store = signed_in_store(api).await;

        assert!(store.switch_role(Role::Merchant).await);
        let user = store.user().await.unwrap();
        assert_eq!(user.active_role, Some(Role::Merchant));
    }

    #[tokio::test]
    async fn test_switch_role_rejects_mismatched_confirmation() {
        // Server confirms specialist when merchant was requested
        let api = Arc::new(StubAuthApi::confirming(Role::Specialist));
        let store = signed_in_store(api).await;

        assert!(!store.switch_role(Role::Merchant).await);
        // State untouched
        let user = store.user().await.unwrap();
        assert_eq!(user.active_role, Some(Role::Admin));
    }

    #[tokio::test]
    async fn test_switch_role_rejects_missing_confirmation() {
        let api = Arc::new(StubAuthApi {
            confirm_role: std::sync::Mutex::new(None),
            embed_user: false,
            get_user_calls: AtomicUsize::new(0),
        });
        let store = signed_in_store(api).await;
        assert!(!store.switch_role(Role::Merchant).await);
    }

    #[tokio::test]
    async fn test_switch_role_refetches_when_payload_incomplete() {
        let api = Arc::new(StubAuthApi::confirming(Role::Merchant));
        let store = signed_in_store(api.clone()).await;

        assert!(store.switch_role(Role::Merchant).await);
        // No embedded user in the stub response, so the profile was re-fetched
        assert_eq!(api.get_user_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_switch_role_uses_embedded_user_when_complete() {
        let api = Arc::new(StubAuthApi {
            confirm_role: std::sync::Mutex::new(Some(Role::Merchant)),
            embed_user: true,
            get_user_calls: AtomicUsize::new(0),
        });
        let store = signed_in_store(api.clone()).await;

        assert!(store.switch_role(Role::Merchant).await);
        assert_eq!(api.get_user_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_switch_role_without_token_fails() {
        let store = SessionStore::new(
            Arc::new(StubAuthApi::confirming(Role::Merchant)),
            Arc::new(MemoryStore::new()),
        );
        assert!(!store.switch_role(Role::Merchant).await);
    }

    #[tokio::test]
    async fn test_add_to_collection_is_idempotent() {
        let api = Arc::new(StubAuthApi::confirming(Role::Merchant));
        let store = signed_in_store(api).await;

        assert_eq!(store.add_to_collection(vec![item("a")]).await.unwrap(), 1);
        assert_eq!(store.add_to_collection(vec![item("a")]).await.unwrap(), 0);
        assert_eq!(store.collection().await.len(), 1);
    }

    #[tokio::test]
    async fn test_language_round_trip() {
        let api = Arc::new(StubAuthApi::confirming(Role::Merchant));
        let store = signed_in_store(api).await;
        store.set_language(Language::Ja).await.unwrap();
        assert_eq!(store.language().await, Some(Language::Ja));
    }
}
