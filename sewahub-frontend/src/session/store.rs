use crate::error::StoreError;
use crate::models::User;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

pub const TOKEN_KEY: &str = "auth_token";
pub const USER_KEY: &str = "user_data";

/// Persisted key/value storage for credentials, surviving page reloads.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Removes every listed key. Implementations keep going after a failed
    /// key and report the first failure.
    async fn clear(&self, keys: &[&str]) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }

    async fn clear(&self, keys: &[&str]) -> Result<(), StoreError> {
        (**self).clear(keys).await
    }
}

/// Reads the token/user pair. A missing half or an unreadable user record
/// counts as no credentials at all.
pub async fn load_credentials<S>(store: &S) -> Result<Option<(String, User)>, StoreError>
where
    S: CredentialStore + ?Sized,
{
    let token = store.get(TOKEN_KEY).await?.filter(|t| !t.is_empty());
    let raw_user = store.get(USER_KEY).await?;

    let (Some(token), Some(raw_user)) = (token, raw_user) else {
        return Ok(None);
    };

    match serde_json::from_str::<User>(&raw_user) {
        Ok(user) if user.validate().is_ok() => Ok(Some((token, user))),
        Ok(_) | Err(_) => {
            tracing::warn!("Discarding unreadable cached user record");
            Ok(None)
        }
    }
}

/// Writes both halves of a fresh login. Called by whoever performed the
/// login, before handing the grant to the synchronizer.
pub async fn persist_credentials<S>(store: &S, token: &str, user: &User) -> Result<(), StoreError>
where
    S: CredentialStore + ?Sized,
{
    store.set(TOKEN_KEY, token.to_string()).await?;
    persist_user(store, user).await
}

pub async fn persist_user<S>(store: &S, user: &User) -> Result<(), StoreError>
where
    S: CredentialStore + ?Sized,
{
    let raw = serde_json::to_string(user)
        .map_err(|e| StoreError(format!("Failed to encode user: {}", e)))?;
    store.set(USER_KEY, raw).await
}

pub async fn clear_credentials<S>(store: &S) -> Result<(), StoreError>
where
    S: CredentialStore + ?Sized,
{
    store.clear(&[TOKEN_KEY, USER_KEY]).await
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: DashMap<String, String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            self.entries.remove(*key);
        }
        Ok(())
    }
}

/// Store backed by the browser's cookie-identified server session.
#[derive(Clone, Debug)]
pub struct CookieSessionStore {
    session: tower_sessions::Session,
}

impl CookieSessionStore {
    pub fn new(session: tower_sessions::Session) -> Self {
        Self { session }
    }

    /// Issues a new session id, keeping the data. Used on login to avoid
    /// session fixation.
    pub async fn rotate_id(&self) -> Result<(), StoreError> {
        self.session
            .cycle_id()
            .await
            .map_err(|e| StoreError(format!("Failed to rotate session id: {}", e)))
    }
}

#[async_trait]
impl CredentialStore for CookieSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.session
            .get::<String>(key)
            .await
            .map_err(|e| StoreError(format!("Failed to read '{}': {}", key, e)))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.session
            .insert(key, value)
            .await
            .map_err(|e| StoreError(format!("Failed to write '{}': {}", key, e)))
    }

    async fn clear(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.session.remove_value(key).await {
                tracing::warn!(key = *key, error = %e, "Failed to clear session key");
                first_error.get_or_insert(StoreError(format!("Failed to clear '{}': {}", key, e)));
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn jane() -> User {
        User {
            id: "1".into(),
            fullname: "Jane Doe".into(),
            email: "jane@example.com".into(),
            role: Role::Customer,
            image_url: None,
            location: None,
        }
    }

    #[tokio::test]
    async fn persisted_credentials_load_back() {
        let store = MemoryCredentialStore::new();
        persist_credentials(&store, "abc", &jane()).await.unwrap();

        let (token, user) = load_credentials(&store).await.unwrap().unwrap();
        assert_eq!(token, "abc");
        assert_eq!(user, jane());
    }

    #[tokio::test]
    async fn half_a_credential_is_none() {
        let store = MemoryCredentialStore::new();
        store.set(TOKEN_KEY, "abc".into()).await.unwrap();
        assert!(load_credentials(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_user_record_is_none() {
        let store = MemoryCredentialStore::new();
        store.set(TOKEN_KEY, "abc".into()).await.unwrap();
        store.set(USER_KEY, "{not json".into()).await.unwrap();
        assert!(load_credentials(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_removes_both_keys() {
        let store = MemoryCredentialStore::new();
        persist_credentials(&store, "abc", &jane()).await.unwrap();
        clear_credentials(&store).await.unwrap();
        assert!(store.is_empty());
    }
}
