//! Session store contract.
//!
//! The session store is an on-device key-value preference store holding the
//! bearer token and basic profile fields. The remote gateway reads the token
//! from here when signing requests; implementations live in the storage crate
//! (file-backed) and here (in-memory, for tests and ephemeral use).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::Result;

pub mod keys {
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const USER_ID: &str = "user_id";
    pub const USERNAME: &str = "username";
    pub const USER_ROLES: &str = "user_roles";
}

/// Profile fields persisted after a successful login or registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProfile {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub roles: Vec<String>,
}

/// Roles are stored comma-joined.
pub fn encode_roles(roles: &[String]) -> String {
    roles.join(",")
}

/// Inverse of [`encode_roles`]; an empty string is an empty list, not `[""]`.
pub fn decode_roles(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|role| role.to_string()).collect()
}

/// Key-value session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;

    /// Current bearer token, if a session is active.
    async fn auth_token(&self) -> Result<Option<String>> {
        self.get(keys::AUTH_TOKEN).await
    }

    async fn user_id(&self) -> Result<Option<i64>> {
        Ok(self
            .get(keys::USER_ID)
            .await?
            .and_then(|raw| raw.parse().ok()))
    }

    async fn username(&self) -> Result<Option<String>> {
        self.get(keys::USERNAME).await
    }

    async fn roles(&self) -> Result<Vec<String>> {
        Ok(self
            .get(keys::USER_ROLES)
            .await?
            .map(|raw| decode_roles(&raw))
            .unwrap_or_default())
    }

    async fn save_profile(&self, profile: &SessionProfile) -> Result<()> {
        self.set(keys::AUTH_TOKEN, &profile.token).await?;
        self.set(keys::USER_ID, &profile.user_id.to_string()).await?;
        self.set(keys::USERNAME, &profile.username).await?;
        self.set(keys::USER_ROLES, &encode_roles(&profile.roles))
            .await
    }
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .expect("session store lock poisoned")
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .expect("session store lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.values
            .lock()
            .expect("session store lock poisoned")
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip_through_comma_join() {
        let roles = vec!["ROLE_ADMIN".to_string(), "ROLE_MUNICIPALIDAD".to_string()];
        assert_eq!(decode_roles(&encode_roles(&roles)), roles);
    }

    #[test]
    fn empty_string_decodes_to_empty_role_list() {
        assert_eq!(decode_roles(""), Vec::<String>::new());
        assert_eq!(encode_roles(&[]), "");
    }

    #[tokio::test]
    async fn profile_fields_are_readable_through_typed_helpers() {
        let store = MemorySessionStore::new();
        store
            .save_profile(&SessionProfile {
                token: "jwt-token".to_string(),
                user_id: 42,
                username: "maria".to_string(),
                roles: vec!["ROLE_EMPRENDEDOR".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(
            store.auth_token().await.unwrap(),
            Some("jwt-token".to_string())
        );
        assert_eq!(store.user_id().await.unwrap(), Some(42));
        assert_eq!(store.username().await.unwrap(), Some("maria".to_string()));
        assert_eq!(
            store.roles().await.unwrap(),
            vec!["ROLE_EMPRENDEDOR".to_string()]
        );

        store.clear().await.unwrap();
        assert_eq!(store.auth_token().await.unwrap(), None);
        assert!(store.roles().await.unwrap().is_empty());
    }
}
