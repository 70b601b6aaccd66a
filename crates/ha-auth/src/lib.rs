//! Home Assistant users
//!
//! Integrations link their own records to Home Assistant users (a kid can be
//! tied to the account they log in with). They only ever need to list users,
//! so the lookup goes through the [`UserDirectory`] trait and the in-memory
//! [`UserStore`] provides it.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use ulid::Ulid;

/// A Home Assistant user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub is_owner: bool,
    pub is_active: bool,
    /// Internal accounts such as the supervisor, never shown to people
    pub system_generated: bool,
    pub credentials: Vec<Credential>,
}

/// A credential linked to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    pub auth_provider_type: String,
    pub auth_provider_id: Option<String>,
}

impl User {
    /// Active, non-system user with a local credential
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            name: name.into(),
            is_owner: false,
            is_active: true,
            system_generated: false,
            credentials: vec![Credential {
                auth_provider_type: "homeassistant".to_string(),
                auth_provider_id: None,
            }],
        }
    }

    pub fn owner(mut self) -> Self {
        self.is_owner = true;
        self
    }

    /// Mark as a system account without credentials
    pub fn system(mut self) -> Self {
        self.system_generated = true;
        self.credentials.clear();
        self
    }
}

/// Source of the current user list
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn async_get_users(&self) -> Vec<User>;
}

/// In-memory user store
#[derive(Default)]
pub struct UserStore {
    users: RwLock<HashMap<String, User>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with onboarding already complete: a single owner user
    pub fn new_onboarded() -> Self {
        let user = User::new("Owner").owner();
        Self {
            users: RwLock::new(HashMap::from([(user.id.clone(), user)])),
        }
    }

    pub async fn add_user(&self, user: User) {
        debug!("Adding user {} ({})", user.name, user.id);
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn remove_user(&self, user_id: &str) -> Option<User> {
        self.users.write().await.remove(user_id)
    }

    pub async fn get(&self, user_id: &str) -> Option<User> {
        self.users.read().await.get(user_id).cloned()
    }
}

#[async_trait]
impl UserDirectory for UserStore {
    /// Users ordered by name
    async fn async_get_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        users
    }
}
