use crate::password::hash_password;
use crate::session::UserId;
use crate::{Error, Result};
use async_lock::RwLock;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The credentials of a user, as needed to check a login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// The user's id.
    pub id: UserId,
    /// The email the user logs in with.
    pub email: String,
    /// The salted hash of the user's password, see [`hash_password`].
    pub hashed_password: String,
}

/// Looks up users by their login email.
///
/// User records belong to the application; this is the narrow view authentication needs.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The user with the given email, if any.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
}

/// An in-process user directory.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Default::default()
    }

    /// Register a user, hashing `password`.
    /// Fails with [`Error::DuplicateUser`] if the email is taken.
    pub async fn register(&self, id: UserId, email: &str, password: &str) -> Result<UserRecord> {
        let mut users = self.users.write().await;
        if users.contains_key(email) {
            return Err(Error::DuplicateUser {
                email: email.to_owned(),
            });
        }
        let record = UserRecord {
            id,
            email: email.to_owned(),
            hashed_password: hash_password(password)?,
        };
        users.insert(email.to_owned(), record.clone());
        log::debug!("Registered user {}", record.id);
        Ok(record)
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(email).cloned())
    }
}
