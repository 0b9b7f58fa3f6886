use crate::session::{SessionDuration, SessionId, SessionRecord};
use crate::session_store::{SessionStoreImplementation, WriteSessionResult};
use crate::Result;
use async_lock::RwLock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// # in-memory session store
/// Because there is no external
/// persistence, this session store is ephemeral and will be cleared
/// on server restart.
///
/// # ***READ THIS BEFORE USING IN A PRODUCTION DEPLOYMENT***
///
/// Storing sessions only in memory brings the following problems:
///
/// 1. All sessions must fit in available memory (important for high load services)
/// 2. Expired sessions are only treated as absent, they are removed only if a client destroys its session,
///    or if [MemoryStore::cleanup] or [SessionStore::clear_store](crate::SessionStore::clear_store) is called.
///    If sessions are not cleaned up properly it might result in OOM
/// 3. All sessions will be lost on shutdown
/// 4. If the service is clustered particular session will be stored only on a single instance.
///    Use a [DurableStore](crate::DurableStore) to share sessions between processes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    session_map: RwLock<HashMap<SessionId, SessionRecord>>,
}

#[async_trait]
impl SessionStoreImplementation for MemoryStore {
    async fn create_record(
        &self,
        id: &SessionId,
        record: SessionRecord,
    ) -> Result<WriteSessionResult> {
        let mut session_map = self.session_map.write().await;
        // replace with `try_insert` once stable #82766
        if session_map.contains_key(id) {
            Ok(WriteSessionResult::SessionIdExists)
        } else {
            session_map.insert(id.clone(), record);
            Ok(WriteSessionResult::Ok(()))
        }
    }

    async fn read_record(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        Ok(self.session_map.read().await.get(id).cloned())
    }

    async fn delete_record(&self, id: &SessionId) -> Result<bool> {
        Ok(self.session_map.write().await.remove(id).is_some())
    }

    async fn clear(&self) -> Result {
        self.session_map.write().await.clear();
        Ok(())
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of sessions in the memory store, including expired ones.
    pub async fn len(&self) -> usize {
        self.session_map.read().await.len()
    }

    /// Returns true if the memory store is empty.
    pub async fn is_empty(&self) -> bool {
        self.session_map.read().await.is_empty()
    }

    /// Performs session cleanup, removing every session that is expired at `now` under `duration`,
    /// and every corrupt session. This should be run on an intermittent basis if this store is run
    /// for long enough that memory accumulation is a concern.
    ///
    /// Returns the number of removed sessions.
    pub async fn cleanup(&self, now: DateTime<Utc>, duration: SessionDuration) -> usize {
        log::trace!("Cleaning up memory store...");
        let mut session_map = self.session_map.write().await;
        let initial_len = session_map.len();
        session_map.retain(|_, record| match record.created_at {
            Some(created_at) => match duration.expiry_of(created_at) {
                Some(expiry) => expiry >= now,
                None => true,
            },
            None => false,
        });
        let removed = initial_len - session_map.len();
        log::trace!("Deleted {removed} expired sessions");
        removed
    }
}
