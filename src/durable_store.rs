use crate::persistence::{Persistence, RecordFilter};
use crate::session::{SessionId, SessionRecord};
use crate::session_store::{SessionStoreImplementation, WriteSessionResult};
use crate::Result;
use async_trait::async_trait;

/// A session store backed by a [`Persistence`] collaborator.
///
/// Sessions survive restarts and can be shared between processes, as far as the collaborator allows.
/// Faults of the collaborator are returned as errors; the [`SessionStore`](crate::SessionStore)
/// turns them into "no such session" for lookups and destruction.
/// New records go through [`Persistence::insert`], so two sessions can never share an id,
/// even when they are created at the same time.
#[derive(Debug, Default)]
pub struct DurableStore<P> {
    persistence: P,
}

impl<P: Persistence> DurableStore<P> {
    /// Create a store keeping its sessions in `persistence`.
    pub fn new(persistence: P) -> Self {
        Self { persistence }
    }

    /// A reference to the collaborator.
    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    async fn find(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let filter = RecordFilter::any().with("session_id", id.to_hex());
        Ok(self.persistence.search(&filter).await?.into_iter().next())
    }
}

#[async_trait]
impl<P: Persistence> SessionStoreImplementation for DurableStore<P> {
    async fn create_record(
        &self,
        _id: &SessionId,
        record: SessionRecord,
    ) -> Result<WriteSessionResult> {
        if self.persistence.insert(&record).await? {
            Ok(WriteSessionResult::Ok(()))
        } else {
            Ok(WriteSessionResult::SessionIdExists)
        }
    }

    async fn read_record(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        self.find(id).await
    }

    async fn delete_record(&self, id: &SessionId) -> Result<bool> {
        match self.find(id).await? {
            Some(record) => {
                self.persistence.remove(&record).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self) -> Result {
        for record in self.persistence.search(&RecordFilter::any()).await? {
            self.persistence.remove(&record).await?;
        }
        Ok(())
    }
}
