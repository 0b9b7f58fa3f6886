use crate::session::{SessionDuration, SessionId, SessionRecord, UserId};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cookie_generator::{DefaultSessionCookieGenerator, SessionCookieGenerator};
use std::fmt::Debug;

pub(crate) mod cookie_generator;

/// An async session store.
///
/// This is the user-facing interface of the session store.
/// It abstracts over CRUD-based database operations on sessions, and adds what every backend
/// shares: generating cookies, hashing them into session ids, and expiring sessions.
///
/// Lookups and destruction never fail. Faults of the backend are logged and reported as
/// "no such session", so a broken database locks users out instead of letting them in.
#[derive(Debug)]
pub struct SessionStore<
    Implementation,
    CookieGenerator = DefaultSessionCookieGenerator,
    const COOKIE_LENGTH: usize = 64,
> {
    implementation: Implementation,
    cookie_generator: CookieGenerator,
    duration: SessionDuration,
}

impl<Implementation: SessionStoreImplementation>
    SessionStore<Implementation, DefaultSessionCookieGenerator>
{
    /// Create a new session store with the given implementation, whose sessions never expire.
    pub fn new(implementation: Implementation) -> Self {
        Self::new_with_cookie_generator(
            implementation,
            DefaultSessionCookieGenerator::default(),
            SessionDuration::NEVER,
        )
    }

    /// Create a new session store with the given implementation and session duration.
    pub fn new_with_duration(implementation: Implementation, duration: SessionDuration) -> Self {
        Self::new_with_cookie_generator(
            implementation,
            DefaultSessionCookieGenerator::default(),
            duration,
        )
    }
}

impl<
        Implementation: SessionStoreImplementation,
        CookieGenerator: SessionCookieGenerator<COOKIE_LENGTH>,
        const COOKIE_LENGTH: usize,
    > SessionStore<Implementation, CookieGenerator, COOKIE_LENGTH>
{
    /// Create a new session store with the given implementation, cookie generator and session duration.
    pub fn new_with_cookie_generator(
        implementation: Implementation,
        cookie_generator: CookieGenerator,
        duration: SessionDuration,
    ) -> Self {
        Self {
            implementation,
            cookie_generator,
            duration,
        }
    }

    /// How long sessions of this store live.
    pub fn duration(&self) -> SessionDuration {
        self.duration
    }

    /// Create a session for `user_id`, returning the cookie value to hand to the client.
    ///
    /// Returns `Ok(None)` if there is no user, as sessions are never created for nobody.
    /// Fails with [`Error::SessionIdCollision`] if the generated id is already taken, and with
    /// the backend's error if the session could not be written.
    pub async fn create_session(&self, user_id: Option<&UserId>) -> Result<Option<String>> {
        self.create_session_at(user_id, Utc::now()).await
    }

    /// Like [`create_session`](Self::create_session), but with an explicit creation time.
    pub async fn create_session_at(
        &self,
        user_id: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let Some(user_id) = user_id else {
            return Ok(None);
        };

        let cookie_value = self.cookie_generator.generate_cookie();
        let id = SessionId::from_cookie_value(&cookie_value);
        let record = SessionRecord::new(&id, user_id.clone(), now);

        match self.implementation.create_record(&id, record).await? {
            WriteSessionResult::Ok(()) => {
                log::debug!("Created session {id:?} for user {user_id}");
                Ok(Some(cookie_value))
            }
            WriteSessionResult::SessionIdExists => {
                log::error!("Generated session id {id:?} is already in use");
                Err(Error::SessionIdCollision)
            }
        }
    }

    /// The user owning the session identified by `cookie_value`.
    ///
    /// Returns `None` if there is no cookie, no such session, or the session is expired.
    pub async fn user_id_for_session(&self, cookie_value: Option<&str>) -> Option<UserId> {
        self.user_id_for_session_at(cookie_value, Utc::now()).await
    }

    /// Like [`user_id_for_session`](Self::user_id_for_session), but evaluates expiry at `now`.
    pub async fn user_id_for_session_at(
        &self,
        cookie_value: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<UserId> {
        let id = SessionId::from_cookie_value(cookie_value?);
        match self.implementation.read_record(&id).await {
            Ok(Some(record)) => self.duration.resolve(record, now),
            Ok(None) => {
                log::trace!("No session {id:?}");
                None
            }
            Err(error) => {
                log::warn!("Could not look up session {id:?}: {error}");
                None
            }
        }
    }

    /// Destroy the session identified by `cookie_value`.
    ///
    /// Returns true if a session was removed, and false if there was no cookie, no such session,
    /// or the backend failed.
    pub async fn destroy_session(&self, cookie_value: Option<&str>) -> bool {
        let Some(cookie_value) = cookie_value else {
            return false;
        };
        let id = SessionId::from_cookie_value(cookie_value);
        match self.implementation.delete_record(&id).await {
            Ok(true) => {
                log::debug!("Destroyed session {id:?}");
                true
            }
            Ok(false) => false,
            Err(error) => {
                log::warn!("Could not destroy session {id:?}: {error}");
                false
            }
        }
    }

    /// Empties the entire store, deleting all sessions.
    pub async fn clear_store(&self) -> Result {
        self.implementation.clear().await
    }

    /// A reference to the backend.
    pub fn inner(&self) -> &Implementation {
        &self.implementation
    }

    /// Consume the store, returning the backend.
    pub fn into_inner(self) -> Implementation {
        self.implementation
    }
}

/// This is the backend-facing interface of the session store.
/// It defines simple [CRUD]-methods on session records.
///
/// The session id is expected to be the primary key, uniquely identifying a session.
/// Implementations are shared between concurrent requests and must synchronise internally.
///
/// [CRUD]: https://en.wikipedia.org/wiki/Create,_read,_update_and_delete
#[async_trait]
pub trait SessionStoreImplementation: Debug + Send + Sync {
    /// Create the session `id` with the given `record`, unless `id` already exists.
    async fn create_record(&self, id: &SessionId, record: SessionRecord)
        -> Result<WriteSessionResult>;

    /// Read the record of the session `id`, regardless of expiry.
    async fn read_record(&self, id: &SessionId) -> Result<Option<SessionRecord>>;

    /// Delete the session `id`. Returns true if it existed.
    async fn delete_record(&self, id: &SessionId) -> Result<bool>;

    /// Delete all sessions in the store.
    async fn clear(&self) -> Result;
}

#[async_trait]
impl<Implementation: SessionStoreImplementation + ?Sized> SessionStoreImplementation
    for Box<Implementation>
{
    async fn create_record(
        &self,
        id: &SessionId,
        record: SessionRecord,
    ) -> Result<WriteSessionResult> {
        (**self).create_record(id, record).await
    }

    async fn read_record(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        (**self).read_record(id).await
    }

    async fn delete_record(&self, id: &SessionId) -> Result<bool> {
        (**self).delete_record(id).await
    }

    async fn clear(&self) -> Result {
        (**self).clear().await
    }
}

/// The result of writing a session, indicating if the session could be written, or if the id collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSessionResult<OkData = ()> {
    /// The session could be written without id collision.
    Ok(OkData),
    /// The session could not be written, because the chosen id already exists.
    SessionIdExists,
}
