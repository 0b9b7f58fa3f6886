use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The identifier of a user.
///
/// User records are owned by the application; sessions only reference them by id.
/// A user id is never empty.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a user id. Returns `None` if `id` is empty.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// The id as string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = &'static str;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id).ok_or("user ids must not be empty")
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl Debug for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserId({:?})", self.0)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The type of a session id.
pub type SessionIdType = [u8; blake3::OUT_LEN];

/// A session id.
///
/// The client only ever sees the cookie value; the store only ever sees its hash.
/// A leaked store therefore does not leak usable cookies.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SessionId(Box<SessionIdType>);

impl SessionId {
    /// Applies a cryptographic hash function on a cookie value to obtain the session id for that cookie.
    ///
    /// This is automatically done by the [`SessionStore`](crate::SessionStore), and this function is only public for test purposes.
    pub fn from_cookie_value(cookie_value: &str) -> Self {
        let hash = blake3::hash(cookie_value.as_bytes());
        Self(Box::new(hash.into()))
    }

    /// The lowercase hex rendering used when the id is persisted.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(*self.0).to_hex().to_string()
    }
}

impl From<SessionId> for SessionIdType {
    fn from(id: SessionId) -> Self {
        *id.0
    }
}

impl Debug for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionId({})", self.to_hex())
    }
}

/// A stored session: which user it belongs to, and since when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The hex rendering of the [`SessionId`].
    pub session_id: String,
    /// The user owning the session.
    pub user_id: UserId,
    /// The creation time. Always set by the session store; a record without it is corrupt.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Create the record of a session created at `created_at`.
    pub fn new(id: &SessionId, user_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id: id.to_hex(),
            user_id,
            created_at: Some(created_at),
        }
    }
}

/// How long sessions live after their creation, in seconds.
///
/// Zero or negative durations mean that sessions never expire.
/// Expiry is evaluated lazily when a session is looked up.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SessionDuration(i64);

impl SessionDuration {
    /// Sessions never expire.
    pub const NEVER: Self = Self(0);

    /// Sessions expire `secs` seconds after their creation.
    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Parse a duration given as decimal seconds with an optional sign.
    /// Returns `None` if `text` is not such a number.
    pub fn parse(text: &str) -> Option<Self> {
        text.parse().ok().map(Self)
    }

    /// The duration in seconds, as configured.
    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Returns true if sessions expire at all.
    pub fn expires(&self) -> bool {
        self.0 > 0
    }

    /// The moment a session created at `created_at` expires, or `None` if it never does.
    pub fn expiry_of(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.expires() {
            return None;
        }
        Duration::try_seconds(self.0).and_then(|ttl| created_at.checked_add_signed(ttl))
    }

    /// The user owning `record` at time `now`, or `None` if the record is expired or corrupt.
    pub fn resolve(&self, record: SessionRecord, now: DateTime<Utc>) -> Option<UserId> {
        let Some(created_at) = record.created_at else {
            log::warn!(
                "Session record {} has no creation time, treating it as absent",
                record.session_id
            );
            return None;
        };

        match self.expiry_of(created_at) {
            Some(expiry) if now > expiry => {
                log::trace!("Session {} expired at {expiry}", record.session_id);
                None
            }
            _ => Some(record.user_id),
        }
    }
}

impl Display for SessionDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.expires() {
            write!(f, "{}s", self.0)
        } else {
            f.write_str("never")
        }
    }
}
