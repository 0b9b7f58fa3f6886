//! Session-based request authentication.
//!
//! This crate decides, for each incoming request, whether it may proceed, and if so on behalf of which user.
//! It does not route requests or render responses; the web framework calls [`AuthPolicy::authenticate`]
//! before dispatching, and answers with the status code of the returned [`AuthOutcome`].
//!
//! # Building blocks
//!
//! * [`ExclusionList`] decides which paths are reachable without authentication.
//! * [`AuthRequest`] is the view of a request needed to read its `Authorization` header and session cookie.
//! * [`SessionStore`] issues, resolves and destroys sessions, and expires them lazily on lookup.
//!   It stores them either in process memory ([`MemoryStore`]) or through a [`Persistence`]
//!   collaborator ([`DurableStore`]).
//! * [`AuthScheme`]s turn requests into users: [`NoAuth`], [`BasicAuth`] and [`SessionAuth`].
//! * [`AuthSetup::from_config`] picks the scheme and session backend named by an [`AuthConfig`].
//!
//! # Security
//!
//! Session cookies are 64 random alphanumeric characters. Stores only see the blake3 hash of a cookie,
//! so the contents of a store cannot be replayed as cookies.
//! Whenever something goes wrong while resolving a request, be it an unknown session, an expired session,
//! a corrupt record or a failing database, the request is treated as unauthenticated.
//!
//! # Example
//!
//! ```
//! use session_gate::{
//!     AuthOutcome, AuthPolicy, ExclusionList, MemoryStore, Request, SessionAuth, SessionDuration,
//!     SessionStore, UserId,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> session_gate::Result {
//! # async_std::task::block_on(async {
//! let store = Arc::new(SessionStore::new_with_duration(
//!     MemoryStore::new(),
//!     SessionDuration::from_secs(3600),
//! ));
//! let sessions = SessionAuth::new(store, Some("_my_session_id".to_owned()));
//! let policy = AuthPolicy::new(Arc::new(sessions.clone()), ExclusionList::default_api());
//!
//! // Log a user in. The returned value is sent to the client as cookie.
//! let user = UserId::new("42").unwrap();
//! let cookie_value = sessions.create_session(Some(&user)).await?.unwrap();
//!
//! let request = Request::new("/api/v1/users/me").with_cookie("_my_session_id", cookie_value);
//! assert_eq!(policy.authenticate(&request).await, AuthOutcome::Allow { user: Some(user) });
//!
//! // Log out again.
//! assert!(sessions.destroy_session(Some(&request)).await);
//! assert_eq!(policy.authenticate(&request).await, AuthOutcome::Forbidden);
//! #
//! # Ok(()) }) }
//! ```

#![forbid(unsafe_code)]
#![deny(
    future_incompatible,
    missing_debug_implementations,
    nonstandard_style,
    missing_docs
)]
#![warn(unreachable_pub, missing_copy_implementations, unused_qualifications)]

/// A result with this crate's [`Error`] and default return type of ()
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

mod config;
pub mod credentials;
mod durable_store;
mod error;
mod memory_store;
pub mod password;
mod path_matcher;
pub mod persistence;
pub mod scheme;
mod policy;
mod session;
mod session_store;
mod users;

pub use config::{AuthConfig, AuthType};
pub use credentials::{AuthRequest, Request};
pub use durable_store::DurableStore;
pub use error::{AuthError, Error};
pub use memory_store::MemoryStore;
pub use path_matcher::{requires_auth, ExclusionList, ExclusionRule, DEFAULT_EXCLUDED_PATHS};
pub use persistence::{
    FileTable, MemoryTable, Persistence, RecordFilter, SESSION_RECORD_FIELDS,
};
pub use policy::{AuthOutcome, AuthPolicy, AuthSetup, ConfiguredSessionAuth};
pub use scheme::{AuthScheme, BasicAuth, NoAuth, SessionAuth};
pub use session::{SessionDuration, SessionId, SessionIdType, SessionRecord, UserId};
pub use session_store::cookie_generator::{
    DebugSessionCookieGenerator, DefaultSessionCookieGenerator, SessionCookieGenerator,
};
pub use session_store::{SessionStore, SessionStoreImplementation, WriteSessionResult};
pub use users::{MemoryUserDirectory, UserDirectory, UserRecord};
