//! Authentication schemes, i.e. ways of turning a request into a user.

use crate::credentials::{
    authorization_header, decode_base64_authorization_header, extract_base64_authorization_header,
    extract_user_credentials, session_cookie, AuthRequest,
};
use crate::password::is_valid;
use crate::session::UserId;
use crate::session_store::cookie_generator::{
    DefaultSessionCookieGenerator, SessionCookieGenerator,
};
use crate::session_store::{SessionStore, SessionStoreImplementation};
use crate::users::UserDirectory;
use crate::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A way of authenticating requests.
///
/// A scheme names the credential a request must carry, and resolves requests to users.
/// The [`AuthPolicy`](crate::AuthPolicy) answers 401 if the credential is missing,
/// and 403 if it is present but no user can be resolved.
#[async_trait]
pub trait AuthScheme: Debug + Send + Sync {
    /// The credential this scheme authenticates with, if the request carries one.
    /// Defaults to the raw `Authorization` header.
    fn credential<'r>(&self, request: &'r dyn AuthRequest) -> Option<&'r str> {
        authorization_header(Some(request))
    }

    /// The user making `request`. Defaults to nobody.
    async fn current_user(&self, _request: &dyn AuthRequest) -> Option<UserId> {
        None
    }
}

/// The base scheme: requires an `Authorization` header, but never resolves a user.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

impl AuthScheme for NoAuth {}

/// HTTP Basic authentication against a [`UserDirectory`].
#[derive(Debug)]
pub struct BasicAuth<Directory> {
    users: Arc<Directory>,
}

impl<Directory> Clone for BasicAuth<Directory> {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
        }
    }
}

impl<Directory: UserDirectory> BasicAuth<Directory> {
    /// Authenticate users of `users`.
    pub fn new(users: Arc<Directory>) -> Self {
        Self { users }
    }

    /// The user with the given email, if `password` is theirs.
    pub async fn user_object_from_credentials(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Option<UserId> {
        let (email, password) = (email?, password?);
        let user = match self.users.find_by_email(email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                log::trace!("No user with email {email:?}");
                return None;
            }
            Err(error) => {
                log::warn!("Could not look up user {email:?}: {error}");
                return None;
            }
        };
        is_valid(&user.hashed_password, password).then_some(user.id)
    }
}

#[async_trait]
impl<Directory: UserDirectory + Debug> AuthScheme for BasicAuth<Directory> {
    async fn current_user(&self, request: &dyn AuthRequest) -> Option<UserId> {
        let header = authorization_header(Some(request))?;
        let encoded = extract_base64_authorization_header(header)?;
        let decoded = decode_base64_authorization_header(encoded)?;
        let (email, password) = extract_user_credentials(&decoded)?;
        self.user_object_from_credentials(Some(email), Some(password))
            .await
    }
}

/// Session cookie authentication.
///
/// Logging in creates a session in the shared store and hands its id to the client as cookie;
/// later requests are resolved through that cookie.
#[derive(Debug)]
pub struct SessionAuth<
    Implementation,
    CookieGenerator = DefaultSessionCookieGenerator,
    const COOKIE_LENGTH: usize = 64,
> {
    store: Arc<SessionStore<Implementation, CookieGenerator, COOKIE_LENGTH>>,
    cookie_name: Option<String>,
}

impl<Implementation, CookieGenerator, const COOKIE_LENGTH: usize> Clone
    for SessionAuth<Implementation, CookieGenerator, COOKIE_LENGTH>
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cookie_name: self.cookie_name.clone(),
        }
    }
}

impl<
        Implementation: SessionStoreImplementation,
        CookieGenerator: SessionCookieGenerator<COOKIE_LENGTH>,
        const COOKIE_LENGTH: usize,
    > SessionAuth<Implementation, CookieGenerator, COOKIE_LENGTH>
{
    /// Authenticate through sessions of `store`, carried in the cookie `cookie_name`.
    /// Without a cookie name no request can be authenticated.
    pub fn new(
        store: Arc<SessionStore<Implementation, CookieGenerator, COOKIE_LENGTH>>,
        cookie_name: Option<String>,
    ) -> Self {
        if cookie_name.as_deref().map_or(true, str::is_empty) {
            log::warn!("No session cookie name configured, session authentication will refuse every request");
        }
        Self { store, cookie_name }
    }

    /// The session store.
    pub fn store(&self) -> &Arc<SessionStore<Implementation, CookieGenerator, COOKIE_LENGTH>> {
        &self.store
    }

    /// The name of the session cookie.
    pub fn cookie_name(&self) -> Option<&str> {
        self.cookie_name.as_deref()
    }

    /// The value of the session cookie of `request`.
    pub fn session_cookie<'r, R: AuthRequest + ?Sized>(
        &self,
        request: Option<&'r R>,
    ) -> Option<&'r str> {
        session_cookie(request, self.cookie_name())
    }

    /// Log `user_id` in, returning the value of the session cookie to set.
    pub async fn create_session(&self, user_id: Option<&UserId>) -> Result<Option<String>> {
        self.store.create_session(user_id).await
    }

    /// Log out the session of `request`.
    /// Returns false if the request has no session cookie, or the session does not exist.
    pub async fn destroy_session<R: AuthRequest + ?Sized>(&self, request: Option<&R>) -> bool {
        self.store
            .destroy_session(self.session_cookie(request))
            .await
    }
}

#[async_trait]
impl<Implementation, CookieGenerator, const COOKIE_LENGTH: usize> AuthScheme
    for SessionAuth<Implementation, CookieGenerator, COOKIE_LENGTH>
where
    Implementation: SessionStoreImplementation + Debug,
    CookieGenerator: SessionCookieGenerator<COOKIE_LENGTH> + Debug,
{
    fn credential<'r>(&self, request: &'r dyn AuthRequest) -> Option<&'r str> {
        self.session_cookie(Some(request))
    }

    async fn current_user(&self, request: &dyn AuthRequest) -> Option<UserId> {
        self.store
            .user_id_for_session(self.session_cookie(Some(request)))
            .await
    }
}
