use crate::config::{AuthConfig, AuthType};
use crate::credentials::AuthRequest;
use crate::durable_store::DurableStore;
use crate::error::AuthError;
use crate::memory_store::MemoryStore;
use crate::path_matcher::ExclusionList;
use crate::persistence::Persistence;
use crate::scheme::{AuthScheme, BasicAuth, NoAuth, SessionAuth};
use crate::session::UserId;
use crate::session_store::{SessionStore, SessionStoreImplementation};
use crate::users::UserDirectory;
use std::fmt::Debug;
use std::sync::Arc;

/// Session authentication over whichever backend the configuration selected.
pub type ConfiguredSessionAuth = SessionAuth<Box<dyn SessionStoreImplementation>>;

/// Everything an application needs at startup, built from an [`AuthConfig`].
#[derive(Debug, Clone)]
pub struct AuthSetup {
    /// The per-request check.
    pub policy: AuthPolicy,
    /// The session scheme the policy authenticates with, for logging users in and out.
    /// Absent unless the auth type uses sessions.
    pub sessions: Option<ConfiguredSessionAuth>,
}

impl AuthSetup {
    /// Build the scheme named by `config.auth_type`.
    ///
    /// `users` backs Basic authentication, and `persistence` backs database sessions;
    /// each is only used by the auth type that needs it.
    /// Expiring session types use `config`'s session duration,
    /// plain session authentication never expires.
    pub fn from_config<Directory, P>(
        config: &AuthConfig,
        users: Arc<Directory>,
        persistence: P,
    ) -> Self
    where
        Directory: UserDirectory + Debug + 'static,
        P: Persistence + 'static,
    {
        let exclusions = config.exclusions();
        let backend: Box<dyn SessionStoreImplementation> = match config.auth_type {
            AuthType::None => {
                log::warn!("Authentication is disabled, every request is allowed");
                return Self {
                    policy: AuthPolicy::disabled(),
                    sessions: None,
                };
            }
            AuthType::Auth => {
                return Self {
                    policy: AuthPolicy::new(Arc::new(NoAuth), exclusions),
                    sessions: None,
                };
            }
            AuthType::BasicAuth => {
                return Self {
                    policy: AuthPolicy::new(Arc::new(BasicAuth::new(users)), exclusions),
                    sessions: None,
                };
            }
            AuthType::SessionAuth | AuthType::SessionExpAuth => Box::new(MemoryStore::new()),
            AuthType::SessionDbAuth => Box::new(DurableStore::new(persistence)),
        };

        let duration = config.effective_session_duration();
        log::debug!("Authenticating with {}, session duration {duration}", config.auth_type);
        let store = Arc::new(SessionStore::new_with_duration(backend, duration));
        let sessions = SessionAuth::new(store, config.cookie_name().map(str::to_owned));
        Self {
            policy: AuthPolicy::new(Arc::new(sessions.clone()), exclusions),
            sessions: Some(sessions),
        }
    }
}

/// The decision about a single request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthOutcome {
    /// The request may proceed. `user` is the authenticated user, if authentication was required.
    Allow {
        /// The user making the request.
        user: Option<UserId>,
    },
    /// The request carries no credential.
    Unauthorized,
    /// The request carries a credential that does not resolve to a user.
    Forbidden,
}

impl AuthOutcome {
    /// The HTTP status code to answer a refused request with, or 200 for allowed ones.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Allow { .. } => 200,
            Self::Unauthorized => AuthError::MissingCredential.status_code(),
            Self::Forbidden => AuthError::UnresolvableUser.status_code(),
        }
    }

    /// Returns true if the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// The authenticated user, if any.
    pub fn user(&self) -> Option<&UserId> {
        match self {
            Self::Allow { user } => user.as_ref(),
            Self::Unauthorized | Self::Forbidden => None,
        }
    }

    /// Convert into a result, for handlers that prefer `?`.
    pub fn into_result(self) -> Result<Option<UserId>, AuthError> {
        match self {
            Self::Allow { user } => Ok(user),
            Self::Unauthorized => Err(AuthError::MissingCredential),
            Self::Forbidden => Err(AuthError::UnresolvableUser),
        }
    }
}

impl From<AuthError> for AuthOutcome {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredential => Self::Unauthorized,
            AuthError::UnresolvableUser => Self::Forbidden,
        }
    }
}

/// The per-request authentication check, meant to run before any handler.
///
/// 1. Without a scheme, every request is allowed.
/// 2. Requests to excluded paths are allowed.
/// 3. Requests without the scheme's credential are [unauthorized](AuthOutcome::Unauthorized).
/// 4. Requests whose credential does not resolve to a user are [forbidden](AuthOutcome::Forbidden).
/// 5. All other requests are allowed, carrying their user.
///
/// The policy holds no mutable state and can be shared freely between requests.
#[derive(Debug, Clone, Default)]
pub struct AuthPolicy {
    scheme: Option<Arc<dyn AuthScheme>>,
    exclusions: ExclusionList,
}

impl AuthPolicy {
    /// Authenticate with `scheme`, except for paths matched by `exclusions`.
    pub fn new(scheme: Arc<dyn AuthScheme>, exclusions: ExclusionList) -> Self {
        Self {
            scheme: Some(scheme),
            exclusions,
        }
    }

    /// The policy selected by `config`. See [`AuthSetup::from_config`], which also returns
    /// the session scheme needed to log users in.
    pub fn from_config<Directory, P>(
        config: &AuthConfig,
        users: Arc<Directory>,
        persistence: P,
    ) -> Self
    where
        Directory: UserDirectory + Debug + 'static,
        P: Persistence + 'static,
    {
        AuthSetup::from_config(config, users, persistence).policy
    }

    /// A policy that allows every request.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Returns true if requests are authenticated at all.
    pub fn is_enabled(&self) -> bool {
        self.scheme.is_some()
    }

    /// The scheme requests are authenticated with.
    pub fn scheme(&self) -> Option<&Arc<dyn AuthScheme>> {
        self.scheme.as_ref()
    }

    /// The exempted paths.
    pub fn exclusions(&self) -> &ExclusionList {
        &self.exclusions
    }

    /// Decide about `request`.
    pub async fn authenticate(&self, request: &dyn AuthRequest) -> AuthOutcome {
        let Some(scheme) = &self.scheme else {
            return AuthOutcome::Allow { user: None };
        };

        let path = request.path();
        if !self.exclusions.requires_auth(path) {
            log::trace!("{path} is excluded from authentication");
            return AuthOutcome::Allow { user: None };
        }

        if scheme.credential(request).is_none() {
            log::info!("Refusing {path}: {}", AuthError::MissingCredential);
            return AuthError::MissingCredential.into();
        }

        match scheme.current_user(request).await {
            Some(user) => {
                log::trace!("{path} requested by user {user}");
                AuthOutcome::Allow { user: Some(user) }
            }
            None => {
                log::info!("Refusing {path}: {}", AuthError::UnresolvableUser);
                AuthError::UnresolvableUser.into()
            }
        }
    }
}
