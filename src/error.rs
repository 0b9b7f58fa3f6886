/// All errors that can occur in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A freshly generated session id already identifies a live session.
    /// Session ids must never be reused, so this points at a broken cookie generator
    /// and is not retried.
    #[error("the generated session id is already in use, the cookie generator does not produce unique values")]
    SessionIdCollision,

    /// A record filter referenced a field that the searched records do not have.
    /// This is a programming error in the caller.
    #[error("records have no field named {field:?}")]
    InvalidFilterField {
        /// The unknown field.
        field: String,
    },

    /// The persistence collaborator failed.
    /// The session store never lets this escape from lookups or destruction.
    #[error("session persistence failed: {0:#}")]
    StoreFault(anyhow::Error),

    /// A user with the given email is already registered.
    #[error("a user with email {email:?} already exists")]
    DuplicateUser {
        /// The email that is already taken.
        email: String,
    },

    /// Hashing a password failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Wrap a fault of the persistence collaborator.
    pub fn store_fault(error: impl Into<anyhow::Error>) -> Self {
        Self::StoreFault(error.into())
    }
}

/// Why a request was refused by the [`AuthPolicy`](crate::AuthPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum AuthError {
    /// The request carries no credential at all.
    #[error("Unauthorized")]
    MissingCredential,

    /// The request carries a credential, but it does not resolve to a known user.
    #[error("Forbidden")]
    UnresolvableUser,
}

impl AuthError {
    /// The HTTP status code the routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingCredential => 401,
            Self::UnresolvableUser => 403,
        }
    }
}

mod expect_impl_error {
    trait ExpectImplError: std::error::Error + Send + Sync + 'static {}

    impl ExpectImplError for super::Error {}
    impl ExpectImplError for super::AuthError {}
}
