use crate::path_matcher::{ExclusionList, DEFAULT_EXCLUDED_PATHS};
use crate::session::SessionDuration;
use crate::Result;
use serde::{Deserialize, Deserializer};
use std::fmt::{Display, Formatter};

/// Which [`AuthScheme`](crate::AuthScheme) to authenticate with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum AuthType {
    /// Do not authenticate at all.
    None,
    /// The base scheme: an `Authorization` header is required, but never accepted.
    #[default]
    Auth,
    /// HTTP Basic authentication.
    BasicAuth,
    /// Session cookies that never expire.
    SessionAuth,
    /// Session cookies expiring after the configured duration.
    SessionExpAuth,
    /// Persisted session cookies expiring after the configured duration.
    SessionDbAuth,
}

impl AuthType {
    /// Parse an auth type name.
    ///
    /// Unknown names fall back to [`AuthType::Auth`], which refuses every non-excluded request,
    /// so a typo never disables authentication.
    pub fn parse(name: &str) -> Self {
        match name {
            "none" => Self::None,
            "auth" => Self::Auth,
            "basic_auth" => Self::BasicAuth,
            "session_auth" => Self::SessionAuth,
            "session_exp_auth" => Self::SessionExpAuth,
            "session_db_auth" => Self::SessionDbAuth,
            other => {
                log::warn!("Unknown auth type {other:?}, falling back to {}", Self::Auth);
                Self::Auth
            }
        }
    }

    /// The configuration name of this auth type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Auth => "auth",
            Self::BasicAuth => "basic_auth",
            Self::SessionAuth => "session_auth",
            Self::SessionExpAuth => "session_exp_auth",
            Self::SessionDbAuth => "session_db_auth",
        }
    }

    /// Returns true for the session cookie based types.
    pub fn uses_sessions(&self) -> bool {
        matches!(
            self,
            Self::SessionAuth | Self::SessionExpAuth | Self::SessionDbAuth
        )
    }
}

impl From<String> for AuthType {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl Display for AuthType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Process-wide authentication settings, read once at startup.
///
/// # Example
///
/// ```rust
/// use session_gate::{AuthConfig, AuthType, SessionDuration};
///
/// let config = AuthConfig::from_toml_str(r#"
///     auth_type = "session_exp_auth"
///     session_name = "_my_session_id"
///     session_duration = "sixty"
/// "#).unwrap();
/// assert_eq!(config.auth_type, AuthType::SessionExpAuth);
/// // Unparseable durations fall back to sessions that never expire.
/// assert_eq!(config.session_duration, SessionDuration::NEVER);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// The authentication scheme.
    pub auth_type: AuthType,
    /// The name of the session cookie.
    pub session_name: Option<String>,
    /// How long sessions live, for the expiring session types.
    #[serde(deserialize_with = "lenient_duration")]
    pub session_duration: SessionDuration,
    /// Paths reachable without authentication.
    pub excluded_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_type: AuthType::default(),
            session_name: None,
            session_duration: SessionDuration::NEVER,
            excluded_paths: DEFAULT_EXCLUDED_PATHS.iter().map(|&path| path.to_owned()).collect(),
        }
    }
}

impl AuthConfig {
    /// Read the configuration from the environment variables `AUTH_TYPE`, `SESSION_NAME` and `SESSION_DURATION`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration from variables provided by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(auth_type) = lookup("AUTH_TYPE") {
            config.auth_type = AuthType::parse(&auth_type);
        }
        config.session_name = lookup("SESSION_NAME");
        if let Some(duration) = lookup("SESSION_DURATION") {
            config.session_duration = parse_duration_or_never(&duration);
        }
        config
    }

    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        Ok(toml::from_str(document)?)
    }

    /// The session cookie name, unless it is unset or empty.
    pub fn cookie_name(&self) -> Option<&str> {
        self.session_name.as_deref().filter(|name| !name.is_empty())
    }

    /// The duration sessions actually live: only the expiring session types honour the configured duration.
    pub fn effective_session_duration(&self) -> SessionDuration {
        match self.auth_type {
            AuthType::SessionExpAuth | AuthType::SessionDbAuth => self.session_duration,
            _ => SessionDuration::NEVER,
        }
    }

    /// The parsed exclusion rules.
    pub fn exclusions(&self) -> ExclusionList {
        ExclusionList::new(&self.excluded_paths)
    }
}

fn parse_duration_or_never(text: &str) -> SessionDuration {
    SessionDuration::parse(text).unwrap_or_else(|| {
        log::warn!("Session duration {text:?} is not a whole number of seconds, sessions will not expire");
        SessionDuration::NEVER
    })
}

fn lenient_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<SessionDuration, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(i64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(secs) => SessionDuration::from_secs(secs),
        RawDuration::Text(text) => parse_duration_or_never(&text),
        RawDuration::Other(_) => {
            log::warn!("Session duration is not a whole number of seconds, sessions will not expire");
            SessionDuration::NEVER
        }
    })
}
