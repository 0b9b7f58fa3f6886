/// Paths that are reachable without authentication unless configured otherwise.
pub const DEFAULT_EXCLUDED_PATHS: [&str; 4] = [
    "/api/v1/status/",
    "/api/v1/unauthorized/",
    "/api/v1/forbidden/",
    "/api/v1/auth_session/login/",
];

/// A single parsed exclusion pattern.
///
/// Patterns ending in `*` exempt every path starting with the part before the `*`.
/// All other patterns exempt the pattern itself (without a trailing `/`) and everything below it.
/// Matching is case sensitive and performs no decoding or normalisation of the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExclusionRule {
    /// Matches any path that starts with the given prefix.
    Prefix(String),
    /// Matches the given base path, or the base path followed by `/` and anything.
    Directory(String),
}

impl ExclusionRule {
    /// Parse an exclusion pattern. Surrounding whitespace is ignored.
    /// Returns `None` for a blank pattern.
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return None;
        }

        Some(if let Some(prefix) = pattern.strip_suffix('*') {
            Self::Prefix(prefix.to_owned())
        } else if let Some(base) = pattern.strip_suffix('/') {
            Self::Directory(base.to_owned())
        } else {
            Self::Directory(pattern.to_owned())
        })
    }

    /// Returns true if `path` is exempted by this rule.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Directory(base) => match path.strip_prefix(base.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }
}

/// The exclusion rules of a policy, parsed once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    rules: Vec<ExclusionRule>,
}

impl ExclusionList {
    /// Parse the given patterns, skipping blank ones.
    pub fn new<S: AsRef<str>>(patterns: impl IntoIterator<Item = S>) -> Self {
        Self {
            rules: patterns
                .into_iter()
                .filter_map(|pattern| ExclusionRule::parse(pattern.as_ref()))
                .collect(),
        }
    }

    /// The rules built from [`DEFAULT_EXCLUDED_PATHS`].
    pub fn default_api() -> Self {
        Self::new(DEFAULT_EXCLUDED_PATHS)
    }

    /// The parsed rules.
    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    /// Returns true if there are no rules, i.e. every path requires authentication.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns true unless one of the rules exempts `path`.
    /// An empty path always requires authentication.
    pub fn requires_auth(&self, path: &str) -> bool {
        if path.is_empty() {
            return true;
        }
        !self.rules.iter().any(|rule| rule.matches(path))
    }
}

/// Decide whether `path` requires authentication given raw exclusion patterns.
///
/// A missing or empty path, and missing or empty exclusions, always require authentication.
pub fn requires_auth<S: AsRef<str>>(path: Option<&str>, excluded_paths: Option<&[S]>) -> bool {
    match (path, excluded_paths) {
        (Some(path), Some(excluded_paths)) if !path.is_empty() => {
            ExclusionList::new(excluded_paths).requires_auth(path)
        }
        _ => true,
    }
}
