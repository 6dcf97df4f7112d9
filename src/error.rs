//! Error taxonomy for the auth flow.
//!
//! ERROR HANDLING
//! ==============
//! Nothing on the resolution path reaches the caller as an error: the
//! resolver maps every variant here to a terminal view. The variants still
//! matter for logging and for the registration/login forms, which surface
//! [`ValidationError`] inline and hide the rest behind a generic message.

/// Failures reported by the identity provider or the profile store.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider reported an error code in the redirect URL.
    #[error("redirect error {code}: {description}")]
    Redirect { code: String, description: String },

    /// A code or token pair was rejected when exchanged for a session.
    #[error("session exchange rejected: {0}")]
    Exchange(String),

    /// The session is valid but the email has not been confirmed.
    #[error("email address not verified")]
    UnverifiedIdentity,

    /// The profile store could not be read.
    #[error("profile fetch failed: {0}")]
    ProfileFetch(String),

    /// Local form input was rejected before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transport-level failure (connect, timeout, malformed body).
    #[error("network failure: {0}")]
    Network(String),

    /// Sign-up was attempted for an email that already has an account.
    #[error("user already registered")]
    AlreadyRegistered,

    /// Password sign-in was rejected.
    #[error("invalid login credentials")]
    InvalidCredentials,

    /// The provider answered with a non-success status.
    #[error("provider response error: status {status}: {message}")]
    Api { status: u16, message: String },
}

impl AuthError {
    /// Stable machine-readable code for logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Redirect { .. } => "E_REDIRECT",
            Self::Exchange(_) => "E_EXCHANGE",
            Self::UnverifiedIdentity => "E_UNVERIFIED",
            Self::ProfileFetch(_) => "E_PROFILE_FETCH",
            Self::Validation(_) => "E_VALIDATION",
            Self::Network(_) => "E_NETWORK",
            Self::AlreadyRegistered => "E_ALREADY_REGISTERED",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::Api { .. } => "E_API",
        }
    }

    /// Whether repeating the same call could plausibly succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Api { status: 429 | 500..=599, .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Local form validation failures. These are the only errors shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Enter a valid email address.")]
    InvalidEmail,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Password must be at least {min} characters.")]
    PasswordTooShort { min: usize },
    #[error("Enter both email and password.")]
    MissingCredentials,
    #[error("Enter your {0}.")]
    MissingField(&'static str),
}

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: one of {vars} must be set")]
    MissingVar { vars: String },
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
