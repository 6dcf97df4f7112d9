//! Provider-neutral identity, session and profile records.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seconds before `expires_at` at which a session is already treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 10;

// =============================================================================
// IDENTITY & SESSION
// =============================================================================

/// External-provider user record. Only the provider mutates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: String,
    /// `None` until the email address is confirmed.
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.email_confirmed_at.as_deref().is_some_and(|at| !at.is_empty())
    }
}

/// Credential pair plus the identity it belongs to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds. `None` when the provider did not say.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: Identity,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now_unix: i64) -> bool {
        self.expires_at
            .is_some_and(|exp| exp - EXPIRY_MARGIN_SECS <= now_unix)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(time::OffsetDateTime::now_utc().unix_timestamp())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Provider notifications consumed by the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
}

impl AuthEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed(_) => "TOKEN_REFRESHED",
        }
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Clone, Debug)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub redirect_to: String,
}

/// Result of a sign-up call. Without auto-confirm there is no session yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignUpOutcome {
    ConfirmationSent(Identity),
    SignedIn(Session),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResendType {
    Signup,
    EmailChange,
}

#[derive(Clone, Debug)]
pub struct ResendRequest {
    pub kind: ResendType,
    pub email: String,
    pub redirect_to: String,
}

// =============================================================================
// PROFILE
// =============================================================================

/// Application-owned profile row keyed by `Identity::id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub default_org_id: Option<Uuid>,
    #[serde(default)]
    pub onboarding_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Profile {
    /// `null` counts as incomplete.
    #[must_use]
    pub fn onboarding_done(&self) -> bool {
        self.onboarding_completed == Some(true)
    }
}
