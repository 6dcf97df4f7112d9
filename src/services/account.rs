//! Login, password-reset and onboarding-completion forms.
//!
//! Like registration, only [`ValidationError`]s are surfaced verbatim; provider
//! and store failures are logged and replaced with a generic message.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::register::normalize_email;
use crate::error::ValidationError;
use crate::provider::{IdentityProvider, Profile, ProfileStore, Session};

pub const LOGIN_FAILURE: &str = "Invalid email or password.";
pub const ONBOARDING_FAILURE: &str = "Could not save your profile. Please try again.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoginOutcome {
    /// The caller re-runs session resolution to pick the screen.
    SignedIn,
    Failed { message: String },
}

/// Sign in with email and password.
///
/// # Errors
///
/// [`ValidationError::MissingCredentials`] when either field is blank.
pub async fn login(
    provider: &dyn IdentityProvider,
    email: &str,
    password: &str,
) -> Result<LoginOutcome, ValidationError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingCredentials);
    }
    match provider.sign_in_with_password(email, password).await {
        Ok(session) => {
            info!(user_id = %session.user.id, "password sign-in");
            Ok(LoginOutcome::SignedIn)
        }
        Err(e) => {
            warn!(code = e.error_code(), error = %e, "password sign-in failed");
            Ok(LoginOutcome::Failed { message: LOGIN_FAILURE.to_owned() })
        }
    }
}

/// Send a recovery email. Provider failures are logged only, so the response
/// never reveals whether the address has an account.
///
/// # Errors
///
/// [`ValidationError::InvalidEmail`] for a malformed address.
pub async fn request_password_reset(
    provider: &dyn IdentityProvider,
    email: &str,
    redirect_to: &str,
) -> Result<(), ValidationError> {
    let email = normalize_email(email).ok_or(ValidationError::InvalidEmail)?;
    if let Err(e) = provider.reset_password_for_email(&email, redirect_to).await {
        warn!(code = e.error_code(), error = %e, "password reset request failed");
    }
    Ok(())
}

// =============================================================================
// ONBOARDING
// =============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OnboardingDetails {
    pub full_name: String,
    pub company_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl OnboardingDetails {
    /// # Errors
    ///
    /// [`ValidationError::MissingField`] naming the first blank required field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.full_name.trim().is_empty() {
            return Err(ValidationError::MissingField("full name"));
        }
        if self.company_name.trim().is_empty() {
            return Err(ValidationError::MissingField("company name"));
        }
        Ok(())
    }

    /// Merge into the existing row, keeping fields this form does not own.
    #[must_use]
    pub fn apply_to(&self, mut profile: Profile) -> Profile {
        profile.full_name = Some(self.full_name.trim().to_owned());
        profile.company_name = Some(self.company_name.trim().to_owned());
        profile.phone = non_blank(self.phone.as_deref());
        profile.position = non_blank(self.position.as_deref());
        profile.onboarding_completed = Some(true);
        profile
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OnboardingOutcome {
    Completed,
    /// Stay on onboarding.
    Failed { message: String },
}

fn onboarding_failed() -> OnboardingOutcome {
    OnboardingOutcome::Failed { message: ONBOARDING_FAILURE.to_owned() }
}

/// Save the onboarding form for the current session's user.
///
/// # Errors
///
/// A [`ValidationError`] before any network call when a required field is
/// blank.
pub async fn complete_onboarding(
    provider: &dyn IdentityProvider,
    profiles: &dyn ProfileStore,
    details: &OnboardingDetails,
) -> Result<OnboardingOutcome, ValidationError> {
    details.validate()?;

    let session: Session = match provider.get_session().await {
        Ok(Some(session)) => session,
        Ok(None) => {
            warn!("onboarding submitted without a session");
            return Ok(onboarding_failed());
        }
        Err(e) => {
            warn!(code = e.error_code(), error = %e, "session lookup failed");
            return Ok(onboarding_failed());
        }
    };
    let user_id = session.user.id;

    let existing = match profiles.fetch_profile(user_id, &session.access_token).await {
        Ok(row) => row.unwrap_or_else(|| Profile { id: user_id, ..Profile::default() }),
        Err(e) => {
            warn!(%user_id, code = e.error_code(), error = %e, "profile fetch failed");
            return Ok(onboarding_failed());
        }
    };

    let profile = details.apply_to(existing);
    match profiles.upsert_profile(&profile, &session.access_token).await {
        Ok(()) => {
            info!(%user_id, "onboarding completed");
            Ok(OnboardingOutcome::Completed)
        }
        Err(e) => {
            warn!(%user_id, code = e.error_code(), error = %e, "profile upsert failed");
            Ok(onboarding_failed())
        }
    }
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
