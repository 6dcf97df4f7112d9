//! Registration form submission.
//!
//! DESIGN
//! ======
//! Validation runs before any provider call and is the only failure shown
//! verbatim. An "already registered" answer is folded into the success path
//! by re-sending the confirmation email, so the form never reveals whether an
//! address has an account.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AuthError, ValidationError};
use crate::provider::{IdentityProvider, ResendRequest, ResendType, SignUpOutcome, SignUpRequest};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const GENERIC_FAILURE: &str = "Registration failed. Please try again.";

#[derive(Clone, Debug, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// What happened to the confirmation email.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    Sent,
    Resent,
    ResendFailed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegisterOutcome {
    /// Advance to `register-success`.
    CheckEmail { delivery: Delivery },
    /// Stay on the form with a generic message.
    Failed { message: String },
}

/// Trimmed, lowercased address with exactly one `@` and both halves present.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || normalized.contains(char::is_whitespace) {
        return None;
    }
    Some(normalized)
}

/// Local checks in display order. Returns the normalized email.
///
/// # Errors
///
/// The first failing check.
pub fn validate_registration(form: &RegistrationForm) -> Result<String, ValidationError> {
    if form.password != form.confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN });
    }
    normalize_email(&form.email).ok_or(ValidationError::InvalidEmail)
}

/// Submit the registration form.
///
/// # Errors
///
/// Returns a [`ValidationError`] before any network call when the form is
/// invalid. Provider failures are reported through [`RegisterOutcome::Failed`].
pub async fn register(
    provider: &dyn IdentityProvider,
    redirect_to: &str,
    form: &RegistrationForm,
) -> Result<RegisterOutcome, ValidationError> {
    let email = validate_registration(form)?;
    let request = SignUpRequest {
        email: email.clone(),
        password: form.password.clone(),
        redirect_to: redirect_to.to_owned(),
    };

    let outcome = match provider.sign_up(&request).await {
        Ok(SignUpOutcome::ConfirmationSent(identity)) => {
            info!(user_id = %identity.id, "registered; confirmation sent");
            RegisterOutcome::CheckEmail { delivery: Delivery::Sent }
        }
        Ok(SignUpOutcome::SignedIn(session)) => {
            // Projects with confirmation disabled sign the user in directly.
            info!(user_id = %session.user.id, "registered; signed in");
            RegisterOutcome::CheckEmail { delivery: Delivery::Sent }
        }
        Err(AuthError::AlreadyRegistered) => {
            let resend = ResendRequest { kind: ResendType::Signup, email, redirect_to: redirect_to.to_owned() };
            match provider.resend(&resend).await {
                Ok(()) => {
                    info!("already registered; confirmation re-sent");
                    RegisterOutcome::CheckEmail { delivery: Delivery::Resent }
                }
                Err(e) => {
                    warn!(code = e.error_code(), error = %e, "confirmation resend failed");
                    RegisterOutcome::CheckEmail { delivery: Delivery::ResendFailed }
                }
            }
        }
        Err(e) => {
            warn!(code = e.error_code(), error = %e, "sign-up failed");
            RegisterOutcome::Failed { message: GENERIC_FAILURE.to_owned() }
        }
    };
    Ok(outcome)
}

#[cfg(test)]
#[path = "register_test.rs"]
mod tests;
