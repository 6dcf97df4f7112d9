//! Session resolver: URL artifact + ambient session + profile → view.
//!
//! ARCHITECTURE
//! ============
//! Priority order, first match wins:
//!
//! 1. Parse the redirect artifact (query before hash fragment).
//! 2. `ErrorInfo` fails closed to login without any network call.
//! 3. `AuthCode` is exchanged for a session (PKCE).
//! 4. `TokenPair` is installed as the session; `type=signup` shows the
//!    one-time email-confirmed screen.
//! 5. Otherwise the ambient session is read and, when verified, handed to the
//!    profile gate.
//!
//! Every consumed artifact is stripped from the URL whatever the outcome, so a
//! second invocation degenerates to step 5. The output depends only on the
//! URL, the provider session and the profile row, never on earlier calls,
//! which makes overlapping mount/event invocations safe.
//!
//! ERROR HANDLING
//! ==============
//! The resolver has no error type. Exchange failures, unverified identities,
//! transport errors and malformed responses are logged and mapped to login.

use std::sync::Arc;

use tracing::{info, warn};

use super::gate::ProfileGate;
use crate::config::RefreshPolicy;
use crate::error::AuthError;
use crate::provider::{AuthEvent, IdentityProvider, Session};
use crate::redirect::{Location, RedirectArtifact, TokenKind};
use crate::state::view::{Resolution, ViewState};

pub struct SessionResolver {
    provider: Arc<dyn IdentityProvider>,
    gate: ProfileGate,
    location: Arc<Location>,
    refresh_policy: RefreshPolicy,
}

impl SessionResolver {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        gate: ProfileGate,
        location: Arc<Location>,
        refresh_policy: RefreshPolicy,
    ) -> Self {
        Self { provider, gate, location, refresh_policy }
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Full resolution, as run at mount.
    pub async fn resolve(&self) -> Resolution {
        match self.location.artifact() {
            RedirectArtifact::None => self.resolve_ambient().await,
            RedirectArtifact::ErrorInfo { code, description } => {
                self.location.strip_artifact();
                let e = AuthError::Redirect { code, description };
                warn!(code = e.error_code(), error = %e, "provider redirect error; login");
                Resolution::LOGIN
            }
            RedirectArtifact::AuthCode { code } => {
                let result = self.provider.exchange_code_for_session(&code).await;
                self.location.strip_artifact();
                match result {
                    Ok(session) => self.admit(session).await,
                    Err(e) => fail_closed("code exchange failed", &e),
                }
            }
            RedirectArtifact::TokenPair { access_token, refresh_token, kind } => {
                let result = self.provider.set_session(&access_token, &refresh_token).await;
                self.location.strip_artifact();
                match result {
                    Ok(session) if !session.user.is_verified() => unverified(&session),
                    Ok(session) if kind == TokenKind::Signup => {
                        info!(user_id = %session.user.id, "signup confirmed");
                        Resolution::View(ViewState::EmailConfirmed)
                    }
                    Ok(session) => self.admit(session).await,
                    Err(e) => fail_closed("token pair rejected", &e),
                }
            }
        }
    }

    /// Resolution for a provider event. `None` leaves the router untouched.
    pub async fn resolve_event(&self, event: &AuthEvent) -> Option<Resolution> {
        match event {
            AuthEvent::SignedOut => Some(Resolution::LOGIN),
            AuthEvent::TokenRefreshed(_) if self.refresh_policy == RefreshPolicy::KeepCurrent => None,
            AuthEvent::SignedIn(_) | AuthEvent::TokenRefreshed(_) => Some(self.resolve().await),
        }
    }

    async fn resolve_ambient(&self) -> Resolution {
        match self.provider.get_session().await {
            Ok(Some(session)) => self.admit(session).await,
            Ok(None) => Resolution::LOGIN,
            Err(e) => fail_closed("session lookup failed", &e),
        }
    }

    /// Verified identities go through the profile gate; others back to login.
    async fn admit(&self, session: Session) -> Resolution {
        if !session.user.is_verified() {
            return unverified(&session);
        }
        let resolution = self.gate.gate(&session).await.into();
        info!(user_id = %session.user.id, ?resolution, "session resolved");
        resolution
    }
}

fn unverified(session: &Session) -> Resolution {
    let e = AuthError::UnverifiedIdentity;
    info!(user_id = %session.user.id, code = e.error_code(), "identity not verified; login");
    Resolution::LOGIN
}

fn fail_closed(context: &'static str, e: &AuthError) -> Resolution {
    warn!(code = e.error_code(), error = %e, "{context}; login");
    Resolution::LOGIN
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
