//! External collaborators: the identity provider and the profile store.
//!
//! DESIGN
//! ======
//! Both are request/response seams behind `async_trait` objects so the
//! resolver runs unchanged against the Supabase HTTP clients ([`gotrue`],
//! [`rest`]) or the in-memory doubles used by demo mode and tests
//! ([`memory`]).
//!
//! Provider notifications travel over a `tokio::sync::broadcast` channel. A
//! subscriber that falls behind skips the lost events instead of failing,
//! which is safe because every event only triggers a re-read of external
//! state.

pub mod gotrue;
pub mod memory;
pub mod pkce;
pub mod rest;
pub mod types;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AuthError;
pub use types::{
    AuthEvent, Identity, Profile, ResendRequest, ResendType, Session, SignUpOutcome, SignUpRequest,
};

const EVENT_CHANNEL_CAPACITY: usize = 32;

// =============================================================================
// TRAITS
// =============================================================================

/// Identity provider operations used by the auth flow.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, refreshed transparently when expired.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Install a session from a token pair delivered in a redirect.
    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session, AuthError>;

    /// Exchange a PKCE authorization code for a session.
    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, AuthError>;

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, AuthError>;

    /// Re-send a confirmation email.
    async fn resend(&self, request: &ResendRequest) -> Result<(), AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Subscribe to `SIGNED_IN`, `SIGNED_OUT` and `TOKEN_REFRESHED`.
    fn on_auth_state_change(&self) -> AuthSubscription;
}

/// Keyed read/write access to profile rows.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` means the row does not exist.
    async fn fetch_profile(&self, user_id: Uuid, access_token: &str) -> Result<Option<Profile>, AuthError>;

    async fn upsert_profile(&self, profile: &Profile, access_token: &str) -> Result<(), AuthError>;
}

// =============================================================================
// EVENTS
// =============================================================================

/// Sending half of the provider's event channel.
#[derive(Clone, Debug)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEvents {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: AuthEvent) {
        debug!(event = event.name(), "auth state change");
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription { rx: self.tx.subscribe() }
    }
}

/// Receiving half handed to a subscriber. Dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    /// Next event, or `None` once the provider is gone.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "auth subscriber lagged; events skipped"),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take every event already queued without waiting.
    pub fn drain_pending(&mut self) -> Vec<AuthEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "auth subscriber lagged; events skipped"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return events,
            }
        }
    }

    /// Detach from the provider. Dropping the subscription does the same.
    pub fn unsubscribe(self) {
        drop(self.rx);
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
