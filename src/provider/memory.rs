//! In-memory identity provider and profile store.
//!
//! SYSTEM CONTEXT
//! ==============
//! Backs demo mode (no Supabase project needed) and doubles as the test
//! collaborator: every trait call is counted, and the provider can be taken
//! offline or made to fail resends to exercise the fail-closed paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use super::{
    AuthEvent, AuthEvents, AuthSubscription, Identity, IdentityProvider, Profile, ProfileStore, ResendRequest,
    Session, SignUpOutcome, SignUpRequest,
};
use crate::error::AuthError;

pub const DEMO_EMAIL: &str = "demo@seisan.example";
pub const DEMO_PASSWORD: &str = "demo-password";
const CONFIRMED_AT: &str = "2024-01-01T00:00:00Z";

/// Outbound email the provider would have sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentEmail {
    pub kind: &'static str,
    pub email: String,
    pub redirect_to: String,
}

struct MemoryUser {
    identity: Identity,
    password: String,
}

#[derive(Default)]
struct MemoryAuth {
    users: HashMap<Uuid, MemoryUser>,
    codes: HashMap<String, Uuid>,
    token_pairs: HashMap<(String, String), Uuid>,
    session: Option<Session>,
    offline: bool,
    fail_resend: bool,
    outbox: Vec<SentEmail>,
}

impl MemoryAuth {
    fn user_by_email(&self, email: &str) -> Option<&MemoryUser> {
        self.users
            .values()
            .find(|u| u.identity.email.eq_ignore_ascii_case(email))
    }

    fn new_session(&mut self, user_id: Uuid) -> Option<Session> {
        let identity = self.users.get(&user_id)?.identity.clone();
        let session = Session {
            access_token: format!("mem-at-{}", Uuid::new_v4()),
            refresh_token: format!("mem-rt-{}", Uuid::new_v4()),
            expires_at: None,
            user: identity,
        };
        self.session = Some(session.clone());
        Some(session)
    }
}

// =============================================================================
// IDENTITY PROVIDER
// =============================================================================

#[derive(Default)]
pub struct MemoryIdentityProvider {
    inner: Mutex<MemoryAuth>,
    events: AuthEvents,
    calls: AtomicUsize,
    exchanges: AtomicUsize,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryAuth> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a provider round trip and fail it when offline.
    fn call(&self) -> Result<MutexGuard<'_, MemoryAuth>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let inner = self.lock();
        if inner.offline {
            return Err(AuthError::Network("provider unreachable".into()));
        }
        Ok(inner)
    }

    pub fn add_user(&self, email: &str, password: &str, verified: bool) -> Identity {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            email_confirmed_at: verified.then(|| CONFIRMED_AT.to_owned()),
        };
        self.lock().users.insert(
            identity.id,
            MemoryUser { identity: identity.clone(), password: password.to_owned() },
        );
        identity
    }

    pub fn confirm_email(&self, user_id: Uuid) {
        if let Some(user) = self.lock().users.get_mut(&user_id) {
            user.identity.email_confirmed_at = Some(CONFIRMED_AT.to_owned());
        }
    }

    /// Issue a one-time PKCE code for `user_id`.
    pub fn issue_code(&self, user_id: Uuid) -> String {
        let code = Uuid::new_v4().simple().to_string();
        self.insert_code(&code, user_id);
        code
    }

    pub fn insert_code(&self, code: &str, user_id: Uuid) {
        self.lock().codes.insert(code.to_owned(), user_id);
    }

    /// Issue a token pair as it would appear in a redirect URL.
    pub fn issue_token_pair(&self, user_id: Uuid) -> (String, String) {
        let pair = (format!("mem-at-{}", Uuid::new_v4()), format!("mem-rt-{}", Uuid::new_v4()));
        self.lock().token_pairs.insert(pair.clone(), user_id);
        pair
    }

    /// Install an ambient session without emitting an event.
    pub fn start_session(&self, user_id: Uuid) -> Option<Session> {
        self.lock().new_session(user_id)
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn set_fail_resend(&self, fail: bool) {
        self.lock().fail_resend = fail;
    }

    /// Emit an event as if it came from the provider.
    pub fn emit(&self, event: AuthEvent) {
        self.events.emit(event);
    }

    #[must_use]
    pub fn network_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    #[must_use]
    pub fn outbox(&self) -> Vec<SentEmail> {
        self.lock().outbox.clone()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let inner = self.call()?;
        let Some(session) = inner.session.clone() else {
            return Ok(None);
        };
        // Reflect confirmation that happened after the session was issued.
        let user = inner
            .users
            .get(&session.user.id)
            .map_or(session.user.clone(), |u| u.identity.clone());
        Ok(Some(Session { user, ..session }))
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session, AuthError> {
        let session = {
            let mut inner = self.call()?;
            let key = (access_token.to_owned(), refresh_token.to_owned());
            let Some(user_id) = inner.token_pairs.remove(&key) else {
                return Err(AuthError::Exchange("invalid token pair".into()));
            };
            inner
                .new_session(user_id)
                .ok_or_else(|| AuthError::Exchange("user not found".into()))?
        };
        self.events.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, AuthError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        let session = {
            let mut inner = self.call()?;
            let Some(user_id) = inner.codes.remove(code) else {
                return Err(AuthError::Exchange("invalid or expired code".into()));
            };
            inner
                .new_session(user_id)
                .ok_or_else(|| AuthError::Exchange("user not found".into()))?
        };
        self.events.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, AuthError> {
        let identity = {
            let mut inner = self.call()?;
            if inner.user_by_email(&request.email).is_some() {
                return Err(AuthError::AlreadyRegistered);
            }
            let identity = Identity { id: Uuid::new_v4(), email: request.email.clone(), email_confirmed_at: None };
            inner.users.insert(
                identity.id,
                MemoryUser { identity: identity.clone(), password: request.password.clone() },
            );
            inner.outbox.push(SentEmail {
                kind: "signup",
                email: request.email.clone(),
                redirect_to: request.redirect_to.clone(),
            });
            identity
        };
        Ok(SignUpOutcome::ConfirmationSent(identity))
    }

    async fn resend(&self, request: &ResendRequest) -> Result<(), AuthError> {
        let mut inner = self.call()?;
        if inner.fail_resend {
            return Err(AuthError::Api { status: 429, message: "email rate limit exceeded".into() });
        }
        inner.outbox.push(SentEmail {
            kind: "resend",
            email: request.email.clone(),
            redirect_to: request.redirect_to.clone(),
        });
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = {
            let mut inner = self.call()?;
            let Some(user) = inner.user_by_email(email).filter(|u| u.password == password) else {
                return Err(AuthError::InvalidCredentials);
            };
            let user_id = user.identity.id;
            inner
                .new_session(user_id)
                .ok_or(AuthError::InvalidCredentials)?
        };
        self.events.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let mut inner = self.call()?;
        if inner.user_by_email(email).is_some() {
            inner.outbox.push(SentEmail {
                kind: "recovery",
                email: email.to_owned(),
                redirect_to: redirect_to.to_owned(),
            });
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.call()?.session.take();
        self.events.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.events.subscribe()
    }
}

// =============================================================================
// PROFILE STORE
// =============================================================================

#[derive(Default)]
pub struct MemoryProfileStore {
    rows: Mutex<HashMap<Uuid, Profile>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<Uuid, Profile>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, profile: Profile) {
        self.rows().insert(profile.id, profile);
    }

    #[must_use]
    pub fn get(&self, user_id: Uuid) -> Option<Profile> {
        self.rows().get(&user_id).cloned()
    }

    /// Make every subsequent call fail like an unreachable store.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn call(&self) -> Result<(), AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::ProfileFetch("profile store unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch_profile(&self, user_id: Uuid, _access_token: &str) -> Result<Option<Profile>, AuthError> {
        self.call()?;
        Ok(self.get(user_id))
    }

    async fn upsert_profile(&self, profile: &Profile, _access_token: &str) -> Result<(), AuthError> {
        self.call()?;
        self.insert(profile.clone());
        Ok(())
    }
}

/// Seed the demo account: verified, onboarding not yet completed.
pub fn seed_demo(provider: &MemoryIdentityProvider) -> Identity {
    provider.add_user(DEMO_EMAIL, DEMO_PASSWORD, true)
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
