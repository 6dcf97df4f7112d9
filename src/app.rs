//! Auth controller: owns the view router and wires the resolver to it.
//!
//! ARCHITECTURE
//! ============
//! ```text
//!   mount ──▶ resolver.resolve() ──┐
//!                                  ├──▶ watch<ViewRouter>  (last write wins)
//!   provider events ──▶ listener ──┘
//!        (broadcast)     resolver.resolve_event()
//! ```
//!
//! The subscription is taken before the mount resolution runs. Events emitted
//! while mount is in flight (the exchange's own `SIGNED_IN`, typically) are
//! drained afterwards: a trailing `SIGNED_OUT` is applied, anything else is
//! dropped because mount already read the state it describes. The listener
//! task starts only after that, so the one-time email-confirmed screen is not
//! immediately overwritten by a re-resolution.
//!
//! TEARDOWN
//! ========
//! [`AuthController::teardown`] aborts the listener, which drops the
//! subscription. It runs on drop as well.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::error::ValidationError;
use crate::provider::{AuthEvent, AuthSubscription, IdentityProvider, ProfileStore};
use crate::redirect::Location;
use crate::services::account::{self, LoginOutcome, OnboardingDetails, OnboardingOutcome};
use crate::services::gate::ProfileGate;
use crate::services::register::{self, RegisterOutcome, RegistrationForm};
use crate::services::resolver::SessionResolver;
use crate::state::router::ViewRouter;
use crate::state::view::{Resolution, ViewState};
use crate::storage::{Storage, clear_local_cache};

/// Absolute redirect targets embedded in outbound emails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectTargets {
    pub email_confirmed: String,
    pub password_reset: String,
}

impl RedirectTargets {
    #[must_use]
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            email_confirmed: config.redirect_to(ViewState::EmailConfirmed.as_str()),
            password_reset: config.redirect_to(ViewState::PasswordReset.as_str()),
        }
    }
}

pub struct AuthController {
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    storage: Arc<dyn Storage>,
    resolver: Arc<SessionResolver>,
    redirects: RedirectTargets,
    router: Arc<watch::Sender<ViewRouter>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AuthController {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        storage: Arc<dyn Storage>,
        location: Arc<Location>,
        config: &GateConfig,
    ) -> Self {
        let gate = ProfileGate::new(profiles.clone(), storage.clone());
        let resolver = SessionResolver::new(provider.clone(), gate, location, config.refresh_policy);
        let (router, _) = watch::channel(ViewRouter::default());
        Self {
            provider,
            profiles,
            storage,
            resolver: Arc::new(resolver),
            redirects: RedirectTargets::from_config(config),
            router: Arc::new(router),
            listener: Mutex::new(None),
        }
    }

    /// Current router state.
    #[must_use]
    pub fn router(&self) -> ViewRouter {
        self.router.borrow().clone()
    }

    /// Receiver notified on every router write.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ViewRouter> {
        self.router.subscribe()
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        self.resolver.location()
    }

    /// Resolve the initial view and start listening for provider events.
    /// Returns the resolution now shown. Calling it again while mounted
    /// restarts the listener.
    pub async fn mount(&self) -> Resolution {
        let mut subscription = self.provider.on_auth_state_change();

        let resolution = self.resolver.resolve().await;
        apply(&self.router, resolution);

        let pending = subscription.drain_pending();
        if matches!(pending.last(), Some(AuthEvent::SignedOut)) {
            clear_local_cache(self.storage.as_ref());
            apply(&self.router, Resolution::LOGIN);
        } else if !pending.is_empty() {
            debug!(dropped = pending.len(), "events raised during mount dropped");
        }

        let handle = tokio::spawn(listen(
            subscription,
            self.resolver.clone(),
            self.storage.clone(),
            self.router.clone(),
        ));
        if let Some(previous) = self.listener_slot().replace(handle) {
            previous.abort();
        }

        let current = current_resolution(&self.router());
        info!(resolution = ?current, "auth mounted");
        current
    }

    /// Stop reacting to provider events. Idempotent.
    pub fn teardown(&self) {
        if let Some(handle) = self.listener_slot().take() {
            handle.abort();
            debug!("auth listener stopped");
        }
    }

    fn listener_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Explicit user navigation between unauthenticated screens.
    pub fn navigate(&self, view: ViewState) {
        self.router.send_modify(|r| r.navigate(view));
    }

    pub fn navigate_named(&self, name: &str) {
        self.router.send_modify(|r| r.navigate_named(name));
    }

    // =========================================================================
    // FORM FLOWS
    // =========================================================================

    /// Submit registration; success moves to `register-success`.
    ///
    /// # Errors
    ///
    /// Form validation failures, before any network call.
    pub async fn register(&self, form: &RegistrationForm) -> Result<RegisterOutcome, ValidationError> {
        let outcome = register::register(self.provider.as_ref(), &self.redirects.email_confirmed, form).await?;
        if matches!(outcome, RegisterOutcome::CheckEmail { .. }) {
            self.navigate(ViewState::RegisterSuccess);
        }
        Ok(outcome)
    }

    /// Password sign-in followed by a full resolution.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingCredentials`] for blank input.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ValidationError> {
        let outcome = account::login(self.provider.as_ref(), email, password).await?;
        if outcome == LoginOutcome::SignedIn {
            let resolution = self.resolver.resolve().await;
            apply(&self.router, resolution);
        }
        Ok(outcome)
    }

    /// # Errors
    ///
    /// [`ValidationError::InvalidEmail`] for a malformed address.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ValidationError> {
        account::request_password_reset(self.provider.as_ref(), email, &self.redirects.password_reset).await
    }

    /// Save onboarding details; success moves to the dashboard.
    ///
    /// # Errors
    ///
    /// Form validation failures, before any network call.
    pub async fn complete_onboarding(&self, details: &OnboardingDetails) -> Result<OnboardingOutcome, ValidationError> {
        let outcome = account::complete_onboarding(self.provider.as_ref(), self.profiles.as_ref(), details).await?;
        if outcome == OnboardingOutcome::Completed {
            apply(&self.router, Resolution::Dashboard);
        }
        Ok(outcome)
    }

    /// Sign out locally even when the provider call fails.
    pub async fn sign_out(&self) {
        if let Err(e) = self.provider.sign_out().await {
            warn!(code = e.error_code(), error = %e, "provider sign-out failed; clearing locally");
        }
        clear_local_cache(self.storage.as_ref());
        apply(&self.router, Resolution::LOGIN);
    }
}

impl Drop for AuthController {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn apply(router: &watch::Sender<ViewRouter>, resolution: Resolution) {
    router.send_modify(|r| r.apply(resolution));
}

fn current_resolution(router: &ViewRouter) -> Resolution {
    if router.authenticated { Resolution::Dashboard } else { Resolution::View(router.view) }
}

async fn listen(
    mut subscription: AuthSubscription,
    resolver: Arc<SessionResolver>,
    storage: Arc<dyn Storage>,
    router: Arc<watch::Sender<ViewRouter>>,
) {
    while let Some(event) = subscription.recv().await {
        debug!(event = event.name(), "auth event received");
        if event == AuthEvent::SignedOut {
            clear_local_cache(storage.as_ref());
        }
        if let Some(resolution) = resolver.resolve_event(&event).await {
            apply(&router, resolution);
        }
    }
    debug!("auth event stream closed");
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
