//! Profile gate: onboarding completion check for a verified identity.
//!
//! ERROR HANDLING
//! ==============
//! A store failure is treated exactly like a missing row. Onboarding is the
//! least-privileged screen a verified user can reach and is always safe to
//! re-enter, so the gate never produces an error screen.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::provider::{Profile, ProfileStore, Session};
use crate::state::view::{Resolution, ViewState};
use crate::storage::{CACHED_PROFILE_KEY, Storage, save_json};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    Onboarding,
    Dashboard,
}

impl From<GateOutcome> for Resolution {
    fn from(outcome: GateOutcome) -> Self {
        match outcome {
            GateOutcome::Onboarding => Self::View(ViewState::Onboarding),
            GateOutcome::Dashboard => Self::Dashboard,
        }
    }
}

/// Pure decision on an already-fetched row.
#[must_use]
pub fn decide(profile: Option<&Profile>) -> GateOutcome {
    match profile {
        Some(p) if p.onboarding_done() => GateOutcome::Dashboard,
        _ => GateOutcome::Onboarding,
    }
}

pub struct ProfileGate {
    profiles: Arc<dyn ProfileStore>,
    storage: Arc<dyn Storage>,
}

impl ProfileGate {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileStore>, storage: Arc<dyn Storage>) -> Self {
        Self { profiles, storage }
    }

    /// Decide where the session's identity belongs. The fetched row is cached
    /// locally; a missing row clears the cache.
    pub async fn gate(&self, session: &Session) -> GateOutcome {
        let user_id = session.user.id;
        match self
            .profiles
            .fetch_profile(user_id, &session.access_token)
            .await
        {
            Ok(Some(profile)) => {
                save_json(self.storage.as_ref(), CACHED_PROFILE_KEY, &profile);
                let outcome = decide(Some(&profile));
                debug!(%user_id, ?outcome, "profile gate decided");
                outcome
            }
            Ok(None) => {
                self.storage.remove_item(CACHED_PROFILE_KEY);
                debug!(%user_id, "no profile row; onboarding");
                GateOutcome::Onboarding
            }
            Err(e) => {
                warn!(%user_id, code = e.error_code(), error = %e, "profile fetch failed; onboarding");
                GateOutcome::Onboarding
            }
        }
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
