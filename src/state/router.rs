//! View router: the single piece of "current view" state.
//!
//! DESIGN
//! ======
//! The router never talks to the network. Resolutions from the session
//! resolver and explicit user navigation are the only writers, and the last
//! write wins.

#[cfg(test)]
#[path = "router_test.rs"]
mod router_test;

use serde::Serialize;

use super::view::{Resolution, Screen, ViewState};

/// Current view, authenticated flag, and initial loading status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ViewRouter {
    pub view: ViewState,
    pub authenticated: bool,
    pub loading: bool,
}

impl Default for ViewRouter {
    fn default() -> Self {
        Self { view: ViewState::Login, authenticated: false, loading: true }
    }
}

impl ViewRouter {
    /// Apply a resolver decision. Ends the loading phase.
    pub fn apply(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Dashboard => self.authenticated = true,
            Resolution::View(view) => {
                self.authenticated = false;
                self.view = view;
            }
        }
        self.loading = false;
    }

    /// Explicit user-driven transition ("back to login", "forgot password").
    pub fn navigate(&mut self, view: ViewState) {
        self.view = view;
    }

    /// Navigate by symbolic name; unknown names land on login.
    pub fn navigate_named(&mut self, name: &str) {
        self.navigate(ViewState::parse_lossy(name));
    }

    /// Screen to render. `None` while the initial resolution is pending.
    #[must_use]
    pub fn screen(&self) -> Option<Screen> {
        if self.loading {
            return None;
        }
        if self.authenticated {
            return Some(Screen::Dashboard);
        }
        Some(self.view.into())
    }
}
