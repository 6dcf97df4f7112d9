//! Symbolic view names and resolver output.

#[cfg(test)]
#[path = "view_test.rs"]
mod view_test;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unauthenticated screens. The dashboard is not listed: it is reached only
/// through the router's authenticated flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewState {
    #[default]
    Login,
    Register,
    RegisterSuccess,
    EmailConfirmed,
    Onboarding,
    PasswordReset,
}

impl ViewState {
    pub const ALL: [Self; 6] = [
        Self::Login,
        Self::Register,
        Self::RegisterSuccess,
        Self::EmailConfirmed,
        Self::Onboarding,
        Self::PasswordReset,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::RegisterSuccess => "register-success",
            Self::EmailConfirmed => "email-confirmed",
            Self::Onboarding => "onboarding",
            Self::PasswordReset => "password-reset",
        }
    }

    /// Parse a view name, falling back to `Login` for anything unrecognized.
    #[must_use]
    pub fn parse_lossy(raw: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == raw.trim())
            .unwrap_or_default()
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Screen actually rendered for a router state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Screen {
    Login,
    Register,
    RegisterSuccess,
    EmailConfirmed,
    Onboarding,
    PasswordReset,
    Dashboard,
}

impl From<ViewState> for Screen {
    fn from(view: ViewState) -> Self {
        match view {
            ViewState::Login => Self::Login,
            ViewState::Register => Self::Register,
            ViewState::RegisterSuccess => Self::RegisterSuccess,
            ViewState::EmailConfirmed => Self::EmailConfirmed,
            ViewState::Onboarding => Self::Onboarding,
            ViewState::PasswordReset => Self::PasswordReset,
        }
    }
}

/// Terminal decision produced by the session resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "view", rename_all = "kebab-case")]
pub enum Resolution {
    /// `authenticated = true`; the router renders the dashboard.
    Dashboard,
    /// `authenticated = false` with the given view.
    View(ViewState),
}

impl Resolution {
    pub const LOGIN: Self = Self::View(ViewState::Login);

    #[must_use]
    pub fn authenticated(self) -> bool {
        matches!(self, Self::Dashboard)
    }

    #[must_use]
    pub fn screen(self) -> Screen {
        match self {
            Self::Dashboard => Screen::Dashboard,
            Self::View(view) => view.into(),
        }
    }
}
