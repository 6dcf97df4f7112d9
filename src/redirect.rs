//! Redirect artifacts carried back from the identity provider in the URL.
//!
//! ARCHITECTURE
//! ============
//! Three delivery mechanisms exist: PKCE codes and token pairs in the query
//! string, and legacy token pairs in the hash fragment (optionally after a
//! hash-router path such as `#/email-confirmed?...`). All of them are parsed
//! once into a single [`RedirectArtifact`]. The query wins when both sources
//! carry one; within a source an error beats a code, which beats tokens.
//!
//! Consumed parameters are removed with [`Location::strip_artifact`], which
//! replaces the current URL in place (no reload, no new history entry) so a
//! refresh cannot replay a one-time code.

#[cfg(test)]
#[path = "redirect_test.rs"]
mod redirect_test;

use std::sync::{Mutex, PoisonError};

use url::Url;
use url::form_urlencoded;

/// Parameters the provider may append to a redirect. All of them are stripped.
pub const ARTIFACT_PARAMS: &[&str] = &[
    "access_token",
    "refresh_token",
    "expires_in",
    "expires_at",
    "token_type",
    "provider_token",
    "provider_refresh_token",
    "type",
    "code",
    "error",
    "error_code",
    "error_description",
];

/// Purpose the provider attached to a token pair (`type=` parameter).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Signup,
    Recovery,
    MagicLink,
    Invite,
    EmailChange,
    Other(String),
}

impl TokenKind {
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or_default() {
            "signup" => Self::Signup,
            "recovery" => Self::Recovery,
            "magiclink" => Self::MagicLink,
            "invite" => Self::Invite,
            "email_change" => Self::EmailChange,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Transient data extracted from the URL on load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RedirectArtifact {
    #[default]
    None,
    TokenPair { access_token: String, refresh_token: String, kind: TokenKind },
    AuthCode { code: String },
    ErrorInfo { code: String, description: String },
}

impl RedirectArtifact {
    /// Parse the artifact from a full URL. Query first, then hash fragment.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let from_query = Self::from_params(&query);
        if from_query != Self::None {
            return from_query;
        }
        url.fragment()
            .map(|fragment| Self::from_params(&fragment_params(fragment)))
            .unwrap_or_default()
    }

    /// Parse the artifact from one decoded parameter list.
    #[must_use]
    pub fn from_params(params: &[(String, String)]) -> Self {
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.as_str())
        };

        if let Some(code) = get("error").or_else(|| get("error_code")) {
            let description = get("error_description").unwrap_or_default();
            return Self::ErrorInfo { code: code.to_owned(), description: description.to_owned() };
        }
        if let Some(code) = get("code") {
            return Self::AuthCode { code: code.to_owned() };
        }
        if let (Some(access_token), Some(refresh_token)) = (get("access_token"), get("refresh_token")) {
            return Self::TokenPair {
                access_token: access_token.to_owned(),
                refresh_token: refresh_token.to_owned(),
                kind: TokenKind::parse(get("type")),
            };
        }
        Self::None
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Parameters that make a source carry an artifact on their own.
const PRIMARY_PARAMS: &[&str] = &[
    "access_token",
    "refresh_token",
    "provider_token",
    "provider_refresh_token",
    "code",
    "error",
    "error_code",
    "error_description",
];

fn is_artifact_param(key: &str) -> bool {
    ARTIFACT_PARAMS.contains(&key)
}

/// Split a fragment into an optional hash-router path (with the separator
/// that follows it) and its parameter part. Both `#/route?params` and the
/// implicit-flow shape `#/route#params` occur.
fn split_fragment(fragment: &str) -> (Option<(&str, char)>, &str) {
    if !fragment.starts_with('/') {
        return (None, fragment);
    }
    match fragment.find(['?', '#']) {
        Some(at) => {
            let sep = if fragment[at..].starts_with('?') { '?' } else { '#' };
            (Some((&fragment[..at], sep)), &fragment[at + 1..])
        }
        None => (Some((fragment, '?')), ""),
    }
}

fn fragment_params(fragment: &str) -> Vec<(String, String)> {
    let (_, params) = split_fragment(fragment);
    form_urlencoded::parse(params.as_bytes()).into_owned().collect()
}

fn segment_key(segment: &str) -> String {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .map(|(k, _)| k.into_owned())
        .unwrap_or_default()
}

/// Remove artifact segments from a raw `a=b&c=d` string, leaving every other
/// segment byte-for-byte. `None` when nothing needs removing; `Some(None)`
/// when nothing is left. Companion params such as `type` are only treated as
/// artifacts next to a primary one.
fn strip_params(raw: &str) -> Option<Option<String>> {
    let segments: Vec<(&str, String)> = raw
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| (segment, segment_key(segment)))
        .collect();
    if !segments.iter().any(|(_, key)| PRIMARY_PARAMS.contains(&key.as_str())) {
        return None;
    }
    let kept: Vec<&str> = segments
        .iter()
        .filter(|(_, key)| !is_artifact_param(key))
        .map(|(segment, _)| *segment)
        .collect();
    if kept.is_empty() {
        return Some(None);
    }
    Some(Some(kept.join("&")))
}

/// Return `url` with every artifact parameter removed from query and fragment.
/// Unrelated parameters and the hash-router path survive.
#[must_use]
pub fn strip_artifact(url: &Url) -> Url {
    let mut out = url.clone();

    if let Some(query) = url.query() {
        if let Some(kept) = strip_params(query) {
            out.set_query(kept.as_deref());
        }
    }

    if let Some(fragment) = url.fragment() {
        let (route, params) = split_fragment(fragment);
        if let Some(kept) = strip_params(params) {
            let rebuilt = match (route, kept) {
                (Some((route, sep)), Some(q)) => Some(format!("{route}{sep}{q}")),
                (Some((route, _)), None) => Some(route.to_owned()),
                (None, Some(q)) => Some(q),
                (None, None) => None,
            };
            out.set_fragment(rebuilt.as_deref());
        }
    }

    out
}

/// The current page URL, replaceable in place like `history.replaceState`.
#[derive(Debug)]
pub struct Location {
    current: Mutex<Url>,
}

impl Location {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self { current: Mutex::new(url) }
    }

    /// Parse an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns the parse error for a malformed or relative URL.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Url::parse(raw).map(Self::new)
    }

    #[must_use]
    pub fn href(&self) -> Url {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current URL without adding a history entry.
    pub fn replace_state(&self, url: Url) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = url;
    }

    #[must_use]
    pub fn artifact(&self) -> RedirectArtifact {
        RedirectArtifact::from_url(&self.href())
    }

    /// Remove consumed artifact parameters. Returns whether the URL changed.
    pub fn strip_artifact(&self) -> bool {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let stripped = strip_artifact(&current);
        if stripped == *current {
            return false;
        }
        *current = stripped;
        true
    }
}
