//! Runtime configuration parsed from environment variables.

use std::path::PathBuf;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_STORAGE_PATH: &str = ".seisan-auth.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const URL_VARS: &[&str] = &["SUPABASE_URL", "VITE_SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"];
const KEY_VARS: &[&str] = &["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"];

/// Whether a `TOKEN_REFRESHED` event re-runs the profile gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Re-resolve fully; an onboarding flag flipped elsewhere is picked up.
    #[default]
    RerunGate,
    /// Keep the current view; a refresh only rotates credentials.
    KeepCurrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

/// Supabase project coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub url: Url,
    pub anon_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// `None` when the project variables are absent (demo mode still works).
    pub provider: Option<ProviderConfig>,
    pub app_origin: Url,
    pub storage_path: PathBuf,
    pub refresh_policy: RefreshPolicy,
    pub timeouts: HttpTimeouts,
}

impl GateConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional (provider pair required outside demo mode):
    /// - `SUPABASE_URL` / `VITE_SUPABASE_URL` / `NEXT_PUBLIC_SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY` / `VITE_SUPABASE_ANON_KEY` / `NEXT_PUBLIC_SUPABASE_ANON_KEY`
    /// - `APP_ORIGIN`: default `http://localhost:5173`
    /// - `AUTH_STORAGE_PATH`: default `.seisan-auth.json`
    /// - `AUTH_TOKEN_REFRESH_POLICY`: `gate` (default) or `keep`
    /// - `AUTH_REQUEST_TIMEOUT_SECS`: default 30
    /// - `AUTH_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed URLs or an unknown policy.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GateConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed URLs or an unknown policy.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |vars: &[&str]| {
            vars.iter()
                .find_map(|var| lookup(*var).filter(|v| !v.trim().is_empty()))
        };

        let provider = match (first(URL_VARS), first(KEY_VARS)) {
            (Some(url), Some(anon_key)) => Some(ProviderConfig { url: parse_url("SUPABASE_URL", &url)?, anon_key }),
            _ => None,
        };

        let app_origin = parse_url(
            "APP_ORIGIN",
            &lookup("APP_ORIGIN").unwrap_or_else(|| DEFAULT_APP_ORIGIN.to_owned()),
        )?;
        let storage_path =
            PathBuf::from(lookup("AUTH_STORAGE_PATH").unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_owned()));
        let refresh_policy = parse_refresh_policy(lookup("AUTH_TOKEN_REFRESH_POLICY").as_deref())?;
        let timeouts = HttpTimeouts {
            request_secs: parse_u64(lookup("AUTH_REQUEST_TIMEOUT_SECS"), DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_u64(lookup("AUTH_CONNECT_TIMEOUT_SECS"), DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { provider, app_origin, storage_path, refresh_policy, timeouts })
    }

    /// The provider pair, or an error naming the variables that were tried.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] when either half is unset.
    pub fn require_provider(&self) -> Result<&ProviderConfig, ConfigError> {
        self.provider.as_ref().ok_or_else(|| ConfigError::MissingVar {
            vars: format!("{} and {}", URL_VARS.join("/"), KEY_VARS.join("/")),
        })
    }

    /// Absolute redirect target for a hash-router view, e.g. `#/email-confirmed`.
    #[must_use]
    pub fn redirect_to(&self, view: &str) -> String {
        let origin = self.app_origin.as_str().trim_end_matches('/');
        format!("{origin}/#/{view}")
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::Parse(format!("{var}: {e}")))
}

fn parse_u64(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_refresh_policy(raw: Option<&str>) -> Result<RefreshPolicy, ConfigError> {
    match raw.map(str::trim).unwrap_or("gate") {
        "gate" => Ok(RefreshPolicy::RerunGate),
        "keep" => Ok(RefreshPolicy::KeepCurrent),
        other => Err(ConfigError::Parse(format!(
            "unknown AUTH_TOKEN_REFRESH_POLICY '{other}' (expected 'gate' or 'keep')"
        ))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
