use std::collections::HashMap;

use super::*;

fn config_from(vars: &[(&str, &str)]) -> Result<GateConfig, ConfigError> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    GateConfig::from_lookup(|key| map.get(key).cloned())
}

#[test]
fn defaults_without_any_vars() {
    let cfg = config_from(&[]).unwrap();
    assert_eq!(cfg.provider, None);
    assert_eq!(cfg.app_origin.as_str(), "http://localhost:5173/");
    assert_eq!(cfg.storage_path, PathBuf::from(DEFAULT_STORAGE_PATH));
    assert_eq!(cfg.refresh_policy, RefreshPolicy::RerunGate);
    assert_eq!(cfg.timeouts, HttpTimeouts::default());
}

#[test]
fn missing_provider_names_every_fallback() {
    let cfg = config_from(&[("SUPABASE_URL", "https://abc.supabase.co")]).unwrap();
    let err = cfg.require_provider().unwrap_err().to_string();
    assert!(err.contains("SUPABASE_URL"));
    assert!(err.contains("VITE_SUPABASE_ANON_KEY"));
}

#[test]
fn vite_and_next_prefixes_are_accepted() {
    let cfg = config_from(&[
        ("VITE_SUPABASE_URL", "https://abc.supabase.co"),
        ("NEXT_PUBLIC_SUPABASE_ANON_KEY", "anon"),
    ])
    .unwrap();
    let provider = cfg.require_provider().unwrap();
    assert_eq!(provider.url.host_str(), Some("abc.supabase.co"));
    assert_eq!(provider.anon_key, "anon");
}

#[test]
fn blank_values_fall_through_to_next_var() {
    let cfg = config_from(&[
        ("SUPABASE_URL", "  "),
        ("NEXT_PUBLIC_SUPABASE_URL", "https://next.supabase.co"),
        ("SUPABASE_ANON_KEY", "anon"),
    ])
    .unwrap();
    assert_eq!(cfg.require_provider().unwrap().url.host_str(), Some("next.supabase.co"));
}

#[test]
fn overrides_are_parsed() {
    let cfg = config_from(&[
        ("APP_ORIGIN", "https://seisan.example/"),
        ("AUTH_STORAGE_PATH", "/tmp/auth.json"),
        ("AUTH_TOKEN_REFRESH_POLICY", "keep"),
        ("AUTH_REQUEST_TIMEOUT_SECS", "5"),
        ("AUTH_CONNECT_TIMEOUT_SECS", "bad"),
    ])
    .unwrap();
    assert_eq!(cfg.refresh_policy, RefreshPolicy::KeepCurrent);
    assert_eq!(cfg.storage_path, PathBuf::from("/tmp/auth.json"));
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 5, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS });
    assert_eq!(cfg.redirect_to("email-confirmed"), "https://seisan.example/#/email-confirmed");
}

#[test]
fn unknown_refresh_policy_errors() {
    let err = config_from(&[("AUTH_TOKEN_REFRESH_POLICY", "sometimes")])
        .unwrap_err()
        .to_string();
    assert!(err.contains("AUTH_TOKEN_REFRESH_POLICY"));
}

#[test]
fn malformed_url_errors() {
    let err = config_from(&[("SUPABASE_URL", "not a url"), ("SUPABASE_ANON_KEY", "anon")]).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
