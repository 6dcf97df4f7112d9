use super::*;
use crate::storage::MemoryStorage;
use uuid::Uuid;

fn client(storage: Arc<MemoryStorage>) -> GoTrueClient {
    GoTrueClient::new(
        reqwest::Client::new(),
        Url::parse("https://abcdefgh.supabase.co").unwrap(),
        "anon-key".into(),
        storage,
    )
}

fn jwt_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u1","exp":{exp}}}"#));
    format!("{header}.{payload}.signature")
}

fn user_json() -> serde_json::Value {
    serde_json::json!({
        "id": "7b0c6f2e-1f7e-4d8b-9a55-0d1f0c3e8b21",
        "email": "user@example.com",
        "email_confirmed_at": "2024-05-01T09:00:00Z",
        "aud": "authenticated"
    })
}

// =============================================================================
// PURE HELPERS
// =============================================================================

#[test]
fn storage_key_uses_project_ref() {
    let url = Url::parse("https://abcdefgh.supabase.co").unwrap();
    assert_eq!(storage_key_for(&url), "sb-abcdefgh-auth-token");
    let local = Url::parse("http://127.0.0.1:54321").unwrap();
    assert_eq!(storage_key_for(&local), "sb-127-auth-token");
}

#[test]
fn jwt_expiry_reads_exp_claim() {
    assert_eq!(jwt_expiry(&jwt_with_exp(1_700_000_000)), Some(1_700_000_000));
    assert_eq!(jwt_expiry("not-a-jwt"), None);
    assert_eq!(jwt_expiry("a.!!!.c"), None);
}

#[test]
fn parse_session_computes_expiry_from_expires_in() {
    let json = serde_json::json!({
        "access_token": "at",
        "refresh_token": "rt",
        "token_type": "bearer",
        "expires_in": 3600,
        "user": user_json(),
    })
    .to_string();
    let session = parse_session(&json, 1_000).unwrap();
    assert_eq!(session.expires_at, Some(4_600));
    assert!(session.user.is_verified());
}

#[test]
fn parse_session_prefers_explicit_expires_at() {
    let json = serde_json::json!({
        "access_token": "at",
        "refresh_token": "rt",
        "expires_in": 3600,
        "expires_at": 99,
        "user": user_json(),
    })
    .to_string();
    assert_eq!(parse_session(&json, 1_000).unwrap().expires_at, Some(99));
}

#[test]
fn parse_session_rejects_malformed_body() {
    let err = parse_session("{\"access_token\":\"x\"}", 0).unwrap_err();
    assert!(matches!(err, AuthError::Network(_)));
}

#[test]
fn parse_sign_up_without_session_is_confirmation_sent() {
    let mut user = user_json();
    user["email_confirmed_at"] = serde_json::Value::Null;
    let outcome = parse_sign_up(&user.to_string(), 0).unwrap();
    assert!(matches!(outcome, SignUpOutcome::ConfirmationSent(ref u) if !u.is_verified()));
}

#[test]
fn parse_sign_up_nested_user_is_confirmation_sent() {
    let json = serde_json::json!({ "user": user_json(), "session": null }).to_string();
    assert!(matches!(parse_sign_up(&json, 0).unwrap(), SignUpOutcome::ConfirmationSent(_)));
}

#[test]
fn parse_sign_up_with_session_is_signed_in() {
    let json = serde_json::json!({
        "access_token": "at",
        "refresh_token": "rt",
        "expires_in": 60,
        "user": user_json(),
    })
    .to_string();
    assert!(matches!(parse_sign_up(&json, 0).unwrap(), SignUpOutcome::SignedIn(_)));
}

#[test]
fn error_message_handles_all_shapes() {
    assert_eq!(
        error_message(r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#),
        "User already registered"
    );
    assert_eq!(
        error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
        "Invalid login credentials"
    );
    assert_eq!(error_message(r#"{"message":"Rate limited"}"#), "Rate limited");
    assert_eq!(error_message("upstream timeout"), "upstream timeout");
}

#[test]
fn api_error_appends_error_code() {
    let err = api_error(422, r#"{"error_code":"weak_password","msg":"Password is too weak"}"#);
    match err {
        AuthError::Api { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Password is too weak (weak_password)");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn already_registered_detection() {
    assert!(is_already_registered("User already registered"));
    assert!(is_already_registered("Email address is registered"));
    assert!(is_already_registered("conflict (user_already_exists)"));
    assert!(!is_already_registered("Password is too weak"));
}

#[test]
fn exchange_error_remaps_api_only() {
    let remapped = exchange_error(AuthError::Api { status: 400, message: "invalid flow state".into() });
    assert!(matches!(remapped, AuthError::Exchange(ref m) if m == "invalid flow state"));
    assert!(matches!(exchange_error(AuthError::Network("x".into())), AuthError::Network(_)));
}

// =============================================================================
// CLIENT (no network)
// =============================================================================

#[test]
fn endpoint_joins_auth_path() {
    let client = client(Arc::new(MemoryStorage::new()));
    assert_eq!(client.endpoint("token"), "https://abcdefgh.supabase.co/auth/v1/token");
    assert_eq!(client.storage_key(), "sb-abcdefgh-auth-token");
}

#[tokio::test]
async fn get_session_empty_storage_is_none() {
    let client = client(Arc::new(MemoryStorage::new()));
    assert!(client.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn get_session_returns_unexpired_stored_session() {
    let storage = Arc::new(MemoryStorage::new());
    let client = client(storage.clone());
    let session = Session {
        access_token: "at".into(),
        refresh_token: "rt".into(),
        expires_at: Some(now_unix() + 3600),
        user: Identity { id: Uuid::new_v4(), email: "a@b.test".into(), email_confirmed_at: None },
    };
    save_json(storage.as_ref(), client.storage_key(), &session);

    assert_eq!(client.get_session().await.unwrap(), Some(session));
}

#[tokio::test]
async fn exchange_without_verifier_fails_before_network() {
    let client = client(Arc::new(MemoryStorage::new()));
    let err = client.exchange_code_for_session("abc123").await.unwrap_err();
    assert!(matches!(err, AuthError::Exchange(_)));
}

#[tokio::test]
async fn set_session_rejects_non_jwt_access_token() {
    let client = client(Arc::new(MemoryStorage::new()));
    let err = client.set_session("opaque", "rt").await.unwrap_err();
    assert!(matches!(err, AuthError::Exchange(_)));
}

#[tokio::test]
async fn sign_out_without_session_clears_and_notifies() {
    let storage = Arc::new(MemoryStorage::new());
    let client = client(storage.clone());
    storage.set_item(&client.verifier_key(), "v");
    let mut sub = client.on_auth_state_change();

    client.sign_out().await.unwrap();

    assert_eq!(storage.get_item(&client.verifier_key()), None);
    assert_eq!(sub.drain_pending(), vec![AuthEvent::SignedOut]);
}
