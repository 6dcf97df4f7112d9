//! Supabase Auth (GoTrue) client.
//!
//! Thin HTTP wrapper over `/auth/v1`. Sessions are persisted in client
//! storage under `sb-{project-ref}-auth-token`; the PKCE code verifier lives
//! next to it under `...-code-verifier` between sign-up/recovery and the code
//! exchange. Wire parsing is kept in pure functions for testability.
//!
//! ERROR HANDLING
//! ==============
//! Provider rejections are remapped per operation: a rejected code or token
//! pair is [`AuthError::Exchange`], a rejected password grant is
//! [`AuthError::InvalidCredentials`], a duplicate sign-up is
//! [`AuthError::AlreadyRegistered`]. Transport failures stay
//! [`AuthError::Network`].

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::types::EXPIRY_MARGIN_SECS;
use super::{
    AuthEvent, AuthEvents, AuthSubscription, Identity, IdentityProvider, ResendRequest, Session, SignUpOutcome,
    SignUpRequest, pkce,
};
use crate::config::HttpTimeouts;
use crate::error::AuthError;
use crate::storage::{Storage, load_json, save_json};

const AUTH_PATH: &str = "auth/v1";

/// Build the shared HTTP client with the configured timeouts.
///
/// # Errors
///
/// Returns [`AuthError::Network`] if the TLS backend cannot be initialized.
pub fn build_http_client(timeouts: HttpTimeouts) -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
        .map_err(|e| AuthError::Network(format!("http client build failed: {e}")))
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
    storage: Arc<dyn Storage>,
    storage_key: String,
    events: AuthEvents,
}

impl GoTrueClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: Url, anon_key: String, storage: Arc<dyn Storage>) -> Self {
        let storage_key = storage_key_for(&base_url);
        Self { http, base_url, anon_key, storage, storage_key, events: AuthEvents::new() }
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    fn verifier_key(&self) -> String {
        format!("{}-code-verifier", self.storage_key)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{AUTH_PATH}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn send(&self, request: RequestBuilder, bearer: Option<&str>) -> Result<String, AuthError> {
        let response = request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(api_error(status, &text));
        }
        Ok(text)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, AuthError> {
        let request = self
            .http
            .post(self.endpoint("token"))
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let text = self.send(request, None).await?;
        parse_session(&text, now_unix())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        self.token_grant("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        let request = self.http.get(self.endpoint("user"));
        let text = self.send(request, Some(access_token)).await?;
        serde_json::from_str(&text).map_err(|e| AuthError::Network(format!("malformed user response: {e}")))
    }

    fn load_session(&self) -> Option<Session> {
        load_json(self.storage.as_ref(), &self.storage_key)
    }

    fn persist(&self, session: &Session) {
        save_json(self.storage.as_ref(), &self.storage_key, session);
    }

    fn clear_session(&self) {
        self.storage.remove_item(&self.storage_key);
    }

    fn signed_in(&self, session: Session) -> Session {
        self.persist(&session);
        info!(user_id = %session.user.id, "session established");
        self.events.emit(AuthEvent::SignedIn(session.clone()));
        session
    }

    fn new_code_challenge(&self) -> String {
        let verifier = pkce::generate_code_verifier();
        let challenge = pkce::code_challenge(&verifier);
        self.storage.set_item(&self.verifier_key(), &verifier);
        challenge
    }
}

#[async_trait::async_trait]
impl IdentityProvider for GoTrueClient {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.load_session() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        debug!(user_id = %session.user.id, "stored session expired; refreshing");
        match self.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                self.persist(&refreshed);
                self.events.emit(AuthEvent::TokenRefreshed(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(AuthError::Api { status: 400..=499, message }) => {
                warn!(%message, "refresh token rejected; clearing session");
                self.clear_session();
                self.events.emit(AuthEvent::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session, AuthError> {
        let Some(expires_at) = jwt_expiry(access_token) else {
            return Err(AuthError::Exchange("access token is not a valid JWT".into()));
        };

        let session = if expires_at - EXPIRY_MARGIN_SECS <= now_unix() {
            self.refresh(refresh_token).await.map_err(exchange_error)?
        } else {
            let user = self.fetch_user(access_token).await.map_err(exchange_error)?;
            Session {
                access_token: access_token.to_owned(),
                refresh_token: refresh_token.to_owned(),
                expires_at: Some(expires_at),
                user,
            }
        };
        Ok(self.signed_in(session))
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, AuthError> {
        let verifier_key = self.verifier_key();
        let Some(verifier) = self.storage.get_item(&verifier_key) else {
            return Err(AuthError::Exchange("no code verifier stored for this client".into()));
        };

        let result = self
            .token_grant("pkce", serde_json::json!({ "auth_code": code, "code_verifier": verifier }))
            .await;
        self.storage.remove_item(&verifier_key);

        let session = result.map_err(exchange_error)?;
        Ok(self.signed_in(session))
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, AuthError> {
        let challenge = self.new_code_challenge();
        let body = serde_json::json!({
            "email": request.email,
            "password": request.password,
            "data": {},
            "code_challenge": challenge,
            "code_challenge_method": pkce::CHALLENGE_METHOD,
        });
        let http_request = self
            .http
            .post(self.endpoint("signup"))
            .query(&[("redirect_to", request.redirect_to.as_str())])
            .json(&body);

        let text = match self.send(http_request, None).await {
            Ok(text) => text,
            Err(AuthError::Api { status, message }) if is_already_registered(&message) => {
                debug!(status, "sign-up rejected: already registered");
                return Err(AuthError::AlreadyRegistered);
            }
            Err(e) => return Err(e),
        };

        match parse_sign_up(&text, now_unix())? {
            SignUpOutcome::SignedIn(session) => Ok(SignUpOutcome::SignedIn(self.signed_in(session))),
            outcome @ SignUpOutcome::ConfirmationSent(_) => Ok(outcome),
        }
    }

    async fn resend(&self, request: &ResendRequest) -> Result<(), AuthError> {
        let body = serde_json::json!({ "type": request.kind, "email": request.email });
        let http_request = self
            .http
            .post(self.endpoint("resend"))
            .query(&[("redirect_to", request.redirect_to.as_str())])
            .json(&body);
        self.send(http_request, None).await?;
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self
            .token_grant("password", serde_json::json!({ "email": email, "password": password }))
            .await
            .map_err(|e| match e {
                AuthError::Api { status: 400 | 401, .. } => AuthError::InvalidCredentials,
                other => other,
            })?;
        Ok(self.signed_in(session))
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let challenge = self.new_code_challenge();
        let body = serde_json::json!({
            "email": email,
            "code_challenge": challenge,
            "code_challenge_method": pkce::CHALLENGE_METHOD,
        });
        let http_request = self
            .http
            .post(self.endpoint("recover"))
            .query(&[("redirect_to", redirect_to)])
            .json(&body);
        self.send(http_request, None).await?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let remote = match self.load_session() {
            Some(session) => {
                let request = self
                    .http
                    .post(self.endpoint("logout"))
                    .query(&[("scope", "global")]);
                self.send(request, Some(&session.access_token)).await.map(drop)
            }
            None => Ok(()),
        };

        self.clear_session();
        self.storage.remove_item(&self.verifier_key());
        self.events.emit(AuthEvent::SignedOut);

        match remote {
            // The session is already gone server-side.
            Err(AuthError::Api { status: 401 | 403 | 404, .. }) | Ok(()) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.events.subscribe()
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// `sb-<first host label>-auth-token`, the key supabase-js uses.
#[must_use]
pub fn storage_key_for(base_url: &Url) -> String {
    let project_ref = base_url
        .host_str()
        .and_then(|host| host.split('.').next())
        .unwrap_or("local");
    format!("sb-{project_ref}-auth-token")
}

/// Read the `exp` claim from a JWT payload without verifying the signature.
#[must_use]
pub fn jwt_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}

#[derive(serde::Deserialize)]
struct SessionResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Identity,
}

impl SessionResponse {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs));
        Session { access_token: self.access_token, refresh_token: self.refresh_token, expires_at, user: self.user }
    }
}

pub(crate) fn parse_session(json: &str, now: i64) -> Result<Session, AuthError> {
    let response: SessionResponse =
        serde_json::from_str(json).map_err(|e| AuthError::Network(format!("malformed session response: {e}")))?;
    Ok(response.into_session(now))
}

/// Sign-up answers with a session when auto-confirm is on, otherwise with the
/// bare user record (older servers nest it under `user`).
pub(crate) fn parse_sign_up(json: &str, now: i64) -> Result<SignUpOutcome, AuthError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| AuthError::Network(format!("malformed sign-up response: {e}")))?;

    if value.get("access_token").is_some() {
        let response: SessionResponse = serde_json::from_value(value)
            .map_err(|e| AuthError::Network(format!("malformed sign-up session: {e}")))?;
        return Ok(SignUpOutcome::SignedIn(response.into_session(now)));
    }

    let user_value = value.get("user").cloned().unwrap_or(value);
    let user: Identity = serde_json::from_value(user_value)
        .map_err(|e| AuthError::Network(format!("malformed sign-up user: {e}")))?;
    Ok(SignUpOutcome::ConfirmationSent(user))
}

/// Extract the human message from any of the provider's error body shapes.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_owned();
    };
    ["msg", "message", "error_description", "error_code", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map_or_else(|| body.trim().to_owned(), str::to_owned)
}

fn api_error(status: u16, body: &str) -> AuthError {
    let mut message = error_message(body);
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(code) = value.get("error_code").and_then(Value::as_str) {
            if !message.contains(code) {
                message = format!("{message} ({code})");
            }
        }
    }
    AuthError::Api { status, message }
}

pub(crate) fn is_already_registered(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("user_already_exists") || lower.contains("already") || lower.contains("registered")
}

fn exchange_error(e: AuthError) -> AuthError {
    match e {
        AuthError::Api { message, .. } => AuthError::Exchange(message),
        other => other,
    }
}

#[cfg(test)]
#[path = "gotrue_test.rs"]
mod tests;
