//! Profile store over PostgREST (`/rest/v1/profiles`).

use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{Profile, ProfileStore};
use crate::error::AuthError;

const PROFILES_PATH: &str = "rest/v1/profiles";

pub struct RestProfileStore {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
}

impl RestProfileStore {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: Url, anon_key: String) -> Self {
        Self { http, base_url, anon_key }
    }

    fn endpoint(&self) -> String {
        format!("{}/{PROFILES_PATH}", self.base_url.as_str().trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl ProfileStore for RestProfileStore {
    async fn fetch_profile(&self, user_id: Uuid, access_token: &str) -> Result<Option<Profile>, AuthError> {
        let response = self
            .http
            .get(self.endpoint())
            .query(&[("id", format!("eq.{user_id}")), ("select", "*".to_owned())])
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::ProfileFetch(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::ProfileFetch(e.to_string()))?;
        if status != 200 {
            return Err(AuthError::ProfileFetch(format!("status {status}: {text}")));
        }
        let profile = parse_profile_rows(&text)?;
        debug!(%user_id, found = profile.is_some(), "profile fetched");
        Ok(profile)
    }

    async fn upsert_profile(&self, profile: &Profile, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.endpoint())
            .header("apikey", &self.anon_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .bearer_auth(access_token)
            .json(profile)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Api { status, message: text });
        }
        Ok(())
    }
}

/// PostgREST always answers with an array; an empty one means "no row".
pub(crate) fn parse_profile_rows(json: &str) -> Result<Option<Profile>, AuthError> {
    let rows: Vec<Profile> =
        serde_json::from_str(json).map_err(|e| AuthError::ProfileFetch(format!("malformed profile rows: {e}")))?;
    Ok(rows.into_iter().next())
}
