//! Discord REST adapter (reqwest).
//!
//! Implements the `mcf-core` [`ProfileApi`] port over the two profile endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use serde_json::Value;

use mcf_core::{
    domain::{GuildId, MentionId},
    errors::Error,
    model::{Profile, User},
    ports::{ApiError, ProfileApi},
    Result,
};

pub mod throttled;

const USER_AGENT: &str = concat!("mcf/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY: usize = 200;

#[derive(Clone, Debug)]
pub struct DiscordHttpClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl DiscordHttpClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::External(format!("reqwest client build failed: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        })
    }

    fn user_url(&self, id: &MentionId) -> String {
        format!("{}/users/{}", self.base_url, id)
    }

    fn profile_url(&self, id: &MentionId) -> String {
        format!("{}/users/{}/profile", self.base_url, id)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<T, ApiError> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .header(AUTHORIZATION, &self.token)
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("request error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let header_hint = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after_header);
            let body = resp.text().await.unwrap_or_default();
            let retry_after = header_hint.or_else(|| parse_retry_after_body(&body));
            tracing::debug!(url, status = status.as_u16(), ?retry_after, "profile request failed");

            return Err(ApiError::from_status(
                status.as_u16(),
                retry_after,
                body.chars().take(MAX_ERROR_BODY).collect(),
            ));
        }

        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Transport(format!("json error: {e}")))
    }
}

#[async_trait]
impl ProfileApi for DiscordHttpClient {
    async fn fetch_user(&self, id: &MentionId) -> std::result::Result<User, ApiError> {
        self.get_json(&self.user_url(id), &[]).await
    }

    async fn fetch_member_profile(
        &self,
        id: &MentionId,
        guild: &GuildId,
    ) -> std::result::Result<Profile, ApiError> {
        self.get_json(&self.profile_url(id), &profile_query(guild))
            .await
    }
}

fn profile_query(guild: &GuildId) -> [(&'static str, &str); 3] {
    [
        ("with_mutual_friends_count", "false"),
        ("with_mutual_guilds", "false"),
        ("guild_id", guild.as_str()),
    ]
}

/// `Retry-After` is whole or fractional seconds.
fn parse_retry_after_header(raw: &str) -> Option<Duration> {
    seconds(raw.trim().parse::<f64>().ok()?)
}

/// Rate-limit bodies carry `{"retry_after": <seconds>}`.
fn parse_retry_after_body(body: &str) -> Option<Duration> {
    let v: Value = serde_json::from_str(body).ok()?;
    seconds(v.get("retry_after")?.as_f64()?)
}

/// Negative, non-finite or out-of-range hints are dropped.
fn seconds(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}
