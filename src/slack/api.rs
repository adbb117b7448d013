//! Minimal Slack Web API wrapper for the streaming endpoint.

use reqwest::Client;
use serde::Deserialize;

use crate::error::{Error, Result};

const API_BASE: &str = "https://slack.com/api";

/// Slack user record as returned by `users.info` / `users.list`.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile: SlackProfile,
}

/// Profile subset used for avatar attribution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackProfile {
    #[serde(default)]
    pub image_48: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RtmConnectResponse {
    ok: bool,
    error: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    ok: bool,
    error: Option<String>,
    user: Option<SlackUser>,
}

#[derive(Debug, Deserialize)]
struct UsersListResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    members: Vec<SlackUser>,
}

fn api_error(error: Option<String>) -> Error {
    Error::Api(error.unwrap_or_else(|| "unknown error".into()))
}

pub struct SlackApi {
    client: Client,
    base_url: String,
    token: String,
}

impl SlackApi {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, API_BASE)
    }

    /// Create with a custom API base URL (for testing with wiremock).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Request a websocket URL for a fresh RTM session.
    pub async fn rtm_connect(&self) -> Result<String> {
        let resp = self
            .client
            .get(format!("{}/rtm.connect", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let parsed: RtmConnectResponse = resp.json().await?;
        if !parsed.ok {
            return Err(api_error(parsed.error));
        }
        parsed
            .url
            .ok_or_else(|| Error::Api("missing rtm url".into()))
    }

    /// Post a message with sender display-name (and optional avatar) override.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        username: &str,
        icon_url: Option<&str>,
    ) -> Result<()> {
        let mut body = serde_json::json!({
            "channel": channel,
            "text": text,
            "username": username,
            "as_user": false,
        });
        if let Some(icon_url) = icon_url {
            body["icon_url"] = serde_json::Value::String(icon_url.to_string());
        }

        let resp = self
            .client
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let parsed: SlackResponse = resp.json().await?;
        if !parsed.ok {
            return Err(api_error(parsed.error));
        }
        Ok(())
    }

    /// Look up a user by backend id.
    pub async fn user_info(&self, user_id: &str) -> Result<SlackUser> {
        let resp = self
            .client
            .get(format!("{}/users.info", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("user", user_id)])
            .send()
            .await?;

        let parsed: UserInfoResponse = resp.json().await?;
        if !parsed.ok {
            return Err(api_error(parsed.error));
        }
        parsed.user.ok_or_else(|| Error::Api("missing user".into()))
    }

    /// Find a user whose name ends with `name` (might be expensive).
    pub async fn user_by_name(&self, name: &str) -> Result<Option<SlackUser>> {
        let resp = self
            .client
            .get(format!("{}/users.list", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let parsed: UsersListResponse = resp.json().await?;
        if !parsed.ok {
            return Err(api_error(parsed.error));
        }
        Ok(parsed
            .members
            .into_iter()
            .find(|user| user.name.ends_with(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_rtm_connect_returns_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rtm.connect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "url": "wss://rtm.example.com/socket",
            })))
            .mount(&server)
            .await;

        let api = SlackApi::with_base_url("xoxb-test", server.uri());
        let url = api.rtm_connect().await.unwrap();
        assert_eq!(url, "wss://rtm.example.com/socket");
    }

    #[tokio::test]
    async fn test_rtm_connect_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rtm.connect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "error": "invalid_auth",
            })))
            .mount(&server)
            .await;

        let api = SlackApi::with_base_url("xoxb-test", server.uri());
        let err = api.rtm_connect().await.unwrap_err();
        assert!(matches!(err, Error::Api(ref e) if e == "invalid_auth"));
    }

    #[tokio::test]
    async fn test_user_info_parses_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.info"))
            .and(query_param("user", "U1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user": {
                    "id": "U1",
                    "name": "alice",
                    "profile": {"image_48": "https://avatars.example.com/alice.png"},
                },
            })))
            .mount(&server)
            .await;

        let api = SlackApi::with_base_url("xoxb-test", server.uri());
        let user = api.user_info("U1").await.unwrap();
        assert_eq!(user.name, "alice");
        assert_eq!(
            user.profile.image_48.as_deref(),
            Some("https://avatars.example.com/alice.png")
        );
    }

    #[tokio::test]
    async fn test_user_by_name_matches_suffix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": [
                    {"id": "U1", "name": "alice"},
                    {"id": "U2", "name": "team.bob"},
                ],
            })))
            .mount(&server)
            .await;

        let api = SlackApi::with_base_url("xoxb-test", server.uri());
        let user = api.user_by_name("bob").await.unwrap().unwrap();
        assert_eq!(user.id, "U2");
        assert!(api.user_by_name("carol").await.unwrap().is_none());
    }
}
