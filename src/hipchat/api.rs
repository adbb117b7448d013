//! Minimal HipChat v2 REST wrapper for the webhook endpoint.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const API_BASE: &str = "https://api.hipchat.com/v2";

/// Room notification request body.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub color: String,
    pub message: String,
    pub notify: bool,
    pub message_format: String,
    pub from: String,
}

/// Registered room webhook as returned by the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Webhook {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookList {
    #[serde(default)]
    items: Vec<Webhook>,
}

/// Room webhook registration request body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateWebhookRequest {
    pub name: String,
    pub event: String,
    pub pattern: String,
    pub url: String,
}

/// Room-scoped OAuth token issued through the installation flow.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthAccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Api(format!("{}: {}", status, body)))
}

#[derive(Clone)]
pub struct HipchatApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HipchatApi {
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

    /// Clone of this client authenticating with a different bearer token.
    pub fn for_token(&self, access_token: &str) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: access_token.to_string(),
        }
    }

    /// Post a notification to a room.
    pub async fn send_notification(&self, room: &str, notification: &Notification) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/room/{}/notification", self.base_url, room))
            .bearer_auth(&self.token)
            .json(notification)
            .send()
            .await?;

        ensure_success(resp).await.map(|_| ())
    }

    /// List the webhooks registered on a room.
    pub async fn list_webhooks(&self, room: &str) -> Result<Vec<Webhook>> {
        let resp = self
            .client
            .get(format!("{}/room/{}/webhook", self.base_url, room))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let resp = ensure_success(resp).await?;
        let parsed: WebhookList = resp.json().await?;
        Ok(parsed.items)
    }

    /// Register a webhook on a room.
    pub async fn create_webhook(&self, room: &str, request: &CreateWebhookRequest) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/room/{}/webhook", self.base_url, room))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;

        ensure_success(resp).await.map(|_| ())
    }

    /// Exchange installation credentials for a room-scoped access token.
    pub async fn generate_token(
        &self,
        client_id: &str,
        client_secret: &str,
        scopes: &[&str],
    ) -> Result<OAuthAccessToken> {
        let scope = scopes.join(" ");
        let resp = self
            .client
            .post(format!("{}/oauth/token", self.base_url))
            .basic_auth(client_id, Some(client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_notification_posts_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/room/42/notification"))
            .and(body_partial_json(json!({
                "color": "gray",
                "message": "hello",
                "message_format": "text",
                "from": "alice",
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = HipchatApi::with_base_url("hc-test", server.uri());
        api.send_notification(
            "42",
            &Notification {
                color: "gray".to_string(),
                message: "hello".to_string(),
                notify: true,
                message_format: "text".to_string(),
                from: "alice".to_string(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_send_notification_surfaces_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/room/42/notification"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let api = HipchatApi::with_base_url("hc-test", server.uri());
        let err = api
            .send_notification(
                "42",
                &Notification {
                    color: "gray".to_string(),
                    message: "hello".to_string(),
                    notify: true,
                    message_format: "text".to_string(),
                    from: "alice".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api(ref e) if e.contains("401")));
    }

    #[tokio::test]
    async fn test_list_webhooks_parses_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/room/42/webhook"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": 7, "name": "roomsync", "event": "room_message", "url": "https://relay.example.com/hook"},
                ],
                "maxResults": 100,
                "startIndex": 0,
            })))
            .mount(&server)
            .await;

        let api = HipchatApi::with_base_url("hc-test", server.uri());
        let hooks = api.list_webhooks("42").await.unwrap();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].name, "roomsync");
        assert_eq!(hooks[0].event, "room_message");
    }

    #[tokio::test]
    async fn test_generate_token_sends_client_credentials_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("send_notification"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "room-token",
                "expires_in": 3600,
                "token_type": "bearer",
            })))
            .mount(&server)
            .await;

        let api = HipchatApi::with_base_url("hc-test", server.uri());
        let token = api
            .generate_token(
                "oauth-id",
                "oauth-secret",
                &["send_notification", "view_messages", "view_room"],
            )
            .await
            .unwrap();

        assert_eq!(token.access_token, "room-token");
        assert_eq!(token.expires_in, Some(3600));
    }
}
