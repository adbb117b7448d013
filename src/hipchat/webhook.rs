//! HTTP surface of the HipChat endpoint.
//!
//! The HipChat platform talks to the relay over four routes: the Atlassian
//! Connect descriptor (served at `/` and `/atlassian-connect.json`), a
//! liveness probe, the installation callback, and the inbound message
//! webhook. The router is owned by the endpoint instance so several
//! adapters or test harnesses can coexist in one process.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::hipchat::api::{HipchatApi, OAuthAccessToken};
use crate::pipe::{Hook, Message};

/// Capabilities requested when exchanging installation credentials.
pub const TOKEN_SCOPES: [&str; 3] = ["send_notification", "view_messages", "view_room"];

/// Per-room OAuth credential and a client bound to it.
///
/// Created lazily when the platform installs the integration into a room;
/// held for the process lifetime, never evicted.
pub struct RoomAuthorization {
    pub token: OAuthAccessToken,
    pub api: HipchatApi,
}

/// Shared state behind the HTTP surface.
pub(crate) struct Context {
    /// Target room id the relay is configured for
    pub channel: String,
    /// Public base URL the platform reaches us at
    pub base_url: String,
    /// Primary API client (process-wide token)
    pub api: HipchatApi,
    /// Relay hook, registered by listen
    pub hook: RwLock<Option<Hook>>,
    /// Installations keyed by room id
    pub rooms: RwLock<HashMap<String, RoomAuthorization>>,
}

/// All URL routes for the room integration.
pub(crate) fn routes(ctx: Arc<Context>) -> Router {
    Router::new()
        .route("/", get(atlassian_connect))
        .route("/atlassian-connect.json", get(atlassian_connect))
        .route("/healthcheck", get(healthcheck))
        .route("/installable", post(installable))
        .route("/hook", post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Connect descriptor templated with the public base URL.
fn descriptor(base_url: &str) -> serde_json::Value {
    json!({
        "key": "roomsync",
        "name": "Roomsync",
        "description": "Relays room messages to a linked chat room",
        "links": {
            "homepage": base_url,
            "self": format!("{}/atlassian-connect.json", base_url),
        },
        "capabilities": {
            "installable": {
                "callbackUrl": format!("{}/installable", base_url),
                "allowRoom": true,
                "allowGlobal": false,
            },
            "hipchatApiConsumer": {
                "scopes": TOKEN_SCOPES,
            },
            "webhook": [{
                "name": "roomsync",
                "event": "room_message",
                "pattern": "",
                "url": format!("{}/hook", base_url),
            }],
        },
    })
}

async fn atlassian_connect(State(ctx): State<Arc<Context>>) -> Json<serde_json::Value> {
    Json(descriptor(&ctx.base_url))
}

async fn healthcheck() -> Json<[&'static str; 1]> {
    Json(["OK"])
}

/// Installation callback payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallablePayload {
    pub oauth_id: String,
    pub oauth_secret: String,
    pub room_id: u64,
}

async fn installable(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<InstallablePayload>,
) -> Response {
    let room = payload.room_id.to_string();

    let token = match ctx
        .api
        .generate_token(&payload.oauth_id, &payload.oauth_secret, &TOKEN_SCOPES)
        .await
    {
        Ok(token) => token,
        Err(e) => {
            // the platform retries installations; it only sees a plain 200
            tracing::error!(room = %room, error = %e, "failed to get access token");
            return StatusCode::OK.into_response();
        }
    };

    let api = ctx.api.for_token(&token.access_token);
    ctx.rooms
        .write()
        .await
        .insert(room.clone(), RoomAuthorization { token, api });
    tracing::debug!(room = %room, "installation registered");

    Json(["OK"]).into_response()
}

/// Inbound message delivery payload.
#[derive(Debug, Deserialize)]
pub struct HookPayload {
    pub event: String,
    pub item: HookItem,
}

#[derive(Debug, Deserialize)]
pub struct HookItem {
    pub room: HookRoom,
    pub message: HookMessage,
}

#[derive(Debug, Deserialize)]
pub struct HookRoom {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct HookMessage {
    pub from: HookSender,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct HookSender {
    pub mention_name: String,
}

async fn webhook(State(ctx): State<Arc<Context>>, Json(payload): Json<HookPayload>) -> StatusCode {
    tracing::debug!("converting hook");
    if payload.event != "room_message" {
        return StatusCode::OK;
    }
    let room_id = payload.item.room.id.to_string();
    if room_id != ctx.channel {
        return StatusCode::OK;
    }

    let msg = Message::new(
        payload.item.message.from.mention_name,
        room_id.clone(),
        payload.item.message.message,
    );

    tracing::debug!(room = %room_id, "triggering hook");
    if let Some(hook) = ctx.hook.read().await.as_ref() {
        if let Err(e) = hook(msg.clone()).await {
            tracing::error!(msg = %msg, error = %e, "hook error");
        }
    }

    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(api_base: &str, channel: &str) -> Arc<Context> {
        Arc::new(Context {
            channel: channel.to_string(),
            base_url: "https://relay.example.com".to_string(),
            api: HipchatApi::with_base_url("hc-test", api_base),
            hook: RwLock::new(None),
            rooms: RwLock::new(HashMap::new()),
        })
    }

    fn capture_hook() -> (Hook, Arc<Mutex<Vec<Message>>>) {
        let seen: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hook: Hook = Arc::new(move |msg| {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                sink.lock().unwrap().push(msg);
                Ok(())
            })
        });
        (hook, seen)
    }

    fn hook_payload(event: &str, room_id: u64, from: &str, body: &str) -> HookPayload {
        serde_json::from_value(json!({
            "event": event,
            "item": {
                "room": {"id": room_id},
                "message": {
                    "from": {"mention_name": from},
                    "message": body,
                },
            },
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_healthcheck_returns_ok_payload() {
        let Json(body) = healthcheck().await;
        assert_eq!(body, ["OK"]);
    }

    #[tokio::test]
    async fn test_descriptor_is_templated_with_base_url() {
        let ctx = context("http://127.0.0.1:1", "42");
        let Json(body) = atlassian_connect(State(ctx)).await;

        assert_eq!(body["key"], "roomsync");
        assert_eq!(
            body["capabilities"]["installable"]["callbackUrl"],
            "https://relay.example.com/installable"
        );
        assert_eq!(
            body["capabilities"]["webhook"][0]["url"],
            "https://relay.example.com/hook"
        );
    }

    #[tokio::test]
    async fn test_matching_room_message_triggers_hook() {
        let ctx = context("http://127.0.0.1:1", "42");
        let (hook, seen) = capture_hook();
        *ctx.hook.write().await = Some(hook);

        let status = webhook(
            State(Arc::clone(&ctx)),
            Json(hook_payload("room_message", 42, "bob", "hi there")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].author, "bob");
        assert_eq!(seen[0].source, "42");
        assert_eq!(seen[0].content, "hi there");
    }

    #[tokio::test]
    async fn test_foreign_room_is_ignored() {
        let ctx = context("http://127.0.0.1:1", "42");
        let (hook, seen) = capture_hook();
        *ctx.hook.write().await = Some(hook);

        webhook(
            State(Arc::clone(&ctx)),
            Json(hook_payload("room_message", 99, "bob", "hi there")),
        )
        .await;

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_message_event_is_ignored() {
        let ctx = context("http://127.0.0.1:1", "42");
        let (hook, seen) = capture_hook();
        *ctx.hook.write().await = Some(hook);

        webhook(
            State(Arc::clone(&ctx)),
            Json(hook_payload("room_enter", 42, "bob", "hi there")),
        )
        .await;

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_installable_stores_room_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "room-token",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let ctx = context(&server.uri(), "42");
        let payload: InstallablePayload = serde_json::from_value(json!({
            "oauthId": "oauth-id",
            "oauthSecret": "oauth-secret",
            "roomId": 42,
        }))
        .unwrap();

        installable(State(Arc::clone(&ctx)), Json(payload)).await;

        let rooms = ctx.rooms.read().await;
        let auth = rooms.get("42").expect("authorization stored");
        assert_eq!(auth.token.access_token, "room-token");
    }

    #[tokio::test]
    async fn test_installable_failure_registers_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let ctx = context(&server.uri(), "42");
        let payload: InstallablePayload = serde_json::from_value(json!({
            "oauthId": "oauth-id",
            "oauthSecret": "wrong",
            "roomId": 42,
        }))
        .unwrap();

        let response = installable(State(Arc::clone(&ctx)), Json(payload)).await;

        // exchange failure is logged only; the platform still sees a 200
        assert_eq!(response.status(), StatusCode::OK);
        assert!(ctx.rooms.read().await.is_empty());
    }
}
