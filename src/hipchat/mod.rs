//! HipChat endpoint (webhook)
//!
//! Relays one HipChat room through the platform's add-on machinery:
//! inbound messages arrive as webhook POSTs on an HTTP surface owned by
//! the endpoint, outbound messages go out as room notifications through
//! the REST API. Installation callbacks carry per-room OAuth credentials
//! which are exchanged for room-scoped tokens and kept for the process
//! lifetime.

mod api;
mod webhook;

pub use api::{CreateWebhookRequest, HipchatApi, Notification, OAuthAccessToken, Webhook};
pub use webhook::{HookPayload, InstallablePayload, RoomAuthorization, TOKEN_SCOPES};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::HipchatConfig;
use crate::error::Result;
use crate::pipe::{Endpoint, Hook, Message};

/// Name under which the relay registers its own room webhook.
const WEBHOOK_NAME: &str = "roomsync";

/// HipChat implementation of [`Endpoint`].
pub struct HipchatEndpoint {
    config: HipchatConfig,
    ctx: Arc<webhook::Context>,
}

impl HipchatEndpoint {
    /// Create a new HipChat endpoint for one room
    pub fn new(config: HipchatConfig) -> Self {
        let api = HipchatApi::new(config.token.clone());
        Self::with_api(api, config)
    }

    /// Create with a custom API client (for testing with wiremock).
    pub fn with_api(api: HipchatApi, config: HipchatConfig) -> Self {
        let ctx = Arc::new(webhook::Context {
            channel: config.channel.clone(),
            base_url: config.base_url.clone(),
            api,
            hook: RwLock::new(None),
            rooms: RwLock::new(HashMap::new()),
        });
        Self { config, ctx }
    }

    /// Register the relay's webhook on the target room, without creating
    /// duplicates.
    ///
    /// Not invoked on connect; exposed as an explicit operational action.
    pub async fn create_webhook(&self) -> Result<()> {
        let hooks = match self.ctx.api.list_webhooks(&self.config.channel).await {
            Ok(hooks) => hooks,
            Err(e) => {
                tracing::error!(error = %e, "failed to get webhooks");
                return Err(e);
            }
        };
        if hooks.iter().any(|hook| hook.name == WEBHOOK_NAME) {
            return Ok(());
        }

        let request = CreateWebhookRequest {
            name: WEBHOOK_NAME.to_string(),
            event: "room_message".to_string(),
            pattern: String::new(),
            url: format!("{}/hook", self.config.base_url),
        };
        if let Err(e) = self
            .ctx
            .api
            .create_webhook(&self.config.channel, &request)
            .await
        {
            tracing::error!(error = %e, "webhook create error");
            return Err(e);
        }
        Ok(())
    }

    /// Installations received so far, keyed by room id.
    pub async fn room_count(&self) -> usize {
        self.ctx.rooms.read().await.len()
    }
}

#[async_trait]
impl Endpoint for HipchatEndpoint {
    fn name(&self) -> &str {
        "hipchat"
    }

    async fn connect(&self) -> Result<()> {
        // Webhook delivery needs no session; self-registration
        // (create_webhook) stays a manual operational action.
        tracing::info!(channel = %self.config.channel, "hipchat client ready");
        Ok(())
    }

    async fn write(&self, message: &Message) -> Result<()> {
        tracing::debug!(msg = %message.content, "writing msg");

        let notification = Notification {
            color: "gray".to_string(),
            message: message.content.clone(),
            notify: true,
            message_format: "text".to_string(),
            from: message.author.clone(),
        };
        if let Err(e) = self
            .ctx
            .api
            .send_notification(&self.config.channel, &notification)
            .await
        {
            tracing::error!(msg = %message, error = %e, "notification error");
            return Err(e);
        }
        Ok(())
    }

    async fn listen(&self, hook: Hook) {
        *self.ctx.hook.write().await = Some(hook);

        let app = webhook::routes(Arc::clone(&self.ctx));
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(addr = %addr, error = %e, "listen error");
                return;
            }
        };

        tracing::info!(addr = %addr, "webhook surface listening");
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "listen error");
        }
    }
}
