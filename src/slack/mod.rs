//! Slack endpoint (streaming)
//!
//! Relays one Slack channel over a persistent RTM websocket session. The
//! connection is owned by a manager task spawned at connect time; the
//! listen loop consumes its decoded event stream, filters out foreign
//! channels, thread replies, and bot traffic, and hands everything else to
//! the relay hook with the author resolved to a display name.

mod api;
mod rtm;

pub use api::{SlackApi, SlackProfile, SlackUser};
pub use rtm::{ConnectionState, MessageEvent, RtmError, RtmEvent};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, RwLock};

use crate::config::SlackConfig;
use crate::error::Result;
use crate::pipe::{Endpoint, Hook, Message};

const EVENT_BUFFER: usize = 256;

/// Slack implementation of [`Endpoint`].
pub struct SlackEndpoint {
    config: SlackConfig,
    api: Arc<SlackApi>,
    events: RwLock<Option<mpsc::Receiver<RtmEvent>>>,
    state: RwLock<Option<watch::Receiver<ConnectionState>>>,
    user_names: RwLock<HashMap<String, String>>,
}

impl SlackEndpoint {
    /// Create a new Slack endpoint for one channel
    pub fn new(config: SlackConfig) -> Self {
        let api = Arc::new(SlackApi::new(config.token.clone()));
        Self::with_api(api, config)
    }

    /// Create with a custom API client (for testing with wiremock).
    pub fn with_api(api: Arc<SlackApi>, config: SlackConfig) -> Self {
        Self {
            config,
            api,
            events: RwLock::new(None),
            state: RwLock::new(None),
            user_names: RwLock::new(HashMap::new()),
        }
    }

    /// Observe the managed connection's state, once connected.
    pub async fn connection_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.state.read().await.clone()
    }

    /// Resolve a backend user id to a display name.
    ///
    /// Falls back to the raw id when the lookup fails; lookups are cached
    /// for the process lifetime since one chatty user would otherwise cost
    /// a REST round-trip per message.
    async fn resolve_user(&self, user_id: &str) -> String {
        if let Some(name) = self.user_names.read().await.get(user_id) {
            return name.clone();
        }
        match self.api.user_info(user_id).await {
            Ok(user) => {
                self.user_names
                    .write()
                    .await
                    .insert(user_id.to_string(), user.name.clone());
                user.name
            }
            Err(e) => {
                tracing::error!(user = user_id, error = %e, "unable to fetch user");
                user_id.to_string()
            }
        }
    }

    /// Apply the filter chain to one message event and invoke the hook.
    async fn process_message(&self, ev: MessageEvent, hook: &Hook) {
        if ev.channel != self.config.channel {
            return;
        }
        // Skip threads
        if !ev.thread_ts.is_empty() {
            return;
        }
        // Skip bots
        if !ev.bot_id.is_empty() {
            return;
        }
        tracing::debug!(msg = %ev.text, "message received");

        let author = self.resolve_user(&ev.user).await;
        let msg = Message::new(author, self.config.channel.clone(), ev.text);
        if let Err(e) = hook(msg.clone()).await {
            tracing::error!(msg = %msg, error = %e, "hook error");
        }
    }
}

#[async_trait]
impl Endpoint for SlackEndpoint {
    fn name(&self) -> &str {
        "slack"
    }

    async fn connect(&self) -> Result<()> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        rtm::spawn_manager(Arc::clone(&self.api), event_tx, state_tx);

        *self.events.write().await = Some(event_rx);
        *self.state.write().await = Some(state_rx);

        tracing::info!(channel = %self.config.channel, "slack session starting");
        Ok(())
    }

    async fn write(&self, message: &Message) -> Result<()> {
        tracing::debug!(msg = %message.content, "writing msg");

        let icon_url = match self.api.user_by_name(&message.author).await {
            Ok(Some(user)) => user.profile.image_48,
            Ok(None) => {
                tracing::error!(username = %message.author, "user not found");
                None
            }
            Err(e) => {
                tracing::error!(username = %message.author, error = %e, "user get error");
                None
            }
        };

        if let Err(e) = self
            .api
            .post_message(
                &self.config.channel,
                &message.content,
                &message.author,
                icon_url.as_deref(),
            )
            .await
        {
            tracing::error!(msg = %message, error = %e, "send message error");
            return Err(e);
        }
        Ok(())
    }

    async fn listen(&self, hook: Hook) {
        let Some(mut events) = self.events.write().await.take() else {
            tracing::error!("listen called before connect");
            return;
        };

        while let Some(event) = events.recv().await {
            match event {
                RtmEvent::Hello => {}
                RtmEvent::Message(ev) => self.process_message(ev, &hook).await,
                RtmEvent::PresenceChange { user, presence } => {
                    tracing::debug!(user = %user, presence = %presence, "presence changed");
                }
                RtmEvent::Pong { reply_to } => {
                    tracing::debug!(reply_to = ?reply_to, "latency report");
                }
                RtmEvent::Goodbye => {
                    tracing::debug!("server requested reconnect");
                }
                RtmEvent::Error { error } => {
                    tracing::error!(code = error.code, msg = %error.msg, "rtm error");
                }
                RtmEvent::Other => {}
            }
        }

        // The manager only drops its sender on terminal auth failure.
        tracing::debug!("event stream closed");
    }
}
