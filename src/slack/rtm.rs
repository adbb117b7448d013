//! RTM event schema and connection management.
//!
//! The connection manager runs as its own task: it exchanges the API token
//! for a websocket URL, keeps the socket alive across drops with capped
//! exponential backoff, and forwards decoded events into an mpsc channel
//! consumed by the endpoint's listen loop. An `invalid_auth` answer from
//! the platform is terminal: the manager drops the event sender, ending
//! the listen loop for this direction.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::Error;
use crate::slack::api::SlackApi;

/// Observable state of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not yet connected, or reconnecting after a drop
    Connecting,
    /// Socket established, events flowing
    Ready,
    /// Terminal authentication failure, no further attempts
    Failed,
}

/// Inbound RTM event, decoded from the socket's text frames.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RtmEvent {
    Hello,
    Message(MessageEvent),
    PresenceChange {
        #[serde(default)]
        user: String,
        #[serde(default)]
        presence: String,
    },
    Pong {
        #[serde(default)]
        reply_to: Option<u64>,
    },
    Goodbye,
    Error {
        error: RtmError,
    },
    #[serde(other)]
    Other,
}

/// Message event payload.
///
/// `thread_ts` and `bot_id` default to empty strings; non-empty values mark
/// thread replies and automated senders, both of which the endpoint skips.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub thread_ts: String,
    #[serde(default)]
    pub bot_id: String,
    #[serde(default)]
    pub ts: String,
}

/// Error payload carried by RTM `error` events.
#[derive(Debug, Clone, Deserialize)]
pub struct RtmError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Spawn the connection manager for one RTM session.
///
/// Returns immediately; the session's lifecycle is observable through
/// `state_tx`'s receivers.
pub(crate) fn spawn_manager(
    api: Arc<SlackApi>,
    event_tx: mpsc::Sender<RtmEvent>,
    state_tx: watch::Sender<ConnectionState>,
) {
    tokio::spawn(async move {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            let url = match api.rtm_connect().await {
                Ok(url) => url,
                Err(Error::Api(ref e)) if e == "invalid_auth" => {
                    tracing::error!("invalid credentials");
                    let _ = state_tx.send(ConnectionState::Failed);
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "rtm connect error");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    tracing::error!(error = %e, "websocket dial error");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            tracing::debug!(url = %url, "connected");
            let _ = state_tx.send(ConnectionState::Ready);
            backoff = INITIAL_BACKOFF;

            let (mut writer, mut reader) = stream.split();
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str::<RtmEvent>(&text) {
                        Ok(event) => {
                            if event_tx.send(event).await.is_err() {
                                // listener gone, nothing left to feed
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "undecodable frame");
                        }
                    },
                    Ok(WsMessage::Ping(data)) => {
                        let _ = writer.send(WsMessage::Pong(data)).await;
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "read error");
                        break;
                    }
                }
            }

            let _ = state_tx.send(ConnectionState::Connecting);
            tracing::warn!("connection lost, reconnecting");
        }
    });
}
