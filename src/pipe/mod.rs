//! Message relay core
//!
//! Provides the generic [`Pipe`] binding two [`Endpoint`]s into a
//! unidirectional relay. Two pipes with swapped ends give bidirectional
//! sync between a pair of chat backends.

mod message;

pub use message::Message;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

use crate::error::Result;

/// Callback invoked once per inbound message on an endpoint.
pub type Hook = Arc<dyn Fn(Message) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Capability contract for a chat backend adapter.
///
/// An implementor owns one backend credential set, one target room/channel
/// identifier, and one logger scope. `connect` is called exactly once;
/// `listen` blocks its task for the process lifetime.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Endpoint name for log scoping
    fn name(&self) -> &str;

    /// Establish the backend session.
    ///
    /// Streaming backends spawn their connection manager here and return
    /// once the session exists, without waiting for the connection itself.
    async fn connect(&self) -> Result<()>;

    /// Deliver one message to the backend's target room.
    async fn write(&self, message: &Message) -> Result<()>;

    /// Invoke `hook` once per inbound message event.
    ///
    /// Blocks until the backend signals an unrecoverable failure. Events
    /// not belonging to the configured room, thread replies, and messages
    /// from automated accounts are filtered before the hook fires.
    async fn listen(&self, hook: Hook);
}

/// Unidirectional message-forwarding binding between two endpoints.
pub struct Pipe {
    input: Arc<dyn Endpoint>,
    output: Arc<dyn Endpoint>,
}

impl Pipe {
    /// New pipe relaying all input events to the output
    pub fn new(input: Arc<dyn Endpoint>, output: Arc<dyn Endpoint>) -> Self {
        Self { input, output }
    }

    /// Open the pipe to allow messages to pass.
    ///
    /// Connects input then output, returning the first error encountered,
    /// then blocks on the input's listen loop with the output's write as
    /// the inbound hook. Write failures are logged by the hook, never
    /// propagated back to the input side.
    pub async fn open(&self) -> Result<()> {
        tracing::info!(end = self.input.name(), "connecting input");
        if let Err(e) = self.input.connect().await {
            tracing::debug!(end = "input", error = %e, "connection error");
            return Err(e);
        }

        tracing::info!(end = self.output.name(), "connecting output");
        if let Err(e) = self.output.connect().await {
            tracing::debug!(end = "output", error = %e, "connection error");
            return Err(e);
        }

        tracing::info!(
            input = self.input.name(),
            output = self.output.name(),
            "listening"
        );
        let output = Arc::clone(&self.output);
        let hook: Hook = Arc::new(move |msg: Message| {
            let output = Arc::clone(&output);
            Box::pin(async move {
                if let Err(e) = output.write(&msg).await {
                    tracing::error!(msg = %msg, error = %e, "write error");
                    return Err(e);
                }
                Ok(())
            })
        });
        self.input.listen(hook).await;

        Ok(())
    }
}
