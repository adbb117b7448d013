//! Roomsync - bidirectional chat relay between Slack and HipChat
//!
//! Roomsync mirrors the messages of one Slack channel and one HipChat room
//! into each other, attributed to their original authors.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   RTM websocket    ┌─────────────────────────────┐
//! │    Slack     │◄──────────────────►│  SlackEndpoint (streaming)  │
//! └──────────────┘                    └──────────────┬──────────────┘
//!                                           listen   │   ▲ write
//!                                                    ▼   │
//!                                        ┌───────────────┴─────────┐
//!                                        │   Pipe × 2 (swapped)    │
//!                                        └───────────────┬─────────┘
//!                                           listen   ▲   │ write
//!                                                    │   ▼
//! ┌──────────────┐   webhooks + REST  ┌──────────────┴──────────────┐
//! │   HipChat    │◄──────────────────►│  HipchatEndpoint (webhook)  │
//! └──────────────┘                    └─────────────────────────────┘
//! ```
//!
//! Each [`pipe::Pipe`] is unidirectional: it connects its input and output
//! endpoints, then feeds every inbound message of the input into the
//! output's write operation. Running two pipes with swapped ends gives
//! two-way sync.
//!
//! ## Modules
//!
//! - [`pipe`]: the relay core (message model, endpoint contract, pipe)
//! - [`slack`]: streaming endpoint speaking the Slack RTM protocol
//! - [`hipchat`]: webhook endpoint speaking the HipChat add-on protocol
//! - [`config`]: configuration management
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod hipchat;
pub mod pipe;
pub mod slack;

pub use config::RoomsyncConfig;
pub use error::{Error, Result};
pub use pipe::{Endpoint, Hook, Message, Pipe};
