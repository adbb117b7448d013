//! Roomsync - bidirectional chat relay between Slack and HipChat
//!
//! Connects one Slack channel and one HipChat room so that messages posted
//! in either appear in the other, attributed to their original authors.

use anyhow::Result;
use clap::Parser;
use roomsync::{
    config::RoomsyncConfig,
    hipchat::HipchatEndpoint,
    pipe::{Endpoint, Pipe},
    slack::SlackEndpoint,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "roomsync")]
#[command(version)]
#[command(about = "Bidirectional message relay between Slack and HipChat rooms")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ROOMSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Slack API token
    #[arg(long, env = "ROOMSYNC_SLACK_TOKEN")]
    slack_token: Option<String>,

    /// Slack channel id to relay
    #[arg(long, env = "ROOMSYNC_SLACK_CHANNEL")]
    slack_channel: Option<String>,

    /// HipChat API token
    #[arg(long, env = "ROOMSYNC_HIPCHAT_TOKEN")]
    hipchat_token: Option<String>,

    /// HipChat room id to relay
    #[arg(long, env = "ROOMSYNC_HIPCHAT_CHANNEL")]
    hipchat_channel: Option<String>,

    /// Public base URL the HipChat platform reaches us at
    #[arg(long, env = "ROOMSYNC_HIPCHAT_BASE_URL")]
    hipchat_base_url: Option<String>,

    /// Port for the webhook HTTP surface
    #[arg(long, env = "ROOMSYNC_HIPCHAT_PORT")]
    hipchat_port: Option<u16>,
}

impl Cli {
    /// Load the file config (if any) and apply flag overrides.
    fn into_config(self) -> Result<RoomsyncConfig> {
        let mut config = match &self.config {
            Some(path) => RoomsyncConfig::load(path)?,
            None => RoomsyncConfig::default(),
        };

        if let Some(token) = self.slack_token {
            config.slack.token = token;
        }
        if let Some(channel) = self.slack_channel {
            config.slack.channel = channel;
        }
        if let Some(token) = self.hipchat_token {
            config.hipchat.token = token;
        }
        if let Some(channel) = self.hipchat_channel {
            config.hipchat.channel = channel;
        }
        if let Some(base_url) = self.hipchat_base_url {
            config.hipchat.base_url = base_url;
        }
        if let Some(port) = self.hipchat_port {
            config.hipchat.port = port;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("roomsync={},tower_http=debug", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("preparing");
    let config = cli.into_config()?;

    tracing::info!("creating pipes");
    let slack: Arc<dyn Endpoint> = Arc::new(SlackEndpoint::new(config.slack.clone()));
    let hipchat: Arc<dyn Endpoint> = Arc::new(HipchatEndpoint::new(config.hipchat.clone()));

    let slack_to_hipchat = Pipe::new(Arc::clone(&slack), Arc::clone(&hipchat));
    let hipchat_to_slack = Pipe::new(hipchat, slack);

    tracing::info!("starting");
    tokio::spawn(async move {
        if let Err(e) = slack_to_hipchat.open().await {
            tracing::error!(error = %e, "slack to hipchat relay failed");
        }
    });
    hipchat_to_slack.open().await?;

    tracing::info!("finished");
    Ok(())
}
