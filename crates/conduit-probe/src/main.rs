//! Command-line host for a Conduit client.
//!
//! Loads a client configuration, starts the network layer and either
//! issues one HTTP request or listens on the session for a while.
//!
//!   cargo run -p conduit-probe -- --config conduit.toml request v1/status --param user=42
//!   cargo run -p conduit-probe -- --config conduit.toml listen --seconds 30

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use conduit_client::{NetworkClient, Priority};
use conduit_core::{ClientConfig, Params, StaticCredentials};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conduit-probe", version, about)]
struct Cli {
    /// Client configuration (TOML).
    #[arg(long, env = "CONDUIT_CONFIG")]
    config: PathBuf,

    /// Credential token presented on the session handshake.
    #[arg(long, env = "CONDUIT_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit one request and print the decrypted response.
    Request {
        endpoint: String,
        /// Query parameter as `key=value`; repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        /// Plaintext body; switches the request to POST.
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        high: bool,
    },
    /// Keep the session open and print unsolicited messages.
    Listen {
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("conduit_client=info".parse()?)
                .add_directive("conduit_probe=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let credentials = Arc::new(StaticCredentials::new(cli.token.unwrap_or_default()));
    let client = NetworkClient::builder(config).credentials(credentials).build();
    client.start();
    let ticker = client.spawn_ticker();

    let result = match cli.command {
        Command::Request {
            endpoint,
            params,
            body,
            high,
        } => request(&client, endpoint, params.into_iter().collect(), body, high).await,
        Command::Listen { seconds } => listen(&client, Duration::from_secs(seconds)).await,
    };

    ticker.abort();
    result
}

async fn request(
    client: &NetworkClient,
    endpoint: String,
    params: Params,
    body: Option<String>,
    high: bool,
) -> anyhow::Result<()> {
    let priority = if high { Priority::High } else { Priority::Normal };
    tracing::info!(%endpoint, ?priority, "submitting request");

    let response = client.submit(endpoint, params, body, priority).await;
    if !response.success {
        bail!(
            "{} (status {}): {}",
            response.error_kind,
            response.status_code,
            response.error_message
        );
    }
    println!("{}", response.data.unwrap_or_default());
    Ok(())
}

async fn listen(client: &NetworkClient, window: Duration) -> anyhow::Result<()> {
    let mut inbound = client.session().subscribe();
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => break,
            received = inbound.recv() => match received {
                Ok(item) => match item.message {
                    Some(message) => println!(
                        "{}: {}",
                        message.kind,
                        message.data.unwrap_or_default()
                    ),
                    None => println!("(empty envelope, status {})", item.envelope.status_code),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "listener fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!(state = %client.connection_state(), "listen window elapsed");
    Ok(())
}
