#![warn(missing_docs)]

//! A line chat between exactly two processes over one TCP connection.
//! One side listens and accepts a single peer, the other connects;
//! both then forward local input lines to the peer and print the lines the peer sends.

use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::arguments::{parse_port, DEFAULT_PORT};

/// Initialize logging on stderr, filtered by `RUST_LOG` (default `info`).
/// If `console` is given, additionally publish tokio-console events at that address.
pub fn init_tracing(console: Option<SocketAddr>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);
    let console = console.map(|console| {
        console_subscriber::ConsoleLayer::builder()
            .retention(Duration::from_secs(60))
            .server_addr(console)
            .spawn()
    });

    tracing_subscriber::registry()
        .with(console)
        .with(stderr)
        .try_init()
        .context("Failed to install tracing subscriber")
}

/// Ask for a port on `output` and read the answer from `input`.
/// Blank or unparsable answers, and end of input, select [`DEFAULT_PORT`].
pub async fn prompt_port<Input, Output>(input: &mut Input, output: &mut Output) -> anyhow::Result<u16>
where
    Input: AsyncBufRead + Unpin,
    Output: AsyncWrite + Unpin,
{
    output
        .write_all(format!("Enter port [{DEFAULT_PORT}]: ").as_bytes())
        .await
        .context("Failed to ask for port")?;
    output.flush().await.context("Failed to ask for port")?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .await
        .context("Failed to receive port")?;
    Ok(parse_port(&answer).unwrap_or_else(|| {
        warn!("Invalid port input, using default {DEFAULT_PORT}");
        DEFAULT_PORT
    }))
}

/// Command line arguments of both binaries, and port defaults.
pub mod arguments;

/// Split a byte stream into `\n`-delimited lines, and frame outgoing lines.
pub mod codec;

/// Establish the single TCP connection of a session, by accepting or by connecting.
pub mod endpoint;

/// Run the inbound and outbound directions of a session concurrently until both are done.
pub mod session;

/// Write a buffer completely, across as many short writes as needed.
pub mod transfer;
