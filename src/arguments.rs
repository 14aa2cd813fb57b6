use std::{net::SocketAddr, time::Duration};

use clap::{Args, Parser};
use tracing::warn;

use crate::{codec::RECV_CHUNK_SIZE, session::SessionConfig};

/// Port used when none, or an unusable one, is given.
pub const DEFAULT_PORT: u16 = 12345;

/// Command Line Arguments of the listening side.
#[derive(Parser, Debug)]
#[clap(author, version, about = "Wait for one peer and chat with it line by line.", long_about = None)]
pub struct ServerArguments {
    /// IPv4 address to bind to, `0.0.0.0` for all interfaces.
    #[clap(value_parser)]
    pub bind_ip: Option<String>,

    /// Port to listen on [default: 12345].
    #[clap(value_parser)]
    pub port: Option<String>,

    #[clap(flatten)]
    pub session: SessionArguments,
}

/// Command Line Arguments of the connecting side.
#[derive(Parser, Debug)]
#[clap(author, version, about = "Connect to a peer and chat with it line by line.", long_about = None)]
pub struct ClientArguments {
    /// IPv4 address of the peer.
    #[clap(value_parser)]
    pub server_ip: Option<String>,

    /// Port to connect to. Asked for interactively when omitted.
    #[clap(value_parser)]
    pub port: Option<String>,

    #[clap(flatten)]
    pub session: SessionArguments,
}

/// Flags shared by both sides.
#[derive(Args, Debug, Clone)]
pub struct SessionArguments {
    /// Address to publish console events on.
    #[clap(short, long, value_parser)]
    pub console: Option<SocketAddr>,

    /// Receive buffer capacity in bytes.
    #[clap(long, value_parser, default_value_t = RECV_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Milliseconds to keep waiting for the peer to hang up once this side is done.
    #[clap(long, value_parser)]
    pub drain_timeout: Option<u64>,
}

impl SessionArguments {
    /// Session tunables selected on the command line.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            chunk_size: self.chunk_size.max(1),
            drain_timeout: self.drain_timeout.map(Duration::from_millis),
        }
    }
}

/// Parse a port number. Blank input yields [`DEFAULT_PORT`], anything else unparsable yields `None`.
pub fn parse_port(input: &str) -> Option<u16> {
    let input = input.trim();
    if input.is_empty() {
        return Some(DEFAULT_PORT);
    }
    input.parse().ok()
}

/// The port given, or [`DEFAULT_PORT`] (with a warning) if it is missing or invalid.
pub fn port_or_default(input: Option<&str>) -> u16 {
    let Some(input) = input else {
        return DEFAULT_PORT;
    };
    parse_port(input).unwrap_or_else(|| {
        warn!(input, "Invalid port, using default {DEFAULT_PORT}");
        DEFAULT_PORT
    })
}
