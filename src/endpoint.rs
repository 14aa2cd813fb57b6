use anyhow::Context;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::{
    io::{AsyncBufRead, AsyncWrite},
    net::{TcpListener, TcpSocket, TcpStream},
};
use tracing::{debug, info};

use crate::session::{run_session, SessionConfig, SessionReport};

/// Pending connections the listening socket queues up.
pub const LISTEN_BACKLOG: u32 = 1;

/// Parse a dotted-quad IPv4 address. `0.0.0.0` stands for every local interface.
pub fn parse_ipv4(address: &str) -> anyhow::Result<Ipv4Addr> {
    address
        .trim()
        .parse()
        .with_context(|| format!("Invalid IPv4 address: {address}"))
}

/// A bound and listening socket that hands out exactly one [`Endpoint`].
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to `ip:port` and start listening with a backlog of [`LISTEN_BACKLOG`].
    pub fn bind(ip: Ipv4Addr, port: u16) -> anyhow::Result<Self> {
        let address = SocketAddr::V4(SocketAddrV4::new(ip, port));
        let socket = TcpSocket::new_v4().context("socket() failed")?;
        socket
            .set_reuseaddr(true)
            .context("Failed to set SO_REUSEADDR")?;
        socket
            .bind(address)
            .with_context(|| format!("bind() failed on {address}"))?;
        let inner = socket.listen(LISTEN_BACKLOG).context("listen() failed")?;
        debug!(%address, "listening");
        Ok(Self { inner })
    }

    /// The address actually bound, with the ephemeral port resolved.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Wait for the first peer. The listening socket stays open, unserviced, until the endpoint is dropped.
    pub async fn accept(self) -> anyhow::Result<Endpoint> {
        let (stream, peer) = self
            .inner
            .accept()
            .await
            .context("accept() failed")?;
        info!(%peer, "accepted connection");
        Ok(Endpoint {
            stream,
            peer,
            _listener: Some(self.inner),
        })
    }
}

/// One connected TCP stream carrying a chat session.
#[derive(Debug)]
pub struct Endpoint {
    stream: TcpStream,
    peer: SocketAddr,
    _listener: Option<TcpListener>,
}

impl Endpoint {
    /// Connect to `ip:port`.
    pub async fn connect(ip: Ipv4Addr, port: u16) -> anyhow::Result<Self> {
        let address = SocketAddr::V4(SocketAddrV4::new(ip, port));
        let socket = TcpSocket::new_v4().context("socket() failed")?;
        let stream = socket
            .connect(address)
            .await
            .with_context(|| format!("connect() failed to {address}"))?;
        info!(peer = %address, "connected");
        Ok(Self {
            stream,
            peer: address,
            _listener: None,
        })
    }

    /// Address of the remote side.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Run a session on this connection, then close it.
    pub async fn run<Input, Display>(
        mut self,
        input: Input,
        display: Display,
        config: SessionConfig,
    ) -> SessionReport
    where
        Input: AsyncBufRead + Unpin,
        Display: AsyncWrite + Unpin,
    {
        let (reader, writer) = self.stream.split();
        run_session(reader, writer, input, display, config).await
    }
}
