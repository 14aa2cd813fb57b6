use bytes::BytesMut;
use std::{io, time::Duration};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
};
use tokio_util::{codec::Decoder, sync::CancellationToken};
use tracing::{debug, error, info, warn};

use crate::{
    codec::{LineCodec, DELIMITER, RECV_CHUNK_SIZE},
    transfer::send_all,
};

/// Tunables of a single chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Receive buffer capacity per read. Values below 1 are treated as 1.
    pub chunk_size: usize,

    /// How long the inbound direction keeps waiting for its next receive once the session was stopped.
    /// `None` waits until the peer sends more data or closes.
    pub drain_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: RECV_CHUNK_SIZE,
            drain_timeout: None,
        }
    }
}

/// Why the inbound direction stopped.
#[derive(Debug)]
pub enum InboundEnd {
    /// The peer closed its sending side.
    PeerClosed,

    /// Receiving from the peer failed.
    ReceiveFailed(io::Error),

    /// Writing a line to the display failed.
    DisplayFailed(io::Error),

    /// The session was stopped; lines of the last receive were displayed.
    Stopped,

    /// The session was stopped and nothing arrived within the drain timeout.
    DrainTimeout,
}

/// Why the outbound direction stopped.
#[derive(Debug)]
pub enum OutboundEnd {
    /// Local input reached its end.
    InputExhausted,

    /// Reading local input failed.
    InputFailed(io::Error),

    /// Sending a line to the peer failed.
    SendFailed(io::Error),

    /// The inbound direction stopped the session first.
    Stopped,
}

/// Outcome of a complete session.
#[derive(Debug)]
pub struct SessionReport {
    /// How the inbound direction ended.
    pub inbound: InboundEnd,

    /// How the outbound direction ended.
    pub outbound: OutboundEnd,

    /// Number of complete lines received from the peer.
    pub lines_received: u64,

    /// Number of lines sent to the peer.
    pub lines_sent: u64,
}

/// Run both directions of a session over `reader`/`writer` until both have ended.
///
/// Lines read from `input` are sent on `writer`, lines received on `reader` are shown on `display`.
/// Whichever direction ends first stops the other one:
/// the outbound direction stops reading `input` right away,
/// the inbound direction displays the lines of its next receive, then stops (see [`SessionConfig::drain_timeout`]).
pub async fn run_session<Reader, Writer, Input, Display>(
    reader: Reader,
    writer: Writer,
    input: Input,
    display: Display,
    config: SessionConfig,
) -> SessionReport
where
    Reader: AsyncRead + Unpin,
    Writer: AsyncWrite + Unpin,
    Input: AsyncBufRead + Unpin,
    Display: AsyncWrite + Unpin,
{
    let token = CancellationToken::new();

    let ((inbound, lines_received), (outbound, lines_sent)) = tokio::join!(
        receive_lines(reader, display, token.clone(), config),
        send_lines(input, writer, token),
    );

    let report = SessionReport {
        inbound,
        outbound,
        lines_received,
        lines_sent,
    };
    info!(
        inbound = ?report.inbound,
        outbound = ?report.outbound,
        lines_received,
        lines_sent,
        "session ended"
    );
    report
}

/// Split the bytes arriving on `reader` into lines and write each one to `display` as `received: {<line>}`.
///
/// # Termination
/// If EOF is signalled on `reader`, announce it on `display` and terminate.
/// If receiving or displaying fails, terminate.
/// If `token` is cancelled, terminate after the lines of the next receive are displayed,
/// or once `config.drain_timeout` elapsed without a receive.
/// In every case `token` is cancelled before returning; an unterminated trailing line is dropped.
pub async fn receive_lines<Reader, Display>(
    mut reader: Reader,
    mut display: Display,
    token: CancellationToken,
    config: SessionConfig,
) -> (InboundEnd, u64)
where
    Reader: AsyncRead + Unpin,
    Display: AsyncWrite + Unpin,
{
    let mut codec = LineCodec::new();
    let mut chunk = vec![0; config.chunk_size.max(1)];
    let mut buffer = BytesMut::with_capacity(chunk.len());
    let drain = drain_expired(&token, config.drain_timeout);
    tokio::pin!(drain);
    let mut lines = 0;

    let end = loop {
        let received = tokio::select! {
            received = reader.read(&mut chunk) => received,
            () = &mut drain => {
                warn!("peer sent nothing in time after the session was stopped");
                break InboundEnd::DrainTimeout;
            }
        };
        match received {
            Ok(0) => {
                if let Err(e) = codec.decode_eof(&mut buffer) {
                    debug!(error = %e, "failed to flush receive buffer");
                }
                if let Err(e) = write_line(&mut display, "Peer closed connection.").await {
                    debug!(error = %e, "failed to announce closed connection");
                }
                break InboundEnd::PeerClosed;
            }
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e) => {
                error!(error = %e, "receive failed");
                break InboundEnd::ReceiveFailed(e);
            }
        }

        if let Err(end) = display_lines(&mut codec, &mut buffer, &mut display, &mut lines).await {
            break end;
        }
        if token.is_cancelled() {
            debug!(buffered = buffer.len(), "session stopped, leaving inbound direction");
            break InboundEnd::Stopped;
        }
    };
    token.cancel();
    (end, lines)
}

/// Display every complete line in `buffer`, leaving a partial line behind.
async fn display_lines<Display>(
    codec: &mut LineCodec,
    buffer: &mut BytesMut,
    display: &mut Display,
    lines: &mut u64,
) -> Result<(), InboundEnd>
where
    Display: AsyncWrite + Unpin,
{
    loop {
        let line = match codec.decode(buffer) {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()),
            Err(e) => {
                error!(error = %e, "failed to split received data");
                return Err(InboundEnd::ReceiveFailed(e));
            }
        };
        let text = String::from_utf8_lossy(&line);
        if let Err(e) = write_line(display, &format!("received: {{{text}}}")).await {
            error!(error = %e, "failed to display received line");
            return Err(InboundEnd::DisplayFailed(e));
        }
        *lines += 1;
    }
}

/// Read lines from `input` and send each one, delimiter appended, on `writer`.
///
/// # Termination
/// If `input` is exhausted or fails, or sending fails, terminate.
/// If `token` is cancelled, terminate without waiting for further input.
/// In every case `token` is cancelled and the sending side of `writer` is shut down before returning.
pub async fn send_lines<Input, Writer>(
    mut input: Input,
    mut writer: Writer,
    token: CancellationToken,
) -> (OutboundEnd, u64)
where
    Input: AsyncBufRead + Unpin,
    Writer: AsyncWrite + Unpin,
{
    let mut line = Vec::new();
    let mut frame = BytesMut::new();
    let mut lines = 0;

    let end = loop {
        line.clear();
        let read = tokio::select! {
            biased;
            () = token.cancelled() => break OutboundEnd::Stopped,
            read = input.read_until(DELIMITER, &mut line) => read,
        };
        match read {
            Ok(0) => break OutboundEnd::InputExhausted,
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "failed to read input");
                break OutboundEnd::InputFailed(e);
            }
        }
        if line.last() == Some(&DELIMITER) {
            line.pop();
        }

        frame.clear();
        LineCodec::frame(&line, &mut frame);
        if let Err(e) = send_all(&mut writer, &frame).await {
            error!(error = %e, "send failed or peer closed");
            break OutboundEnd::SendFailed(e);
        }
        lines += 1;
    };

    token.cancel();
    // Half-close: the peer sees EOF, receiving stays open.
    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "failed to shut down sending side");
    }
    (end, lines)
}

/// Resolves `timeout` after `token` was cancelled, never if there is no timeout.
async fn drain_expired(token: &CancellationToken, timeout: Option<Duration>) {
    token.cancelled().await;
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

async fn write_line<Display>(display: &mut Display, text: &str) -> io::Result<()>
where
    Display: AsyncWrite + Unpin,
{
    display.write_all(text.as_bytes()).await?;
    display.write_all(b"\n").await?;
    display.flush().await
}
