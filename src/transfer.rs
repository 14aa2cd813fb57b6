use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Write every byte of `buf` to `writer`, issuing as many writes as it takes.
///
/// # Errors
/// Fails with [`io::ErrorKind::WriteZero`] as soon as a write makes no progress,
/// and passes through any error reported by the writer.
/// Either way, an unknown prefix of `buf` may already have been sent.
pub async fn send_all<Writer>(writer: &mut Writer, buf: &[u8]) -> io::Result<()>
where
    Writer: AsyncWrite + Unpin + ?Sized,
{
    let mut sent = 0;
    while sent < buf.len() {
        let written = writer.write(&buf[sent..]).await?;
        if written == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "peer stopped accepting data",
            ));
        }
        sent += written;
        trace!(written, remaining = buf.len() - sent, "partial send");
    }
    Ok(())
}
