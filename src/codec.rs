use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

/// Byte separating two lines on the wire.
pub const DELIMITER: u8 = b'\n';

/// Default capacity of a single receive, in bytes.
pub const RECV_CHUNK_SIZE: usize = 512;

/// Splits a byte stream into `\n`-terminated lines and frames outgoing lines the same way.
///
/// Decoded lines never contain the delimiter.
/// Bytes following the last delimiter stay in the receive buffer until a later chunk completes them,
/// and are dropped if the stream ends first.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineCodec {
    /// Offset in the receive buffer up to which no delimiter exists.
    next_index: usize,
}

impl LineCodec {
    /// Create a codec with an empty scan position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `line` followed by the delimiter to `dst`.
    pub fn frame(line: &[u8], dst: &mut BytesMut) {
        dst.reserve(line.len() + 1);
        dst.put_slice(line);
        dst.put_u8(DELIMITER);
    }
}

impl Decoder for LineCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Bytes>> {
        let unscanned = &src[self.next_index..];
        match unscanned.iter().position(|byte| *byte == DELIMITER) {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let mut line = src.split_to(end + 1);
                line.truncate(end);
                Ok(Some(line.freeze()))
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Bytes>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if !src.is_empty() {
            debug!(bytes = src.len(), "discarding unterminated line");
            src.clear();
        }
        self.next_index = 0;
        Ok(None)
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: T, dst: &mut BytesMut) -> io::Result<()> {
        Self::frame(line.as_ref(), dst);
        Ok(())
    }
}
