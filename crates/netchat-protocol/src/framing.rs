//! Length-prefixed framing: 4-byte big-endian length, then the JSON payload.
//!
//! [`encode_message`]/[`decode_message`] operate on byte slices;
//! [`FrameReader`]/[`FrameWriter`] wrap blocking `Read`/`Write` streams for
//! tests and non-async consumers. The async path lives in
//! [`crate::Channel`].

use std::io::{Read, Write};

use crate::MAX_FRAME_SIZE;
use crate::error::{TransportError, TransportResult};
use crate::message::Message;

/// Encodes a message to a complete frame ready for transmission.
pub fn encode_message(message: &Message) -> TransportResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    let len = json.len() as u32;

    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(4 + json.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Decodes a message from one complete frame (length prefix + payload).
pub fn decode_message(data: &[u8]) -> TransportResult<Message> {
    if data.len() < 4 {
        return Err(TransportError::Disconnected);
    }

    let len_bytes: [u8; 4] = data[0..4].try_into().map_err(|_| TransportError::Disconnected)?;
    let len = u32::from_be_bytes(len_bytes);

    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    if len == 0 {
        return Err(TransportError::EmptyFrame);
    }
    if data.len() < 4 + len as usize {
        return Err(TransportError::Disconnected);
    }

    let message = serde_json::from_slice(&data[4..4 + len as usize])?;
    Ok(message)
}

/// Reads framed messages from a blocking byte stream.
pub struct FrameReader<R> {
    reader: R,
}

impl<R: Read> FrameReader<R> {
    /// Wraps the given reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads one framed message.
    ///
    /// Returns `Ok(None)` on a clean EOF before any bytes of a frame.
    pub fn read_message(&mut self) -> TransportResult<Option<Message>> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf);
        if len > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }
        if len == 0 {
            return Err(TransportError::EmptyFrame);
        }

        let mut payload = vec![0u8; len as usize];
        self.reader.read_exact(&mut payload)?;

        let message = serde_json::from_slice(&payload)?;
        Ok(Some(message))
    }

    /// Unwraps this reader, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes framed messages to a blocking byte stream.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    /// Wraps the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one framed message.
    pub fn write_message(&mut self, message: &Message) -> TransportResult<()> {
        let frame = encode_message(message)?;
        self.writer.write_all(&frame)?;
        Ok(())
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> TransportResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Unwraps this writer, returning the underlying stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
