//! The transport channel: one full-duplex, ordered envelope stream.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;

use crate::MAX_FRAME_SIZE;
use crate::error::{TransportError, TransportResult};
use crate::framing::encode_message;
use crate::message::Message;

/// A full-duplex channel that sends and receives whole [`Message`]
/// envelopes over one TCP connection.
///
/// Sends are atomic per channel: a mutex on the write half guarantees that
/// two concurrent `send` calls never interleave their bytes. Receives are
/// serialized the same way on the read half, so exactly one caller consumes
/// each frame. After [`Channel::close`], both directions fail with
/// [`TransportError::Closed`].
pub struct Channel {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
    peer: Option<SocketAddr>,
}

impl Channel {
    /// Wraps an established connection.
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            peer,
        }
    }

    /// Connects to the given address and wraps the resulting stream.
    pub async fn connect(addr: impl ToSocketAddrs) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    /// The peer's address, if the socket could report one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// True once [`Channel::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Serializes the message and writes it as one frame.
    pub async fn send(&self, message: &Message) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let frame = encode_message(message)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Waits for exactly one whole envelope.
    ///
    /// Fails with [`TransportError::Disconnected`] when the peer closes the
    /// connection, and with [`TransportError::Malformed`] when a complete
    /// frame does not decode; the latter leaves the stream in sync, so the
    /// caller may keep receiving.
    pub async fn receive(&self) -> TransportResult<Message> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut reader = self.reader.lock().await;

        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(TransportError::Disconnected);
            }
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
        match reader.read_exact(&mut payload).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(TransportError::Disconnected);
            }
            Err(e) => return Err(e.into()),
        }

        let message = serde_json::from_slice(&payload)?;
        Ok(message)
    }

    /// Releases the connection. Idempotent; subsequent `send`/`receive`
    /// fail with [`TransportError::Closed`].
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn channel_pair() -> (Channel, Channel) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let connect = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (accepted, _) = listener.accept().await.unwrap();
        let connected = connect.await.unwrap();

        (Channel::new(accepted), Channel::new(connected))
    }

    #[tokio::test]
    async fn send_receive_roundtrip() {
        let (server, client) = channel_pair().await;

        server.send(&Message::NameRequest).await.unwrap();
        assert_eq!(client.receive().await.unwrap(), Message::NameRequest);

        client.send(&Message::user_name("alice")).await.unwrap();
        assert_eq!(
            server.receive().await.unwrap(),
            Message::user_name("alice")
        );
    }

    #[tokio::test]
    async fn receive_preserves_order() {
        let (server, client) = channel_pair().await;

        for i in 0..10 {
            server.send(&Message::text(format!("m{i}"))).await.unwrap();
        }
        for i in 0..10 {
            assert_eq!(
                client.receive().await.unwrap(),
                Message::text(format!("m{i}"))
            );
        }
    }

    #[tokio::test]
    async fn peer_disconnect_fails_receive() {
        let (server, client) = channel_pair().await;

        drop(server);
        assert!(matches!(
            client.receive().await,
            Err(TransportError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn malformed_frame_is_recoverable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let writer_task = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            // One frame of garbage, then a valid envelope.
            let garbage = b"not json at all";
            stream
                .write_all(&(garbage.len() as u32).to_be_bytes())
                .await
                .unwrap();
            stream.write_all(garbage).await.unwrap();
            stream
                .write_all(&encode_message(&Message::text("ok")).unwrap())
                .await
                .unwrap();
            stream.flush().await.unwrap();
            // Keep the connection open until the reader is done.
            let mut buf = [0u8; 1];
            let _ = stream.read(&mut buf).await;
        });

        let (accepted, _) = listener.accept().await.unwrap();
        let channel = Channel::new(accepted);

        let err = channel.receive().await.unwrap_err();
        assert!(err.is_recoverable(), "expected recoverable error, got {err}");
        assert_eq!(channel.receive().await.unwrap(), Message::text("ok"));

        channel.close().await;
        writer_task.await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent_and_fails_io() {
        let (server, client) = channel_pair().await;

        client.close().await;
        client.close().await;
        assert!(client.is_closed());

        assert!(matches!(
            client.send(&Message::Disable).await,
            Err(TransportError::Closed)
        ));
        assert!(matches!(
            client.receive().await,
            Err(TransportError::Closed)
        ));

        // The peer sees the disconnect.
        assert!(matches!(
            server.receive().await,
            Err(TransportError::Disconnected)
        ));
    }
}
