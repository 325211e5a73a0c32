//! Output sinks (live viewer connections)

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::error::{BroadcasterError, Result};
use crate::frame::{encode_header, MessageKind};

/// Unique sink identity within the process
pub type SinkId = u64;

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh sink identity
pub fn next_sink_id() -> SinkId {
    NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed)
}

/// A message-oriented output channel.
///
/// The hub bounds every `write` with its own deadline and calls `close`
/// after the first failure, so implementations need neither timeouts nor
/// retry logic.
pub trait Sink: Send + Sync {
    fn id(&self) -> SinkId;

    /// Write one whole message of the given kind
    fn write<'a>(&'a self, payload: &'a [u8], kind: MessageKind) -> BoxFuture<'a, Result<()>>;

    /// Close the channel; must be safe to call more than once
    fn close(&self) -> BoxFuture<'_, ()>;

    /// Human-readable peer description for logs
    fn describe(&self) -> String {
        format!("sink#{}", self.id())
    }
}

/// Sink over any async byte stream, writing framed messages
pub struct StreamSink<W> {
    id: SinkId,
    label: String,
    writer: Mutex<Option<W>>,
}

/// Sink for a TCP viewer connection
pub type TcpSink = StreamSink<OwnedWriteHalf>;

impl<W> StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W, label: impl Into<String>) -> Self {
        Self {
            id: next_sink_id(),
            label: label.into(),
            writer: Mutex::new(Some(writer)),
        }
    }

    async fn write_frame(&self, payload: &[u8], kind: MessageKind) -> Result<()> {
        let header = encode_header(kind, payload.len())?;

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(BroadcasterError::SinkClosed)?;
        writer.write_all(&header).await?;
        writer.write_all(payload).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn shutdown(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }
}

impl TcpSink {
    pub fn from_tcp(writer: OwnedWriteHalf, peer: SocketAddr) -> Self {
        Self::new(writer, peer.to_string())
    }
}

impl<W> Sink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn id(&self) -> SinkId {
        self.id
    }

    fn write<'a>(&'a self, payload: &'a [u8], kind: MessageKind) -> BoxFuture<'a, Result<()>> {
        self.write_frame(payload, kind).boxed()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        self.shutdown().boxed()
    }

    fn describe(&self) -> String {
        format!("{} (#{})", self.label, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::read_frame;

    #[tokio::test]
    async fn test_stream_sink_writes_frames() {
        let (client, server) = tokio::io::duplex(1024);
        let sink = StreamSink::new(client, "duplex");

        sink.write(b"{\"hr\":60}", MessageKind::Text).await.unwrap();
        sink.write(&[1, 2, 3, 4], MessageKind::Binary).await.unwrap();

        let mut reader = server;
        let (kind, payload) = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(kind, MessageKind::Text);
        assert_eq!(payload, b"{\"hr\":60}");

        let (kind, payload) = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(kind, MessageKind::Binary);
        assert_eq!(payload, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let (client, _server) = tokio::io::duplex(1024);
        let sink = StreamSink::new(client, "duplex");

        sink.close().await;
        sink.close().await;
        assert!(matches!(
            sink.write(b"x", MessageKind::Text).await,
            Err(BroadcasterError::SinkClosed)
        ));
    }

    #[tokio::test]
    async fn test_write_to_dropped_peer_fails() {
        let (client, server) = tokio::io::duplex(1024);
        drop(server);
        let sink = StreamSink::new(client, "duplex");
        assert!(sink.write(b"x", MessageKind::Text).await.is_err());
    }

    #[test]
    fn test_sink_ids_are_unique() {
        let a = next_sink_id();
        let b = next_sink_id();
        assert_ne!(a, b);
    }
}
