use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::error::Result;
use crate::hub::Hub;
use crate::sink::{Sink, TcpSink};

/// TCP listener that turns every viewer connection into a hub sink
pub struct ViewerServer {
    listener: TcpListener,
    hub: Arc<Hub>,
}

impl ViewerServer {
    /// Bind the viewer listener
    pub async fn bind(addr: &str, hub: Arc<Hub>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Viewer server listening on {}", listener.local_addr()?);
        Ok(Self { listener, hub })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept viewers until shutdown is signalled
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::info!("New viewer connection from {}", peer);
                        self.register(stream, peer, shutdown.clone());
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept viewer: {}", e);
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("Viewer acceptance task stopped");
    }

    fn register(&self, stream: TcpStream, peer: SocketAddr, shutdown: watch::Receiver<bool>) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("set_nodelay failed for {}: {}", peer, e);
        }

        let (reader, writer) = stream.into_split();
        let sink = Arc::new(TcpSink::from_tcp(writer, peer));
        self.hub.add(sink.clone());

        let hub = Arc::clone(&self.hub);
        tokio::spawn(async move {
            watch_disconnect(reader, shutdown).await;
            hub.remove(sink.id());
            sink.close().await;
            tracing::info!("Viewer {} disconnected", peer);
        });
    }
}

/// Keep reading (and discarding) viewer input until EOF, error or shutdown
async fn watch_disconnect(mut reader: OwnedReadHalf, mut shutdown: watch::Receiver<bool>) {
    let mut buf = [0u8; 512];
    loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            },
            _ = shutdown.changed() => break,
        }
    }
}
