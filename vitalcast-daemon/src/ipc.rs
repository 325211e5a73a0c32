//! Unix socket control server for metrics, status and quit commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, error, info};
use vitalcast_broadcaster::Hub;
use vitalcast_metrics::StreamMetrics;

use crate::socket_utils::secure_socket_permissions;

/// Control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Metrics,
    Status,
    Quit,
}

impl ControlCommand {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "metrics" | "stats" => Ok(Self::Metrics),
            "status" => Ok(Self::Status),
            "quit" | "exit" | "shutdown" => Ok(Self::Quit),
            _ => anyhow::bail!("Unknown command: {}", s.trim()),
        }
    }
}

/// What the control server can see and do
pub struct ControlState {
    pub metrics: Arc<StreamMetrics>,
    pub hub: Arc<Hub>,
    pub batch_ms: u64,
    pub max_batch: usize,
    pub shutdown: watch::Sender<bool>,
}

impl ControlState {
    /// Execute one command and build the reply
    pub fn execute(&self, command: ControlCommand) -> String {
        match command {
            ControlCommand::Metrics => self.metrics.snapshot().to_text(&[
                ("batch_ms", self.batch_ms),
                ("max_batch", self.max_batch as u64),
            ]),
            ControlCommand::Status => {
                format!("running clients={}\n", self.hub.len())
            }
            ControlCommand::Quit => {
                info!("Received quit command");
                // Only fails when every receiver is gone, i.e. already shut down
                let _ = self.shutdown.send(true);
                "Shutting down\n".to_string()
            }
        }
    }
}

/// Unix socket control server
pub struct ControlServer {
    listener: UnixListener,
    socket_path: PathBuf,
    state: Arc<ControlState>,
}

impl ControlServer {
    /// Bind the control socket, replacing a stale one
    pub fn bind(socket_path: &Path, state: Arc<ControlState>) -> Result<Self> {
        let _ = std::fs::remove_file(socket_path);

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind control socket {}", socket_path.display()))?;
        secure_socket_permissions(socket_path)?;

        info!("Control server listening on {}", socket_path.display());

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            state,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Serve connections until shutdown, then remove the socket file
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, state).await {
                                error!("Control connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept control connection: {}", e),
                },
                _ = shutdown.changed() => break,
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        info!("Control server stopped");
    }
}

/// Handle a single control connection: one command, one reply
pub async fn handle_connection(mut stream: UnixStream, state: Arc<ControlState>) -> Result<()> {
    let mut buffer = [0u8; 1024];
    let n = stream.read(&mut buffer).await?;

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..n]);
    debug!("Received control command: {}", request.trim());

    let response = match ControlCommand::parse(&request) {
        Ok(command) => state.execute(command),
        Err(e) => format!("Error: {}\n", e),
    };

    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    Ok(())
}
