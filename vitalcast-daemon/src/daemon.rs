//! Component wiring and lifecycle
//!
//! A running daemon owns one message bus, one viewer hub and the tasks that
//! connect them: the wave batcher, the rate relay, the heart-rate processor,
//! the optional synthetic producer, the viewer server and the control server.
//! All tasks observe one shutdown flag.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vitalcast_broadcaster::{relay_text, Hub, SampleBatcher, ViewerServer};
use vitalcast_metrics::StreamMetrics;
use vitalcast_transport::MessageBus;

use crate::config::DaemonConfig;
use crate::ipc::{ControlServer, ControlState};
use crate::processor::RateProcessor;
use crate::producer::WaveProducer;
use crate::socket_utils::get_control_socket_path;

/// How long shutdown waits for each task before abandoning it
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Daemon {
    bus: MessageBus,
    hub: Arc<Hub>,
    metrics: Arc<StreamMetrics>,
    viewer_addr: SocketAddr,
    control_path: PathBuf,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Daemon {
    /// Build and start every component described by `config`.
    ///
    /// Binding the viewer listener or the control socket is fatal.
    pub async fn start(config: DaemonConfig) -> Result<Self> {
        config.validate()?;

        let bus = MessageBus::with_capacity("vitalcast", config.queue_capacity);
        let metrics = Arc::new(StreamMetrics::new());
        let hub = Arc::new(Hub::new(Arc::clone(&metrics), config.batcher.write_timeout()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Subscribe everything before the producer publishes its first sample
        let batcher = SampleBatcher::new(
            bus.subscribe_sync(&config.wave_subject)?,
            Arc::clone(&hub),
            Arc::clone(&metrics),
            config.batcher.to_batcher_config(),
        )
        .context("Invalid batcher configuration")?;
        let params_sub = bus.subscribe_sync(&config.params_subject)?;
        let processor_sub = bus.subscribe_sync(&config.wave_subject)?;
        let processor = RateProcessor::new(bus.clone(), &config.params_subject, config.detector.clone())?;

        let server = ViewerServer::bind(&config.listen_addr, Arc::clone(&hub))
            .await
            .with_context(|| format!("Failed to bind viewer listener on {}", config.listen_addr))?;
        let viewer_addr = server.local_addr()?;

        let control_path = match &config.control_socket_path {
            Some(path) => PathBuf::from(path),
            None => get_control_socket_path()?,
        };
        let control = ControlServer::bind(
            &control_path,
            Arc::new(ControlState {
                metrics: Arc::clone(&metrics),
                hub: Arc::clone(&hub),
                batch_ms: config.batcher.batch_ms,
                max_batch: config.batcher.max_batch,
                shutdown: shutdown_tx.clone(),
            }),
        )?;

        let mut tasks = vec![
            ("batcher", tokio::spawn(batcher.run(shutdown_rx.clone()))),
            ("relay", tokio::spawn(relay_text(params_sub, Arc::clone(&hub), shutdown_rx.clone()))),
            ("processor", tokio::spawn(processor.run(processor_sub, shutdown_rx.clone()))),
            ("viewer-server", tokio::spawn(server.run(shutdown_rx.clone()))),
            ("control-server", tokio::spawn(control.run(shutdown_rx.clone()))),
        ];

        if config.producer.enabled {
            let producer = WaveProducer::new(bus.clone(), &config.wave_subject, config.producer.to_ecg_config())?;
            tasks.push(("producer", tokio::spawn(producer.run(shutdown_rx))));
        } else {
            info!("Built-in producer disabled, waiting for external samples on {}", config.wave_subject);
        }

        info!("Daemon started (viewers on {}, control on {})", viewer_addr, control_path.display());

        Ok(Self {
            bus,
            hub,
            metrics,
            viewer_addr,
            control_path,
            shutdown_tx,
            tasks,
        })
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn metrics(&self) -> &Arc<StreamMetrics> {
        &self.metrics
    }

    /// Address the viewer server is bound to
    pub fn viewer_addr(&self) -> SocketAddr {
        self.viewer_addr
    }

    pub fn control_path(&self) -> &Path {
        &self.control_path
    }

    /// Receiver that flips to `true` when shutdown is requested (for example by `quit`)
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Stop every task, close all viewers and tear down the bus
    pub async fn shutdown(self) {
        info!("Shutting down daemon");
        let _ = self.shutdown_tx.send(true);

        for (name, task) in self.tasks {
            match tokio::time::timeout(TASK_JOIN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Task {} failed: {}", name, e),
                Err(_) => warn!("Task {} did not stop within {:?}", name, TASK_JOIN_TIMEOUT),
            }
        }

        self.hub.close_all().await;
        self.bus.close();

        let snapshot = self.metrics.snapshot();
        info!(
            "Daemon stopped ({} batches, {} samples sent, {} dropped)",
            snapshot.batches_sent, snapshot.samples_sent, snapshot.samples_dropped
        );
    }
}
