//! End-to-end tests against a running daemon

use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UnixStream};
use vitalcast_broadcaster::{read_frame, MessageKind};
use vitalcast_daemon::{Daemon, DaemonConfig};
use vitalcast_transport::{unpack_f32_le, RateMessage};

fn test_config(dir: &TempDir) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.config_path = dir.path().join("config.toml");
    config.listen_addr = "127.0.0.1:0".to_string();
    config.control_socket_path = Some(dir.path().join("control.sock").display().to_string());
    config
}

async fn control(path: &Path, command: &str) -> String {
    let mut stream = UnixStream::connect(path).await.unwrap();
    stream.write_all(command.as_bytes()).await.unwrap();
    let mut reply = String::new();
    tokio::time::timeout(Duration::from_secs(1), stream.read_to_string(&mut reply))
        .await
        .expect("control reply within 1s")
        .unwrap();
    reply
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn test_simulated_stream_reaches_viewer() {
    let dir = TempDir::new().unwrap();
    let daemon = Daemon::start(test_config(&dir)).await.unwrap();

    let mut viewer = TcpStream::connect(daemon.viewer_addr()).await.unwrap();
    wait_for(|| daemon.hub().len() == 1).await;

    let mut wave_frames = 0;
    let mut rate = None;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);

    while rate.is_none() || wave_frames == 0 {
        let frame = tokio::time::timeout_at(deadline, read_frame(&mut viewer))
            .await
            .expect("wave frames and a rate event within 5s")
            .unwrap()
            .expect("viewer connection stays open");

        match frame {
            (MessageKind::Binary, payload) => {
                let samples = unpack_f32_le(&payload).unwrap();
                assert!(!samples.is_empty());
                wave_frames += 1;
            }
            (MessageKind::Text, payload) => {
                rate = Some(RateMessage::from_bytes(&payload).unwrap());
            }
        }
    }

    let rate = rate.unwrap();
    assert_eq!(rate.subject, "ecg.params");
    assert!((65..=80).contains(&rate.bpm), "simulated 72 BPM, got {}", rate.bpm);

    let reply = control(daemon.control_path(), "metrics").await;
    assert!(reply.lines().any(|l| l == "clients 1"));
    assert!(reply.lines().any(|l| l == "batch_ms 40"));
    assert!(reply.lines().any(|l| l == "max_batch 200"));
    let batches: u64 = reply
        .lines()
        .find_map(|l| l.strip_prefix("batches_sent "))
        .unwrap()
        .parse()
        .unwrap();
    assert!(batches > 0);

    daemon.shutdown().await;

    // Viewer sees the connection close
    let closed = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            match read_frame(&mut viewer).await {
                Ok(Some(_)) => continue,
                _ => break,
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn test_external_samples_without_producer() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.producer.enabled = false;
    let daemon = Daemon::start(config).await.unwrap();

    let mut viewer = TcpStream::connect(daemon.viewer_addr()).await.unwrap();
    wait_for(|| daemon.hub().len() == 1).await;

    let bus = daemon.bus();
    bus.publish("ecg.wave", br#"{"v":0.1}"#.to_vec()).unwrap();
    bus.publish("ecg.wave", b"broken".to_vec()).unwrap();
    bus.publish("ecg.wave", br#"{"v":0.2,"seq":7,"fs":250.0}"#.to_vec()).unwrap();

    let (kind, payload) = tokio::time::timeout(Duration::from_secs(1), read_frame(&mut viewer))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(kind, MessageKind::Binary);
    assert_eq!(unpack_f32_le(&payload).unwrap(), vec![0.1, 0.2]);
    assert_eq!(daemon.metrics().samples_dropped(), 1);

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_control_commands() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.producer.enabled = false;
    let daemon = Daemon::start(config).await.unwrap();
    let path = daemon.control_path().to_path_buf();

    assert_eq!(control(&path, "status\n").await, "running clients=0\n");
    assert_eq!(control(&path, "reboot").await, "Error: Unknown command: reboot\n");

    let mut quit = daemon.shutdown_signal();
    assert_eq!(control(&path, "quit").await, "Shutting down\n");
    tokio::time::timeout(Duration::from_secs(1), quit.changed())
        .await
        .expect("quit flips the shutdown signal")
        .unwrap();
    assert!(*quit.borrow());

    daemon.shutdown().await;
    assert!(!path.exists(), "control socket removed on shutdown");
}

#[tokio::test]
async fn test_listener_bind_failure_is_fatal() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.listen_addr = occupied.local_addr().unwrap().to_string();

    assert!(Daemon::start(config).await.is_err());
}
