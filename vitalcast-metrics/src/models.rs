//! Data models for metrics reporting

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Read-only copy of the gateway counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Live viewer connections
    pub clients: i64,
    /// Wave batches broadcast
    pub batches_sent: u64,
    /// Samples packed into broadcast batches
    pub samples_sent: u64,
    /// Samples lost to overflow or decode failure
    pub samples_dropped: u64,
    /// Seconds since the collector was created
    pub uptime_s: u64,
}

impl MetricsSnapshot {
    /// Render as plain `key value` lines.
    ///
    /// `extra` entries (typically static configuration such as the batch
    /// interval) are appended after the counters in the given order.
    pub fn to_text(&self, extra: &[(&str, u64)]) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = writeln!(out, "clients {}", self.clients);
        let _ = writeln!(out, "batches_sent {}", self.batches_sent);
        let _ = writeln!(out, "samples_sent {}", self.samples_sent);
        let _ = writeln!(out, "samples_dropped {}", self.samples_dropped);
        let _ = writeln!(out, "uptime_s {}", self.uptime_s);
        for (key, value) in extra {
            let _ = writeln!(out, "{} {}", key, value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_rendering() {
        let snapshot = MetricsSnapshot {
            clients: 3,
            batches_sent: 25,
            samples_sent: 250,
            samples_dropped: 4,
            uptime_s: 1,
        };

        let text = snapshot.to_text(&[("batch_ms", 40), ("max_batch", 200)]);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines,
            vec![
                "clients 3",
                "batches_sent 25",
                "samples_sent 250",
                "samples_dropped 4",
                "uptime_s 1",
                "batch_ms 40",
                "max_batch 200",
            ]
        );
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_json_serialization() {
        let snapshot = MetricsSnapshot {
            clients: 1,
            batches_sent: 2,
            ..Default::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"clients\":1"));
        assert!(json.contains("\"batches_sent\":2"));
    }
}
