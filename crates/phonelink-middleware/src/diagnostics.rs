//! Diagnostics Monitor – periodic connection/freshness health records.
//!
//! Runs on a fixed 5-second period, takes a consistent snapshot of the
//! shared [`ConnectionState`], and publishes a [`HealthRecord`] on the bus.
//! Purely a derived read-only view; nothing here mutates link state.

use std::sync::Arc;
use std::time::Duration;

use phonelink_types::{Event, HealthLevel, HealthRecord, KeyValue, NormalizedMessage};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::bus::PublishSink;
use crate::state::{ConnectionState, LinkSnapshot};

/// Evaluation and emission period.
pub const DIAGNOSTICS_PERIOD: Duration = Duration::from_secs(5);

/// Data older than this is considered stale while connected.
pub const STALE_AFTER: Duration = Duration::from_secs(5);

/// Derive a health record from a link snapshot.
///
/// - `Error` – not connected.
/// - `Warn` – connected but no frame for [`STALE_AFTER`] or longer (the
///   message notes the staleness duration), or no frame ever received.
/// - `Ok` – connected and fresh, with a `data_age` key/value attached.
pub fn evaluate(snapshot: &LinkSnapshot) -> HealthRecord {
    let name = "phonelink/connection".to_string();

    if !snapshot.connected {
        return HealthRecord {
            name,
            level: HealthLevel::Error,
            message: "disconnected from phone sensor server".to_string(),
            values: vec![],
        };
    }

    match snapshot.data_age {
        Some(age) if age < STALE_AFTER => HealthRecord {
            name,
            level: HealthLevel::Ok,
            message: "connected to phone sensor server".to_string(),
            values: vec![KeyValue {
                key: "data_age".to_string(),
                value: format!("{:.1}s", age.as_secs_f64()),
            }],
        },
        Some(age) => HealthRecord {
            name,
            level: HealthLevel::Warn,
            message: format!(
                "connected to phone sensor server (no data for {:.1}s)",
                age.as_secs_f64()
            ),
            values: vec![],
        },
        None => HealthRecord {
            name,
            level: HealthLevel::Warn,
            message: "connected to phone sensor server (no data received yet)".to_string(),
            values: vec![],
        },
    }
}

/// Interval task publishing health records until shutdown.
pub struct DiagnosticsMonitor {
    state: ConnectionState,
    sink: Arc<dyn PublishSink>,
    frame_id: String,
}

impl DiagnosticsMonitor {
    pub fn new(state: ConnectionState, sink: Arc<dyn PublishSink>, base_frame: &str) -> Self {
        Self {
            state,
            sink,
            frame_id: base_frame.to_string(),
        }
    }

    /// Emit one record every [`DIAGNOSTICS_PERIOD`] until shutdown is
    /// signalled or the sender side is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(DIAGNOSTICS_PERIOD);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("shutdown requested, diagnostics monitor stopping");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let record = evaluate(&self.state.snapshot());
                    if record.level != HealthLevel::Ok {
                        warn!(level = ?record.level, message = %record.message, "link health degraded");
                    }
                    let _ = self
                        .sink
                        .publish(Event::now(&self.frame_id, NormalizedMessage::Health(record)));
                }
            }
        }
    }
}
