//! `phonelink-middleware` – the runtime plumbing of the sensor bridge.
//!
//! Routes frames from the phone to the internal bus without caring about the
//! data's meaning (the meaning lives in `phonelink-pipeline`).
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels, plus the [`PublishSink`] contract.
//! - [`state`] – the mutex-guarded connection-state cell shared between the
//!   transport loop and the diagnostics monitor.
//! - [`client`] – the transport client: ordered WebSocket → TCP fallback,
//!   trust-all TLS, raw-frame delivery over a channel.
//! - [`ingest`] – the single processing task that turns raw frames into
//!   published events (decode → normalize → stamp → publish).
//! - [`diagnostics`] – periodic connection/freshness health records.
//! - [`egress`] – WebSocket fan-out of the live event stream for dashboards.
//!
//! [`PublishSink`]: bus::PublishSink

pub mod bus;
pub mod client;
pub mod diagnostics;
pub mod egress;
pub mod ingest;
pub mod state;

pub use bus::{EventBus, PublishSink, Topic, TopicReceiver};
pub use client::{TransportClient, TransportKind};
pub use diagnostics::DiagnosticsMonitor;
pub use egress::WsEgress;
pub use ingest::IngestPump;
pub use state::{ConnectionState, LinkSnapshot};
