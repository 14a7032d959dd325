//! Ingest pump – the single task that turns raw frames into published events.
//!
//! The transport client pushes raw frames onto an `mpsc` channel; this pump
//! consumes it and runs decode → normalize → stamp → publish synchronously
//! per frame, so ordering and backpressure stay explicit. Malformed frames
//! are logged and dropped; nothing here can take the pipeline down.

use std::sync::Arc;

use phonelink_pipeline::{DecodedFrame, camera, decode, normalize};
use phonelink_types::{Event, NormalizedMessage};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bus::PublishSink;

/// Channel-fed frame processor.
pub struct IngestPump {
    sink: Arc<dyn PublishSink>,
    /// Reference frame stamped on sensor messages.
    frame_id: String,
    /// Reference frame stamped on camera messages.
    camera_frame_id: String,
}

impl IngestPump {
    pub fn new(sink: Arc<dyn PublishSink>, base_frame: &str) -> Self {
        Self {
            sink,
            frame_id: base_frame.to_string(),
            camera_frame_id: format!("{base_frame}_camera"),
        }
    }

    /// Consume raw frames until the channel closes (transport gone).
    pub async fn run(self, mut frames: mpsc::Receiver<String>) {
        while let Some(raw) = frames.recv().await {
            self.process(&raw);
        }
        debug!("frame channel closed, ingest pump stopping");
    }

    /// Process one raw frame. Fully self-contained: no state survives from
    /// one call to the next.
    pub fn process(&self, raw: &str) {
        match decode(raw) {
            Ok(DecodedFrame::Welcome) => {
                debug!("welcome handshake received, awaiting sensor data");
            }
            Ok(DecodedFrame::Camera(payload)) => match camera::extract(&payload) {
                Ok(frame) => {
                    self.publish(&self.camera_frame_id, NormalizedMessage::Camera(frame));
                }
                Err(e) => warn!(error = %e, "dropping malformed camera payload"),
            },
            Ok(DecodedFrame::Sample(sample)) => {
                for message in normalize(&sample) {
                    self.publish(&self.frame_id, message);
                }
            }
            Err(e) => warn!(error = %e, "dropping malformed frame"),
        }
    }

    fn publish(&self, frame_id: &str, message: NormalizedMessage) {
        // Fire-and-forget: zero subscribers on a lane is a normal condition.
        if let Err(e) = self.sink.publish(Event::now(frame_id, message)) {
            debug!(error = %e, "event published with no subscribers");
        }
    }
}
