//! Shared connection state.
//!
//! [`ConnectionState`] is the only mutable state shared between the transport
//! receive loop (writer) and the diagnostics monitor (reader). Both fields
//! live behind one mutex so a reader can never observe `connected` and the
//! last-frame time mid-update; [`ConnectionState::snapshot`] hands out a
//! consistent copy.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    connected: bool,
    last_frame: Option<Instant>,
}

/// Consistent point-in-time view of the link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkSnapshot {
    pub connected: bool,
    /// Elapsed time since the last received frame; `None` when no frame has
    /// ever arrived.
    pub data_age: Option<Duration>,
}

/// Cloneable handle to the shared link-state cell.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    inner: Arc<Mutex<Inner>>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful transport open.
    pub fn mark_connected(&self) {
        self.lock().connected = true;
    }

    /// Record a transport close or error.
    pub fn mark_disconnected(&self) {
        self.lock().connected = false;
    }

    /// Record the receipt of one frame, refreshing the freshness clock.
    pub fn mark_frame(&self) {
        self.lock().last_frame = Some(Instant::now());
    }

    /// Take a consistent snapshot for diagnostics.
    pub fn snapshot(&self) -> LinkSnapshot {
        let inner = self.lock();
        LinkSnapshot {
            connected: inner.connected,
            data_age: inner.last_frame.map(|t| t.elapsed()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a writer panicked mid-update of plain
        // scalars; the data is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_disconnected_with_no_frames() {
        let state = ConnectionState::new();
        let snap = state.snapshot();
        assert!(!snap.connected);
        assert!(snap.data_age.is_none());
    }

    #[test]
    fn connect_and_frame_are_visible_in_snapshot() {
        let state = ConnectionState::new();
        state.mark_connected();
        state.mark_frame();
        let snap = state.snapshot();
        assert!(snap.connected);
        assert!(snap.data_age.unwrap() < Duration::from_secs(1));
    }

    #[test]
    fn disconnect_preserves_last_frame_time() {
        let state = ConnectionState::new();
        state.mark_connected();
        state.mark_frame();
        state.mark_disconnected();
        let snap = state.snapshot();
        assert!(!snap.connected);
        assert!(snap.data_age.is_some());
    }

    #[test]
    fn data_age_grows_between_frames() {
        let state = ConnectionState::new();
        state.mark_frame();
        thread::sleep(Duration::from_millis(20));
        let age = state.snapshot().data_age.unwrap();
        assert!(age >= Duration::from_millis(20));

        state.mark_frame();
        let refreshed = state.snapshot().data_age.unwrap();
        assert!(refreshed < age);
    }

    #[test]
    fn handles_are_shared_across_clones() {
        let state = ConnectionState::new();
        let writer = state.clone();
        writer.mark_connected();
        assert!(state.snapshot().connected);
    }
}
