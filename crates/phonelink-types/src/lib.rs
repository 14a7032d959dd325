//! `phonelink-types` – shared data model for the PhoneLink sensor bridge.
//!
//! Everything that crosses a crate boundary lives here: the raw
//! [`SensorSample`] produced by the frame decoder, the [`NormalizedMessage`]
//! variants produced by the unit normalizer, the [`Event`] envelope published
//! on the bus, and the [`BridgeError`] taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Geometric primitives
// ────────────────────────────────────────────────────────────────────────────

/// A 3-axis reading. Units depend on context: g for raw accelerometer,
/// deg/s for raw gyroscope, m/s² and rad/s after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// A rotation quaternion in (w, x, y, z) convention.
///
/// Messages published on the bus carry unit quaternions (|q| = 1 within
/// floating tolerance); [`Quaternion::norm`] exists so callers can verify.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Euclidean norm of the four components.
    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Raw sample (decoder output)
// ────────────────────────────────────────────────────────────────────────────

/// Device Euler angles in degrees, as reported by the phone's orientation
/// API: `alpha` rotation about Z, `beta` about Y, `gamma` about X.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// A raw GPS reading. `latitude`/`longitude` in degrees, `altitude` in
/// metres, `accuracy` in metres (1-sigma horizontal).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GpsReading {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
}

/// A raw battery reading. `level` is reported by the phone as a 0–1
/// fraction and is passed through unclamped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatteryReading {
    pub level: Option<f64>,
    pub voltage: Option<f64>,
    pub charging: Option<bool>,
}

/// Processed device-motion data: `user_acceleration` already in m/s²
/// (gravity removed by the phone), `rotation_rate` in deg/s.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceMotion {
    pub user_acceleration: Option<Vector3>,
    pub rotation_rate: Option<Vector3>,
}

/// One decoded sensor frame. Every field group is independently optional;
/// presence determines which normalized messages are produced downstream.
///
/// A sample is immutable once decoded and lives only for the duration of one
/// frame's processing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSample {
    pub accelerometer: Option<Vector3>,
    pub gyroscope: Option<Vector3>,
    pub orientation: Option<EulerAngles>,
    pub gps: Option<GpsReading>,
    pub battery: Option<BatteryReading>,
    pub device_motion: Option<DeviceMotion>,
}

impl SensorSample {
    /// True when no recognized field group is present. An empty sample is
    /// valid; the normalizer simply emits nothing for it.
    pub fn is_empty(&self) -> bool {
        self.accelerometer.is_none()
            && self.gyroscope.is_none()
            && self.orientation.is_none()
            && self.gps.is_none()
            && self.battery.is_none()
            && self.device_motion.is_none()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Normalized messages (bus payloads)
// ────────────────────────────────────────────────────────────────────────────

/// Row-major 3×3 covariance matrix, ROS convention: element `[0]` set to
/// `-1.0` marks the estimate as unavailable.
pub type Covariance3 = [f64; 9];

/// GPS position covariance interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CovarianceType {
    Unknown,
    Approximated,
    DiagonalKnown,
    Known,
}

/// Battery charge status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeStatus {
    Charging,
    NotCharging,
    Unknown,
}

/// Inertial measurement: linear acceleration in m/s², angular velocity in
/// rad/s, optional orientation quaternion derived from the same frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuMessage {
    pub linear_acceleration: Vector3,
    pub angular_velocity: Vector3,
    pub orientation: Option<Quaternion>,
    pub orientation_covariance: Covariance3,
    pub angular_velocity_covariance: Covariance3,
    pub linear_acceleration_covariance: Covariance3,
}

/// GPS fix: degrees, degrees, metres; diagonal covariance = accuracy².
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFixMessage {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub position_covariance: Covariance3,
    pub position_covariance_type: CovarianceType,
}

/// Battery state: `percentage` is a 0–1 fraction, unclamped by design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryMessage {
    pub percentage: f64,
    pub voltage: f64,
    pub status: ChargeStatus,
    pub present: bool,
}

/// Device-motion twist: linear in m/s² (passthrough), angular in rad/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionMessage {
    pub linear: Vector3,
    pub angular: Vector3,
}

/// Standalone device orientation as a unit quaternion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationMessage {
    pub quaternion: Quaternion,
}

/// One decoded camera frame, passed through as compressed bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraFrame {
    /// Compression format, currently always `"jpeg"`.
    pub format: String,
    pub data: Vec<u8>,
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthLevel {
    Ok,
    Warn,
    Error,
}

/// A single key/value pair attached to a health record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Periodic health record emitted by the diagnostics monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub name: String,
    pub level: HealthLevel,
    pub message: String,
    pub values: Vec<KeyValue>,
}

/// Every message variant that can be published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NormalizedMessage {
    Imu(ImuMessage),
    GpsFix(GpsFixMessage),
    Battery(BatteryMessage),
    Motion(MotionMessage),
    Orientation(OrientationMessage),
    Camera(CameraFrame),
    Health(HealthRecord),
}

/// Envelope for a published message. `timestamp` and `frame_id` are stamped
/// at normalization time, not at decode time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Reference frame the payload is expressed in (e.g. `"phone_base_link"`).
    pub frame_id: String,
    pub payload: NormalizedMessage,
}

impl Event {
    /// Wrap `payload` in a freshly stamped envelope.
    pub fn now(frame_id: impl Into<String>, payload: NormalizedMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            frame_id: frame_id.into(),
            payload,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type for the bridge. Nothing here is fatal to the process:
/// connection errors mark the link down, decode/extract errors drop the
/// offending frame, and the pipeline continues.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("frame decode error: {0}")]
    Decode(String),

    #[error("camera extract error: {0}")]
    Extract(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("config error: {0}")]
    Config(String),
}
