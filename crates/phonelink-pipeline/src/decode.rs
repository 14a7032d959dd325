//! Frame Decoder – one raw wire frame in, one [`DecodedFrame`] out.
//!
//! The phone sends loosely-typed JSON objects where every sensor group is
//! optional and numeric values occasionally arrive as strings. The decoder
//! probes each recognized group independently and returns "absent" rather
//! than failing, so one malformed field never suppresses unrelated groups.
//!
//! A parse failure yields [`BridgeError::Decode`] with no side effects; the
//! caller logs it, drops the frame, and keeps the transport loop alive.

use phonelink_types::{
    BatteryReading, BridgeError, DeviceMotion, EulerAngles, GpsReading, SensorSample, Vector3,
};
use serde_json::Value;
use tracing::warn;

/// Classification of one successfully parsed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    /// `{type:"welcome"}` handshake announcement; discarded silently.
    Welcome,
    /// `{data:"<base64[,prefix]>"}` camera payload, still base64-encoded.
    Camera(String),
    /// A (possibly empty) sensor sample.
    Sample(SensorSample),
}

/// Decode a raw text frame.
///
/// # Errors
///
/// Returns [`BridgeError::Decode`] when the frame is not valid JSON or not a
/// JSON object. Objects with no recognized keys are *not* errors; they decode
/// to an empty [`SensorSample`].
pub fn decode(raw: &str) -> Result<DecodedFrame, BridgeError> {
    let json: Value = serde_json::from_str(raw)
        .map_err(|e| BridgeError::Decode(format!("invalid JSON frame: {e}")))?;

    let Some(obj) = json.as_object() else {
        return Err(BridgeError::Decode(format!(
            "expected a JSON object, got {json}"
        )));
    };

    if obj.get("type").and_then(Value::as_str) == Some("welcome") {
        return Ok(DecodedFrame::Welcome);
    }

    // Camera frames arrive on the same connection as a bare `data` payload.
    if let Some(data) = obj.get("data").and_then(Value::as_str) {
        return Ok(DecodedFrame::Camera(data.to_string()));
    }

    Ok(DecodedFrame::Sample(SensorSample {
        accelerometer: axes_group(&json, "accelerometer"),
        gyroscope: axes_group(&json, "gyroscope"),
        orientation: orientation_group(&json),
        gps: gps_group(&json),
        battery: battery_group(&json),
        device_motion: motion_group(&json),
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Per-group extraction
// ────────────────────────────────────────────────────────────────────────────

/// Coerce a JSON value into a finite f64. Numbers pass through; numeric
/// strings are parsed; everything else is `None`.
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Read `group.key` as f64, treating a present-but-unparseable value the
/// same as an absent one (logged, never an error).
fn field_f64(group: &Value, group_name: &str, key: &str) -> Option<f64> {
    let value = group.get(key)?;
    match coerce_f64(value) {
        Some(v) => Some(v),
        None => {
            warn!(group = group_name, field = key, %value, "unparseable numeric field, treating as absent");
            None
        }
    }
}

/// Extract an `{x,y,z}` group. Missing or unparseable components default to
/// zero, matching the wire contract for partial axis readings.
fn axes_group(json: &Value, name: &str) -> Option<Vector3> {
    let group = json.get(name)?;
    group.as_object()?;
    Some(Vector3::new(
        field_f64(group, name, "x").unwrap_or(0.0),
        field_f64(group, name, "y").unwrap_or(0.0),
        field_f64(group, name, "z").unwrap_or(0.0),
    ))
}

fn orientation_group(json: &Value) -> Option<EulerAngles> {
    let group = json.get("orientation")?;
    group.as_object()?;
    Some(EulerAngles {
        alpha: field_f64(group, "orientation", "alpha").unwrap_or(0.0),
        beta: field_f64(group, "orientation", "beta").unwrap_or(0.0),
        gamma: field_f64(group, "orientation", "gamma").unwrap_or(0.0),
    })
}

/// A GPS group is only usable when `latitude` is present and parseable; a
/// fix without latitude carries no position information.
fn gps_group(json: &Value) -> Option<GpsReading> {
    let group = json.get("gps")?;
    group.as_object()?;
    let latitude = field_f64(group, "gps", "latitude")?;
    Some(GpsReading {
        latitude,
        longitude: field_f64(group, "gps", "longitude").unwrap_or(0.0),
        altitude: field_f64(group, "gps", "altitude"),
        accuracy: field_f64(group, "gps", "accuracy"),
    })
}

fn battery_group(json: &Value) -> Option<BatteryReading> {
    let group = json.get("battery")?;
    group.as_object()?;
    Some(BatteryReading {
        level: field_f64(group, "battery", "level"),
        voltage: field_f64(group, "battery", "voltage"),
        charging: group.get("charging").and_then(Value::as_bool),
    })
}

fn motion_group(json: &Value) -> Option<DeviceMotion> {
    let group = json.get("deviceMotion")?;
    group.as_object()?;
    Some(DeviceMotion {
        user_acceleration: axes_group(group, "userAcceleration"),
        rotation_rate: axes_group(group, "rotationRate"),
    })
}
