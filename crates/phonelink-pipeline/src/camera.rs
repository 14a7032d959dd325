//! Camera Frame Extractor – base64 payload to raw JPEG bytes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use phonelink_types::{BridgeError, CameraFrame};

/// Decode a camera payload into a passthrough [`CameraFrame`].
///
/// The phone sends either a bare base64 string or a data URL
/// (`"data:image/jpeg;base64,<b64>"`); a leading prefix is stripped by
/// splitting on the first comma. Both forms decode to identical bytes.
///
/// # Errors
///
/// Returns [`BridgeError::Extract`] when the remainder is not valid base64.
/// Callers log the error and drop the frame; no message is emitted.
pub fn extract(payload: &str) -> Result<CameraFrame, BridgeError> {
    let encoded = match payload.split_once(',') {
        Some((_prefix, rest)) => rest,
        None => payload,
    };

    let data = STANDARD
        .decode(encoded.trim())
        .map_err(|e| BridgeError::Extract(format!("invalid base64 image data: {e}")))?;

    Ok(CameraFrame {
        format: "jpeg".to_string(),
        data,
    })
}
