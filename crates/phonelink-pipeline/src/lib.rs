//! `phonelink-pipeline` – the stateless frame-processing pipeline.
//!
//! Pure, per-message transforms with no cross-frame state:
//!
//! - [`decode`] – parses one raw wire frame into a [`DecodedFrame`]
//!   (handshake, camera payload, or partially-populated sensor sample).
//! - [`normalize`] – converts a sample's present field groups into canonical
//!   SI units and quaternion orientation.
//! - [`camera`] – decodes a base64 (optionally data-URL-prefixed) JPEG
//!   payload into raw bytes.
//!
//! [`decode`]: decode::decode
//! [`normalize`]: normalize::normalize

pub mod camera;
pub mod decode;
pub mod normalize;

pub use camera::extract;
pub use decode::{DecodedFrame, decode};
pub use normalize::normalize;
