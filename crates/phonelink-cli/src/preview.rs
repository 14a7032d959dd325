//! `phonelink-preview` – quick MJPEG camera stream checker.
//!
//! Connects to the phone's MJPEG camera endpoint, splits the multipart byte
//! stream into individual JPEG frames on the SOI/EOI markers, decodes each
//! frame and prints its dimensions and the effective frame rate. Handy for
//! verifying the camera stream before pointing the bridge at it.
//!
//! Usage: `phonelink-preview [url]` – defaults to the `camera_stream_url`
//! from `~/.phonelink/config.toml`.

mod config;

use std::io::{Read, Write};
use std::time::Instant;

/// JPEG start-of-image marker.
const SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Upper bound on bytes buffered while waiting for a frame boundary. A
/// non-MJPEG endpoint never produces one, so the buffer must not grow
/// without limit.
const MAX_BUFFERED_BYTES: usize = 8 * 1024 * 1024;

fn main() {
    let url = match std::env::args().nth(1) {
        Some(url) => url,
        None => {
            let mut cfg = config::load().ok().flatten().unwrap_or_default();
            config::apply_env_overrides(&mut cfg);
            cfg.camera_stream_url
        }
    };

    println!("Previewing MJPEG stream at {url} (Ctrl-C to stop)");
    if let Err(e) = run(&url) {
        eprintln!("preview failed: {e}");
        std::process::exit(1);
    }
}

fn run(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    // Phones on a LAN serve self-signed certificates.
    let client = reqwest::blocking::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()?;
    let mut response = client.get(url).send()?.error_for_status()?;

    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut frames: u64 = 0;
    let started = Instant::now();

    loop {
        let n = response.read(&mut chunk)?;
        if n == 0 {
            println!();
            println!("stream ended after {frames} frame(s)");
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..n]);

        while let Some((jpeg, consumed)) = next_jpeg(&buffer) {
            frames += 1;
            match image::load_from_memory(&jpeg) {
                Ok(img) => {
                    let fps = frames as f64 / started.elapsed().as_secs_f64().max(1e-9);
                    print!(
                        "\rframe {frames}: {}x{} ({} bytes, {fps:.1} fps)   ",
                        img.width(),
                        img.height(),
                        jpeg.len()
                    );
                    std::io::stdout().flush().ok();
                }
                Err(e) => eprintln!("\nframe {frames}: undecodable jpeg ({e})"),
            }
            buffer.drain(..consumed);
        }

        discard_unframed(&mut buffer);
    }
}

/// Drop buffered bytes that can no longer become part of a frame: anything
/// before the first SOI marker, and the whole buffer once it exceeds
/// [`MAX_BUFFERED_BYTES`] without a complete frame.
fn discard_unframed(buffer: &mut Vec<u8>) {
    match find(buffer, &SOI) {
        Some(0) => {}
        Some(start) => {
            buffer.drain(..start);
        }
        None => {
            // A trailing 0xFF may be the first half of a marker split
            // across two reads.
            let keep = usize::from(buffer.last() == Some(&0xFF));
            buffer.drain(..buffer.len() - keep);
        }
    }

    if buffer.len() > MAX_BUFFERED_BYTES {
        eprintln!(
            "\ndiscarding {} buffered bytes with no frame boundary",
            buffer.len()
        );
        buffer.clear();
    }
}

/// Extract the first complete JPEG from `buffer`.
///
/// Returns the frame bytes and the buffer offset just past its EOI marker,
/// or `None` when no complete frame is buffered yet.
fn next_jpeg(buffer: &[u8]) -> Option<(Vec<u8>, usize)> {
    let start = find(buffer, &SOI)?;
    let end_rel = find(&buffer[start + SOI.len()..], &EOI)?;
    let end = start + SOI.len() + end_rel + EOI.len();
    Some((buffer[start..end].to_vec(), end))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_jpeg_extracts_a_complete_frame() {
        let mut stream = b"--boundary\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        stream.extend_from_slice(&[0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        stream.extend_from_slice(b"\r\n--boundary");

        let (jpeg, consumed) = next_jpeg(&stream).expect("frame present");
        assert_eq!(jpeg, vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        assert!(consumed <= stream.len());
        assert_eq!(&stream[consumed - 2..consumed], &[0xFF, 0xD9]);
    }

    #[test]
    fn next_jpeg_waits_for_the_eoi_marker() {
        // SOI present but the frame is still streaming in.
        let partial = [0xFF, 0xD8, 1, 2, 3];
        assert!(next_jpeg(&partial).is_none());
    }

    #[test]
    fn next_jpeg_ignores_leading_garbage() {
        let mut stream = vec![0u8; 16];
        stream.extend_from_slice(&[0xFF, 0xD8, 9, 0xFF, 0xD9]);
        let (jpeg, _) = next_jpeg(&stream).expect("frame present");
        assert_eq!(jpeg, vec![0xFF, 0xD8, 9, 0xFF, 0xD9]);
    }

    #[test]
    fn two_buffered_frames_come_out_one_at_a_time() {
        let mut stream = vec![0xFF, 0xD8, 1, 0xFF, 0xD9];
        stream.extend_from_slice(&[0xFF, 0xD8, 2, 0xFF, 0xD9]);

        let (first, consumed) = next_jpeg(&stream).expect("first frame");
        assert_eq!(first, vec![0xFF, 0xD8, 1, 0xFF, 0xD9]);

        let rest = &stream[consumed..];
        let (second, _) = next_jpeg(rest).expect("second frame");
        assert_eq!(second, vec![0xFF, 0xD8, 2, 0xFF, 0xD9]);
    }

    #[test]
    fn garbage_without_soi_does_not_accumulate() {
        let mut buffer = vec![0u8; 1024];
        discard_unframed(&mut buffer);
        assert!(buffer.is_empty());
    }

    #[test]
    fn trailing_half_marker_survives_a_discard() {
        let mut buffer = vec![1, 2, 3, 0xFF];
        discard_unframed(&mut buffer);
        assert_eq!(buffer, vec![0xFF]);
    }

    #[test]
    fn bytes_before_soi_are_dropped() {
        let mut buffer = vec![9, 9, 0xFF, 0xD8, 1];
        discard_unframed(&mut buffer);
        assert_eq!(buffer, vec![0xFF, 0xD8, 1]);
    }

    #[test]
    fn oversized_partial_frame_is_cleared() {
        let mut buffer = vec![0xFF, 0xD8];
        buffer.resize(MAX_BUFFERED_BYTES + 1, 0);
        discard_unframed(&mut buffer);
        assert!(buffer.is_empty());
    }

    #[test]
    fn find_locates_a_subsequence() {
        assert_eq!(find(&[0, 1, 2, 3], &[2, 3]), Some(2));
        assert_eq!(find(&[0, 1], &[9]), None);
    }
}
