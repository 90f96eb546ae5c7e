//! Whole-body gzip compression for buffered responses.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write as _;

/// Compresses the UTF-8 bytes of `text` with gzip.
///
/// Returns `None` when there is nothing to compress (`text` is empty), which is distinct from a
/// compressed empty payload. A compression failure is logged and also reported as `None`; the
/// caller must then give up on sending the body.
#[must_use]
pub fn compress(text: &str) -> Option<Vec<u8>> {
	if text.is_empty() {
		return None;
	}
	let mut encoder = GzEncoder::new(Vec::with_capacity(text.len() / 2), Compression::default());
	let compressed = match encoder.write_all(text.as_bytes()) {
		Ok(()) => encoder.finish(),
		Err(e) => Err(e),
	};
	match compressed {
		Ok(compressed) => Some(compressed),
		Err(e) => {
			log::error!("Error on compressing HTTP response: {e}");
			None
		}
	}
}
