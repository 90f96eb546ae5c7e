//! Process-wide settings applied to every response.
//!
//! The server reads these from its own configuration source; every field has a default, so a
//! partial document deserializes.

use serde::{Deserialize, Serialize};

/// Settings every [`ResponseState`](crate::ResponseState) starts from.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
	/// The protocol version written in status lines.
	pub http_version: String,

	/// The character set named in `Content-Type` headers.
	pub character_set: String,

	/// The value of the `Server` header.
	pub server_info: String,

	/// Complete header lines (e.g. `Access-Control-Allow-Origin: *`) added to every response.
	pub additional_headers: Vec<String>,

	/// Whether connections stay open after a response.
	pub keep_alive: bool,

	/// Whether JSON results are streamed with chunked encoding rather than buffered.
	pub streaming: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			http_version: "HTTP/1.1".to_owned(),
			character_set: "utf-8".to_owned(),
			server_info: concat!("aahr/", env!("CARGO_PKG_VERSION")).to_owned(),
			additional_headers: Vec::new(),
			keep_alive: true,
			streaming: false,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	/// Tests that missing fields take their defaults.
	#[test]
	fn test_partial() {
		let config: Config = serde_json::from_str(
			r#"{"streaming": true, "additional_headers": ["Access-Control-Allow-Origin: *"]}"#,
		)
		.unwrap();
		assert!(config.streaming);
		assert!(config.keep_alive);
		assert_eq!(config.http_version, "HTTP/1.1");
		assert_eq!(
			config.additional_headers,
			vec!["Access-Control-Allow-Origin: *".to_owned()]
		);
	}
}
