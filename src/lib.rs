#![forbid(unsafe_code)]
#![warn(
	future_incompatible,
	nonstandard_style,
	rust_2018_idioms,
	rustdoc,
	unused
)]
#![warn(
	deprecated_in_future,
	missing_crate_level_docs,
	missing_debug_implementations,
	missing_docs,
	missing_doc_code_examples,
	// Disabled due to <https://github.com/rust-lang/rust/issues/69952> and
	// <https://github.com/rust-lang/rust/issues/77217>.
	// single_use_lifetimes,
	trivial_casts,
	trivial_numeric_casts,
	unused_crate_dependencies,
	unused_import_braces,
	// Disabled due to <https://github.com/rust-lang/rust/issues/77217>.
	// unused_lifetimes,
	unused_qualifications,
	unused_results
)]
#![warn(clippy::pedantic, clippy::cargo)]
// Disabled because we frequently mix u64 and usize, where the former is used for message body
// lengths and the latter for in-memory buffer sizes.
#![allow(clippy::cast_possible_truncation)]

//! Agnostic Asynchronous HTTP Responses
//!
//! This crate writes the HTTP/1.1 responses of a database server’s REST front end. It turns
//! whatever a query or command produced (nothing, a scalar, a mapping, one record, or a cursor
//! over many) into a JSON or CSV body, and frames it either with a `Content-Length`, optionally
//! gzip-compressed, or with chunked transfer encoding as it is rendered. It is not tied to any
//! specific asynchronous executor and does not spawn additional threads.
//!
//! The only requirement to use `aahr` is that the application provides a socket connected to the
//! HTTP client, which must implement [`AsyncWrite`](futures_io::AsyncWrite). Records come from the
//! application too, through the [`Identifiable`] and [`Record`] traits; `aahr` never renders a
//! stored record itself.
//!
//! # Example
//! ```
//! let mut socket: Vec<u8> = Vec::new();
//! futures_executor::block_on(async {
//!		let config = aahr::Config::default();
//!
//!		// One writer per exchange.
//!		let mut writer = aahr::ResponseWriter::new(
//!			std::pin::Pin::new(&mut socket),
//!			aahr::ResponseState::new(&config),
//!			aahr::ConnectionGuard::unmonitored(),
//!		);
//!
//!		// A scalar is wrapped in a document of its own.
//!		writer
//!			.write_result(aahr::Value::from(42), aahr::ResultOptions::default())
//!			.await
//!			.unwrap();
//! });
//! assert!(socket.starts_with(b"HTTP/1.1 200 OK\r\n"));
//! assert!(socket.ends_with(br#"{"result": [{"value": 42}]}"#));
//! ```

mod compress;
mod config;
mod connection;
mod csv;
#[cfg(feature = "detailed-errors")]
pub mod error;
#[cfg(not(feature = "detailed-errors"))]
mod error;
mod json;
mod normalize;
mod response;
mod util;
mod value;

pub use compress::compress;
pub use config::Config;
pub use connection::{Connection, ConnectionGuard, ConnectionState};
pub use csv::Table;
pub use error::RenderError;
pub use json::{encode, Completion, FormatSpec, JsonBody, JSON_FORMAT};
pub use normalize::{Entries, Shape};
pub use response::{
	http_date, BodyWriter, ChunkedBody, Emission, Phase, ResponseState, ResponseWriter,
	ResultOptions, CONTENT_CSV, CONTENT_JAVASCRIPT, CONTENT_JSON, CONTENT_TEXT_PLAIN, GZIP,
	SESSION_COOKIE,
};
pub use value::{Document, Identifiable, Record, RecordId, Rows, TypedResult, Value};
