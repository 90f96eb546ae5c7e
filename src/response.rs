mod chunked;
mod headers;

pub use chunked::ChunkedBody;
pub use headers::http_date;

use crate::config::Config;
use crate::connection::ConnectionGuard;
use crate::csv::Table;
use crate::json::{Completion, FormatSpec, JsonBody, JSON_FORMAT};
use crate::normalize::{Entries, Shape};
use crate::value::{Identifiable, Value};
use futures_io::{AsyncRead, AsyncWrite};
use std::io::Result;
use std::pin::Pin;

/// The media type of plain text.
pub const CONTENT_TEXT_PLAIN: &str = "text/plain";

/// The media type of JSON bodies.
pub const CONTENT_JSON: &str = "application/json";

/// The media type of CSV bodies.
pub const CONTENT_CSV: &str = "text/csv";

/// The media type of JSONP bodies.
pub const CONTENT_JAVASCRIPT: &str = "text/javascript";

/// The content encoding token that turns on body compression.
pub const GZIP: &str = "gzip";

/// The name of the cookie carrying the session ID.
pub const SESSION_COOKIE: &str = "OSESSIONID";

/// Everything about a response that handlers may decide before it is sent.
///
/// Values staged here override what the sending operation is asked to send; see
/// [`ResponseWriter::send`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponseState {
	/// The protocol version written in the status line.
	pub http_version: String,

	/// The status code to send regardless of what the sending operation asks for, or 0 to let
	/// the operation decide.
	pub code: u16,

	/// A block of raw header lines, CRLF-separated, written before all other headers.
	pub headers: Option<String>,

	/// Complete header lines written after the standard headers.
	pub additional_headers: Vec<String>,

	/// A media type overriding the one the sending operation asks for.
	pub content_type: Option<String>,

	/// The character set named in the `Content-Type` header.
	pub character_set: String,

	/// The value of the `Server` header.
	pub server_info: String,

	/// The session ID, sent as a cookie.
	pub session_id: Option<String>,

	/// The JSONP callback function; if set, bodies are wrapped in a call to it.
	pub callback_function: Option<String>,

	/// The content encoding; [`GZIP`] compresses buffered bodies.
	pub content_encoding: Option<String>,

	/// A body overriding the one the sending operation asks for.
	pub content: Option<String>,

	/// Whether the connection stays open after the response.
	pub keep_alive: bool,

	/// Whether JSON results are streamed with chunked encoding rather than buffered.
	pub streaming: bool,
}

impl ResponseState {
	/// Constructs the state for a new exchange from the process-wide settings.
	#[must_use]
	pub fn new(config: &Config) -> Self {
		Self {
			http_version: config.http_version.clone(),
			code: 0,
			headers: None,
			additional_headers: config.additional_headers.clone(),
			content_type: None,
			character_set: config.character_set.clone(),
			server_info: config.server_info.clone(),
			session_id: None,
			callback_function: None,
			content_encoding: None,
			content: None,
			keep_alive: config.keep_alive,
			streaming: config.streaming,
		}
	}
}

/// Whether a response body has been sent yet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
	/// Nothing has been sent.
	Pending,

	/// A response has been sent, or its sending has started; further sends do nothing.
	Sent,
}

/// How a JSON result is emitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Emission {
	/// Rendered into memory and sent with a `Content-Length`, compressed if so configured.
	Buffered,

	/// Sent with chunked transfer encoding as it is rendered.
	Streamed,
}

/// How a result is to be rendered.
#[derive(Debug, Default)]
pub struct ResultOptions<'a> {
	/// Extra options passed to records along with the base ones.
	pub format: Option<&'a str>,

	/// The fetch plan passed to records.
	pub fetch_plan: Option<&'a str>,

	/// The request’s `Accept` header; CSV is sent if it mentions `text/csv`.
	pub accept: Option<&'a str>,

	/// Named values written after the result, in order.
	pub properties: Vec<(String, Value)>,

	/// Overrides, for this result only, whether it is streamed.
	pub mode: Option<Emission>,
}

/// Something that writes a response body into a sink.
///
/// The sink is the chunked body of a streamed response, or an in-memory buffer.
#[allow(async_fn_in_trait)]
pub trait BodyWriter {
	/// Writes the body.
	///
	/// A writer producing a long body should consult `guard` as it goes and return
	/// [`Completion::Abandoned`] once the peer has gone away.
	///
	/// # Errors
	/// This function returns an error if writing to `sink` fails.
	async fn write_body<Sink: AsyncWrite + ?Sized>(
		self,
		sink: Pin<&mut Sink>,
		guard: &ConnectionGuard<'_>,
	) -> Result<Completion>;
}

/// A body wrapped in a call to a JSONP callback.
#[derive(Debug)]
struct Jsonp<Inner> {
	/// The callback function name.
	callback: String,

	/// The wrapped body.
	inner: Inner,
}

impl<Inner: BodyWriter> BodyWriter for Jsonp<Inner> {
	async fn write_body<Sink: AsyncWrite + ?Sized>(
		self,
		mut sink: Pin<&mut Sink>,
		guard: &ConnectionGuard<'_>,
	) -> Result<Completion> {
		use crate::util::io::AsyncWriteExt as _;

		let mut head = self.callback;
		head.push('(');
		sink.as_mut().write_all(head.as_bytes()).await?;
		if self.inner.write_body(sink.as_mut(), guard).await? == Completion::Abandoned {
			return Ok(Completion::Abandoned);
		}
		sink.as_mut().write_all(b")").await?;
		Ok(Completion::Finished)
	}
}

/// Sends one HTTP response over a socket.
///
/// The `'socket` lifetime parameter is the lifetime of the transport socket and of the connection
/// the guard watches. The `Socket` type parameter is the type of transport-layer socket.
///
/// Only one response body is ever sent: once any of the sending operations has started, all of
/// them do nothing. The low-level framing functions ([`write_status`](Self::write_status) and
/// friends) are not guarded.
#[derive(Debug)]
pub struct ResponseWriter<'socket, Socket: AsyncWrite + ?Sized> {
	/// The underlying socket.
	socket: Pin<&'socket mut Socket>,

	/// The liveness check for the peer.
	guard: ConnectionGuard<'socket>,

	/// The staged response.
	state: ResponseState,

	/// Whether a body has been sent.
	phase: Phase,
}

impl<'socket, Socket: AsyncWrite + ?Sized> ResponseWriter<'socket, Socket> {
	/// Constructs a new `ResponseWriter`.
	///
	/// The `socket` parameter is the transport-layer socket; it is recommended that it provide
	/// write buffering, since headers are written one line at a time.
	pub fn new(
		socket: Pin<&'socket mut Socket>,
		state: ResponseState,
		guard: ConnectionGuard<'socket>,
	) -> Self {
		Self {
			socket,
			guard,
			state,
			phase: Phase::Pending,
		}
	}

	/// Returns the staged response.
	#[must_use]
	pub fn state(&self) -> &ResponseState {
		&self.state
	}

	/// Returns the staged response for modification.
	pub fn state_mut(&mut self) -> &mut ResponseState {
		&mut self.state
	}

	/// Returns whether a response has been sent.
	#[must_use]
	pub fn is_sent(&self) -> bool {
		self.phase == Phase::Sent
	}

	/// Chooses, for this response only, whether JSON results are streamed.
	pub fn set_streaming(&mut self, streaming: bool) {
		self.state.streaming = streaming;
	}

	/// Sends a status line.
	///
	/// # Errors
	/// This function returns an error if writing to the socket fails.
	pub async fn write_status(&mut self, code: u16, reason: &str) -> Result<()> {
		headers::send_status(&self.state.http_version, code, reason, self.socket.as_mut()).await
	}

	/// Sends the standard headers, including `Content-Encoding` if one is staged.
	///
	/// # Errors
	/// This function returns an error if writing to the socket fails.
	pub async fn write_headers(&mut self, content_type: &str) -> Result<()> {
		self.send_standard(content_type, true).await
	}

	/// Sends the standard headers, leaving out `Content-Encoding` unless `encoded` is set.
	async fn send_standard(&mut self, content_type: &str, encoded: bool) -> Result<()> {
		let standard = headers::Standard {
			raw: self.state.headers.as_deref(),
			date: chrono::Utc::now(),
			content_type,
			character_set: &self.state.character_set,
			server_info: &self.state.server_info,
			keep_alive: self.state.keep_alive,
			content_encoding: if encoded {
				self.state.content_encoding.as_deref().filter(|e| !e.is_empty())
			} else {
				None
			},
			additional: &self.state.additional_headers,
		};
		headers::send_standard(&standard, self.socket.as_mut()).await
	}

	/// Sends a line followed by CRLF.
	///
	/// # Errors
	/// This function returns an error if writing to the socket fails.
	pub async fn write_line(&mut self, line: &str) -> Result<()> {
		headers::send_line(line, self.socket.as_mut()).await
	}

	/// Sends text with no line terminator.
	///
	/// # Errors
	/// This function returns an error if writing to the socket fails.
	pub async fn write_content(&mut self, content: &str) -> Result<()> {
		use crate::util::io::AsyncWriteExt as _;

		self.socket.as_mut().write_all(content.as_bytes()).await
	}

	/// Flushes the socket, and closes it if the connection is not kept alive.
	///
	/// # Errors
	/// This function returns an error if flushing or closing the socket fails.
	pub async fn flush(&mut self) -> Result<()> {
		use crate::util::io::AsyncWriteExt as _;

		self.socket.as_mut().flush().await?;
		if !self.state.keep_alive {
			self.socket.as_mut().close().await?;
		}
		Ok(())
	}

	/// Sends a complete response with a `Content-Length`.
	///
	/// If a JSONP callback is staged, the body is `callback(content)` (with `null` standing in for
	/// absent content) and the media type is `text/javascript`. Otherwise, staged content and a
	/// staged media type take precedence over `content` and `content_type`.
	///
	/// A staged status code is sent in place of `code`. Otherwise, a 200 response with an empty
	/// body becomes 204.
	///
	/// If the staged content encoding is [`GZIP`], the body is compressed. This happens before
	/// anything is written, so a failure to compress leaves the socket untouched.
	///
	/// The `extra_header` parameter is a complete header line (e.g. `ETag: 3`).
	///
	/// # Errors
	/// This function returns an error if the body cannot be compressed or writing to the socket
	/// fails.
	pub async fn send(
		&mut self,
		code: u16,
		reason: &str,
		content_type: &str,
		content: Option<&str>,
		extra_header: Option<&str>,
	) -> Result<()> {
		if self.phase == Phase::Sent {
			return Ok(());
		}
		self.phase = Phase::Sent;

		let (content, content_type) = match &self.state.callback_function {
			Some(callback) => (
				Some(format!("{}({})", callback, content.unwrap_or("null"))),
				CONTENT_JAVASCRIPT.to_owned(),
			),
			None => (
				match self.state.content.as_deref() {
					Some(staged) if !staged.is_empty() => Some(staged.to_owned()),
					_ => content.map(str::to_owned),
				},
				match self.state.content_type.as_deref() {
					Some(staged) if !staged.is_empty() => staged.to_owned(),
					_ => content_type.to_owned(),
				},
			),
		};

		let body = match content.filter(|c| !c.is_empty()) {
			None => None,
			Some(text) if self.state.content_encoding.as_deref() == Some(GZIP) => {
				Some(crate::compress::compress(&text).ok_or(crate::error::Error::Compression)?)
			}
			Some(text) => Some(text.into_bytes()),
		};

		if self.state.code > 0 {
			self.send_fixed(self.state.code, reason, &content_type, extra_header, body)
				.await
		} else if body.is_none() && code == 200 {
			self.send_fixed(204, "No Content", &content_type, extra_header, None)
				.await
		} else {
			self.send_fixed(code, reason, &content_type, extra_header, body)
				.await
		}
	}

	/// Sends an empty 204 response, ignoring any staged body, media type, status or callback.
	async fn send_empty(&mut self) -> Result<()> {
		if self.phase == Phase::Sent {
			return Ok(());
		}
		self.phase = Phase::Sent;
		self.send_fixed(204, "No Content", CONTENT_TEXT_PLAIN, None, None)
			.await
	}

	/// Sends the status line, headers and an already encoded body, then flushes.
	async fn send_fixed(
		&mut self,
		code: u16,
		reason: &str,
		content_type: &str,
		extra_header: Option<&str>,
		body: Option<Vec<u8>>,
	) -> Result<()> {
		self.write_status(code, reason).await?;
		self.send_standard(content_type, true).await?;
		if let Some(line) = extra_header {
			debug_assert!(
				crate::util::is_header_line(line),
				"Header line {:?} is malformed",
				line
			);
			self.write_line(line).await?;
		}
		if let Some(session_id) = self.state.session_id.clone() {
			self.write_line(&format!(
				"Set-Cookie: {SESSION_COOKIE}={session_id}; Path=/; HttpOnly"
			))
			.await?;
		}
		let length = body.as_ref().map_or(0, Vec::len);
		self.write_line(&format!("Content-Length: {length}")).await?;
		self.write_line("").await?;
		if let Some(body) = body {
			use crate::util::io::AsyncWriteExt as _;
			self.socket.as_mut().write_all(&body).await?;
		}
		self.flush().await
	}

	/// Sends a response whose body is produced by `writer` and sent with chunked transfer
	/// encoding.
	///
	/// If `filename` is given, the body is offered as a download under that name.
	///
	/// If the peer goes away while the body is being written, the response is abandoned: nothing
	/// more is written and this function succeeds.
	///
	/// # Errors
	/// This function returns an error if writing to the socket fails, or the error `writer`
	/// returned; in the latter case, the body is still terminated if possible.
	pub async fn send_stream<Writer: BodyWriter>(
		&mut self,
		code: u16,
		reason: &str,
		content_type: &str,
		filename: Option<&str>,
		writer: Writer,
	) -> Result<()> {
		if self.phase == Phase::Sent {
			return Ok(());
		}
		self.phase = Phase::Sent;

		self.write_status(code, reason).await?;
		self.send_standard(content_type, false).await?;
		self.write_line("Content-Transfer-Encoding: binary").await?;
		self.write_line("Transfer-Encoding: chunked").await?;
		if let Some(filename) = filename {
			self.write_line(&format!(
				"Content-Disposition: attachment; filename=\"{filename}\""
			))
			.await?;
		}
		self.write_line("").await?;

		let guard = self.guard;
		let mut body = ChunkedBody::new(self.socket.as_mut());
		match writer.write_body(Pin::new(&mut body), &guard).await {
			Ok(Completion::Finished) => {
				body.finish().await?;
				self.flush().await
			}
			Ok(Completion::Abandoned) => {
				log::debug!("Peer went away; abandoning {} response", content_type);
				Ok(())
			}
			Err(e) => {
				if body.is_between_chunks() {
					if let Err(e) = body.finish().await {
						log::debug!("Cannot terminate failed response body: {}", e);
					} else if let Err(e) = self.flush().await {
						log::debug!("Cannot flush failed response: {}", e);
					}
				}
				Err(e)
			}
		}
	}

	/// Sends a response whose body is read from `reader`.
	///
	/// If `size` is given, exactly that many bytes are copied; otherwise the whole reader is read
	/// into memory first to learn its length. If `filename` is given, the body is offered as a
	/// download under that name. Each of `headers` is sent as a `name: value` line.
	///
	/// # Errors
	/// This function returns an error if reading from `reader` or writing to the socket fails, or
	/// if `reader` ends before `size` bytes.
	#[allow(clippy::too_many_arguments)]
	pub async fn send_reader<Reader: AsyncRead + ?Sized>(
		&mut self,
		code: u16,
		reason: &str,
		content_type: &str,
		mut reader: Pin<&mut Reader>,
		size: Option<u64>,
		filename: Option<&str>,
		headers: &[(&str, &str)],
	) -> Result<()> {
		use crate::util::io::AsyncWriteExt as _;

		if self.phase == Phase::Sent {
			return Ok(());
		}
		self.phase = Phase::Sent;

		// Reading happens first so that a failing reader leaves the socket untouched.
		let buffered = match size {
			Some(_) => None,
			None => {
				let mut buffer = Vec::new();
				crate::util::io::read_to_end(reader.as_mut(), &mut buffer).await?;
				Some(buffer)
			}
		};

		self.write_status(code, reason).await?;
		self.send_standard(content_type, false).await?;
		self.write_line("Content-Transfer-Encoding: binary").await?;
		if let Some(filename) = filename {
			self.write_line(&format!(
				"Content-Disposition: attachment; filename=\"{filename}\""
			))
			.await?;
		}
		for (name, value) in headers {
			debug_assert!(crate::util::is_token(name), "Header {} is not a token", name);
			self.write_line(&format!("{name}: {value}")).await?;
		}
		match buffered {
			Some(buffer) => {
				self.write_line(&format!("Content-Length: {}", buffer.len()))
					.await?;
				self.write_line("").await?;
				self.socket.as_mut().write_all(&buffer).await?;
			}
			None => {
				let size = size.unwrap_or_default();
				self.write_line(&format!("Content-Length: {size}")).await?;
				self.write_line("").await?;
				crate::util::io::copy_exact(reader, self.socket.as_mut(), size).await?;
			}
		}
		self.flush().await
	}

	/// Sends a query or command result.
	///
	/// No result is sent as an empty `text/plain` 204 response, whatever has been staged. Anything
	/// else is normalized into a sequence of entries and sent by
	/// [`write_records`](Self::write_records).
	///
	/// # Errors
	/// This function returns an error if writing to the socket fails.
	pub async fn write_result(&mut self, value: Value, options: ResultOptions<'_>) -> Result<()> {
		match Shape::classify(value).into_entries() {
			None => self.send_empty().await,
			Some(entries) => self.write_records(entries, options).await,
		}
	}

	/// Sends a sequence of entries.
	///
	/// If the `Accept` header mentions `text/csv`, the records among the entries are sent as a
	/// CSV download named `data.csv`. Otherwise the entries and properties are sent as one JSON
	/// object, streamed or buffered according to [`ResultOptions::mode`] or, if that is absent,
	/// the staged streaming flag. The bytes of the JSON body are the same either way, including a
	/// JSONP wrapping; staged content, which replaces the body outright, is always buffered.
	///
	/// # Errors
	/// This function returns an error if writing to the socket fails.
	pub async fn write_records(
		&mut self,
		entries: Entries,
		options: ResultOptions<'_>,
	) -> Result<()> {
		if self.phase == Phase::Sent {
			return Ok(());
		}

		if options.accept.map_or(false, |a| a.contains(CONTENT_CSV)) {
			let table = Table::collect(entries);
			return self
				.send_stream(200, "OK", CONTENT_CSV, Some("data.csv"), table)
				.await;
		}

		let body = JsonBody::new(
			entries,
			options.properties,
			FormatSpec::new(options.format, options.fetch_plan),
		);
		let streamed = match options.mode {
			Some(Emission::Streamed) => true,
			Some(Emission::Buffered) => false,
			None => self.state.streaming,
		};
		let staged = self.state.content.as_deref().map_or(false, |c| !c.is_empty());
		let code = if self.state.code > 0 { self.state.code } else { 200 };
		let callback = if streamed {
			self.state.callback_function.clone()
		} else {
			None
		};
		if let Some(callback) = callback {
			let body = Jsonp {
				callback,
				inner: body,
			};
			self.send_stream(code, "OK", CONTENT_JAVASCRIPT, None, body)
				.await
		} else if streamed && !staged {
			let content_type = match self.state.content_type.as_deref() {
				Some(staged) if !staged.is_empty() => staged.to_owned(),
				_ => CONTENT_JSON.to_owned(),
			};
			self.send_stream(code, "OK", &content_type, None, body)
				.await
		} else {
			let mut buffer = Vec::new();
			let guard = self.guard;
			if body.write_body(Pin::new(&mut buffer), &guard).await? == Completion::Abandoned {
				log::debug!("Peer went away; abandoning buffered response");
				self.phase = Phase::Sent;
				return Ok(());
			}
			let text = String::from_utf8(buffer)
				.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
			self.send(200, "OK", CONTENT_JSON, Some(&text), None).await
		}
	}

	/// Sends a single record, with its version as the entity tag.
	///
	/// The record is rendered with `format`, or the base options if absent, plus the fetch plan.
	/// If the record cannot be loaded, nothing is sent.
	///
	/// # Errors
	/// This function returns an error if the record fails to render or writing to the socket
	/// fails.
	pub async fn write_record(
		&mut self,
		record: &dyn Identifiable,
		fetch_plan: Option<&str>,
		format: Option<&str>,
	) -> Result<()> {
		let Some(record) = record.record() else {
			return Ok(());
		};
		let mut format = format.unwrap_or(JSON_FORMAT).to_owned();
		if let Some(plan) = fetch_plan {
			format.push_str(",fetchPlan:");
			format.push_str(plan);
		}
		let json = record
			.to_json(&format)
			.map_err(crate::error::Error::Render)?;
		let etag = format!("ETag: {}", record.version());
		self.send(200, "OK", CONTENT_JSON, Some(&json), Some(&etag))
			.await
	}
}
