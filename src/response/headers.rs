use chrono::{DateTime, Utc};
use futures_io::AsyncWrite;
use std::io::Result;
use std::pin::Pin;

/// Formats a timestamp as an HTTP date (the RFC 7231 IMF-fixdate form).
#[must_use]
pub fn http_date(when: DateTime<Utc>) -> String {
	when.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// The headers every response carries.
#[derive(Clone, Copy, Debug)]
pub struct Standard<'a> {
	/// A block of raw header lines, CRLF-separated, written first.
	pub raw: Option<&'a str>,

	/// The value of the `Date` header.
	pub date: DateTime<Utc>,

	/// The media type, without parameters.
	pub content_type: &'a str,

	/// The character set appended to the media type.
	pub character_set: &'a str,

	/// The value of the `Server` header.
	pub server_info: &'a str,

	/// Whether the connection stays open after this response.
	pub keep_alive: bool,

	/// The `Content-Encoding` token, if the body is encoded.
	pub content_encoding: Option<&'a str>,

	/// Further complete header lines, written last.
	pub additional: &'a [String],
}

/// Sends a single line followed by CRLF.
///
/// # Errors
/// This function returns an error if writing to `socket` fails.
pub async fn send_line<Socket: AsyncWrite + ?Sized>(
	line: &str,
	mut socket: Pin<&mut Socket>,
) -> Result<()> {
	use crate::util::io::AsyncWriteExt as _;

	let mut buffer = String::with_capacity(line.len() + 2);
	buffer.push_str(line);
	buffer.push_str(crate::util::EOL);
	socket.as_mut().write_all(buffer.as_bytes()).await
}

/// Sends a status line.
///
/// # Errors
/// This function returns an error if writing to `socket` fails.
///
/// # Panics
/// This function panics in a debug build if `reason` contains control characters.
pub async fn send_status<Socket: AsyncWrite + ?Sized>(
	version: &str,
	code: u16,
	reason: &str,
	socket: Pin<&mut Socket>,
) -> Result<()> {
	debug_assert!(
		crate::util::is_field_value(reason.as_bytes()),
		"Reason phrase {:?} is not valid",
		reason
	);
	log::trace!("{} {} {}", version, code, reason);
	send_line(&format!("{version} {code} {reason}"), socket).await
}

/// Sends the standard headers, in order: the raw block, `Date`, `Content-Type`, `Server`,
/// `Connection`, `Content-Encoding` and then the additional lines.
///
/// *Important*: This function does not send the blank line that ends the header section.
///
/// # Errors
/// This function returns an error if writing to `socket` fails.
///
/// # Panics
/// This function panics in a debug build if any of the header lines is malformed or the content
/// type is not a media type.
pub async fn send_standard<Socket: AsyncWrite + ?Sized>(
	headers: &Standard<'_>,
	mut socket: Pin<&mut Socket>,
) -> Result<()> {
	use crate::util::{is_header_line, is_media_type, is_token};

	debug_assert!(
		is_media_type(headers.content_type),
		"Content type {} is not a media type",
		headers.content_type
	);
	debug_assert!(
		is_token(headers.character_set),
		"Character set {} is not a token",
		headers.character_set
	);

	if let Some(raw) = headers.raw {
		debug_assert!(
			raw.split(crate::util::EOL).all(is_header_line),
			"Raw header block {:?} is not a sequence of header lines",
			raw
		);
		send_line(raw, socket.as_mut()).await?;
	}
	send_line(&format!("Date: {}", http_date(headers.date)), socket.as_mut()).await?;
	send_line(
		&format!(
			"Content-Type: {}; charset={}",
			headers.content_type, headers.character_set
		),
		socket.as_mut(),
	)
	.await?;
	send_line(&format!("Server: {}", headers.server_info), socket.as_mut()).await?;
	send_line(
		if headers.keep_alive {
			"Connection: Keep-Alive"
		} else {
			"Connection: close"
		},
		socket.as_mut(),
	)
	.await?;
	if let Some(encoding) = headers.content_encoding {
		debug_assert!(is_token(encoding), "Content encoding {} is not a token", encoding);
		send_line(&format!("Content-Encoding: {encoding}"), socket.as_mut()).await?;
	}
	for line in headers.additional {
		debug_assert!(is_header_line(line), "Header line {:?} is malformed", line);
		send_line(line, socket.as_mut()).await?;
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use chrono::TimeZone as _;
	use futures_executor::block_on;

	fn date() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap()
	}

	/// Tests the date format.
	#[test]
	fn test_http_date() {
		assert_eq!(http_date(date()), "Sun, 06 Nov 1994 08:49:37 GMT");
	}

	/// Tests sending a status line.
	#[test]
	fn test_status() {
		let mut sink = Vec::new();
		block_on(send_status("HTTP/1.1", 404, "Not Found", Pin::new(&mut sink))).unwrap();
		assert_eq!(sink, b"HTTP/1.1 404 Not Found\r\n");
	}

	/// Tests the minimal header set.
	#[test]
	fn test_minimal() {
		let headers = Standard {
			raw: None,
			date: date(),
			content_type: "application/json",
			character_set: "utf-8",
			server_info: "aahr",
			keep_alive: true,
			content_encoding: None,
			additional: &[],
		};
		let mut sink = Vec::new();
		block_on(send_standard(&headers, Pin::new(&mut sink))).unwrap();
		assert_eq!(
			String::from_utf8(sink).unwrap(),
			"Date: Sun, 06 Nov 1994 08:49:37 GMT\r\n\
			Content-Type: application/json; charset=utf-8\r\n\
			Server: aahr\r\n\
			Connection: Keep-Alive\r\n"
		);
	}

	/// Tests the order of every optional header.
	#[test]
	fn test_everything() {
		let additional = vec![
			"Access-Control-Allow-Origin: *".to_owned(),
			"Cache-Control: no-cache".to_owned(),
		];
		let headers = Standard {
			raw: Some("X-First: 1\r\nX-Second: 2"),
			date: date(),
			content_type: "text/csv",
			character_set: "utf-8",
			server_info: "aahr",
			keep_alive: false,
			content_encoding: Some("gzip"),
			additional: &additional,
		};
		let mut sink = Vec::new();
		block_on(send_standard(&headers, Pin::new(&mut sink))).unwrap();
		assert_eq!(
			String::from_utf8(sink).unwrap(),
			"X-First: 1\r\nX-Second: 2\r\n\
			Date: Sun, 06 Nov 1994 08:49:37 GMT\r\n\
			Content-Type: text/csv; charset=utf-8\r\n\
			Server: aahr\r\n\
			Connection: close\r\n\
			Content-Encoding: gzip\r\n\
			Access-Control-Allow-Origin: *\r\n\
			Cache-Control: no-cache\r\n"
		);
	}
}
