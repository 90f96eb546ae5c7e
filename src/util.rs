pub mod io;

/// The line terminator used throughout HTTP framing and CSV bodies.
pub const EOL: &str = "\r\n";

/// Checks whether a byte is a `tchar` (token character).
pub fn is_tchar(b: u8) -> bool {
	(b'A'..=b'Z').contains(&b)
		|| (b'a'..=b'z').contains(&b)
		|| (b'0'..=b'9').contains(&b)
		|| b == b'!'
		|| b == b'#'
		|| b == b'$'
		|| b == b'%'
		|| b == b'&'
		|| b == b'\''
		|| b == b'*'
		|| b == b'+'
		|| b == b'-'
		|| b == b'.'
		|| b == b'^'
		|| b == b'_'
		|| b == b'`'
		|| b == b'|'
		|| b == b'~'
}

/// Checks whether a string is a token.
pub fn is_token(name: &str) -> bool {
	!name.is_empty() && name.bytes().all(is_tchar)
}

/// Checks whether a byte can legally appear in an HTTP header value.
pub fn is_field_vchar(b: u8) -> bool {
	b == b'\t' || b >= 0x20
}

/// Checks whether a sequence of bytes is a valid HTTP header value.
pub fn is_field_value(value: &[u8]) -> bool {
	match (value.first(), value.last()) {
		(Some(&first), Some(&last)) => {
			first != b' '
				&& first != b'\t'
				&& last != b' '
				&& last != b'\t'
				&& value.iter().all(|b| is_field_vchar(*b))
		}
		_ => true,
	}
}

/// Checks whether a string is a complete `name: value` header line, without its CRLF.
///
/// One optional space after the colon is permitted, as conventionally emitted.
pub fn is_header_line(line: &str) -> bool {
	match line.split_once(':') {
		Some((name, value)) => {
			is_token(name) && is_field_value(value.strip_prefix(' ').unwrap_or(value).as_bytes())
		}
		None => false,
	}
}

/// Checks whether a media type such as `application/json` is two tokens separated by a slash.
pub fn is_media_type(media_type: &str) -> bool {
	match media_type.split_once('/') {
		Some((kind, subtype)) => is_token(kind) && is_token(subtype),
		None => false,
	}
}
