//! Rendering of result sequences as a single JSON object.

use crate::connection::ConnectionGuard;
use crate::normalize::Entries;
use crate::response::BodyWriter;
use crate::value::Value;
use futures_io::AsyncWrite;
use std::io::Result;
use std::pin::Pin;

/// The options every record is rendered with.
pub const JSON_FORMAT: &str =
	"type,indent:-1,rid,version,attribSameRow,class,keepTypes,alwaysFetchEmbeddedDocuments";

/// The comma-joined option string passed to [`Record::to_json`](crate::Record::to_json).
///
/// The string always starts with [`JSON_FORMAT`]. Its tokens are meaningful only to the record
/// layer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormatSpec(String);

impl FormatSpec {
	/// Builds a format from the base options, optional extra options, and an optional fetch plan.
	#[must_use]
	pub fn new(extra: Option<&str>, fetch_plan: Option<&str>) -> Self {
		let mut s = String::from(JSON_FORMAT);
		if let Some(extra) = extra {
			s.push(',');
			s.push_str(extra);
		}
		if let Some(plan) = fetch_plan {
			s.push_str(",fetchPlan:");
			s.push_str(plan);
		}
		Self(s)
	}

	/// Returns the option string.
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Default for FormatSpec {
	fn default() -> Self {
		Self::new(None, None)
	}
}

/// How an encoding run ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Completion {
	/// Everything was written.
	Finished,

	/// The peer went away part way through, so the rest was not written.
	Abandoned,
}

/// Appends a JSON string literal.
pub(crate) fn write_string(out: &mut String, s: &str) {
	// Serializing a str cannot fail.
	out.push_str(&serde_json::to_string(s).unwrap_or_default());
}

/// Appends a value nested inside a record, such as a field value.
///
/// Links to other records are written as their identity. Nested values are never shaped by the
/// record format, only records themselves are.
pub(crate) fn write_value(out: &mut String, value: &Value) {
	match value {
		Value::Null | Value::Rows(_) => out.push_str("null"),
		Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
		Value::Integer(i) => out.push_str(&i.to_string()),
		Value::Float(x) => match serde_json::Number::from_f64(*x) {
			Some(n) => out.push_str(&n.to_string()),
			None => out.push_str("null"),
		},
		Value::String(s) => write_string(out, s),
		Value::List(v) => {
			out.push('[');
			for (i, elt) in v.iter().enumerate() {
				if i > 0 {
					out.push_str(", ");
				}
				write_value(out, elt);
			}
			out.push(']');
		}
		Value::Map(v) => {
			out.push('{');
			for (i, (k, elt)) in v.iter().enumerate() {
				if i > 0 {
					out.push_str(", ");
				}
				write_string(out, &k.to_string());
				out.push_str(": ");
				write_value(out, elt);
			}
			out.push('}');
		}
		Value::Record(r) => write_string(out, &r.identity().to_string()),
		Value::Result(r) => out.push_str(&r.to_json()),
	}
}

/// Renders one entry of a result sequence.
///
/// Returns `None` if the entry produces no output: it is null, it refers to a record that cannot
/// be loaded, or its record failed to render (which is logged).
fn render_entry(entry: Value, format: &str) -> Option<String> {
	match entry {
		Value::Null => None,
		Value::Result(r) => Some(r.to_json()),
		Value::Record(r) => {
			let record = r.record()?;
			match record.to_json(format) {
				Ok(json) => Some(json),
				Err(e) => {
					log::error!("Error transforming record {} to JSON: {}", r.identity(), e);
					None
				}
			}
		}
		multi @ (Value::List(_) | Value::Map(_) | Value::Rows(_)) => {
			let mut out = String::from("[");
			let mut first = true;
			for elt in multi.into_values() {
				if let Some(json) = render_entry(elt, format) {
					if !first {
						out.push_str(", ");
					}
					first = false;
					out.push_str(&json);
				}
			}
			out.push(']');
			Some(out)
		}
		scalar => {
			let mut out = String::new();
			write_value(&mut out, &scalar);
			Some(out)
		}
	}
}

/// Writes a sequence of entries, separated by commas, one sink write per rendered entry.
///
/// The connection is checked after every entry.
async fn write_entries<Sink: AsyncWrite + ?Sized>(
	entries: impl Iterator<Item = Value>,
	format: &str,
	guard: &ConnectionGuard<'_>,
	sink: &mut Pin<&mut Sink>,
) -> Result<Completion> {
	use crate::util::io::AsyncWriteExt as _;

	let mut first = true;
	for entry in entries {
		if let Some(json) = render_entry(entry, format) {
			if first {
				sink.as_mut().write_all(json.as_bytes()).await?;
				first = false;
			} else {
				let mut piece = String::with_capacity(json.len() + 2);
				piece.push_str(", ");
				piece.push_str(&json);
				sink.as_mut().write_all(piece.as_bytes()).await?;
			}
		}
		if !guard.is_alive() {
			return Ok(Completion::Abandoned);
		}
	}
	Ok(Completion::Finished)
}

/// Encodes a result sequence and its side-channel properties as one JSON object.
///
/// The object has the form `{"result": [...], "name": value, ...}`. Each entry is rendered on its
/// own: typed result items verbatim, records through [`Record::to_json`](crate::Record::to_json)
/// with `format`, collections as nested arrays, and anything else as a plain JSON value. A record
/// that fails to render is logged and left out.
///
/// After each entry, `guard` is consulted; if the connection has gone away, encoding stops
/// without writing anything more and [`Completion::Abandoned`] is returned. That is not an error.
///
/// # Errors
/// This function returns an error if writing to `sink` fails.
pub async fn encode<Sink: AsyncWrite + ?Sized>(
	entries: impl Iterator<Item = Value>,
	properties: Vec<(String, Value)>,
	format: &FormatSpec,
	guard: &ConnectionGuard<'_>,
	mut sink: Pin<&mut Sink>,
) -> Result<Completion> {
	use crate::util::io::AsyncWriteExt as _;

	sink.as_mut().write_all(b"{\"result\": [").await?;
	if write_entries(entries, format.as_str(), guard, &mut sink).await? == Completion::Abandoned {
		return Ok(Completion::Abandoned);
	}
	sink.as_mut().write_all(b"]").await?;

	for (name, value) in properties {
		let mut head = String::from(", ");
		write_string(&mut head, &name);
		head.push_str(": ");
		if value.is_multi_value() {
			head.push('[');
			sink.as_mut().write_all(head.as_bytes()).await?;
			if write_entries(value.into_values(), format.as_str(), guard, &mut sink).await?
				== Completion::Abandoned
			{
				return Ok(Completion::Abandoned);
			}
			sink.as_mut().write_all(b"]").await?;
		} else {
			head.push_str(
				render_entry(value, format.as_str())
					.as_deref()
					.unwrap_or("null"),
			);
			sink.as_mut().write_all(head.as_bytes()).await?;
			if !guard.is_alive() {
				return Ok(Completion::Abandoned);
			}
		}
	}

	sink.as_mut().write_all(b"}").await?;
	Ok(Completion::Finished)
}

/// A result, with its side-channel properties, waiting to be encoded into a response body.
#[derive(Debug)]
pub struct JsonBody {
	entries: Entries,
	properties: Vec<(String, Value)>,
	format: FormatSpec,
}

impl JsonBody {
	/// Constructs a new `JsonBody`.
	#[must_use]
	pub fn new(entries: Entries, properties: Vec<(String, Value)>, format: FormatSpec) -> Self {
		Self {
			entries,
			properties,
			format,
		}
	}
}

impl BodyWriter for JsonBody {
	async fn write_body<Sink: AsyncWrite + ?Sized>(
		self,
		sink: Pin<&mut Sink>,
		guard: &ConnectionGuard<'_>,
	) -> Result<Completion> {
		encode(self.entries, self.properties, &self.format, guard, sink).await
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::error::RenderError;
	use crate::value::{Document, Identifiable, Record, RecordId, TypedResult};
	use futures_executor::block_on;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	/// A record whose rendering either echoes the format or fails.
	#[derive(Debug)]
	struct Echo {
		id: RecordId,
		fail: bool,
	}

	impl Record for Echo {
		fn identity(&self) -> RecordId {
			self.id
		}

		fn to_json(&self, format: &str) -> std::result::Result<String, RenderError> {
			if self.fail {
				Err(RenderError::new("broken"))
			} else {
				Ok(format!("{{\"@rid\": \"{}\", \"format\": \"{}\"}}", self.id, format))
			}
		}
	}

	impl Identifiable for Echo {
		fn identity(&self) -> RecordId {
			self.id
		}

		fn record(&self) -> Option<&dyn Record> {
			Some(self)
		}
	}

	/// A link whose record cannot be loaded.
	#[derive(Debug)]
	struct Dangling;

	impl Identifiable for Dangling {
		fn identity(&self) -> RecordId {
			RecordId::new(9, 9)
		}

		fn record(&self) -> Option<&dyn Record> {
			None
		}
	}

	#[derive(Debug)]
	struct Projection(&'static str);

	impl TypedResult for Projection {
		fn to_json(&self) -> String {
			self.0.to_owned()
		}
	}

	fn echo(cluster: i32, position: i64, fail: bool) -> Value {
		Value::Record(Arc::new(Echo {
			id: RecordId::new(cluster, position),
			fail,
		}))
	}

	fn run(entries: Vec<Value>, properties: Vec<(String, Value)>, format: &FormatSpec) -> String {
		let guard = ConnectionGuard::unmonitored();
		let mut sink = Vec::new();
		let completion = block_on(encode(
			entries.into_iter(),
			properties,
			format,
			&guard,
			Pin::new(&mut sink),
		))
		.unwrap();
		assert_eq!(completion, Completion::Finished);
		String::from_utf8(sink).unwrap()
	}

	/// Tests building format strings.
	#[test]
	fn test_format_spec() {
		assert_eq!(FormatSpec::default().as_str(), JSON_FORMAT);
		assert_eq!(
			FormatSpec::new(Some("prettyPrint"), Some("*:1")).as_str(),
			format!("{JSON_FORMAT},prettyPrint,fetchPlan:*:1")
		);
		assert_eq!(
			FormatSpec::new(None, Some("*:-1")).as_str(),
			format!("{JSON_FORMAT},fetchPlan:*:-1")
		);
	}

	/// Tests a wrapped scalar.
	#[test]
	fn test_scalar_document() {
		let doc = Value::from(Document::new().with("value", 42));
		assert_eq!(
			run(vec![doc], vec![], &FormatSpec::default()),
			r#"{"result": [{"value": 42}]}"#
		);
	}

	/// Tests that records receive the format string unchanged.
	#[test]
	fn test_format_passed_through() {
		let format = FormatSpec::new(Some("shallow"), None);
		let body = run(vec![echo(3, 1, false)], vec![], &format);
		assert_eq!(
			body,
			format!(r##"{{"result": [{{"@rid": "#3:1", "format": "{}"}}]}}"##, format.as_str())
		);
	}

	/// Tests that failing, missing and null entries are skipped without leaving stray commas.
	#[test]
	fn test_skipped_entries() {
		let entries = vec![
			Value::Null,
			echo(1, 1, true),
			Value::Result(Arc::new(Projection(r#"{"n": 1}"#))),
			Value::Record(Arc::new(Dangling)),
			echo(1, 2, true),
			Value::Result(Arc::new(Projection(r#"{"n": 2}"#))),
		];
		assert_eq!(
			run(entries, vec![], &FormatSpec::default()),
			r#"{"result": [{"n": 1}, {"n": 2}]}"#
		);
	}

	/// Tests nested collections and plain values as entries.
	#[test]
	fn test_nested_entries() {
		let entries = vec![
			Value::from(vec![1, 2]),
			Value::List(vec![Value::from(vec!["a"]), Value::Null, Value::Bool(true)]),
			Value::from("x\"y"),
			Value::Float(1.5),
		];
		assert_eq!(
			run(entries, vec![], &FormatSpec::default()),
			r#"{"result": [[1, 2], [["a"], true], "x\"y", 1.5]}"#
		);
	}

	/// Tests side-channel properties following the result array, in order.
	#[test]
	fn test_properties() {
		let properties = vec![
			("notFound".to_owned(), Value::from(vec![3, 4])),
			("elapsed".to_owned(), Value::from(12)),
			("note".to_owned(), Value::Null),
		];
		assert_eq!(
			run(vec![Value::from(1)], properties, &FormatSpec::default()),
			r#"{"result": [1], "notFound": [3, 4], "elapsed": 12, "note": null}"#
		);
	}

	/// Tests that an empty sequence still yields a well-formed object.
	#[test]
	fn test_empty() {
		assert_eq!(run(vec![], vec![], &FormatSpec::default()), r#"{"result": []}"#);
	}

	/// A connection that reports itself closed after a given number of checks.
	#[derive(Debug)]
	struct Dying {
		checks_left: AtomicUsize,
	}

	impl crate::connection::Connection for Dying {
		fn is_closed(&self) -> bool {
			self.checks_left
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
				.is_err()
		}

		fn is_input_shutdown(&self) -> bool {
			false
		}
	}

	/// Tests that a lost connection stops the encoding early without an error.
	#[test]
	fn test_abandoned() {
		let conn = Dying {
			checks_left: AtomicUsize::new(10),
		};
		let guard = ConnectionGuard::new(Some(&conn));
		let rendered = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&rendered);
		let entries = (0..100).map(move |i| {
			let _ = counter.fetch_add(1, Ordering::SeqCst);
			Value::from(i)
		});
		let mut sink = Vec::new();
		let completion = block_on(encode(
			entries,
			vec![("after".to_owned(), Value::from(1))],
			&FormatSpec::default(),
			&guard,
			Pin::new(&mut sink),
		))
		.unwrap();
		assert_eq!(completion, Completion::Abandoned);
		assert!(rendered.load(Ordering::SeqCst) < 100);
		let body = String::from_utf8(sink).unwrap();
		assert!(body.starts_with("{\"result\": [0, 1, 2"));
		assert!(!body.contains("after"));
	}

	/// Tests that a connection lost while writing properties stops the encoding.
	#[test]
	fn test_abandoned_in_properties() {
		let conn = Dying {
			checks_left: AtomicUsize::new(1),
		};
		let guard = ConnectionGuard::new(Some(&conn));
		let mut sink = Vec::new();
		let completion = block_on(encode(
			vec![Value::from(1)].into_iter(),
			vec![("more".to_owned(), Value::from(vec![5, 6]))],
			&FormatSpec::default(),
			&guard,
			Pin::new(&mut sink),
		))
		.unwrap();
		assert_eq!(completion, Completion::Abandoned);
		assert_eq!(
			String::from_utf8(sink).unwrap(),
			r#"{"result": [1], "more": [5"#
		);
	}
}
