//! The values a query or command can produce, and the capabilities the record layer provides.

use crate::error::RenderError;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// The identity of a record: its cluster and its position within the cluster.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RecordId {
	/// The cluster the record lives in, or -1 for a record that has never been stored.
	pub cluster: i32,

	/// The position of the record within its cluster, or -1 for a record that has never been
	/// stored.
	pub position: i64,
}

impl RecordId {
	/// The identity of a record that has never been stored.
	pub const TEMPORARY: Self = Self {
		cluster: -1,
		position: -1,
	};

	/// Constructs a new `RecordId`.
	#[must_use]
	pub fn new(cluster: i32, position: i64) -> Self {
		Self { cluster, position }
	}
}

impl Display for RecordId {
	fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
		write!(f, "#{}:{}", self.cluster, self.position)
	}
}

/// A record: a document-like object that can render itself as JSON.
///
/// Implementations are provided by the record layer. The `format` parameter of
/// [`to_json`](Record::to_json) is a comma-joined list of options (see
/// [`FormatSpec`](crate::FormatSpec)); this crate never interprets it.
pub trait Record: Debug {
	/// Returns the record’s identity.
	fn identity(&self) -> RecordId;

	/// Returns the record’s version, used as its entity tag.
	fn version(&self) -> i32 {
		0
	}

	/// Renders the record as a JSON object.
	///
	/// # Errors
	/// Returns an error if the record cannot be rendered.
	fn to_json(&self, format: &str) -> Result<String, RenderError>;

	/// Returns the names of the record’s fields, in the record’s own order.
	///
	/// Records which are not documents have no fields.
	fn field_names(&self) -> Vec<String> {
		Vec::new()
	}

	/// Returns the value of a field, or `None` if the field is absent.
	fn field(&self, _name: &str) -> Option<Value> {
		None
	}
}

/// Something with a stable identity that can be dereferenced to a [`Record`].
///
/// A record is trivially identifiable; a link to a record that has to be loaded first is also
/// identifiable, and dereferences to nothing if the record cannot be loaded.
pub trait Identifiable: Debug {
	/// Returns the identity of the record this refers to.
	fn identity(&self) -> RecordId;

	/// Returns the record, or `None` if it is not available.
	fn record(&self) -> Option<&dyn Record>;
}

/// A pre-rendered query result item which owns its own JSON rendering.
pub trait TypedResult: Debug {
	/// Renders the item as JSON.
	fn to_json(&self) -> String;
}

/// A lazily produced sequence of values, such as a query cursor.
pub struct Rows(Box<dyn Iterator<Item = Value>>);

impl Rows {
	/// Wraps an iterator.
	pub fn new<I: Iterator<Item = Value> + 'static>(iter: I) -> Self {
		Self(Box::new(iter))
	}
}

impl Iterator for Rows {
	type Item = Value;

	fn next(&mut self) -> Option<Value> {
		self.0.next()
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.0.size_hint()
	}
}

impl Debug for Rows {
	fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
		f.write_str("Rows(..)")
	}
}

/// Any value a query or command can produce.
#[derive(Debug)]
pub enum Value {
	/// No value.
	Null,

	/// A boolean.
	Bool(bool),

	/// An integer.
	Integer(i64),

	/// A floating-point number.
	Float(f64),

	/// A string.
	String(String),

	/// A materialized collection.
	List(Vec<Value>),

	/// A mapping, in insertion order. Keys need not be strings.
	Map(Vec<(Value, Value)>),

	/// A record, or a link to one.
	Record(Arc<dyn Identifiable>),

	/// A pre-rendered query result item.
	Result(Arc<dyn TypedResult>),

	/// A lazily produced sequence.
	Rows(Rows),
}

impl Value {
	/// Returns whether the value holds several values.
	#[must_use]
	pub fn is_multi_value(&self) -> bool {
		matches!(self, Self::List(_) | Self::Map(_) | Self::Rows(_))
	}

	/// Returns whether the value is a record or a typed result item.
	#[must_use]
	pub fn is_record_like(&self) -> bool {
		matches!(self, Self::Record(_) | Self::Result(_))
	}

	/// Turns a multi-valued value into an iterator over its elements; a map yields its values.
	///
	/// Single values yield themselves.
	#[must_use]
	pub fn into_values(self) -> Rows {
		match self {
			Self::List(v) => Rows::new(v.into_iter()),
			Self::Map(v) => Rows::new(v.into_iter().map(|(_, value)| value)),
			Self::Rows(rows) => rows,
			other => Rows::new(std::iter::once(other)),
		}
	}

	/// Drains any lazy sequences inside this value into lists.
	#[must_use]
	pub fn materialize(self) -> Self {
		match self {
			Self::Rows(rows) => Self::List(rows.map(Self::materialize).collect()),
			Self::List(v) => Self::List(v.into_iter().map(Self::materialize).collect()),
			Self::Map(v) => Self::Map(
				v.into_iter()
					.map(|(k, v)| (k.materialize(), v.materialize()))
					.collect(),
			),
			other => other,
		}
	}

	/// Copies a value that holds no lazy sequence; a lazy sequence copies as `Null`.
	///
	/// Records and typed results are shared, not deep-copied.
	#[must_use]
	pub fn shallow_clone(&self) -> Self {
		match self {
			Self::Null | Self::Rows(_) => Self::Null,
			Self::Bool(b) => Self::Bool(*b),
			Self::Integer(i) => Self::Integer(*i),
			Self::Float(x) => Self::Float(*x),
			Self::String(s) => Self::String(s.clone()),
			Self::List(v) => Self::List(v.iter().map(Self::shallow_clone).collect()),
			Self::Map(v) => Self::Map(
				v.iter()
					.map(|(k, v)| (k.shallow_clone(), v.shallow_clone()))
					.collect(),
			),
			Self::Record(r) => Self::Record(Arc::clone(r)),
			Self::Result(r) => Self::Result(Arc::clone(r)),
		}
	}
}

impl Display for Value {
	/// Formats the value as plain text, as used for map keys and CSV cells.
	fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
		match self {
			Self::Null => f.write_str("null"),
			Self::Bool(b) => write!(f, "{b}"),
			Self::Integer(i) => write!(f, "{i}"),
			Self::Float(x) => write!(f, "{x}"),
			Self::String(s) => f.write_str(s),
			Self::List(v) => {
				f.write_str("[")?;
				for (i, elt) in v.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{elt}")?;
				}
				f.write_str("]")
			}
			Self::Map(v) => {
				f.write_str("{")?;
				for (i, (k, elt)) in v.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{k}={elt}")?;
				}
				f.write_str("}")
			}
			Self::Record(r) => write!(f, "{}", r.identity()),
			Self::Result(r) => f.write_str(&r.to_json()),
			Self::Rows(_) => f.write_str("[..]"),
		}
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Self::Bool(b)
	}
}

impl From<i32> for Value {
	fn from(i: i32) -> Self {
		Self::Integer(i.into())
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Self::Integer(i)
	}
}

impl From<f64> for Value {
	fn from(x: f64) -> Self {
		Self::Float(x)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Self::String(s.to_owned())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Self::String(s)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(v: Vec<T>) -> Self {
		Self::List(v.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(v: Option<T>) -> Self {
		v.map_or(Self::Null, Into::into)
	}
}

/// A document built in memory: an identity plus named fields in insertion order.
///
/// Maps and scalar results are wrapped in documents so that every result can be emitted as a
/// sequence of records.
#[derive(Debug)]
pub struct Document {
	/// The document’s identity.
	identity: RecordId,

	/// The document’s version.
	version: i32,

	/// The fields.
	fields: Vec<(String, Value)>,
}

impl Document {
	/// Constructs a new, empty, never-stored document.
	#[must_use]
	pub fn new() -> Self {
		Self::with_identity(RecordId::TEMPORARY, 0)
	}

	/// Constructs a new, empty document with the given identity and version.
	#[must_use]
	pub fn with_identity(identity: RecordId, version: i32) -> Self {
		Self {
			identity,
			version,
			fields: Vec::new(),
		}
	}

	/// Sets a field, replacing any existing field of the same name in place.
	///
	/// Lazy sequences are drained into lists, because a document may be read more than once.
	pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
		let name = name.into();
		let value = value.into().materialize();
		match self.fields.iter_mut().find(|(n, _)| *n == name) {
			Some(field) => field.1 = value,
			None => self.fields.push((name, value)),
		}
	}

	/// Sets a field and returns the document.
	#[must_use]
	pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.set(name, value);
		self
	}

	/// Returns the fields.
	#[must_use]
	pub fn fields(&self) -> &[(String, Value)] {
		&self.fields
	}
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl Record for Document {
	fn identity(&self) -> RecordId {
		self.identity
	}

	fn version(&self) -> i32 {
		self.version
	}

	fn to_json(&self, _format: &str) -> Result<String, RenderError> {
		let mut out = String::from("{");
		for (i, (name, value)) in self.fields.iter().enumerate() {
			if i > 0 {
				out.push_str(", ");
			}
			crate::json::write_string(&mut out, name);
			out.push_str(": ");
			crate::json::write_value(&mut out, value);
		}
		out.push('}');
		Ok(out)
	}

	fn field_names(&self) -> Vec<String> {
		self.fields.iter().map(|(n, _)| n.clone()).collect()
	}

	fn field(&self, name: &str) -> Option<Value> {
		self.fields
			.iter()
			.find(|(n, _)| n == name)
			.map(|(_, v)| v.shallow_clone())
	}
}

impl Identifiable for Document {
	fn identity(&self) -> RecordId {
		self.identity
	}

	fn record(&self) -> Option<&dyn Record> {
		Some(self)
	}
}

impl From<Document> for Value {
	fn from(doc: Document) -> Self {
		Self::Record(Arc::new(doc))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	/// Tests the textual form of record identities.
	#[test]
	fn test_record_id() {
		assert_eq!(RecordId::new(12, 4).to_string(), "#12:4");
		assert_eq!(RecordId::TEMPORARY.to_string(), "#-1:-1");
	}

	/// Tests the plain-text rendering used for map keys and CSV cells.
	#[test]
	fn test_display() {
		assert_eq!(Value::from(3).to_string(), "3");
		assert_eq!(Value::from("abc").to_string(), "abc");
		assert_eq!(Value::from(vec![1, 2]).to_string(), "[1, 2]");
		let map = Value::Map(vec![(Value::from(1), Value::from("one"))]);
		assert_eq!(map.to_string(), "{1=one}");
	}

	/// Tests that setting an existing field keeps its position.
	#[test]
	fn test_document_set() {
		let mut doc = Document::new().with("a", 1).with("b", 2);
		doc.set("a", 3);
		let names = doc.field_names();
		assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
		assert!(matches!(doc.field("a"), Some(Value::Integer(3))));
		assert!(doc.field("c").is_none());
	}

	/// Tests that lazy sequences are drained when stored into a document.
	#[test]
	fn test_document_materializes() {
		let rows = Rows::new(vec![Value::from(1), Value::from(2)].into_iter());
		let doc = Document::new().with("value", Value::Rows(rows));
		match doc.field("value") {
			Some(Value::List(v)) => assert_eq!(v.len(), 2),
			other => panic!("unexpected {other:?}"),
		}
	}

	/// Tests rendering a document with nested values.
	#[test]
	fn test_document_json() {
		let doc = Document::new()
			.with("name", "Ada")
			.with("tags", vec!["x", "y"])
			.with("age", 36);
		assert_eq!(
			doc.to_json("").unwrap(),
			r#"{"name": "Ada", "tags": ["x", "y"], "age": 36}"#
		);
	}

	/// Tests that nested values render the same whatever the format, and links stay identities.
	#[test]
	fn test_document_json_format() {
		let linked = Document::with_identity(RecordId::new(4, 2), 1).with("x", 1);
		let doc = Document::new().with(
			"links",
			Value::List(vec![
				Value::from(linked),
				Value::Map(vec![(Value::from("n"), Value::from(1.5))]),
			]),
		);
		let expected = r##"{"links": ["#4:2", {"n": 1.5}]}"##;
		assert_eq!(doc.to_json("").unwrap(), expected);
		assert_eq!(doc.to_json("rid,version,fetchPlan:*:-1").unwrap(), expected);
	}

	/// Tests that a shallow copy shares records and drops lazy sequences.
	#[test]
	fn test_shallow_clone() {
		let record: Arc<dyn Identifiable> = Arc::new(Document::new().with("x", 1));
		let value = Value::List(vec![
			Value::Record(Arc::clone(&record)),
			Value::Rows(Rows::new(std::iter::empty())),
			Value::from("s"),
		]);
		match value.shallow_clone() {
			Value::List(v) => match v.as_slice() {
				[Value::Record(r), Value::Null, Value::String(s)] => {
					assert!(Arc::ptr_eq(r, &record));
					assert_eq!(s, "s");
				}
				other => panic!("unexpected {other:?}"),
			},
			other => panic!("unexpected {other:?}"),
		}
	}
}
