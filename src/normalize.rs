//! Classification of arbitrary results into a sequence of entries.

use crate::value::{Document, Identifiable, Rows, TypedResult, Value};
use std::sync::Arc;

/// The shape of a result, which decides how it becomes a sequence of entries.
#[derive(Debug)]
pub enum Shape {
	/// There is no result.
	Empty,

	/// A mapping, turned into one document whose fields are the mapping’s entries.
	NamedMap(Document),

	/// A non-empty collection of plain values, turned into one document holding the whole
	/// collection in its `value` field.
	HomogeneousCollection(Document),

	/// A single record.
	SingleRecordLike(Arc<dyn Identifiable>),

	/// A single typed result item.
	SingleResult(Arc<dyn TypedResult>),

	/// A lazy sequence of records or typed result items.
	Sequence(Rows),

	/// A materialized collection of records or typed result items, or an empty collection.
	RawMultiValue(Vec<Value>),

	/// Anything else, turned into one document holding it in its `value` field.
	Scalar(Document),
}

impl Shape {
	/// Classifies a result.
	///
	/// Every value has exactly one shape. Whether a collection holds records is decided by its
	/// first element alone.
	#[must_use]
	pub fn classify(value: Value) -> Self {
		match value {
			Value::Null => Self::Empty,
			Value::Map(entries) => {
				let mut doc = Document::new();
				for (key, value) in entries {
					let key = match key {
						Value::String(s) => s,
						other => other.to_string(),
					};
					doc.set(key, value);
				}
				Self::NamedMap(doc)
			}
			Value::List(v) => {
				if v.first().map_or(false, |first| !first.is_record_like()) {
					Self::HomogeneousCollection(Document::new().with("value", Value::List(v)))
				} else {
					Self::RawMultiValue(v)
				}
			}
			Value::Rows(rows) => {
				let mut rows = rows.peekable();
				let rows_hold_plain_values =
					rows.peek().map_or(false, |first| !first.is_record_like());
				let rows = Rows::new(rows);
				if rows_hold_plain_values {
					Self::HomogeneousCollection(Document::new().with("value", Value::Rows(rows)))
				} else {
					Self::Sequence(rows)
				}
			}
			Value::Record(r) => Self::SingleRecordLike(r),
			Value::Result(r) => Self::SingleResult(r),
			scalar @ (Value::Bool(_) | Value::Integer(_) | Value::Float(_) | Value::String(_)) => {
				Self::Scalar(Document::new().with("value", scalar))
			}
		}
	}

	/// Returns the entries to emit, or `None` if there is no result.
	#[must_use]
	pub fn into_entries(self) -> Option<Entries> {
		let rows = match self {
			Self::Empty => return None,
			Self::NamedMap(doc) | Self::HomogeneousCollection(doc) | Self::Scalar(doc) => {
				Rows::new(std::iter::once(Value::from(doc)))
			}
			Self::SingleRecordLike(r) => Rows::new(std::iter::once(Value::Record(r))),
			Self::SingleResult(r) => Rows::new(std::iter::once(Value::Result(r))),
			Self::Sequence(rows) => rows,
			Self::RawMultiValue(v) => Rows::new(v.into_iter()),
		};
		Some(Entries(rows))
	}
}

/// The single iteration sequence every result is turned into.
#[derive(Debug)]
pub struct Entries(Rows);

impl Entries {
	/// Wraps values which are already a sequence of entries.
	pub fn new<I: Iterator<Item = Value> + 'static>(iter: I) -> Self {
		Self(Rows::new(iter))
	}
}

impl Iterator for Entries {
	type Item = Value;

	fn next(&mut self) -> Option<Value> {
		self.0.next()
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.0.size_hint()
	}
}
