//! Rendering of result sequences as CSV.
//!
//! The columns of a CSV body are the union of the field names of every record in the result, so
//! the whole sequence has to be read before the header row can be written.

use crate::connection::ConnectionGuard;
use crate::json::Completion;
use crate::response::BodyWriter;
use crate::value::{Identifiable, Value};
use futures_io::AsyncWrite;
use std::io::Result;
use std::pin::Pin;
use std::sync::Arc;

/// A fully read result, ready to be written as CSV.
#[derive(Debug, Default)]
pub struct Table {
	/// The column names, in the order they were first seen.
	columns: Vec<String>,

	/// The records, one per row.
	records: Vec<Arc<dyn Identifiable>>,
}

impl Table {
	/// Reads a whole sequence of entries.
	///
	/// Entries which are not records, and records which cannot be loaded, are left out.
	pub fn collect(entries: impl Iterator<Item = Value>) -> Self {
		let mut table = Self::default();
		for entry in entries {
			if let Value::Record(r) = entry {
				if let Some(record) = r.record() {
					for name in record.field_names() {
						if !table.columns.contains(&name) {
							table.columns.push(name);
						}
					}
					table.records.push(Arc::clone(&r));
				}
			}
		}
		table
	}

	/// Returns the column names.
	#[must_use]
	pub fn columns(&self) -> &[String] {
		&self.columns
	}

	/// Returns the header row, without its line terminator.
	#[must_use]
	pub fn header(&self) -> String {
		self.columns.join(",")
	}

	/// Returns the row for one record, without its line terminator.
	fn row(&self, record: &dyn Identifiable) -> String {
		let mut out = String::new();
		let record = record.record();
		for (i, column) in self.columns.iter().enumerate() {
			if i > 0 {
				out.push(',');
			}
			match record.and_then(|r| r.field(column)) {
				None | Some(Value::Null) => (),
				Some(number @ (Value::Integer(_) | Value::Float(_))) => {
					out.push_str(&number.to_string());
				}
				Some(other) => {
					out.push('"');
					out.push_str(&other.to_string());
					out.push('"');
				}
			}
		}
		out
	}

	/// Writes the header row and then every record’s row, each followed by CRLF, one sink write
	/// per line.
	///
	/// # Errors
	/// This function returns an error if writing to `sink` fails.
	pub async fn write_to<Sink: AsyncWrite + ?Sized>(&self, mut sink: Pin<&mut Sink>) -> Result<()> {
		use crate::util::io::AsyncWriteExt as _;

		let mut line = self.header();
		line.push_str(crate::util::EOL);
		sink.as_mut().write_all(line.as_bytes()).await?;
		for record in &self.records {
			let mut line = self.row(&**record);
			line.push_str(crate::util::EOL);
			sink.as_mut().write_all(line.as_bytes()).await?;
		}
		Ok(())
	}
}

impl BodyWriter for Table {
	async fn write_body<Sink: AsyncWrite + ?Sized>(
		self,
		sink: Pin<&mut Sink>,
		_guard: &ConnectionGuard<'_>,
	) -> Result<Completion> {
		self.write_to(sink).await?;
		Ok(Completion::Finished)
	}
}
