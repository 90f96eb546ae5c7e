//! Errors that originate inside `aahr`.
//!
//! `aahr` API functions report three kinds of errors: errors passed up from the underlying socket,
//! errors raised by the record layer while rendering a record, and errors raised while preparing a
//! response body (for example, a failure to compress it). `aahr` API functions always report
//! errors in the form of [`std::io::Error`]. Errors passed up from the underlying socket pass
//! through `aahr` completely unmodified. Errors that originate in `aahr` are reported as
//! [`std::io::ErrorKind::Other`] or [`std::io::ErrorKind::InvalidData`]; if the `detailed-errors`
//! feature is enabled, then the inner error of the [`std::io::Error`] is an [`Error`] instance,
//! otherwise there is no source and this module is not exported.
//!
//! [`RenderError`] is always available, because it is the error type record implementations
//! return from [`Record::to_json`](crate::Record::to_json).

use std::fmt::{Display, Formatter};

/// An error reported by the record layer while rendering a record to JSON.
#[derive(Debug)]
pub struct RenderError {
	/// The underlying cause.
	inner: Box<dyn std::error::Error + Send + Sync>,
}

impl RenderError {
	/// Wraps an arbitrary error, or a message, as a `RenderError`.
	pub fn new<E: Into<Box<dyn std::error::Error + Send + Sync>>>(inner: E) -> Self {
		Self {
			inner: inner.into(),
		}
	}
}

impl Display for RenderError {
	fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
		self.inner.fmt(f)
	}
}

impl std::error::Error for RenderError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(&*self.inner)
	}
}

/// The type of nested error included in any error that originates within `aahr` itself.
///
/// Errors that pass through `aahr` but do not originate there, such as errors returned by the
/// underlying socket, do not contain a nested error object of this type.
///
/// The nested error is included only if the `detailed-errors` feature is enabled. If the
/// `detailed-errors` feature is disabled, this type is not exported.
#[derive(Debug)]
pub enum Error {
	/// The response body could not be gzip-compressed, so the response cannot be sent.
	Compression,

	/// A single record requested on its own could not be rendered.
	Render(RenderError),
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
		match self {
			Self::Compression => write!(f, "Unable to compress response body"),
			Self::Render(inner) => write!(f, "Unable to render record: {inner}"),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Compression => None,
			Self::Render(inner) => Some(inner),
		}
	}
}

impl From<RenderError> for Error {
	fn from(inner: RenderError) -> Self {
		Self::Render(inner)
	}
}

impl Error {
	/// Returns the [`std::io::ErrorKind`] this error is reported as.
	fn kind(&self) -> std::io::ErrorKind {
		match self {
			Self::Compression => std::io::ErrorKind::Other,
			Self::Render(_) => std::io::ErrorKind::InvalidData,
		}
	}
}

impl From<Error> for std::io::Error {
	#[cfg(feature = "detailed-errors")]
	fn from(inner: Error) -> Self {
		Self::new(inner.kind(), inner)
	}

	#[cfg(not(feature = "detailed-errors"))]
	fn from(inner: Error) -> Self {
		inner.kind().into()
	}
}

impl From<RenderError> for std::io::Error {
	fn from(inner: RenderError) -> Self {
		Into::<Error>::into(inner).into()
	}
}
