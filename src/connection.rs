//! Liveness of the connection a response is being written to.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};

/// The state of a transport connection, as far as the server knows it.
///
/// Both functions must answer immediately from state the server already has; they must not
/// perform I/O.
pub trait Connection: Debug {
	/// Returns whether the connection has been closed.
	fn is_closed(&self) -> bool;

	/// Returns whether the read side of the connection has been shut down, for example because
	/// the peer half-closed it.
	fn is_input_shutdown(&self) -> bool;
}

/// A connection state held in atomic flags.
///
/// The code servicing the socket sets the flags as it observes the peer going away; the code
/// writing a response reads them through a [`ConnectionGuard`].
#[derive(Debug, Default)]
pub struct ConnectionState {
	/// Whether the connection is closed.
	closed: AtomicBool,

	/// Whether the read side is shut down.
	input_shutdown: AtomicBool,
}

impl ConnectionState {
	/// Constructs a new, open `ConnectionState`.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Records that the connection has been closed.
	pub fn close(&self) {
		self.closed.store(true, Ordering::Release);
	}

	/// Records that the read side of the connection has been shut down.
	pub fn shutdown_input(&self) {
		self.input_shutdown.store(true, Ordering::Release);
	}
}

impl Connection for ConnectionState {
	fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	fn is_input_shutdown(&self) -> bool {
		self.input_shutdown.load(Ordering::Acquire)
	}
}

/// Where a guard gets its answer from.
#[derive(Clone, Copy, Debug)]
enum Source<'conn> {
	/// Nothing is watched; the connection is assumed to stay up.
	Unmonitored,

	/// The connection, if the transport handle exists.
	Watched(Option<&'conn dyn Connection>),
}

/// An advisory check, made between entries of a long response, that the peer is still there.
///
/// A dead connection is not an error: whoever asks simply stops producing output nobody will read.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionGuard<'conn> {
	source: Source<'conn>,
}

impl<'conn> ConnectionGuard<'conn> {
	/// Constructs a guard watching a connection.
	///
	/// `None` means the transport handle is absent, in which case the connection is reported as
	/// dead.
	#[must_use]
	pub fn new(connection: Option<&'conn dyn Connection>) -> Self {
		Self {
			source: Source::Watched(connection),
		}
	}

	/// Constructs a guard that always reports the connection alive.
	#[must_use]
	pub fn unmonitored() -> Self {
		Self {
			source: Source::Unmonitored,
		}
	}

	/// Returns whether the connection is alive: present, not closed, and with its read side open.
	#[must_use]
	pub fn is_alive(&self) -> bool {
		match self.source {
			Source::Unmonitored => true,
			Source::Watched(None) => {
				log::debug!("Connection handle is gone; abandoning response");
				false
			}
			Source::Watched(Some(c)) => {
				if c.is_closed() || c.is_input_shutdown() {
					log::debug!("Found closed connection {c:?}; abandoning response");
					false
				} else {
					true
				}
			}
		}
	}
}
