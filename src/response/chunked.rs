use futures_core::ready;
use futures_io::AsyncWrite;
use std::io::Result;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::task::{Context, Poll};

/// An in-progress HTTP response which is currently sending a chunk-encoded response body.
///
/// Every write is sent as one chunk of exactly the written length. Writing zero bytes sends
/// nothing, so an empty chunk never appears before the end of the body.
///
/// The `'socket` lifetime parameter is the lifetime of the transport socket. The `Socket` type
/// parameter is the type of transport-layer socket over which the HTTP response is sent.
#[derive(Debug)]
pub struct ChunkedBody<'socket, Socket: AsyncWrite + ?Sized> {
	/// The underlying socket.
	socket: Pin<&'socket mut Socket>,

	/// A buffer to hold a chunk header (size plus CRLF) or footer (CRLF).
	header_footer_buffer: [u8; 20],

	/// The number of bytes of `header_footer_buffer` that are filled.
	header_footer_buffer_used: usize,

	/// The number of bytes of `header_footer_buffer` that have been sent over the socket.
	header_footer_buffer_sent: usize,

	/// The number of bytes left to send in the current chunk.
	chunk_bytes_left: u64,
}

impl<'socket, Socket: AsyncWrite + ?Sized> ChunkedBody<'socket, Socket> {
	/// Constructs a new `ChunkedBody`.
	///
	/// The `socket` parameter is the transport-layer socket over which the response headers have
	/// already been sent.
	pub fn new(socket: Pin<&'socket mut Socket>) -> Self {
		Self {
			socket,
			header_footer_buffer: Default::default(),
			header_footer_buffer_used: 0,
			header_footer_buffer_sent: 0,
			chunk_bytes_left: 0,
		}
	}

	/// Returns whether the most recent chunk has been completely written, so the body may end.
	pub fn is_between_chunks(&self) -> bool {
		self.chunk_bytes_left == 0
	}

	/// Polls sending the chunk header or footer to the socket.
	///
	/// If it has been fully sent, this function does nothing and indicates `Ready`. Otherwise, it
	/// tries to send the remainder.
	fn poll_send_header_footer(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
		while self.header_footer_buffer_sent != self.header_footer_buffer_used {
			let bytes_written = ready!(self.socket.as_mut().poll_write(
				cx,
				&self.header_footer_buffer
					[self.header_footer_buffer_sent..self.header_footer_buffer_used],
			))?;
			if bytes_written == 0 {
				return Poll::Ready(Err(std::io::ErrorKind::WriteZero.into()));
			}
			self.header_footer_buffer_sent += bytes_written;
		}
		Ok(()).into()
	}

	/// Prepares for a write of some data bytes.
	///
	/// The `cx` parameter is the asynchronous context. The `length` parameter is the number of
	/// bytes that are about to be written.
	///
	/// This function returns `Poll::Ready(Ok(n))` if the socket is in a condition where `n` bytes
	/// of body data can be sent. `n` is always less than or equal to `length`.
	fn pre_write(
		&mut self,
		cx: &mut Context<'_>,
		length: NonZeroUsize,
	) -> Poll<Result<NonZeroUsize>> {
		// A new chunk starts with this write unless an earlier write was only partly accepted.
		if self.chunk_bytes_left == 0 {
			use std::io::Write as _;

			// The previous chunk’s footer may still be waiting in the buffer.
			ready!(self.poll_send_header_footer(cx))?;

			let mut cursor = std::io::Cursor::new(&mut self.header_footer_buffer[..]);
			write!(&mut cursor, "{:X}\r\n", length.get())?;
			self.header_footer_buffer_used = cursor.position() as usize;
			self.header_footer_buffer_sent = 0;
			self.chunk_bytes_left = length.get() as u64;
		}

		ready!(self.poll_send_header_footer(cx))?;

		// Inside a chunk with the header sent: allow as many bytes as the caller has or as fit in
		// the rest of the chunk, whichever is smaller.
		let left: usize = self.chunk_bytes_left.try_into().unwrap_or(usize::MAX);
		Ok(NonZeroUsize::new(std::cmp::min(length.get(), left)).unwrap_or(length)).into()
	}

	/// Does closing work after a write has completed.
	///
	/// The `bytes_written` parameter is the number of bytes written to the underlying socket.
	fn post_write(&mut self, bytes_written: usize) {
		self.chunk_bytes_left -= bytes_written as u64;
		if self.chunk_bytes_left == 0 {
			// At the end of a chunk, we must send a CRLF chunk footer.
			self.header_footer_buffer[0..2].copy_from_slice(b"\r\n");
			self.header_footer_buffer_sent = 0;
			self.header_footer_buffer_used = 2;
		}
	}

	/// Finishes the body by sending the terminating zero-length chunk.
	///
	/// *Important*: This function does not flush the socket.
	///
	/// # Panics
	/// This function panics in a debug build if the most recent chunk was not fully sent.
	///
	/// # Errors
	/// This function returns an error if writing to the underlying socket fails.
	pub async fn finish(mut self) -> Result<()> {
		use crate::util::io::AsyncWriteExt as _;

		struct SendHeaderFooterDataFuture<'socket, 'body, Socket: AsyncWrite + ?Sized> {
			body: &'body mut ChunkedBody<'socket, Socket>,
		}
		impl<Socket: AsyncWrite + ?Sized> std::future::Future
			for SendHeaderFooterDataFuture<'_, '_, Socket>
		{
			type Output = Result<()>;
			fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
				self.body.poll_send_header_footer(cx)
			}
		}

		debug_assert!(self.chunk_bytes_left == 0);

		// The most recent chunk’s footer would still be in the buffer. Drain it.
		SendHeaderFooterDataFuture { body: &mut self }.await?;

		self.socket.as_mut().write_all(b"0\r\n\r\n").await
	}
}

impl<Socket: AsyncWrite + ?Sized> AsyncWrite for ChunkedBody<'_, Socket> {
	fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize>> {
		if let Some(buf_len) = NonZeroUsize::new(buf.len()) {
			let this = Pin::into_inner(self);
			let to_write: NonZeroUsize = ready!(this.pre_write(cx, buf_len))?;
			let bytes_written = ready!(this
				.socket
				.as_mut()
				.poll_write(cx, &buf[..(to_write.get())]))?;
			this.post_write(bytes_written);
			Ok(bytes_written).into()
		} else {
			Ok(0).into()
		}
	}

	fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
		ready!(self.poll_send_header_footer(cx))?;
		self.socket.as_mut().poll_flush(cx)
	}

	fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
		ready!(self.poll_send_header_footer(cx))?;
		self.socket.as_mut().poll_close(cx)
	}
}
