use futures_core::ready;
use futures_io::{AsyncRead, AsyncWrite};
use std::future::Future;
use std::io::Result;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A set of additional utility functions available on any type implementing `AsyncRead`.
pub trait AsyncReadExt: AsyncRead {
	/// Reads data to a caller-provided buffer.
	fn read<'buffer>(
		self: Pin<&mut Self>,
		buffer: &'buffer mut [u8],
	) -> ReadFuture<'_, 'buffer, Self> {
		ReadFuture {
			source: self,
			buffer,
		}
	}
}

impl<R: AsyncRead + ?Sized> AsyncReadExt for R {}

/// A set of additional utility functions available on any type implementing `AsyncWrite`.
pub trait AsyncWriteExt: AsyncWrite {
	/// Writes a block of bytes to the writeable.
	///
	/// This function performs repeated writes into the writeable until the entire requested data
	/// has been written.
	fn write_all<'a>(self: Pin<&'a mut Self>, data: &'a [u8]) -> WriteAllFuture<'a, Self> {
		WriteAllFuture { sink: self, data }
	}

	/// Flushes the writeable.
	fn flush(self: Pin<&mut Self>) -> FlushFuture<'_, Self> {
		FlushFuture { sink: self }
	}

	/// Closes the writeable.
	fn close(self: Pin<&mut Self>) -> CloseFuture<'_, Self> {
		CloseFuture { sink: self }
	}
}

impl<W: AsyncWrite + ?Sized> AsyncWriteExt for W {}

/// A future that reads from an `AsyncRead` into a single caller-provided buffer.
#[derive(Debug)]
pub struct ReadFuture<'source, 'buffer, Source: AsyncRead + ?Sized> {
	source: Pin<&'source mut Source>,
	buffer: &'buffer mut [u8],
}

impl<Source: AsyncRead + ?Sized> Future for ReadFuture<'_, '_, Source> {
	type Output = Result<usize>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.get_mut();
		this.source.as_mut().poll_read(cx, this.buffer)
	}
}

/// A future that writes all of an array to an `AsyncWrite`.
#[derive(Debug)]
pub struct WriteAllFuture<'a, T: AsyncWrite + ?Sized> {
	sink: Pin<&'a mut T>,
	data: &'a [u8],
}

impl<T: AsyncWrite + ?Sized> Future for WriteAllFuture<'_, T> {
	type Output = Result<()>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		while !self.data.is_empty() {
			let data = self.data;
			let bytes_written = ready!(self.sink.as_mut().poll_write(cx, data))?;
			if bytes_written == 0 {
				return Poll::Ready(Err(std::io::ErrorKind::WriteZero.into()));
			}
			self.data = &self.data[bytes_written..];
		}
		Ok(()).into()
	}
}

/// A future that flushes an `AsyncWrite`.
#[derive(Debug)]
pub struct FlushFuture<'a, T: AsyncWrite + ?Sized> {
	sink: Pin<&'a mut T>,
}

impl<T: AsyncWrite + ?Sized> Future for FlushFuture<'_, T> {
	type Output = Result<()>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		self.sink.as_mut().poll_flush(cx)
	}
}

/// A future that closes an `AsyncWrite`.
#[derive(Debug)]
pub struct CloseFuture<'a, T: AsyncWrite + ?Sized> {
	sink: Pin<&'a mut T>,
}

impl<T: AsyncWrite + ?Sized> Future for CloseFuture<'_, T> {
	type Output = Result<()>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		self.sink.as_mut().poll_close(cx)
	}
}

/// Reads from a source until EOF, appending everything to `buffer`.
pub async fn read_to_end<Source: AsyncRead + ?Sized>(
	mut src: Pin<&mut Source>,
	buffer: &mut Vec<u8>,
) -> Result<()> {
	let mut block = [0_u8; 4096];
	loop {
		let bytes_read = src.as_mut().read(&mut block[..]).await?;
		if bytes_read == 0 {
			return Ok(());
		}
		buffer.extend_from_slice(&block[..bytes_read]);
	}
}

/// Copies exactly `length` bytes from a source to a sink.
///
/// # Errors
/// This function returns an error if reading or writing fails, or
/// [`UnexpectedEof`](std::io::ErrorKind::UnexpectedEof) if the source ends early.
pub async fn copy_exact<Source: AsyncRead + ?Sized, Sink: AsyncWrite + ?Sized>(
	mut src: Pin<&mut Source>,
	mut dest: Pin<&mut Sink>,
	mut length: u64,
) -> Result<()> {
	let mut block = [0_u8; 4096];
	while length != 0 {
		let wanted = std::cmp::min(length, block.len() as u64) as usize;
		let bytes_read = src.as_mut().read(&mut block[..wanted]).await?;
		if bytes_read == 0 {
			return Err(std::io::ErrorKind::UnexpectedEof.into());
		}
		dest.as_mut().write_all(&block[..bytes_read]).await?;
		length -= bytes_read as u64;
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use futures_executor::block_on;

	/// Tests calling `read` on a source.
	#[test]
	fn test_read() {
		block_on(async {
			let mut src: &[u8] = &b"abcdefgh"[..];
			let mut buffer = [0u8; 4];
			let bytes_read = Pin::new(&mut src).read(&mut buffer[..]).await.unwrap();
			assert_eq!(bytes_read, 4);
			assert_eq!(&buffer, b"abcd");
		});
	}

	/// Tests draining a source larger than one read block.
	#[test]
	fn test_read_to_end() {
		block_on(async {
			let data = vec![b'x'; 10_000];
			let mut src: &[u8] = &data[..];
			let mut buffer = Vec::new();
			read_to_end(Pin::new(&mut src), &mut buffer).await.unwrap();
			assert_eq!(buffer, data);
		});
	}

	/// Tests copying a fixed length, and running out of source early.
	#[test]
	fn test_copy_exact() {
		block_on(async {
			let data = vec![b'y'; 5000];
			let mut src: &[u8] = &data[..];
			let mut sink = Vec::new();
			copy_exact(Pin::new(&mut src), Pin::new(&mut sink), 4500)
				.await
				.unwrap();
			assert_eq!(sink.len(), 4500);
			assert_eq!(src.len(), 500);

			let e = copy_exact(Pin::new(&mut src), Pin::new(&mut sink), 501)
				.await
				.unwrap_err();
			assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof);
		});
	}

	/// Tests calling `write_all` on a sink that accepts data only one byte at a time.
	#[test]
	fn test_write_all_slow() {
		struct Test {
			v: Vec<u8>,
		}
		impl AsyncWrite for Test {
			fn poll_write(
				mut self: Pin<&mut Self>,
				_cx: &mut Context<'_>,
				data: &[u8],
			) -> Poll<Result<usize>> {
				match data.first() {
					None => Ok(0).into(),
					Some(&b) => {
						self.v.push(b);
						Ok(1).into()
					}
				}
			}

			fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
				panic!("Should not be called");
			}

			fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
				panic!("Should not be called");
			}
		}
		let mut t = Test { v: vec![] };
		block_on(async { Pin::new(&mut t).write_all(b"abcdefgh").await }).unwrap();
		assert_eq!(t.v.as_slice(), b"abcdefgh");
	}

	/// Tests calling `write_all` on a sink that returns an error.
	#[test]
	fn test_write_all_error() {
		struct Test {
			already_called: bool,
		}
		impl AsyncWrite for Test {
			fn poll_write(
				mut self: Pin<&mut Self>,
				_cx: &mut Context<'_>,
				_data: &[u8],
			) -> Poll<Result<usize>> {
				assert!(!self.already_called);
				self.already_called = true;
				Err(std::io::Error::new(
					std::io::ErrorKind::Other,
					"Test error message",
				))
				.into()
			}

			fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
				panic!("Should not be called");
			}

			fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
				panic!("Should not be called");
			}
		}
		let mut t = Test {
			already_called: false,
		};
		let e = block_on(async { Pin::new(&mut t).write_all(b"abcdefgh").await }).unwrap_err();
		assert_eq!(e.kind(), std::io::ErrorKind::Other);
		assert_eq!(format!("{}", e), "Test error message");
	}
}
