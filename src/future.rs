use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::AsyncBufRead;

#[cfg(feature = "stream")]
use futures_core::stream::Stream;

use crate::event::{Event, Next};
use crate::lexer::{Lexer, LexerOptions};
use crate::parser::{Parse, Parser, SliceAdapter};
use crate::Result;

use pin_project_lite::pin_project;

pin_project! {
	/// Future returned by [`AsyncEventReadExt::read`].
	pub struct ReadEvent<T: ?Sized>{
		#[pin]
		inner: T,
	}
}

impl<T: AsyncEventRead + Unpin> Future for ReadEvent<T> {
	type Output = Result<Option<Event>>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		self.project().inner.poll_read(cx)
	}
}

pin_project! {
	/// Future returned by [`AsyncEventReadExt::read_all`].
	pub struct ReadAll<T: ?Sized, F> {
		cb: F,
		#[pin]
		inner: T,
	}
}

impl<T: AsyncEventRead + Unpin, F: FnMut(Event) -> () + Send> Future for ReadAll<T, F> {
	type Output = Result<()>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
		let mut this = self.project();
		loop {
			match this.inner.as_mut().poll_read(cx) {
				Poll::Ready(Ok(Some(ev))) => {
					(this.cb)(ev);
				}
				Poll::Ready(Ok(None)) => return Poll::Ready(Ok(())),
				Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
				Poll::Pending => return Poll::Pending,
			}
		}
	}
}

/**
Asynchronous source of individual XML events

This trait is implemented by the asynchronous parser frontend. It is analogous
to the [`tokio::io::AsyncRead`] trait, but for [`Event`]s instead of bytes.

Where the synchronous drivers return [`Next::NeedInput`], an asynchronous
source returns [`Poll::Pending`]. `Ok(None)` is returned after
[`Event::EndDocument`].

Usually, one interacts with this trait through the helpers available in
[`AsyncEventReadExt`].
*/
pub trait AsyncEventRead {
	/// Poll for a single event from the parser.
	fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Option<Event>>>;
}

impl<T: AsyncEventRead + Unpin + ?Sized> AsyncEventRead for &mut T {
	fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Option<Event>>> {
		let this: &mut &mut T = Pin::into_inner(self);
		let this: &mut T = *this;
		let this = Pin::new(this);
		this.poll_read(cx)
	}
}

/**
Helper trait for asynchronous sources of individual XML events

This helper trait is automatically implemented for all [`AsyncEventRead`].
*/
pub trait AsyncEventReadExt: AsyncEventRead {
	/// Read a single event from the parser.
	///
	/// If the end of a valid document has been reached, `None` is returned.
	///
	/// I/O errors may be retried, all other errors are fatal (and will be
	/// returned again by the parser on the next invocation without reading
	/// further data from the source).
	///
	/// Equivalent to:
	///
	/// ```ignore
	/// async fn read(&mut self) -> Result<Option<Event>>;
	/// ```
	fn read(&mut self) -> ReadEvent<&mut Self> {
		ReadEvent { inner: self }
	}

	/// Read all events until the end of the document.
	///
	/// The given `cb` is invoked for each event.
	///
	/// I/O errors may be retried, all other errors are fatal (and will be
	/// returned again by the parser on the next invocation without reading
	/// further data from the source).
	///
	/// Equivalent to:
	///
	/// ```ignore
	///     async fn read_all<F>(&mut self, mut cb: F) -> Result<()>
	///            where F: FnMut(Event) -> () + Send
	/// ```
	fn read_all<F>(&mut self, cb: F) -> ReadAll<&mut Self, F> {
		ReadAll { inner: self, cb }
	}
}

impl<T: AsyncEventRead> AsyncEventReadExt for T {}

pin_project! {
	/**
	# Tokio-compatible asynchronous parser

	The [`AsyncParser`] allows parsing XML documents from a
	[`tokio::io::AsyncBufRead`], asynchronously. It operates similarly as the
	[`PullParser`](crate::PullParser) does, but instead of blocking the task,
	it will yield control to other tasks if the backend is not able to supply
	data immediately.

	Interaction with an `AsyncParser` should happen exclusively via the
	[`AsyncEventReadExt`] trait (or the `Stream` implementation with the
	`stream` feature).

	## Example

	```
	use xmlfeed::{AsyncParser, Event, AsyncEventReadExt};
	# tokio_test::block_on(async {
	let mut doc = &b"<?xml version='1.0'?><hello>World!</hello>"[..];
	// this converts the doc into an tokio::io::AsyncBufRead
	let mut pp = AsyncParser::new(&mut doc);
	let ev = pp.read().await;
	assert_eq!(ev.unwrap(), Some(Event::StartDocument));
	let mut n = 0;
	pp.read_all(|_| n += 1).await.unwrap();
	assert_eq!(n, 4);
	# })
	```
	*/
	pub struct AsyncParser<T>{
		#[pin]
		inner: T,
		lexer: Lexer,
		parser: Parser,
	}
}

impl<T: AsyncBufRead> AsyncParser<T> {
	/// Create a new parser with default options, wrapping the given reader.
	pub fn new(inner: T) -> Self {
		Self::with_options(inner, LexerOptions::default())
	}

	/// Create a new parser while configuring the lexer with the given
	/// options.
	pub fn with_options(inner: T, options: LexerOptions) -> Self {
		Self {
			inner,
			lexer: Lexer::with_options(options),
			parser: Parser::new(),
		}
	}

	/// Decompose the AsyncParser and return the inner AsyncBufRead
	pub fn into_inner(self) -> T {
		self.inner
	}

	/// Access the inner AsyncBufRead
	pub fn get_inner(&self) -> &T {
		&self.inner
	}

	/// Access the inner AsyncBufRead, mutably
	pub fn get_inner_mut(&mut self) -> &mut T {
		&mut self.inner
	}

	/// Access the lexer
	pub fn get_lexer(&self) -> &Lexer {
		&self.lexer
	}

	/// Access the parser
	pub fn get_parser(&self) -> &Parser {
		&self.parser
	}

	/// Release temporary buffers and other ephemeral allocations.
	///
	/// This is sensible to call when it is expected that no more data will be
	/// processed by the parser for a while and the memory is better used
	/// elsewhere.
	#[inline(always)]
	pub fn release_temporaries(&mut self) {
		self.lexer.release_temporaries();
		self.parser.release_temporaries();
	}
}

impl<T: AsyncBufRead> AsyncEventRead for AsyncParser<T> {
	fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Option<Event>>> {
		let mut this = self.project();
		loop {
			let (mut buf, eof, pending) = match this.inner.as_mut().poll_fill_buf(cx) {
				// a.k.a. WouldBlock; queued events can still be returned
				Poll::Pending => (&[][..], false, true),
				Poll::Ready(Ok(buf)) => (buf, buf.len() == 0, false),
				Poll::Ready(Err(e)) => return Poll::Ready(Err(e.into())),
			};
			let old_len = buf.len();
			let result = {
				let mut adapter = SliceAdapter::new(this.lexer, &mut buf, eof);
				this.parser.parse(&mut adapter)
			};
			let consumed = old_len - buf.len();
			if !pending {
				this.inner.as_mut().consume(consumed);
			}
			match result {
				Ok(Next::Event(ev)) => return Poll::Ready(Ok(Some(ev))),
				Ok(Next::Complete) => return Poll::Ready(Ok(None)),
				Ok(Next::NeedInput) if pending => return Poll::Pending,
				// the buffer has been consumed, ask the source for more
				Ok(Next::NeedInput) => continue,
				Err(e) => return Poll::Ready(Err(e)),
			}
		}
	}
}

#[cfg(feature = "stream")]
#[cfg_attr(docsrs, doc(cfg(all(feature = "stream", feature = "async"))))]
impl<T: AsyncBufRead> Stream for AsyncParser<T> {
	type Item = Result<Event>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		match self.poll_read(cx) {
			Poll::Pending => Poll::Pending,
			Poll::Ready(Ok(Some(v))) => Poll::Ready(Some(Ok(v))),
			Poll::Ready(Ok(None)) => Poll::Ready(None),
			Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
		}
	}
}
