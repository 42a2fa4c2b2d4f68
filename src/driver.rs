/*!
Wrappers around the lexer and the parser to drive them.

For high-level parsing, [`FeedParser`] and [`PullParser`] are the things to
look at. More information and examples can also be found in the [`xmlfeed`]
top-level documentation.

   [`xmlfeed`]: crate
*/

use std::io;

use crate::buffer::ChunkBuffer;
use crate::error::Result;
use crate::event::{Event, Next};
use crate::lexer::{Lexed, Lexer, LexerOptions};
use crate::parser::{LexerAdapter, Parse, Parser, SliceAdapter, TokenRead};

/**
# Source for individual XML events

This trait is implemented by the different parser frontends. It is analogous
to the [`std::io::Read`] trait, but for XML document events instead of bytes.
*/
pub trait EventRead {
	/// Read a single event from the parser.
	///
	/// [`Next::NeedInput`] is returned if no event can be produced from the
	/// input available right now, [`Next::Complete`] once the document has
	/// been fully processed.
	///
	/// I/O errors may be retried, all other errors are fatal (and will be
	/// returned again by the parser on the next invocation without reading
	/// further data from the source).
	fn read(&mut self) -> Result<Next>;

	/// Read all events which can be produced from the data source (at this
	/// point in time).
	///
	/// The given `cb` is invoked for each event.
	///
	/// If more input is needed to continue, `false` is returned. If the
	/// document is complete, `true` is returned.
	///
	/// I/O errors may be retried, all other errors are fatal (and will be
	/// returned again by the parser on the next invocation without reading
	/// further data from the source).
	fn read_all<F>(&mut self, mut cb: F) -> Result<bool>
	where
		F: FnMut(Event) -> (),
	{
		loop {
			match self.read()? {
				Next::Event(ev) => cb(ev),
				Next::NeedInput => return Ok(false),
				Next::Complete => return Ok(true),
			}
		}
	}
}

/**
# Non-blocking parsing

The [`FeedParser`] allows parsing XML documents as they arrive in the
application, giving back control to the caller immediately when not enough
data is available for processing. This is especially useful when streaming
data from sockets.

Chunks passed to [`feed()`](Self::feed) may be split at arbitrary byte
offsets; the resulting event sequence is the same as if the whole document
had been fed at once.

## Example

```
use xmlfeed::{FeedParser, Event, Next};
let doc = b"<?xml version='1.0'?><hello>World!</hello>";
let mut fp = FeedParser::new();
fp.feed(&doc[..10]);
// the XML declaration is not complete yet
assert_eq!(fp.next().unwrap(), Next::NeedInput);
assert!(fp.needs_input());

fp.feed(&doc[10..]);
assert_eq!(fp.next().unwrap(), Next::Event(Event::StartDocument));
```
*/
pub struct FeedParser {
	buffer: ChunkBuffer,
	lexer: Lexer,
	parser: Parser,
	needs_input: bool,
}

impl FeedParser {
	/// Create a new parser with default options.
	pub fn new() -> Self {
		Self::with_options(LexerOptions::default())
	}

	/// Create a new parser while configuring the lexer with the given
	/// options.
	pub fn with_options(options: LexerOptions) -> Self {
		Self {
			buffer: ChunkBuffer::new(),
			lexer: Lexer::with_options(options),
			parser: Parser::new(),
			needs_input: false,
		}
	}

	/// Feed a chunk of data to the parser.
	///
	/// This enqueues the data for processing, but does not process it right
	/// away. To process data, call [`next()`](Self::next) or use the
	/// [`EventRead`] trait.
	///
	/// # Panics
	///
	/// If [`finish()`](Self::finish) has been called before.
	pub fn feed(&mut self, data: &[u8]) {
		self.buffer.append(data);
	}

	/// Signal that no more data will arrive.
	///
	/// This is a prerequisite for parsing to terminate with
	/// [`Event::EndDocument`]. Otherwise, [`Next::NeedInput`] will be
	/// returned once the root element has been closed.
	pub fn finish(&mut self) {
		self.buffer.push_eof();
	}

	/// Return true if [`finish()`](Self::finish) has been called.
	pub fn is_finished(&self) -> bool {
		self.buffer.eof_pushed()
	}

	/// Produce the next event from the data fed so far.
	///
	/// Bytes which belong to a token are released from the internal buffer
	/// as soon as the lexer has processed them.
	pub fn next(&mut self) -> Result<Next> {
		let eof = self.buffer.eof_pushed();
		let mut view = self.buffer.remaining();
		let before = view.len();
		let result = {
			let mut adapter = SliceAdapter::new(&mut self.lexer, &mut view, eof);
			self.parser.parse(&mut adapter)
		};
		let consumed = before - view.len();
		self.buffer.consume_up_to(consumed);
		self.needs_input = match result {
			Ok(Next::NeedInput) => true,
			_ => false,
		};
		result
	}

	/// Return true if the last call to [`next()`](Self::next) stopped
	/// because more input is needed.
	pub fn needs_input(&self) -> bool {
		self.needs_input
	}

	/// Return true once [`Event::EndDocument`] has been returned.
	pub fn is_complete(&self) -> bool {
		self.parser.is_complete()
	}

	/// Return the amount of bytes which have been fed, but not processed by
	/// the lexer yet.
	pub fn buffered(&self) -> usize {
		self.buffer.len()
	}

	/// Number of bytes processed by the lexer so far.
	pub fn position(&self) -> usize {
		self.lexer.position()
	}

	/// Access the lexer
	pub fn get_lexer(&self) -> &Lexer {
		&self.lexer
	}

	/// Access the parser
	pub fn get_parser(&self) -> &Parser {
		&self.parser
	}

	/// Release all temporary buffers
	///
	/// This is sensible to call when it is expected that no more data will be
	/// processed by the parser for a while and the memory is better used
	/// elsewhere.
	pub fn release_temporaries(&mut self) {
		self.buffer.release_temporaries();
		self.lexer.release_temporaries();
		self.parser.release_temporaries();
	}
}

impl Default for FeedParser {
	fn default() -> Self {
		Self::new()
	}
}

impl EventRead for FeedParser {
	fn read(&mut self) -> Result<Next> {
		self.next()
	}
}

/// Token source for the [`PullParser`].
///
/// Keeps calling the lexer as long as the reader supplies data.
struct PullSource<R: io::BufRead> {
	inner: LexerAdapter<R>,
}

impl<R: io::BufRead> TokenRead for PullSource<R> {
	fn read(&mut self) -> Result<Lexed> {
		loop {
			let before = self.inner.get_lexer().position();
			match self.inner.read()? {
				// the buffer ran dry, but the reader may have more
				Lexed::NeedInput if self.inner.get_lexer().position() != before => continue,
				other => return Ok(other),
			}
		}
	}
}

/**
# Blocking parsing

The [`PullParser`] allows parsing XML documents from a [`io::BufRead`]
blockingly. The parser will block until the backing [`io::BufRead`] has
enough data available (or returns an error).

An empty buffer returned by the reader is treated as the end of the
document. A [`std::io::ErrorKind::WouldBlock`] error is reported as
[`Next::NeedInput`], so that non-blocking readers can be used as well. All
other I/O errors are passed through; they do not poison the parser.

## Example

```
use xmlfeed::{PullParser, Event, EventRead, Next};
let mut doc = &b"<?xml version='1.0'?><hello>World!</hello>"[..];
let mut pp = PullParser::new(&mut doc);
assert_eq!(pp.read().unwrap(), Next::Event(Event::StartDocument));
let mut n = 0;
assert!(pp.read_all(|_| n += 1).unwrap());
assert_eq!(n, 4);
```
*/
pub struct PullParser<R: io::BufRead> {
	token_source: PullSource<R>,
	parser: Parser,
}

impl<R: io::BufRead> PullParser<R> {
	/// Create a new parser with default options, wrapping the given reader.
	pub fn new(inner: R) -> Self {
		Self::with_options(inner, LexerOptions::default())
	}

	/// Create a new parser while configuring the lexer with the given
	/// options.
	pub fn with_options(inner: R, options: LexerOptions) -> Self {
		Self {
			token_source: PullSource {
				inner: LexerAdapter::new(Lexer::with_options(options), inner),
			},
			parser: Parser::new(),
		}
	}

	/// Access the inner BufRead
	pub fn get_inner(&self) -> &R {
		self.token_source.inner.get_ref()
	}

	/// Access the inner BufRead, mutably
	pub fn get_inner_mut(&mut self) -> &mut R {
		self.token_source.inner.get_mut()
	}

	/// Decompose the parser and return the inner BufRead
	pub fn into_inner(self) -> R {
		self.token_source.inner.into_inner().1
	}

	/// Access the lexer
	pub fn get_lexer(&self) -> &Lexer {
		self.token_source.inner.get_lexer()
	}

	/// Access the parser
	pub fn get_parser(&self) -> &Parser {
		&self.parser
	}

	/// Release all temporary buffers
	pub fn release_temporaries(&mut self) {
		self.token_source.inner.get_lexer_mut().release_temporaries();
		self.parser.release_temporaries();
	}
}

impl<R: io::BufRead> EventRead for PullParser<R> {
	/// Read a single event from the parser.
	///
	/// All I/O errors from the source are passed on without modification,
	/// except for [`std::io::ErrorKind::WouldBlock`], which is reported as
	/// [`Next::NeedInput`].
	fn read(&mut self) -> Result<Next> {
		self.parser.parse(&mut self.token_source)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Error;
	use std::collections::VecDeque;

	fn feed_all(fp: &mut FeedParser) -> Vec<Event> {
		let mut out = Vec::new();
		loop {
			match fp.next().unwrap() {
				Next::Event(ev) => out.push(ev),
				_ => return out,
			}
		}
	}

	/// BufRead which hands out one step at a time.
	struct Stepwise {
		steps: VecDeque<io::Result<Vec<u8>>>,
		cur: Vec<u8>,
		pos: usize,
	}

	impl Stepwise {
		fn new(steps: Vec<io::Result<&[u8]>>) -> Self {
			Self {
				steps: steps.into_iter().map(|s| s.map(|b| b.to_vec())).collect(),
				cur: Vec::new(),
				pos: 0,
			}
		}
	}

	impl io::Read for Stepwise {
		fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
			let n = {
				let avail = io::BufRead::fill_buf(self)?;
				let n = std::cmp::min(avail.len(), buf.len());
				buf[..n].copy_from_slice(&avail[..n]);
				n
			};
			io::BufRead::consume(self, n);
			Ok(n)
		}
	}

	impl io::BufRead for Stepwise {
		fn fill_buf(&mut self) -> io::Result<&[u8]> {
			if self.pos >= self.cur.len() {
				match self.steps.pop_front() {
					None => return Ok(&[]),
					Some(Err(e)) => return Err(e),
					Some(Ok(v)) => {
						self.cur = v;
						self.pos = 0;
					}
				}
			}
			Ok(&self.cur[self.pos..])
		}

		fn consume(&mut self, amt: usize) {
			self.pos += amt;
		}
	}

	#[test]
	fn feedparser_reports_need_input_before_finish() {
		let mut fp = FeedParser::new();
		assert_eq!(fp.next().unwrap(), Next::NeedInput);
		assert!(fp.needs_input());
		fp.feed(b"<a/>");
		let evs = feed_all(&mut fp);
		assert_eq!(evs.len(), 3);
		assert!(fp.needs_input());
		assert!(!fp.is_complete());
		fp.finish();
		assert_eq!(fp.next().unwrap(), Next::Event(Event::EndDocument));
		assert!(!fp.needs_input());
		assert_eq!(fp.next().unwrap(), Next::Complete);
		assert!(fp.is_complete());
	}

	#[test]
	fn feedparser_releases_consumed_bytes() {
		let mut fp = FeedParser::new();
		fp.feed(b"<root><child>text");
		assert_eq!(fp.buffered(), 17);
		feed_all(&mut fp);
		assert_eq!(fp.buffered(), 0);
		assert_eq!(fp.position(), 17);
		fp.release_temporaries();
		fp.feed(b"</child></root>");
		fp.finish();
		let evs = feed_all(&mut fp);
		assert_eq!(evs[0], Event::Characters("text".to_string()));
		assert_eq!(evs.last(), Some(&Event::EndDocument));
	}

	#[test]
	#[should_panic(expected = "cannot append behind eof")]
	fn feedparser_feed_after_finish_panics() {
		let mut fp = FeedParser::new();
		fp.finish();
		fp.feed(b"<a/>");
	}

	#[test]
	fn feedparser_read_all_signals_completion() {
		let mut fp = FeedParser::new();
		let mut evs = Vec::new();
		fp.feed(b"<a>x</");
		assert_eq!(fp.read_all(|ev| evs.push(ev)).unwrap(), false);
		assert_eq!(evs.len(), 3);
		fp.feed(b"a>");
		fp.finish();
		assert_eq!(fp.read_all(|ev| evs.push(ev)).unwrap(), true);
		assert_eq!(evs.len(), 5);
		assert_eq!(fp.read_all(|ev| evs.push(ev)).unwrap(), true);
		assert_eq!(evs.len(), 5);
	}

	#[test]
	fn feedparser_errors_are_terminal() {
		let mut fp = FeedParser::new();
		fp.feed(b"<a></b>");
		fp.finish();
		assert_eq!(fp.next().unwrap(), Next::Event(Event::StartDocument));
		match fp.next().unwrap() {
			Next::Event(Event::StartElement(_)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		let e1 = fp.next().err().unwrap();
		match e1 {
			Error::UnbalancedElement(_) => (),
			ref other => panic!("unexpected error: {:?}", other),
		}
		assert_eq!(fp.next().err().unwrap(), e1);
		assert_eq!(fp.next().err().unwrap(), e1);
	}

	#[test]
	fn feedparser_reports_truncated_document() {
		let mut fp = FeedParser::new();
		fp.feed(b"<a><b>");
		fp.finish();
		let mut evs = Vec::new();
		match fp.read_all(|ev| evs.push(ev)) {
			Err(Error::UnexpectedEndOfInput(_)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		assert_eq!(evs.len(), 3);
	}

	#[test]
	fn feedparser_applies_lexer_options() {
		let mut fp = FeedParser::with_options(LexerOptions::default().max_token_length(8));
		fp.feed(b"<a>0123456789</a>");
		fp.finish();
		match fp.read_all(|_| ()) {
			Err(Error::TokenTooLong(_)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn pullparser_reads_from_slice() {
		let mut doc = &b"<a>text</a>"[..];
		let mut pp = PullParser::new(&mut doc);
		let mut evs = Vec::new();
		assert!(pp.read_all(|ev| evs.push(ev)).unwrap());
		assert_eq!(
			evs.iter().filter(|ev| matches!(ev, Event::Characters(_))).count(),
			1
		);
		assert_eq!(evs.last(), Some(&Event::EndDocument));
	}

	#[test]
	fn pullparser_refills_small_buffers() {
		let doc = &b"<root a='1'><child>some longer text</child></root>"[..];
		let mut pp = PullParser::new(io::BufReader::with_capacity(3, doc));
		let mut evs = Vec::new();
		assert!(pp.read_all(|ev| evs.push(ev)).unwrap());
		assert!(evs.contains(&Event::Characters("some longer text".to_string())));
		assert_eq!(evs.len(), 7);
	}

	#[test]
	fn pullparser_reports_would_block_as_need_input() {
		let src = Stepwise::new(vec![
			Ok(&b"<a>"[..]),
			Err(io::Error::new(io::ErrorKind::WouldBlock, "later")),
			Ok(&b"text</a>"[..]),
		]);
		let mut pp = PullParser::new(src);
		let mut evs = Vec::new();
		assert_eq!(pp.read_all(|ev| evs.push(ev)).unwrap(), false);
		assert_eq!(evs.len(), 2);
		assert_eq!(pp.read_all(|ev| evs.push(ev)).unwrap(), true);
		assert_eq!(evs[2], Event::Characters("text".to_string()));
		assert_eq!(evs.len(), 5);
	}

	#[test]
	fn pullparser_passes_io_errors_without_poisoning() {
		let src = Stepwise::new(vec![
			Ok(&b"<a>"[..]),
			Err(io::Error::new(io::ErrorKind::Other, "broken")),
			Ok(&b"</a>"[..]),
		]);
		let mut pp = PullParser::new(src);
		let mut evs = Vec::new();
		match pp.read_all(|ev| evs.push(ev)) {
			Err(Error::IO(e)) => assert_eq!(e.kind(), io::ErrorKind::Other),
			other => panic!("unexpected result: {:?}", other),
		}
		assert_eq!(pp.read_all(|ev| evs.push(ev)).unwrap(), true);
		assert_eq!(evs.len(), 4);
	}
}
