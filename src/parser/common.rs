use std::io;

use crate::error::Result;
use crate::event::Next;
use crate::lexer::{Lexed, Lexer};

/// XML core namespace URI (for the `xml:` prefix)
pub const XMLNS_XML: &'static str = "http://www.w3.org/XML/1998/namespace";
/// XML namespace URI (for the `xmlns:` prefix)
pub const XMLNS_XMLNS: &'static str = "http://www.w3.org/2000/xmlns/";

/**
# Read individual tokens from a source

Analogously to [`std::io::Read`] and intended as a wrapper around
[`crate::Lexer`], this trait provides individual tokens.
*/
pub trait TokenRead {
	/// Return a single token from the source.
	///
	/// [`Lexed::NeedInput`] is returned if the source has no complete token
	/// available right now, [`Lexed::Eof`] once the document has ended.
	///
	/// Lexer errors and I/O errors from the underlying data source are
	/// passed through.
	fn read(&mut self) -> Result<Lexed>;
}

/// Wrapper around [`Lexer`] and a byte slice to provide a [`TokenRead`].
///
/// Consumed bytes are removed from the front of the slice.
pub struct SliceAdapter<'a, 'b> {
	lexer: &'a mut Lexer,
	src: &'a mut &'b [u8],
	at_eof: bool,
}

impl<'a, 'b> SliceAdapter<'a, 'b> {
	/// Wrap a lexer and a slice.
	///
	/// If `at_eof` is true, the end of the slice is the end of the document.
	pub fn new(lexer: &'a mut Lexer, src: &'a mut &'b [u8], at_eof: bool) -> Self {
		Self { lexer, src, at_eof }
	}
}

impl<'a, 'b> TokenRead for SliceAdapter<'a, 'b> {
	fn read(&mut self) -> Result<Lexed> {
		self.lexer.lex_bytes(self.src, self.at_eof)
	}
}

/// Wrapper around [`Lexer`] and [`std::io::BufRead`] to provide a
/// [`TokenRead`].
pub struct LexerAdapter<R: io::BufRead> {
	lexer: Lexer,
	src: R,
}

impl<R: io::BufRead> LexerAdapter<R> {
	/// Wraps a lexer and a byte source
	pub fn new(lexer: Lexer, src: R) -> Self {
		Self { lexer, src }
	}

	/// Consume self and return the wrapped lexer and byte source.
	pub fn into_inner(self) -> (Lexer, R) {
		(self.lexer, self.src)
	}

	/// Return a reference to the byte source
	pub fn get_ref(&self) -> &R {
		&self.src
	}

	/// Return a mutable reference to the byte source
	pub fn get_mut(&mut self) -> &mut R {
		&mut self.src
	}

	/// Return a reference to the lexer
	pub fn get_lexer(&self) -> &Lexer {
		&self.lexer
	}

	/// Return a mutable reference to the lexer
	pub fn get_lexer_mut(&mut self) -> &mut Lexer {
		&mut self.lexer
	}
}

impl<R: io::BufRead> TokenRead for LexerAdapter<R> {
	fn read(&mut self) -> Result<Lexed> {
		self.lexer.lex(&mut self.src)
	}
}

/**
Trait for parser-like structs.
*/
pub trait Parse {
	/// Parse a single event using tokens from `r`.
	///
	/// Once the end of the document has been reached and the final event
	/// returned, [`Next::Complete`] is returned. If the token source needs
	/// more input, [`Next::NeedInput`] is returned. Otherwise, the next
	/// event is returned.
	///
	/// If the document violates a constraint, such as the XML 1.0
	/// grammar or namespacing rules, the corresponding error is returned.
	///
	/// Errors from the token source (such as I/O errors) are forwarded.
	fn parse<R: TokenRead>(&mut self, r: &mut R) -> Result<Next>;

	/// Release all temporary buffers or other ephemeral allocations
	///
	/// This is sensible to call when it is expected that no more data will be
	/// processed by the parser for a while and the memory is better used
	/// elsewhere.
	fn release_temporaries(&mut self);
}
