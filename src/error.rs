/*!
# Error types

This module holds the error types returned by the lexer, the parser and the
drivers of this crate.
*/
use std::error;
use std::fmt;
use std::io;
use std::ops::Deref;
use std::result::Result as StdResult;
use std::sync::Arc;

use smartstring::alias::String as SmartString;

pub(crate) const ERRCTX_UNKNOWN: &'static str = "in unknown context";
pub(crate) const ERRCTX_PROLOGUE: &'static str = "before the root element";
pub(crate) const ERRCTX_EPILOGUE: &'static str = "after the root element";
pub(crate) const ERRCTX_TEXT: &'static str = "in text";
pub(crate) const ERRCTX_MARKUP: &'static str = "after '<'";
pub(crate) const ERRCTX_NAME: &'static str = "in name";
pub(crate) const ERRCTX_ELEMENT: &'static str = "in element start tag";
pub(crate) const ERRCTX_ELEMENT_FOOT: &'static str = "in element end tag";
pub(crate) const ERRCTX_ELEMENT_CLOSE: &'static str = "at end of empty element";
pub(crate) const ERRCTX_ATTNAME: &'static str = "in attribute name";
pub(crate) const ERRCTX_ATTVAL: &'static str = "in attribute value";
pub(crate) const ERRCTX_REF: &'static str = "in reference";
pub(crate) const ERRCTX_COMMENT_START: &'static str = "in comment start";
pub(crate) const ERRCTX_COMMENT: &'static str = "in comment";
pub(crate) const ERRCTX_CDATA_SECTION_START: &'static str = "in CDATA section start";
pub(crate) const ERRCTX_CDATA_SECTION: &'static str = "in CDATA section";
pub(crate) const ERRCTX_PI: &'static str = "in processing instruction";
pub(crate) const ERRCTX_PI_TARGET: &'static str = "in processing instruction target";
pub(crate) const ERRCTX_NAMESPACE_DECL: &'static str = "in namespace declaration";

/// Lexical or syntactical violation of the XML 1.0 (or Namespaces in XML
/// 1.0) grammar.
///
/// The `&'static str` members describe where the violation was found; their
/// exact contents are implementation details.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum MarkupError {
	/// Byte which was not expected at that point in the grammar, optionally
	/// with a list of things which would have been acceptable.
	UnexpectedByte(&'static str, u8, Option<&'static [&'static str]>),

	/// Character which is not allowed in XML 1.0 documents.
	InvalidChar(&'static str, u32),

	/// Byte which is not part of a valid UTF-8 sequence.
	InvalidUtf8Byte(u8),

	/// Generalized invalid syntactic construct which does not fit into any
	/// of the other categories.
	InvalidSyntax(&'static str),

	/// Qualified name with more than one colon or an empty prefix or local
	/// part.
	InvalidQName(&'static str),

	/// Attempt to use or (re-)bind a reserved namespace prefix or URI.
	ReservedNamespace(&'static str),
}

impl MarkupError {
	pub(crate) fn with_context(self, ctx: &'static str) -> Self {
		match self {
			Self::UnexpectedByte(_, b, alt) => Self::UnexpectedByte(ctx, b, alt),
			Self::InvalidChar(_, cp) => Self::InvalidChar(ctx, cp),
			Self::InvalidQName(_) => Self::InvalidQName(ctx),
			other => other,
		}
	}
}

impl fmt::Display for MarkupError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::UnexpectedByte(ctx, b, Some(opts)) if opts.len() > 0 => {
				write!(f, "0x{:02x} not allowed {} (expected ", *b, ctx)?;
				if opts.len() == 1 {
					f.write_str(opts[0])?;
				} else {
					f.write_str("one of: ")?;
					for (i, opt) in opts.iter().enumerate() {
						if i > 0 {
							f.write_str(", ")?;
						}
						f.write_str(*opt)?;
					}
				}
				f.write_str(")")
			}
			Self::UnexpectedByte(ctx, b, _) => write!(f, "0x{:02x} not allowed {}", *b, ctx),
			Self::InvalidChar(ctx, cp) => write!(f, "invalid codepoint U+{:x} {}", cp, ctx),
			Self::InvalidUtf8Byte(b) => write!(f, "invalid utf-8 byte: \\x{:02x}", b),
			Self::InvalidSyntax(msg) => write!(f, "invalid syntax: {}", msg),
			Self::InvalidQName(ctx) => write!(f, "malformed qualified name {}", ctx),
			Self::ReservedNamespace(msg) => write!(f, "reserved namespace: {}", msg),
		}
	}
}

impl error::Error for MarkupError {}

/// Violation of the element nesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
	/// The end tag name does not match the name of the innermost open
	/// element.
	Mismatch {
		expected: SmartString,
		found: SmartString,
	},

	/// An end tag was found while no element was open.
	NoOpenElement(SmartString),
}

impl fmt::Display for BalanceError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Mismatch { expected, found } => write!(
				f,
				"end tag </{}> does not match start tag <{}>",
				found, expected
			),
			Self::NoOpenElement(name) => write!(f, "end tag </{}> without open element", name),
		}
	}
}

impl error::Error for BalanceError {}

/// [`std::sync::Arc`]-based wrapper around [`std::io::Error`] to allow
/// cloning.
#[derive(Clone)]
pub struct IOErrorWrapper(Arc<io::Error>);

impl IOErrorWrapper {
	fn wrap(e: io::Error) -> IOErrorWrapper {
		IOErrorWrapper(Arc::new(e))
	}
}

impl fmt::Debug for IOErrorWrapper {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		fmt::Debug::fmt(&**self, f)
	}
}

impl fmt::Display for IOErrorWrapper {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		fmt::Display::fmt(&**self, f)
	}
}

impl PartialEq for IOErrorWrapper {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl Deref for IOErrorWrapper {
	type Target = io::Error;

	fn deref(&self) -> &io::Error {
		&*self.0
	}
}

/// Error types which may be returned from the parser, the lexer or the
/// drivers.
///
/// With the exception of [`Error::IO`], all errors are fatal: once
/// encountered, the same error is returned on every later call without
/// consuming further input.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
	/// Unrecognized or ill-formed lexical construct.
	MalformedMarkup(MarkupError),

	/// End tag without matching start tag.
	UnbalancedElement(BalanceError),

	/// An element or attribute name uses a namespace prefix which has not
	/// been declared in any enclosing scope.
	UndeclaredPrefix {
		prefix: SmartString,
		ctx: &'static str,
	},

	/// Two attributes on the same start tag resolve to the same
	/// `(namespace URI, local name)` pair, or a namespace prefix is declared
	/// twice on the same start tag.
	DuplicateAttribute {
		namespace_uri: Option<String>,
		local_name: SmartString,
	},

	/// The input ended while a construct was incomplete or elements were
	/// still open.
	UnexpectedEndOfInput(&'static str),

	/// An entity reference is neither one of the five predefined entities
	/// nor a well-formed reference to a valid character.
	InvalidEntity(&'static str),

	/// A single token exceeded the configured
	/// [`LexerOptions::max_token_length`](crate::LexerOptions::max_token_length).
	TokenTooLong(&'static str),

	/// An I/O error was returned by the byte source of a pull-based or
	/// asynchronous driver.
	///
	/// I/O errors are not fatal and may be retried.
	IO(IOErrorWrapper),
}

pub type Result<T> = StdResult<T, Error>;

pub(crate) trait ErrorWithContext {
	fn with_context(self, ctx: &'static str) -> Self;
}

impl Error {
	pub fn io(e: io::Error) -> Error {
		Error::IO(IOErrorWrapper::wrap(e))
	}

	/// Return true if the error is fatal for the component which returned
	/// it.
	pub fn is_fatal(&self) -> bool {
		!matches!(self, Self::IO(_))
	}

	pub(crate) fn eof(ctx: &'static str) -> Error {
		Error::UnexpectedEndOfInput(ctx)
	}
}

impl ErrorWithContext for Error {
	fn with_context(self, ctx: &'static str) -> Self {
		match self {
			Self::MalformedMarkup(e) => Self::MalformedMarkup(e.with_context(ctx)),
			Self::UndeclaredPrefix { prefix, .. } => Self::UndeclaredPrefix { prefix, ctx },
			Self::InvalidEntity(_) => Self::InvalidEntity(ctx),
			other => other,
		}
	}
}

pub(crate) fn add_context<T>(r: Result<T>, ctx: &'static str) -> Result<T> {
	r.map_err(|e| e.with_context(ctx))
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::io(e)
	}
}

impl From<MarkupError> for Error {
	fn from(e: MarkupError) -> Error {
		Error::MalformedMarkup(e)
	}
}

impl From<BalanceError> for Error {
	fn from(e: BalanceError) -> Error {
		Error::UnbalancedElement(e)
	}
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::MalformedMarkup(e) => write!(f, "malformed markup: {}", e),
			Error::UnbalancedElement(e) => write!(f, "unbalanced element: {}", e),
			Error::UndeclaredPrefix { prefix, ctx } => {
				write!(f, "undeclared namespace prefix '{}' {}", prefix, ctx)
			}
			Error::DuplicateAttribute {
				namespace_uri: Some(uri),
				local_name,
			} => write!(f, "duplicate attribute {{{}}}{}", uri, local_name),
			Error::DuplicateAttribute {
				namespace_uri: None,
				local_name,
			} => write!(f, "duplicate attribute {}", local_name),
			Error::UnexpectedEndOfInput(ctx) => write!(f, "unexpected end of input {}", ctx),
			Error::InvalidEntity(ctx) => write!(f, "invalid entity or character reference {}", ctx),
			Error::TokenTooLong(ctx) => write!(f, "token length limit exceeded {}", ctx),
			Error::IO(e) => write!(f, "I/O error: {}", e),
		}
	}
}

impl error::Error for Error {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match self {
			Error::IO(e) => Some(&**e),
			Error::MalformedMarkup(e) => Some(e),
			Error::UnbalancedElement(e) => Some(e),
			Error::UndeclaredPrefix { .. }
			| Error::DuplicateAttribute { .. }
			| Error::UnexpectedEndOfInput(_)
			| Error::InvalidEntity(_)
			| Error::TokenTooLong(_) => None,
		}
	}
}
