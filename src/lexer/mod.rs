/*!
# Incremental XML 1.0 lexer

The [`Lexer`] turns bytes into [`Token`]s. It can be suspended at any byte
boundary: if the bytes passed to it do not complete a token, it keeps what it
has seen so far in internal buffers and reports [`Lexed::NeedInput`]. No
partial token is ever returned, so the sequence of tokens does not depend on
how the input was split into chunks.

Besides the lexical structure, the lexer tracks the names of the open
elements. It therefore knows whether it is before, inside or after the root
element and can check that end tags match their start tags.
*/
use std::fmt;
use std::io;

use smartstring::alias::String as SmartString;

mod ranges;
mod read;

use crate::error::*;
use ranges::*;
use read::Endbyte;

/// A raw attribute as found in a start tag: the unresolved qualified name
/// and the value with all references expanded.
pub type RawAttribute = (SmartString, String);

/**
A single lexical unit of an XML document.

Tokens are only produced once they are complete. Text is produced as one
token for the whole run of character data between two pieces of markup, with
references already expanded.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
	/// The XML declaration (`<?xml ...?>`), carrying the raw pseudo-attribute
	/// text.
	XmlDeclaration(String),

	/// An element start tag or empty element tag.
	StartTag {
		/// Qualified name as written in the document.
		name: SmartString,
		/// Attributes in document order, including namespace declarations.
		attributes: Vec<RawAttribute>,
		/// True for `<name/>`.
		empty: bool,
	},

	/// An element end tag whose name has been matched against the innermost
	/// open element.
	EndTag { name: SmartString },

	/// Character data inside an element.
	Text(String),

	/// Contents of a CDATA section, verbatim.
	CData(String),

	/// Contents of a comment, without the delimiters.
	Comment(String),

	/// A processing instruction other than the XML declaration.
	ProcessingInstruction {
		target: SmartString,
		data: Option<String>,
	},
}

/// Outcome of a successful call to the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lexed {
	/// A complete token.
	Token(Token),
	/// The input seen so far does not complete a token.
	NeedInput,
	/// The end of the document has been reached after the root element.
	Eof,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CharRefRadix {
	Decimal,
	Hexadecimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RefKind {
	Entity,
	Char(CharRefRadix),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MarkupState {
	Initial,
	/// `<!` read
	Bang,
	/// `<!-` read
	CommentStart,
	/// Number of bytes of `<![CDATA[` matched so far
	CDataStart(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TagState {
	Name,
	/// After an attribute value
	SpaceRequired,
	Blank,
	AttributeName,
	/// Whitespace between attribute name and `=`
	AfterAttributeName,
	/// Whitespace between `=` and the quote
	AfterEq,
	/// Delimiter and alphabet
	AttributeValue(u8, &'static [ByteRange]),
	/// Encountered `/`
	MaybeEmptyClose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CloseState {
	Name,
	Blank,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PiState {
	Target,
	/// `?` directly after the target
	TargetEnd,
	Blank,
	Data,
	/// `?` inside the data
	MaybeEnd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RefReturnState {
	AttributeValue(u8, &'static [ByteRange]),
	Text,
}

impl RefReturnState {
	fn to_state(self) -> State {
		match self {
			Self::AttributeValue(delim, selector) => {
				State::TagOpen(TagState::AttributeValue(delim, selector))
			}
			Self::Text => State::Content,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
	/// Before the root element
	Prologue,
	/// Character data inside the root element
	Content,
	/// Number of consecutive `]` seen in character data
	ContentBrackets(usize),
	/// After the root element
	Epilogue,
	/// Encountered `<`
	Markup(MarkupState),
	TagOpen(TagState),
	TagClose(CloseState),
	/// Number of consecutive `]` seen
	CDataSection(usize),
	/// Number of consecutive `-` seen
	CommentSection(usize),
	ProcessingInstructionSection(PiState),
	/// Encountered `&`
	Reference {
		ctx: &'static str,
		ret: RefReturnState,
		kind: RefKind,
	},
	Done,
}

// longest named entity is 4 chars
// longest valid decimal reference is 7 digits, hexadecimal 6
const MAX_REFERENCE_LENGTH: usize = 8usize;

const TOK_XML_CDATA_START: &'static [u8] = b"<![CDATA[";

/// Hold options to configure a [`Lexer`].
///
/// See also [`Lexer::with_options()`].
#[derive(Debug, Clone, PartialEq, Copy, Default)]
pub struct LexerOptions {
	/// Maximum number of bytes a single name, attribute value, text run,
	/// comment, CDATA section or processing instruction may occupy in the
	/// lexer's buffers.
	///
	/// If a token exceeds this limit, lexing fails with
	/// [`Error::TokenTooLong`]. The default is `None`, meaning no limit.
	pub max_token_length: Option<usize>,
}

impl LexerOptions {
	/// Set the [`LexerOptions::max_token_length`] value.
	///
	/// # Example
	///
	/// ```
	/// use xmlfeed::{Lexer, LexerOptions};
	/// let mut lexer = Lexer::with_options(LexerOptions::default().max_token_length(1024));
	/// ```
	pub fn max_token_length(mut self, v: usize) -> LexerOptions {
		self.max_token_length = Some(v);
		self
	}
}

fn resolve_named_entity(name: &[u8]) -> LResult<u8> {
	// amp, lt, gt, apos, quot
	match name {
		b"amp" => Ok(b'&'),
		b"lt" => Ok(b'<'),
		b"gt" => Ok(b'>'),
		b"apos" => Ok(b'\''),
		b"quot" => Ok(b'"'),
		_ => Err(Error::InvalidEntity(ERRCTX_UNKNOWN).into()),
	}
}

fn is_xml_char(ch: char) -> bool {
	match ch {
		'\t' | '\n' | '\r' => true,
		'\u{20}'..='\u{d7ff}' => true,
		'\u{e000}'..='\u{fffd}' => true,
		'\u{10000}'..='\u{10ffff}' => true,
		_ => false,
	}
}

fn resolve_char_reference(digits: &[u8], radix: CharRefRadix, into: &mut Vec<u8>) -> LResult<()> {
	let radix = match radix {
		CharRefRadix::Decimal => 10,
		CharRefRadix::Hexadecimal => 16,
	};
	let codepoint = std::str::from_utf8(digits)
		.ok()
		.and_then(|s| u32::from_str_radix(s, radix).ok())
		.ok_or(Error::InvalidEntity(ERRCTX_UNKNOWN))?;
	match std::char::from_u32(codepoint) {
		Some(ch) if is_xml_char(ch) => {
			let mut buf = [0u8; 4];
			into.extend_from_slice(ch.encode_utf8(&mut buf[..]).as_bytes());
			Ok(())
		}
		_ => Err(Error::InvalidEntity(ERRCTX_UNKNOWN).into()),
	}
}

fn handle_eof<T>(v: Option<T>, ctx: &'static str) -> LResult<T> {
	v.ok_or_else(|| Error::eof(ctx).into())
}

struct ST(State, Option<Token>);

impl ST {
	fn splice<'a>(self, st: &'a mut State) -> Option<Token> {
		*st = self.0;
		self.1
	}
}

/// Lexer-internal error: either the end of the current buffer was reached
/// (which is not an error to the outside) or a fatal error occured.
#[derive(Debug, Clone, PartialEq)]
enum LexError {
	EndOfBuffer,
	Fatal(Error),
}

impl From<Error> for LexError {
	fn from(other: Error) -> Self {
		Self::Fatal(other)
	}
}

impl From<MarkupError> for LexError {
	fn from(other: MarkupError) -> Self {
		Self::Fatal(other.into())
	}
}

impl From<BalanceError> for LexError {
	fn from(other: BalanceError) -> Self {
		Self::Fatal(other.into())
	}
}

fn add_lex_context<T>(r: LResult<T>, ctx: &'static str) -> LResult<T> {
	r.map_err(|e| match e {
		LexError::Fatal(e) => LexError::Fatal(e.with_context(ctx)),
		other => other,
	})
}

type LResult<T> = std::result::Result<T, LexError>;

/**
# Incremental XML 1.0 lexer

The lexer can be fed from a byte slice ([`Lexer::lex_bytes`]) or from a
[`std::io::BufRead`] ([`Lexer::lex`]). Errors are fatal: once an error has
been returned, the same error is returned on every further call.
*/
pub struct Lexer {
	state: State,
	scratchpad: Vec<u8>,
	swap: Vec<u8>,
	/// Names of the open elements, innermost last
	open: Vec<SmartString>,
	root_seen: bool,
	tag_name: Option<SmartString>,
	attr_name: Option<SmartString>,
	attributes: Vec<RawAttribute>,
	pi_target: Option<SmartString>,
	xml_decl_allowed: bool,
	ctr: usize,
	limit: usize,
	opts: LexerOptions,
	err: Option<Error>,
	has_eof: bool,
}

impl Lexer {
	/// Construct a new Lexer based on [`LexerOptions::default()`].
	pub fn new() -> Self {
		Self::with_options(LexerOptions::default())
	}

	/// Construct a new Lexer with the given options.
	pub fn with_options(opts: LexerOptions) -> Self {
		Self {
			state: State::Prologue,
			scratchpad: Vec::new(),
			swap: Vec::new(),
			open: Vec::new(),
			root_seen: false,
			tag_name: None,
			attr_name: None,
			attributes: Vec::new(),
			pi_target: None,
			xml_decl_allowed: false,
			ctr: 0,
			limit: opts.max_token_length.unwrap_or(usize::MAX),
			opts,
			err: None,
			has_eof: false,
		}
	}

	/// Return the options the lexer was created with.
	pub fn options(&self) -> &LexerOptions {
		&self.opts
	}

	/// Number of bytes consumed so far.
	///
	/// This is a plain counter which wraps around on overflow.
	pub fn position(&self) -> usize {
		self.ctr
	}

	/// Number of currently open elements.
	pub fn depth(&self) -> usize {
		self.open.len()
	}

	fn demote_eof(&self, ep: Endbyte) -> LResult<Endbyte> {
		match ep {
			Endbyte::Eof => {
				if self.has_eof {
					Ok(Endbyte::Eof)
				} else {
					Err(LexError::EndOfBuffer)
				}
			}
			other => Ok(other),
		}
	}

	/// State to continue in after a piece of markup is complete.
	fn after_markup(&self) -> State {
		if !self.open.is_empty() {
			State::Content
		} else if self.root_seen {
			State::Epilogue
		} else {
			State::Prologue
		}
	}

	fn read_validated<B: ByteSelect>(&mut self, r: &mut &[u8], selector: &B, limit: usize) -> LResult<Endbyte> {
		let remaining = match limit.checked_sub(self.scratchpad.len()) {
			None => return Ok(Endbyte::Limit),
			Some(v) => v,
		};
		let old_len = self.scratchpad.len();
		let ep = read::read_validated_bytes(r, selector, remaining, &mut self.scratchpad);
		self.ctr = self.ctr.wrapping_add(self.scratchpad.len() - old_len);
		if let Endbyte::Delimiter(_) = ep {
			self.ctr = self.ctr.wrapping_add(1);
		}
		self.demote_eof(ep)
	}

	#[inline]
	fn read_single(&mut self, r: &mut &[u8]) -> LResult<Option<u8>> {
		match r.split_first() {
			Some((v, tail)) => {
				self.ctr = self.ctr.wrapping_add(1);
				*r = tail;
				Ok(Some(*v))
			}
			None => {
				if self.has_eof {
					Ok(None)
				} else {
					Err(LexError::EndOfBuffer)
				}
			}
		}
	}

	#[inline]
	fn skip_matching<B: ByteSelect>(&mut self, r: &mut &[u8], selector: &B) -> (usize, LResult<Endbyte>) {
		let (nread, ep) = read::skip_matching_bytes(r, selector);
		self.ctr = self.ctr.wrapping_add(nread);
		match self.demote_eof(ep) {
			Ok(ep) => {
				if let Endbyte::Delimiter(_) = ep {
					self.ctr = self.ctr.wrapping_add(1)
				};
				(nread, Ok(ep))
			}
			Err(e) => (nread, Err(e)),
		}
	}

	fn swap_scratchpad(&mut self) {
		std::mem::swap(&mut self.scratchpad, &mut self.swap);
	}

	fn read_swap(&mut self) -> Vec<u8> {
		std::mem::take(&mut self.swap)
	}

	/// Push a single byte of character data, rejecting non-chars.
	fn push_char_byte(&mut self, b: u8, ctx: &'static str) -> LResult<()> {
		if CLASS_XML_MAY_NONCHAR_BYTE.select(b) {
			return Err(MarkupError::InvalidChar(ctx, b as u32).into());
		}
		self.scratchpad.push(b);
		Ok(())
	}

	fn flush_scratchpad_as_string(&mut self) -> LResult<String> {
		let result = match std::str::from_utf8(&self.scratchpad[..]) {
			Ok(s) => Ok(s.to_owned()),
			Err(e) => Err(MarkupError::InvalidUtf8Byte(self.scratchpad[e.valid_up_to()]).into()),
		};
		self.scratchpad.clear();
		result
	}

	fn flush_scratchpad_as_name(&mut self) -> LResult<SmartString> {
		Ok(self.flush_scratchpad_as_string()?.into())
	}

	fn maybe_flush_scratchpad_as_text(&mut self) -> LResult<Option<Token>> {
		if self.scratchpad.len() == 0 {
			Ok(None)
		} else {
			Ok(Some(Token::Text(self.flush_scratchpad_as_string()?)))
		}
	}

	/// Whitespace before, between and after the root element.
	fn lex_misc(&mut self, r: &mut &[u8]) -> LResult<ST> {
		let (ctx, in_prologue) = match self.state {
			State::Prologue => (ERRCTX_PROLOGUE, true),
			_ => (ERRCTX_EPILOGUE, false),
		};
		match self.skip_matching(r, &CLASS_XML_SPACE_BYTE) {
			(_, Ok(Endbyte::Eof)) | (_, Ok(Endbyte::Limit)) => {
				if in_prologue {
					Err(Error::eof(ctx).into())
				} else {
					Ok(ST(State::Done, None))
				}
			}
			(_, Ok(Endbyte::Delimiter(b'<'))) => Ok(ST(State::Markup(MarkupState::Initial), None)),
			(_, Ok(Endbyte::Delimiter(b))) => {
				Err(MarkupError::UnexpectedByte(ctx, b, Some(&["whitespace", "'<'"])).into())
			}
			(_, Err(e)) => Err(e),
		}
	}

	fn lex_content(&mut self, r: &mut &[u8]) -> LResult<ST> {
		match self.read_validated(r, &CLASS_XML_TEXT_DELIMITED_BYTE, self.limit)? {
			// elements are still open
			Endbyte::Eof => Err(Error::eof(ERRCTX_TEXT).into()),
			Endbyte::Limit => Err(Error::TokenTooLong(ERRCTX_TEXT).into()),
			Endbyte::Delimiter(b'<') => Ok(ST(
				State::Markup(MarkupState::Initial),
				self.maybe_flush_scratchpad_as_text()?,
			)),
			Endbyte::Delimiter(b']') => Ok(ST(State::ContentBrackets(1), None)),
			Endbyte::Delimiter(b'&') => {
				// the text read so far waits in the swap until the reference
				// is complete
				self.swap_scratchpad();
				Ok(ST(
					State::Reference {
						ctx: ERRCTX_TEXT,
						ret: RefReturnState::Text,
						kind: RefKind::Entity,
					},
					None,
				))
			}
			Endbyte::Delimiter(b) => Err(MarkupError::InvalidChar(ERRCTX_TEXT, b as u32).into()),
		}
	}

	/// `]` in character data: `]]>` must not appear outside of CDATA
	/// sections.
	fn lex_content_brackets(&mut self, nbrackets: usize, r: &mut &[u8]) -> LResult<ST> {
		let b = match r.first() {
			Some(b) => *b,
			None if self.has_eof => return Err(Error::eof(ERRCTX_TEXT).into()),
			None => return Err(LexError::EndOfBuffer),
		};
		match b {
			b']' => {
				self.read_single(r)?;
				if nbrackets < 2 {
					return Ok(ST(State::ContentBrackets(nbrackets + 1), None));
				}
				if self.scratchpad.len() >= self.limit {
					return Err(Error::TokenTooLong(ERRCTX_TEXT).into());
				}
				self.scratchpad.push(b']');
				Ok(ST(State::ContentBrackets(2), None))
			}
			b'>' if nbrackets >= 2 => Err(MarkupError::InvalidSyntax("unescaped ']]>' forbidden in text").into()),
			// the byte is left to the text lexer
			_ => {
				for _ in 0..nbrackets {
					self.scratchpad.push(b']');
				}
				Ok(ST(State::Content, None))
			}
		}
	}

	fn lex_markup(&mut self, state: MarkupState, r: &mut &[u8]) -> LResult<ST> {
		match state {
			MarkupState::Initial => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_MARKUP)?;
				match b {
					b'/' => Ok(ST(State::TagClose(CloseState::Name), None)),
					b'?' => {
						// only `<?` may precede an XML declaration
						self.xml_decl_allowed = self.ctr == 2;
						Ok(ST(State::ProcessingInstructionSection(PiState::Target), None))
					}
					b'!' => Ok(ST(State::Markup(MarkupState::Bang), None)),
					b if CLASS_XML_NAMESTART_BYTE.select(b) => {
						if self.root_seen && self.open.is_empty() {
							return Err(MarkupError::InvalidSyntax("more than one root element").into());
						}
						self.scratchpad.push(b);
						Ok(ST(State::TagOpen(TagState::Name), None))
					}
					b => Err(MarkupError::UnexpectedByte(
						ERRCTX_MARKUP,
						b,
						Some(&["'/'", "'?'", "'!'", "start of name"]),
					)
					.into()),
				}
			}
			MarkupState::Bang => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_MARKUP)?;
				match b {
					b'-' => Ok(ST(State::Markup(MarkupState::CommentStart), None)),
					b'[' => {
						if self.open.is_empty() {
							Err(MarkupError::InvalidSyntax("CDATA section outside of root element").into())
						} else {
							Ok(ST(State::Markup(MarkupState::CDataStart(3)), None))
						}
					}
					b'D' => Err(MarkupError::InvalidSyntax("document type declarations are not supported").into()),
					b => Err(MarkupError::UnexpectedByte(ERRCTX_MARKUP, b, Some(&["'--'", "'[CDATA['"])).into()),
				}
			}
			MarkupState::CommentStart => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_COMMENT_START)?;
				if b != b'-' {
					return Err(MarkupError::UnexpectedByte(ERRCTX_COMMENT_START, b, Some(&["'-'"])).into());
				}
				Ok(ST(State::CommentSection(0), None))
			}
			MarkupState::CDataStart(i) => {
				debug_assert!(i < TOK_XML_CDATA_START.len());
				let b = handle_eof(self.read_single(r)?, ERRCTX_CDATA_SECTION_START)?;
				if b != TOK_XML_CDATA_START[i] {
					return Err(MarkupError::InvalidSyntax("malformed CDATA section start").into());
				}
				let next = i + 1;
				if next == TOK_XML_CDATA_START.len() {
					Ok(ST(State::CDataSection(0), None))
				} else {
					Ok(ST(State::Markup(MarkupState::CDataStart(next)), None))
				}
			}
		}
	}

	fn lex_cdata_section(&mut self, nend: usize, r: &mut &[u8]) -> LResult<ST> {
		match nend {
			0 => match self.read_validated(r, &CLASS_XML_CDATA_SECTION_DELIMITED_BYTE, self.limit)? {
				Endbyte::Eof => Err(Error::eof(ERRCTX_CDATA_SECTION).into()),
				Endbyte::Limit => Err(Error::TokenTooLong(ERRCTX_CDATA_SECTION).into()),
				Endbyte::Delimiter(b']') => Ok(ST(State::CDataSection(1), None)),
				Endbyte::Delimiter(b) => Err(MarkupError::InvalidChar(ERRCTX_CDATA_SECTION, b as u32).into()),
			},
			1 => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_CDATA_SECTION)?;
				if b == b']' {
					return Ok(ST(State::CDataSection(2), None));
				}
				self.scratchpad.push(b']');
				self.push_char_byte(b, ERRCTX_CDATA_SECTION)?;
				Ok(ST(State::CDataSection(0), None))
			}
			_ => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_CDATA_SECTION)?;
				match b {
					b'>' => Ok(ST(State::Content, Some(Token::CData(self.flush_scratchpad_as_string()?)))),
					// `]]]`: the first bracket is content, the other two may
					// still end the section
					b']' => {
						self.scratchpad.push(b']');
						Ok(ST(State::CDataSection(2), None))
					}
					b => {
						self.scratchpad.extend_from_slice(b"]]");
						self.push_char_byte(b, ERRCTX_CDATA_SECTION)?;
						Ok(ST(State::CDataSection(0), None))
					}
				}
			}
		}
	}

	fn lex_comment(&mut self, ndashes: usize, r: &mut &[u8]) -> LResult<ST> {
		match ndashes {
			0 => match self.read_validated(r, &CLASS_XML_COMMENT_DELIMITED_BYTE, self.limit)? {
				Endbyte::Eof => Err(Error::eof(ERRCTX_COMMENT).into()),
				Endbyte::Limit => Err(Error::TokenTooLong(ERRCTX_COMMENT).into()),
				Endbyte::Delimiter(b'-') => Ok(ST(State::CommentSection(1), None)),
				Endbyte::Delimiter(b) => Err(MarkupError::InvalidChar(ERRCTX_COMMENT, b as u32).into()),
			},
			1 => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_COMMENT)?;
				if b == b'-' {
					return Ok(ST(State::CommentSection(2), None));
				}
				self.scratchpad.push(b'-');
				self.push_char_byte(b, ERRCTX_COMMENT)?;
				Ok(ST(State::CommentSection(0), None))
			}
			_ => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_COMMENT)?;
				if b != b'>' {
					return Err(MarkupError::InvalidSyntax("'--' not allowed in comment").into());
				}
				let text = self.flush_scratchpad_as_string()?;
				Ok(ST(self.after_markup(), Some(Token::Comment(text))))
			}
		}
	}

	fn finish_processing_instruction(&mut self) -> LResult<ST> {
		let target = match self.pi_target.take() {
			Some(v) => v,
			None => return Err(MarkupError::InvalidSyntax("processing instruction without target").into()),
		};
		let data = self.flush_scratchpad_as_string()?;
		let data = if data.len() > 0 { Some(data) } else { None };
		let tok = if target.as_str() == "xml" && self.xml_decl_allowed {
			match data {
				Some(data) if data.starts_with("version") => Token::XmlDeclaration(data),
				_ => return Err(MarkupError::InvalidSyntax("XML declaration must start with version").into()),
			}
		} else {
			Token::ProcessingInstruction { target, data }
		};
		Ok(ST(self.after_markup(), Some(tok)))
	}

	fn lex_processing_instruction(&mut self, state: PiState, r: &mut &[u8]) -> LResult<ST> {
		match state {
			PiState::Target => {
				if self.scratchpad.len() == 0 {
					let b = handle_eof(self.read_single(r)?, ERRCTX_PI_TARGET)?;
					if !CLASS_XML_NAMESTART_BYTE.select(b) {
						return Err(MarkupError::UnexpectedByte(ERRCTX_PI_TARGET, b, Some(&["start of name"])).into());
					}
					self.scratchpad.push(b);
					return Ok(ST(State::ProcessingInstructionSection(PiState::Target), None));
				}
				let next = match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.limit)? {
					Endbyte::Eof => return Err(Error::eof(ERRCTX_PI_TARGET).into()),
					Endbyte::Limit => return Err(Error::TokenTooLong(ERRCTX_PI_TARGET).into()),
					Endbyte::Delimiter(b'?') => PiState::TargetEnd,
					Endbyte::Delimiter(b) if CLASS_XML_SPACE_BYTE.select(b) => PiState::Blank,
					Endbyte::Delimiter(b) => {
						return Err(MarkupError::UnexpectedByte(
							ERRCTX_PI_TARGET,
							b,
							Some(&["whitespace", "'?>'"]),
						)
						.into())
					}
				};
				let target = self.flush_scratchpad_as_name()?;
				if target.eq_ignore_ascii_case("xml") && !(target.as_str() == "xml" && self.xml_decl_allowed) {
					return Err(MarkupError::InvalidSyntax("reserved processing instruction target").into());
				}
				self.pi_target = Some(target);
				Ok(ST(State::ProcessingInstructionSection(next), None))
			}
			PiState::TargetEnd => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_PI)?;
				if b != b'>' {
					return Err(MarkupError::UnexpectedByte(ERRCTX_PI, b, Some(&["'>'"])).into());
				}
				self.finish_processing_instruction()
			}
			PiState::Blank => match self.skip_matching(r, &CLASS_XML_SPACE_BYTE) {
				(_, Ok(Endbyte::Eof)) | (_, Ok(Endbyte::Limit)) => Err(Error::eof(ERRCTX_PI).into()),
				(_, Ok(Endbyte::Delimiter(b'?'))) => Ok(ST(State::ProcessingInstructionSection(PiState::MaybeEnd), None)),
				(_, Ok(Endbyte::Delimiter(b))) => {
					self.push_char_byte(b, ERRCTX_PI)?;
					Ok(ST(State::ProcessingInstructionSection(PiState::Data), None))
				}
				(_, Err(e)) => Err(e),
			},
			PiState::Data => match self.read_validated(r, &CLASS_XML_PI_DELIMITED_BYTE, self.limit)? {
				Endbyte::Eof => Err(Error::eof(ERRCTX_PI).into()),
				Endbyte::Limit => Err(Error::TokenTooLong(ERRCTX_PI).into()),
				Endbyte::Delimiter(b'?') => Ok(ST(State::ProcessingInstructionSection(PiState::MaybeEnd), None)),
				Endbyte::Delimiter(b) => Err(MarkupError::InvalidChar(ERRCTX_PI, b as u32).into()),
			},
			PiState::MaybeEnd => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_PI)?;
				match b {
					b'>' => self.finish_processing_instruction(),
					b'?' => {
						self.scratchpad.push(b'?');
						Ok(ST(State::ProcessingInstructionSection(PiState::MaybeEnd), None))
					}
					b => {
						self.scratchpad.push(b'?');
						self.push_char_byte(b, ERRCTX_PI)?;
						Ok(ST(State::ProcessingInstructionSection(PiState::Data), None))
					}
				}
			}
		}
	}

	fn finish_start_tag(&mut self, empty: bool) -> LResult<ST> {
		let name = match self.tag_name.take() {
			Some(v) => v,
			None => return Err(MarkupError::InvalidSyntax("start tag without name").into()),
		};
		let attributes = std::mem::take(&mut self.attributes);
		self.root_seen = true;
		if !empty {
			self.open.push(name.clone());
		}
		Ok(ST(
			if empty { self.after_markup() } else { State::Content },
			Some(Token::StartTag {
				name,
				attributes,
				empty,
			}),
		))
	}

	/// Interpret the byte after an element name, attribute value or
	/// whitespace inside a start tag.
	fn lex_tag_delimiter(&mut self, b: u8, space_seen: bool) -> LResult<ST> {
		match b {
			b' ' | b'\t' | b'\r' | b'\n' => Ok(ST(State::TagOpen(TagState::Blank), None)),
			b'>' => self.finish_start_tag(false),
			b'/' => Ok(ST(State::TagOpen(TagState::MaybeEmptyClose), None)),
			b if CLASS_XML_NAMESTART_BYTE.select(b) => {
				if !space_seen {
					return Err(MarkupError::InvalidSyntax("space required before attribute names").into());
				}
				self.scratchpad.push(b);
				Ok(ST(State::TagOpen(TagState::AttributeName), None))
			}
			b => Err(MarkupError::UnexpectedByte(
				ERRCTX_ELEMENT,
				b,
				Some(&["whitespace", "'>'", "'/>'", "start of name"]),
			)
			.into()),
		}
	}

	fn lex_tag_open(&mut self, state: TagState, r: &mut &[u8]) -> LResult<ST> {
		match state {
			TagState::Name => match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.limit)? {
				Endbyte::Eof => Err(Error::eof(ERRCTX_NAME).into()),
				Endbyte::Limit => Err(Error::TokenTooLong(ERRCTX_NAME).into()),
				Endbyte::Delimiter(b) => {
					self.tag_name = Some(self.flush_scratchpad_as_name()?);
					self.lex_tag_delimiter(b, false)
				}
			},
			TagState::SpaceRequired | TagState::Blank => match self.skip_matching(r, &CLASS_XML_SPACE_BYTE) {
				(_, Ok(Endbyte::Eof)) | (_, Ok(Endbyte::Limit)) => Err(Error::eof(ERRCTX_ELEMENT).into()),
				(nmatching, Err(LexError::EndOfBuffer)) if nmatching > 0 && state == TagState::SpaceRequired => {
					// remember that the required space has been seen before
					// suspending
					Ok(ST(State::TagOpen(TagState::Blank), None))
				}
				(nmatching, Ok(Endbyte::Delimiter(b))) => {
					self.lex_tag_delimiter(b, state == TagState::Blank || nmatching > 0)
				}
				(_, Err(e)) => Err(e),
			},
			TagState::AttributeName => match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.limit)? {
				Endbyte::Eof => Err(Error::eof(ERRCTX_ATTNAME).into()),
				Endbyte::Limit => Err(Error::TokenTooLong(ERRCTX_ATTNAME).into()),
				Endbyte::Delimiter(b) => {
					let next = match b {
						b'=' => TagState::AfterEq,
						b if CLASS_XML_SPACE_BYTE.select(b) => TagState::AfterAttributeName,
						b => return Err(MarkupError::UnexpectedByte(ERRCTX_ATTNAME, b, Some(&["'='"])).into()),
					};
					self.attr_name = Some(self.flush_scratchpad_as_name()?);
					Ok(ST(State::TagOpen(next), None))
				}
			},
			TagState::AfterAttributeName => match self.skip_matching(r, &CLASS_XML_SPACE_BYTE) {
				(_, Ok(Endbyte::Eof)) | (_, Ok(Endbyte::Limit)) => Err(Error::eof(ERRCTX_ATTNAME).into()),
				(_, Ok(Endbyte::Delimiter(b'='))) => Ok(ST(State::TagOpen(TagState::AfterEq), None)),
				(_, Ok(Endbyte::Delimiter(b))) => {
					Err(MarkupError::UnexpectedByte(ERRCTX_ATTNAME, b, Some(&["'='"])).into())
				}
				(_, Err(e)) => Err(e),
			},
			TagState::AfterEq => match self.skip_matching(r, &CLASS_XML_SPACE_BYTE) {
				(_, Ok(Endbyte::Eof)) | (_, Ok(Endbyte::Limit)) => Err(Error::eof(ERRCTX_ATTVAL).into()),
				(_, Ok(Endbyte::Delimiter(b'"'))) => Ok(ST(
					State::TagOpen(TagState::AttributeValue(b'"', CLASS_XML_ATT_QUOT_DELIMITED_BYTE)),
					None,
				)),
				(_, Ok(Endbyte::Delimiter(b'\''))) => Ok(ST(
					State::TagOpen(TagState::AttributeValue(b'\'', CLASS_XML_ATT_APOS_DELIMITED_BYTE)),
					None,
				)),
				(_, Ok(Endbyte::Delimiter(b))) => {
					Err(MarkupError::UnexpectedByte(ERRCTX_ATTVAL, b, Some(&["'\"'", "\"'\""])).into())
				}
				(_, Err(e)) => Err(e),
			},
			TagState::AttributeValue(delim, selector) => match self.read_validated(r, &selector, self.limit)? {
				Endbyte::Eof => Err(Error::eof(ERRCTX_ATTVAL).into()),
				Endbyte::Limit => Err(Error::TokenTooLong(ERRCTX_ATTVAL).into()),
				Endbyte::Delimiter(b) if b == delim => {
					let value = self.flush_scratchpad_as_string()?;
					let name = match self.attr_name.take() {
						Some(v) => v,
						None => return Err(MarkupError::InvalidSyntax("attribute value without name").into()),
					};
					self.attributes.push((name, value));
					Ok(ST(State::TagOpen(TagState::SpaceRequired), None))
				}
				Endbyte::Delimiter(b'&') => {
					self.swap_scratchpad();
					Ok(ST(
						State::Reference {
							ctx: ERRCTX_ATTVAL,
							ret: RefReturnState::AttributeValue(delim, selector),
							kind: RefKind::Entity,
						},
						None,
					))
				}
				Endbyte::Delimiter(b'<') => Err(MarkupError::UnexpectedByte(ERRCTX_ATTVAL, b'<', None).into()),
				Endbyte::Delimiter(b) => Err(MarkupError::InvalidChar(ERRCTX_ATTVAL, b as u32).into()),
			},
			TagState::MaybeEmptyClose => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_ELEMENT_CLOSE)?;
				if b != b'>' {
					return Err(MarkupError::UnexpectedByte(ERRCTX_ELEMENT_CLOSE, b, Some(&["'>'"])).into());
				}
				self.finish_start_tag(true)
			}
		}
	}

	fn finish_end_tag(&mut self) -> LResult<ST> {
		let name = match self.tag_name.take() {
			Some(v) => v,
			None => return Err(MarkupError::InvalidSyntax("end tag without name").into()),
		};
		Ok(ST(self.after_markup(), Some(Token::EndTag { name })))
	}

	fn lex_tag_close(&mut self, state: CloseState, r: &mut &[u8]) -> LResult<ST> {
		match state {
			CloseState::Name => {
				if self.scratchpad.len() == 0 {
					let b = handle_eof(self.read_single(r)?, ERRCTX_ELEMENT_FOOT)?;
					if !CLASS_XML_NAMESTART_BYTE.select(b) {
						return Err(MarkupError::UnexpectedByte(ERRCTX_ELEMENT_FOOT, b, Some(&["start of name"])).into());
					}
					self.scratchpad.push(b);
					return Ok(ST(State::TagClose(CloseState::Name), None));
				}
				let b = match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.limit)? {
					Endbyte::Eof => return Err(Error::eof(ERRCTX_ELEMENT_FOOT).into()),
					Endbyte::Limit => return Err(Error::TokenTooLong(ERRCTX_NAME).into()),
					Endbyte::Delimiter(b) => b,
				};
				let name = self.flush_scratchpad_as_name()?;
				match self.open.pop() {
					None => return Err(BalanceError::NoOpenElement(name).into()),
					Some(expected) if expected != name => {
						return Err(BalanceError::Mismatch { expected, found: name }.into())
					}
					Some(_) => (),
				}
				self.tag_name = Some(name);
				match b {
					b'>' => self.finish_end_tag(),
					b if CLASS_XML_SPACE_BYTE.select(b) => Ok(ST(State::TagClose(CloseState::Blank), None)),
					b => Err(MarkupError::UnexpectedByte(ERRCTX_ELEMENT_FOOT, b, Some(&["whitespace", "'>'"])).into()),
				}
			}
			CloseState::Blank => match self.skip_matching(r, &CLASS_XML_SPACE_BYTE) {
				(_, Ok(Endbyte::Eof)) | (_, Ok(Endbyte::Limit)) => Err(Error::eof(ERRCTX_ELEMENT_FOOT).into()),
				(_, Ok(Endbyte::Delimiter(b'>'))) => self.finish_end_tag(),
				(_, Ok(Endbyte::Delimiter(b))) => {
					Err(MarkupError::UnexpectedByte(ERRCTX_ELEMENT_FOOT, b, Some(&["whitespace", "'>'"])).into())
				}
				(_, Err(e)) => Err(e),
			},
		}
	}

	/// Drop leading zeros of a character reference, keeping at least one
	/// digit. Returns true if anything was dropped.
	fn strip_leading_zeros(&mut self) -> bool {
		let nzeros = self.scratchpad.iter().take_while(|b| **b == b'0').count();
		let nzeros = nzeros.min(self.scratchpad.len().saturating_sub(1));
		if nzeros == 0 {
			return false;
		}
		self.scratchpad.drain(..nzeros);
		true
	}

	fn lex_reference(&mut self, ctx: &'static str, ret: RefReturnState, kind: RefKind, r: &mut &[u8]) -> LResult<ST> {
		let result = match kind {
			RefKind::Entity => self.read_validated(r, &CLASS_XML_NAME_BYTE, MAX_REFERENCE_LENGTH),
			RefKind::Char(CharRefRadix::Decimal) => {
				self.read_validated(r, &CLASS_XML_DECIMAL_DIGIT_BYTE, MAX_REFERENCE_LENGTH)
			}
			RefKind::Char(CharRefRadix::Hexadecimal) => {
				self.read_validated(r, &CLASS_XML_HEXADECIMAL_DIGIT_BYTE, MAX_REFERENCE_LENGTH)
			}
		};
		// leading zeros do not count towards the length bound
		let stripped = match kind {
			RefKind::Char(_) => self.strip_leading_zeros(),
			RefKind::Entity => false,
		};
		let result = result?;
		if result == Endbyte::Limit && stripped {
			return Ok(ST(State::Reference { ctx, ret, kind }, None));
		}
		match result {
			Endbyte::Eof => Err(Error::eof(ERRCTX_REF).into()),
			Endbyte::Limit => Err(Error::InvalidEntity(ctx).into()),
			Endbyte::Delimiter(b'#') if kind == RefKind::Entity && self.scratchpad.len() == 0 => Ok(ST(
				State::Reference {
					ctx,
					ret,
					kind: RefKind::Char(CharRefRadix::Decimal),
				},
				None,
			)),
			Endbyte::Delimiter(b'x') if kind == RefKind::Char(CharRefRadix::Decimal) && self.scratchpad.len() == 0 => {
				Ok(ST(
					State::Reference {
						ctx,
						ret,
						kind: RefKind::Char(CharRefRadix::Hexadecimal),
					},
					None,
				))
			}
			Endbyte::Delimiter(b';') if self.scratchpad.len() > 0 => {
				// return to the main scratchpad; the reference is now in the
				// swap
				self.swap_scratchpad();
				let reference = self.read_swap();
				match kind {
					RefKind::Entity => {
						let b = add_lex_context(resolve_named_entity(&reference[..]), ctx)?;
						self.scratchpad.push(b);
					}
					RefKind::Char(radix) => {
						add_lex_context(resolve_char_reference(&reference[..], radix, &mut self.scratchpad), ctx)?;
					}
				}
				Ok(ST(ret.to_state(), None))
			}
			Endbyte::Delimiter(_) => Err(Error::InvalidEntity(ctx).into()),
		}
	}

	fn lex_bytes_raw(&mut self, r: &mut &[u8]) -> LResult<Option<Token>> {
		if let Some(e) = self.err.as_ref() {
			return Err(LexError::Fatal(e.clone()));
		}

		loop {
			#[cfg(debug_assertions)]
			let prev = (self.ctr, self.state);
			let stresult = match self.state {
				State::Prologue | State::Epilogue => self.lex_misc(r),
				State::Content => self.lex_content(r),
				State::ContentBrackets(nbrackets) => self.lex_content_brackets(nbrackets, r),
				State::Markup(substate) => self.lex_markup(substate, r),
				State::TagOpen(substate) => self.lex_tag_open(substate, r),
				State::TagClose(substate) => self.lex_tag_close(substate, r),
				State::CDataSection(nend) => self.lex_cdata_section(nend, r),
				State::CommentSection(ndashes) => self.lex_comment(ndashes, r),
				State::ProcessingInstructionSection(substate) => self.lex_processing_instruction(substate, r),
				State::Reference { ctx, ret, kind } => self.lex_reference(ctx, ret, kind, r),
				State::Done => return Ok(None),
			};
			let st = match stresult {
				Err(LexError::EndOfBuffer) => return Err(LexError::EndOfBuffer),
				Err(LexError::Fatal(e)) => {
					// cached so that no invalid data is emitted later on
					log::debug!("lexer failed at byte {}: {}", self.ctr, e);
					self.err = Some(e.clone());
					return Err(LexError::Fatal(e));
				}
				Ok(st) => st,
			};
			if let Some(tok) = st.splice(&mut self.state) {
				log::trace!("lexed token {:?}", tok);
				return Ok(Some(tok));
			}
			#[cfg(debug_assertions)]
			{
				if prev == (self.ctr, self.state) {
					panic!("state has not changed in the last iteration: {:?} {:?}", self, self.scratchpad);
				}
			}
		}
	}

	/// Lex bytes from the buffer, advancing the slice for any byte consumed,
	/// until either an error occurs, a token is complete or the buffer is at
	/// its end.
	///
	/// Bytes which belong to an incomplete token are consumed from the slice
	/// and kept in the lexer, so the caller can drop them.
	///
	/// # End-of-file handling
	///
	/// If `at_eof` is false, the end of the buffer is treated as a temporary
	/// situation and [`Lexed::NeedInput`] is returned when it is reached.
	/// Otherwise, the end of the buffer is the end of the document:
	/// [`Lexed::Eof`] is returned if the root element has been closed, and
	/// [`Error::UnexpectedEndOfInput`] otherwise.
	pub fn lex_bytes(&mut self, r: &mut &[u8], at_eof: bool) -> Result<Lexed> {
		self.has_eof = at_eof;
		match self.lex_bytes_raw(r) {
			Ok(Some(tok)) => Ok(Lexed::Token(tok)),
			Ok(None) => Ok(Lexed::Eof),
			Err(LexError::EndOfBuffer) => Ok(Lexed::NeedInput),
			Err(LexError::Fatal(e)) => Err(e),
		}
	}

	/// Lex bytes from the reader until either an error occurs, a token is
	/// complete or the available data is exhausted.
	///
	/// This issues exactly one call to `fill_buf()`. An empty buffer is
	/// treated as the end of the document. A
	/// [`std::io::ErrorKind::WouldBlock`] error is treated as an empty buffer
	/// which is not the end of the document ([`Lexed::NeedInput`] is
	/// returned unless a token can be completed). All other I/O errors are
	/// passed back as [`Error::IO`] without invoking the lexer; they can be
	/// retried.
	pub fn lex<R: io::BufRead + ?Sized>(&mut self, r: &mut R) -> Result<Lexed> {
		let (mut buf, eof): (&[u8], bool) = match r.fill_buf() {
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => (&[], false),
			Err(e) => return Err(e.into()),
			Ok(b) => (b, b.len() == 0),
		};
		let orig_len = buf.len();
		let result = self.lex_bytes(&mut buf, eof);
		let new_len = buf.len();
		r.consume(orig_len - new_len);
		result
	}

	/// Release all temporary buffers
	///
	/// This is sensible to call when it is expected that no more data will be
	/// processed by the lexer for a while and the memory is better used
	/// elsewhere.
	pub fn release_temporaries(&mut self) {
		self.scratchpad.shrink_to_fit();
		self.swap.shrink_to_fit();
		self.attributes.shrink_to_fit();
	}
}

impl Default for Lexer {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Lexer {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Lexer")
			.field("state", &self.state)
			.field("depth", &self.open.len())
			.field("ctr", &self.ctr)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::buffer::ChunkBuffer;

	fn lex(data: &[u8]) -> (Vec<Token>, Result<()>) {
		let mut lexer = Lexer::new();
		let mut src = data;
		let mut out = Vec::new();
		loop {
			match lexer.lex_bytes(&mut src, true) {
				Ok(Lexed::Token(tok)) => out.push(tok),
				Ok(Lexed::Eof) => return (out, Ok(())),
				Ok(Lexed::NeedInput) => panic!("need input despite eof"),
				Err(e) => return (out, Err(e)),
			}
		}
	}

	fn lex_chunked_with(lexer: &mut Lexer, chunks: &[&[u8]]) -> (Vec<Token>, Result<()>) {
		let mut buf = ChunkBuffer::new();
		let mut out = Vec::new();
		for chunk in chunks {
			buf.append(chunk);
			loop {
				let mut view = buf.remaining();
				let before = view.len();
				let result = lexer.lex_bytes(&mut view, false);
				let consumed = before - view.len();
				buf.consume_up_to(consumed);
				match result {
					Ok(Lexed::Token(tok)) => out.push(tok),
					Ok(Lexed::NeedInput) => break,
					Ok(Lexed::Eof) => panic!("eof before end of input"),
					Err(e) => return (out, Err(e)),
				}
			}
		}
		buf.push_eof();
		loop {
			let mut view = buf.remaining();
			let before = view.len();
			let result = lexer.lex_bytes(&mut view, true);
			let consumed = before - view.len();
			buf.consume_up_to(consumed);
			match result {
				Ok(Lexed::Token(tok)) => out.push(tok),
				Ok(Lexed::NeedInput) => panic!("need input despite eof"),
				Ok(Lexed::Eof) => return (out, Ok(())),
				Err(e) => return (out, Err(e)),
			}
		}
	}

	fn lex_chunked(chunks: &[&[u8]]) -> (Vec<Token>, Result<()>) {
		lex_chunked_with(&mut Lexer::new(), chunks)
	}

	fn lex_err(data: &[u8]) -> Error {
		match lex(data) {
			(_, Err(e)) => e,
			(toks, Ok(())) => panic!("unexpected success: {:?}", toks),
		}
	}

	fn start(name: &str, attributes: &[(&str, &str)], empty: bool) -> Token {
		Token::StartTag {
			name: name.into(),
			attributes: attributes.iter().map(|(n, v)| ((*n).into(), (*v).to_string())).collect(),
			empty,
		}
	}

	fn end(name: &str) -> Token {
		Token::EndTag { name: name.into() }
	}

	#[test]
	fn lexer_lex_element_with_attributes() {
		let (toks, r) = lex(&b"<element x='foo' y=\"bar\" xmlns='baz' xmlns:abc='fnord'></element>"[..]);
		r.unwrap();
		assert_eq!(
			toks,
			vec![
				start(
					"element",
					&[("x", "foo"), ("y", "bar"), ("xmlns", "baz"), ("xmlns:abc", "fnord")],
					false
				),
				end("element"),
			]
		);
	}

	#[test]
	fn lexer_lex_empty_element() {
		let (toks, r) = lex(&b"<element/>"[..]);
		r.unwrap();
		assert_eq!(toks, vec![start("element", &[], true)]);
	}

	#[test]
	fn lexer_lex_empty_element_with_attribute_and_whitespace() {
		let (toks, r) = lex(&b"<a  b = 'c'\n/>"[..]);
		r.unwrap();
		assert_eq!(toks, vec![start("a", &[("b", "c")], true)]);
	}

	#[test]
	fn lexer_lex_end_tag_with_trailing_whitespace() {
		let (toks, r) = lex(&b"<a></a \t>"[..]);
		r.unwrap();
		assert_eq!(toks, vec![start("a", &[], false), end("a")]);
	}

	#[test]
	fn lexer_lex_text_with_references() {
		let (toks, r) = lex(&b"<a>x &amp; y &lt;&gt;&apos;&quot; &#65;&#x42;&#x1f389;</a>"[..]);
		r.unwrap();
		assert_eq!(toks[1], Token::Text("x & y <>'\" AB\u{1f389}".to_string()));
		assert_eq!(toks.len(), 3);
	}

	#[test]
	fn lexer_lex_char_references_with_leading_zeros() {
		let doc = &b"<a>&#0000000065;&#x00000000042;&#00;&#x0000000001f389;</a>"[..];
		let (toks, r) = lex(&b"<a>&#0000000065;&#x00000000042;</a>"[..]);
		r.unwrap();
		assert_eq!(toks[1], Token::Text("AB".to_string()));
		// U+0000 stays invalid, however it is written
		match lex_err(doc) {
			Error::InvalidEntity(ctx) => assert_eq!(ctx, ERRCTX_TEXT),
			other => panic!("unexpected error: {:?}", other),
		}
		let (toks, r) = lex(&b"<a>&#x0000000001f389;&#000000000000000000000000009;</a>"[..]);
		r.unwrap();
		assert_eq!(toks[1], Token::Text("\u{1f389}\t".to_string()));
		let bytewise: Vec<&[u8]> = b"<a>&#0000000065;&#x00000000042;</a>".chunks(1).collect();
		let (toks, r) = lex_chunked(&bytewise[..]);
		r.unwrap();
		assert_eq!(toks[1], Token::Text("AB".to_string()));
	}

	#[test]
	fn lexer_lex_whitespace_only_text_in_content() {
		let (toks, r) = lex(&b"<a> <b/>\n</a>"[..]);
		r.unwrap();
		assert_eq!(
			toks,
			vec![
				start("a", &[], false),
				Token::Text(" ".to_string()),
				start("b", &[], true),
				Token::Text("\n".to_string()),
				end("a"),
			]
		);
	}

	#[test]
	fn lexer_lex_attribute_with_references() {
		let (toks, r) = lex(&b"<a b='&amp;x&#x20;&quot;'/>"[..]);
		r.unwrap();
		assert_eq!(toks, vec![start("a", &[("b", "&x \"")], true)]);
	}

	#[test]
	fn lexer_does_not_normalize_attribute_whitespace() {
		let (toks, r) = lex(&b"<a b='x\ty\r\nz'/>"[..]);
		r.unwrap();
		assert_eq!(toks, vec![start("a", &[("b", "x\ty\r\nz")], true)]);
	}

	#[test]
	fn lexer_lex_cdata_section_verbatim() {
		let (toks, r) = lex(&b"<doc><![CDATA[<not>even</valid>&amp;]]></doc>"[..]);
		r.unwrap();
		assert_eq!(toks[1], Token::CData("<not>even</valid>&amp;".to_string()));
	}

	#[test]
	fn lexer_handles_closing_brackets_in_cdata_section() {
		let (toks, r) = lex(&b"<a><![CDATA[]]]></a>"[..]);
		r.unwrap();
		assert_eq!(toks[1], Token::CData("]".to_string()));

		let (toks, r) = lex(&b"<a><![CDATA[x]y]]z]]]]></a>"[..]);
		r.unwrap();
		assert_eq!(toks[1], Token::CData("x]y]]z]]".to_string()));
	}

	#[test]
	fn lexer_passes_brackets_in_text() {
		let doc = &b"<a>]x]]y]]]&amp;]]]</a>"[..];
		let (toks, r) = lex(doc);
		r.unwrap();
		assert_eq!(toks, vec![start("a", &[], false), Token::Text("]x]]y]]]&]]]".to_string()), end("a")]);
		let bytewise: Vec<&[u8]> = doc.chunks(1).collect();
		let (chunked, r) = lex_chunked(&bytewise[..]);
		r.unwrap();
		assert_eq!(chunked, toks);
	}

	#[test]
	fn lexer_rejects_unescaped_cdata_end_in_text() {
		for doc in &[&b"<a>]]></a>"[..], &b"<a>x]]]></a>"[..], &b"<a>&amp;]]>x</a>"[..]] {
			match lex_err(doc) {
				Error::MalformedMarkup(MarkupError::InvalidSyntax(_)) => (),
				other => panic!("unexpected error for {:?}: {:?}", doc, other),
			}
		}
		let (toks, r) = lex_chunked(&[&b"<a>]"[..], &b"]"[..], &b"></a>"[..]]);
		assert_eq!(toks, vec![start("a", &[], false)]);
		match r {
			Err(Error::MalformedMarkup(MarkupError::InvalidSyntax(_))) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		// `]>` alone is fine
		let (toks, r) = lex(&b"<a>]></a>"[..]);
		r.unwrap();
		assert_eq!(toks[1], Token::Text("]>".to_string()));
	}

	#[test]
	fn lexer_lex_empty_cdata_section() {
		let (toks, r) = lex(&b"<a><![CDATA[]]></a>"[..]);
		r.unwrap();
		assert_eq!(toks[1], Token::CData("".to_string()));
	}

	#[test]
	fn lexer_lex_comment() {
		let (toks, r) = lex(&b"<!-- pre --><a><!--comment--><!--a-b--></a><!---->"[..]);
		r.unwrap();
		assert_eq!(
			toks,
			vec![
				Token::Comment(" pre ".to_string()),
				start("a", &[], false),
				Token::Comment("comment".to_string()),
				Token::Comment("a-b".to_string()),
				end("a"),
				Token::Comment("".to_string()),
			]
		);
	}

	#[test]
	fn lexer_rejects_double_dash_in_comment() {
		match lex_err(&b"<a><!-- a -- b --></a>"[..]) {
			Error::MalformedMarkup(MarkupError::InvalidSyntax(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
		match lex_err(&b"<a><!-- a ---></a>"[..]) {
			Error::MalformedMarkup(MarkupError::InvalidSyntax(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_lex_processing_instructions() {
		let (toks, r) = lex(&b"<?target content?><a><?empty?><?spaced  ?><?q a?b??></a>"[..]);
		r.unwrap();
		assert_eq!(
			toks,
			vec![
				Token::ProcessingInstruction {
					target: "target".into(),
					data: Some("content".to_string())
				},
				start("a", &[], false),
				Token::ProcessingInstruction {
					target: "empty".into(),
					data: None
				},
				Token::ProcessingInstruction {
					target: "spaced".into(),
					data: None
				},
				Token::ProcessingInstruction {
					target: "q".into(),
					data: Some("a?b?".to_string())
				},
				end("a"),
			]
		);
	}

	#[test]
	fn lexer_lex_xml_declaration() {
		let (toks, r) = lex(&b"<?xml version='1.0' encoding='utf-8'?>\n<a/>"[..]);
		r.unwrap();
		assert_eq!(
			toks,
			vec![
				Token::XmlDeclaration("version='1.0' encoding='utf-8'".to_string()),
				start("a", &[], true),
			]
		);
	}

	#[test]
	fn lexer_rejects_misplaced_xml_declaration() {
		match lex_err(&b" <?xml version='1.0'?><a/>"[..]) {
			Error::MalformedMarkup(MarkupError::InvalidSyntax(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
		match lex_err(&b"<a><?xml version='1.0'?></a>"[..]) {
			Error::MalformedMarkup(MarkupError::InvalidSyntax(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
		match lex_err(&b"<?XmL foo?><a/>"[..]) {
			Error::MalformedMarkup(MarkupError::InvalidSyntax(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
		match lex_err(&b"<?xml?><a/>"[..]) {
			Error::MalformedMarkup(MarkupError::InvalidSyntax(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_skips_whitespace_outside_root() {
		let (toks, r) = lex(&b" \r\n\t<a/>\n \n"[..]);
		r.unwrap();
		assert_eq!(toks, vec![start("a", &[], true)]);
	}

	#[test]
	fn lexer_rejects_text_outside_root() {
		match lex_err(&b"foo<a/>"[..]) {
			Error::MalformedMarkup(MarkupError::UnexpectedByte(ctx, b'f', _)) => assert_eq!(ctx, ERRCTX_PROLOGUE),
			other => panic!("unexpected error: {:?}", other),
		}
		match lex_err(&b"<a/>foo"[..]) {
			Error::MalformedMarkup(MarkupError::UnexpectedByte(ctx, b'f', _)) => assert_eq!(ctx, ERRCTX_EPILOGUE),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_second_root_element() {
		let (toks, r) = lex(&b"<a/><b/>"[..]);
		assert_eq!(toks, vec![start("a", &[], true)]);
		match r.err().unwrap() {
			Error::MalformedMarkup(MarkupError::InvalidSyntax(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_cdata_and_doctype_outside_root() {
		match lex_err(&b"<![CDATA[x]]><a/>"[..]) {
			Error::MalformedMarkup(MarkupError::InvalidSyntax(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
		match lex_err(&b"<!DOCTYPE a><a/>"[..]) {
			Error::MalformedMarkup(MarkupError::InvalidSyntax(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_mismatched_end_tag() {
		let (toks, r) = lex(&b"<a><b></a></b>"[..]);
		assert_eq!(toks, vec![start("a", &[], false), start("b", &[], false)]);
		match r.err().unwrap() {
			Error::UnbalancedElement(BalanceError::Mismatch { expected, found }) => {
				assert_eq!(expected.as_str(), "b");
				assert_eq!(found.as_str(), "a");
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_end_tag_without_open_element() {
		match lex_err(&b"</a>"[..]) {
			Error::UnbalancedElement(BalanceError::NoOpenElement(name)) => assert_eq!(name.as_str(), "a"),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_missing_whitespace_between_attributes() {
		match lex_err(&b"<a b='1'c='2'/>"[..]) {
			Error::MalformedMarkup(MarkupError::InvalidSyntax(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_accepts_required_whitespace_split_across_chunks() {
		let (toks, r) = lex_chunked(&[&b"<a b='1' "[..], &b" c='2'/>"[..]]);
		r.unwrap();
		assert_eq!(toks, vec![start("a", &[("b", "1"), ("c", "2")], true)]);
	}

	#[test]
	fn lexer_rejects_unquoted_attribute_value() {
		match lex_err(&b"<a b=c/>"[..]) {
			Error::MalformedMarkup(MarkupError::UnexpectedByte(_, b'c', _)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_lt_in_attribute_value() {
		match lex_err(&b"<a b='<'/>"[..]) {
			Error::MalformedMarkup(MarkupError::UnexpectedByte(ctx, b'<', _)) => assert_eq!(ctx, ERRCTX_ATTVAL),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_invalid_namestarts() {
		match lex_err(&b"<1a/>"[..]) {
			Error::MalformedMarkup(MarkupError::UnexpectedByte(_, b'1', _)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
		match lex_err(&b"<a></-a>"[..]) {
			Error::MalformedMarkup(MarkupError::UnexpectedByte(_, b'-', _)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
		match lex_err(&b"<a></>"[..]) {
			Error::MalformedMarkup(MarkupError::UnexpectedByte(_, b'>', _)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_unterminated_constructs_at_eof() {
		for doc in &[
			&b""[..],
			&b"  "[..],
			&b"<a>"[..],
			&b"<a>text"[..],
			&b"<a"[..],
			&b"<a b='c"[..],
			&b"<a><!-- x"[..],
			&b"<a><![CDATA[ x"[..],
			&b"<?pi x"[..],
			&b"<a></a"[..],
			&b"<a>&am"[..],
		] {
			match lex_err(doc) {
				Error::UnexpectedEndOfInput(_) => (),
				other => panic!("unexpected error for {:?}: {:?}", doc, other),
			}
		}
	}

	#[test]
	fn lexer_rejects_invalid_references() {
		for doc in &[
			&b"<a>&foo;</a>"[..],
			&b"<a>&amp</a>"[..],
			&b"<a>&;</a>"[..],
			&b"<a>&#;</a>"[..],
			&b"<a>&#x;</a>"[..],
			&b"<a>&#0;</a>"[..],
			&b"<a>&#xd800;</a>"[..],
			&b"<a>&#x110000;</a>"[..],
			&b"<a>&#12345678901;</a>"[..],
			&b"<a>&#65a;</a>"[..],
			&b"<a b='&nbsp;'/>"[..],
		] {
			match lex_err(doc) {
				Error::InvalidEntity(_) => (),
				other => panic!("unexpected error for {:?}: {:?}", doc, other),
			}
		}
	}

	#[test]
	fn lexer_reference_errors_carry_context() {
		match lex_err(&b"<a b='&foo;'/>"[..]) {
			Error::InvalidEntity(ctx) => assert_eq!(ctx, ERRCTX_ATTVAL),
			other => panic!("unexpected error: {:?}", other),
		}
		match lex_err(&b"<a>&foo;</a>"[..]) {
			Error::InvalidEntity(ctx) => assert_eq!(ctx, ERRCTX_TEXT),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_rejects_nonchars_verbatim() {
		for doc in &[
			&b"<a>\x00</a>"[..],
			&b"<a b='\x01'/>"[..],
			&b"<a><!--\x02--></a>"[..],
			&b"<a><![CDATA[\x1f]]></a>"[..],
			&b"<a><![CDATA[]\x1f]]></a>"[..],
			&b"<a><?pi \x07?></a>"[..],
		] {
			match lex_err(doc) {
				Error::MalformedMarkup(MarkupError::InvalidChar(..)) => (),
				other => panic!("unexpected error for {:?}: {:?}", doc, other),
			}
		}
	}

	#[test]
	fn lexer_catches_invalid_utf8() {
		match lex_err(&b"<a>\xff</a>"[..]) {
			Error::MalformedMarkup(MarkupError::InvalidUtf8Byte(0xff)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
		match lex_err(&b"<a>\xf0\x9f\x8e</a>"[..]) {
			Error::MalformedMarkup(MarkupError::InvalidUtf8Byte(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_re_emits_error_on_next_call() {
		let mut lexer = Lexer::new();
		let mut src = &b"<a>\x00</a>"[..];
		match lexer.lex_bytes(&mut src, true) {
			Ok(Lexed::Token(Token::StartTag { .. })) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		let e1 = lexer.lex_bytes(&mut src, true).err().unwrap();
		let remaining = src.len();
		let e2 = lexer.lex_bytes(&mut src, true).err().unwrap();
		assert_eq!(e1, e2);
		assert_eq!(src.len(), remaining);
	}

	#[test]
	fn lexer_reports_need_input_mid_token() {
		let mut lexer = Lexer::new();
		let mut src = &b"<a att"[..];
		assert_eq!(lexer.lex_bytes(&mut src, false).unwrap(), Lexed::NeedInput);
		assert_eq!(src.len(), 0);
		let mut src = &b"r='x'>"[..];
		match lexer.lex_bytes(&mut src, false).unwrap() {
			Lexed::Token(tok) => assert_eq!(tok, start("a", &[("attr", "x")], false)),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn lexer_emits_text_only_once_markup_follows() {
		let mut lexer = Lexer::new();
		let mut src = &b"<a>foo"[..];
		match lexer.lex_bytes(&mut src, false).unwrap() {
			Lexed::Token(Token::StartTag { .. }) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		assert_eq!(lexer.lex_bytes(&mut src, false).unwrap(), Lexed::NeedInput);
		let mut src = &b"bar"[..];
		assert_eq!(lexer.lex_bytes(&mut src, false).unwrap(), Lexed::NeedInput);
		let mut src = &b"<"[..];
		assert_eq!(
			lexer.lex_bytes(&mut src, false).unwrap(),
			Lexed::Token(Token::Text("foobar".to_string()))
		);
	}

	#[test]
	fn lexer_emits_end_tag_at_end_of_buffer() {
		let mut lexer = Lexer::new();
		let mut src = &b"<foo></foo>"[..];
		match lexer.lex_bytes(&mut src, false).unwrap() {
			Lexed::Token(Token::StartTag { .. }) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		assert_eq!(lexer.lex_bytes(&mut src, false).unwrap(), Lexed::Token(end("foo")));
		assert_eq!(lexer.lex_bytes(&mut src, false).unwrap(), Lexed::NeedInput);
		assert_eq!(lexer.lex_bytes(&mut src, true).unwrap(), Lexed::Eof);
		assert_eq!(lexer.lex_bytes(&mut src, true).unwrap(), Lexed::Eof);
	}

	#[test]
	fn lexer_is_resilient_to_chunking() {
		let doc = &b"<?xml version='1.0'?>\n<!--c--><?pi d?><root xmlns='urn:x' a=\"1&amp;2\"><child b='&#x3c;'/>t&lt;xt<![CDATA[]]]]><!--x-y--></root>\n<?post?>"[..];
		let (reference, r) = lex(doc);
		r.unwrap();
		for i in 0..doc.len() {
			let (toks, r) = lex_chunked(&[&doc[..i], &doc[i..]]);
			r.unwrap();
			assert_eq!(toks, reference, "split at {}", i);
		}
		let bytewise: Vec<&[u8]> = doc.chunks(1).collect();
		let (toks, r) = lex_chunked(&bytewise[..]);
		r.unwrap();
		assert_eq!(toks, reference);
	}

	#[test]
	fn lexer_handles_chunked_utf8_fed_bytewise() {
		let src = "<xyz>fööbär🎉</xyz>".as_bytes();
		let chunks: Vec<&[u8]> = src.chunks(1).collect();
		let (toks, r) = lex_chunked(&chunks[..]);
		r.unwrap();
		assert_eq!(
			toks,
			vec![
				start("xyz", &[], false),
				Token::Text("fööbär🎉".to_string()),
				end("xyz"),
			]
		);
	}

	#[test]
	fn lexer_enforces_token_length_limit() {
		let opts = LexerOptions::default().max_token_length(4);
		let (toks, r) = lex_chunked_with(&mut Lexer::with_options(opts), &[&b"<a>abcd</a>"[..]]);
		r.unwrap();
		assert_eq!(toks[1], Token::Text("abcd".to_string()));

		let (_, r) = lex_chunked_with(&mut Lexer::with_options(opts), &[&b"<a>abcde</a>"[..]]);
		match r.err().unwrap() {
			Error::TokenTooLong(ctx) => assert_eq!(ctx, ERRCTX_TEXT),
			other => panic!("unexpected error: {:?}", other),
		}

		let (_, r) = lex_chunked_with(&mut Lexer::with_options(opts), &[&b"<abcde/>"[..]]);
		match r.err().unwrap() {
			Error::TokenTooLong(ctx) => assert_eq!(ctx, ERRCTX_NAME),
			other => panic!("unexpected error: {:?}", other),
		}

		let (_, r) = lex_chunked_with(&mut Lexer::with_options(opts), &[&b"<a b='ab&amp;cd'/>"[..]]);
		match r.err().unwrap() {
			Error::TokenTooLong(ctx) => assert_eq!(ctx, ERRCTX_ATTVAL),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_token_length_limit_holds_across_chunks() {
		let opts = LexerOptions::default().max_token_length(4);
		let (_, r) = lex_chunked_with(
			&mut Lexer::with_options(opts),
			&[&b"<a><!--ab"[..], &b"c"[..], &b"de--></a>"[..]],
		);
		match r.err().unwrap() {
			Error::TokenTooLong(ctx) => assert_eq!(ctx, ERRCTX_COMMENT),
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn lexer_counts_consumed_bytes() {
		let mut lexer = Lexer::new();
		let mut src = &b"<a>text</a>"[..];
		lexer.lex_bytes(&mut src, false).unwrap();
		assert_eq!(lexer.position(), 3);
		assert_eq!(lexer.depth(), 1);
		lexer.lex_bytes(&mut src, false).unwrap();
		assert_eq!(lexer.position(), 8);
		lexer.lex_bytes(&mut src, false).unwrap();
		assert_eq!(lexer.position(), 11);
		assert_eq!(lexer.depth(), 0);
	}

	#[test]
	fn lexer_reads_from_bufread() {
		let src = &b"<a>text</a>"[..];
		let mut buffered = io::BufReader::with_capacity(2, src);
		let mut lexer = Lexer::new();
		let mut toks = Vec::new();
		loop {
			match lexer.lex(&mut buffered).unwrap() {
				Lexed::Token(tok) => toks.push(tok),
				Lexed::NeedInput => (),
				Lexed::Eof => break,
			}
		}
		assert_eq!(
			toks,
			vec![start("a", &[], false), Token::Text("text".to_string()), end("a")]
		);
	}
}
