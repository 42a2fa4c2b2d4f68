/*!
# Event emitter

The [`Parser`] takes tokens from a [`TokenRead`] (usually a
[`Lexer`](crate::Lexer) wrapped in an adapter), runs start and end tags
through the [`NamespaceResolver`] and converts the result into [`Event`]s.
*/
use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::event::{Event, Next};
use crate::lexer::{Lexed, Token};

mod common;
mod namespaces;

pub use self::common::*;
pub use self::namespaces::NamespaceResolver;

#[derive(Debug, Clone, Copy, PartialEq)]
enum DocState {
	/// Nothing emitted yet
	Initial,
	/// StartDocument emitted
	Document,
	/// EndDocument queued or emitted
	Complete,
}

/**
# Namespace-aware XML event emitter

The parser inserts [`Event::StartDocument`] before the first token and
[`Event::EndDocument`] after the token source signalled the end of the
document. Everything in between maps 1:1 to tokens, except that empty
elements yield a start and an end event and the XML declaration yields
nothing.

Once an error has been encountered, the parser first returns all events
which were complete before the error, then the error, then the same error
again on every call. I/O errors of the token source are passed through and
do not poison the parser.
*/
pub struct Parser {
	resolver: NamespaceResolver,
	state: DocState,
	eventq: VecDeque<Event>,
	poison: Option<Error>,
}

impl Parser {
	/// Create a new parser
	pub fn new() -> Self {
		Self {
			resolver: NamespaceResolver::new(),
			state: DocState::Initial,
			eventq: VecDeque::new(),
			poison: None,
		}
	}

	/// Return true once [`Event::EndDocument`] has been produced.
	pub fn is_complete(&self) -> bool {
		self.state == DocState::Complete && self.eventq.len() == 0
	}

	/// Number of currently open elements.
	pub fn depth(&self) -> usize {
		self.resolver.depth()
	}

	/// Access the namespace resolver.
	pub fn resolver(&self) -> &NamespaceResolver {
		&self.resolver
	}

	fn check_poison(&self) -> Result<()> {
		if let Some(poison) = self.poison.as_ref() {
			return Err(poison.clone());
		}
		Ok(())
	}

	fn set_poison(&mut self, e: Error) {
		if self.poison.is_none() {
			log::debug!("parser poisoned: {}", e);
			self.poison = Some(e);
		}
	}

	fn start_document(&mut self) {
		if self.state == DocState::Initial {
			self.eventq.push_back(Event::StartDocument);
			self.state = DocState::Document;
		}
	}

	fn process_token(&mut self, tok: Token) -> Result<()> {
		match tok {
			Token::XmlDeclaration(_) => (),
			Token::StartTag {
				name,
				attributes,
				empty,
			} => {
				let el = self.resolver.start_element(&name, attributes)?;
				self.eventq.push_back(Event::StartElement(el));
				if empty {
					let local_name = self.resolver.end_element(&name)?;
					self.eventq.push_back(Event::EndElement { local_name });
				}
			}
			Token::EndTag { name } => {
				let local_name = self.resolver.end_element(&name)?;
				self.eventq.push_back(Event::EndElement { local_name });
			}
			Token::Text(text) => self.eventq.push_back(Event::Characters(text)),
			Token::CData(text) => self.eventq.push_back(Event::CData(text)),
			Token::Comment(text) => self.eventq.push_back(Event::Comment(text)),
			Token::ProcessingInstruction { target, data } => self.eventq.push_back(Event::ProcessingInstruction {
				target: Some(target),
				data,
			}),
		}
		Ok(())
	}
}

impl Default for Parser {
	fn default() -> Self {
		Self::new()
	}
}

impl Parse for Parser {
	fn parse<R: TokenRead>(&mut self, r: &mut R) -> Result<Next> {
		loop {
			// events which were complete before an error are still returned
			if let Some(ev) = self.eventq.pop_front() {
				log::trace!("emitting event {:?}", ev);
				return Ok(Next::Event(ev));
			}
			self.check_poison()?;
			if self.state == DocState::Complete {
				return Ok(Next::Complete);
			}

			let tok = match r.read() {
				Ok(Lexed::Token(tok)) => tok,
				Ok(Lexed::NeedInput) => return Ok(Next::NeedInput),
				Ok(Lexed::Eof) => {
					self.start_document();
					self.eventq.push_back(Event::EndDocument);
					self.state = DocState::Complete;
					continue;
				}
				Err(e) if !e.is_fatal() => return Err(e),
				Err(e) => {
					self.set_poison(e);
					continue;
				}
			};
			self.start_document();
			if let Err(e) = self.process_token(tok) {
				self.set_poison(e);
			}
		}
	}

	fn release_temporaries(&mut self) {
		self.eventq.shrink_to_fit();
	}
}
