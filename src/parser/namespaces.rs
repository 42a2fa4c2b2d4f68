use std::collections::HashSet;

use smartstring::alias::String as SmartString;

use crate::error::*;
use crate::event::{Attribute, Namespace, NamespaceUri, StartElement};
use crate::lexer::RawAttribute;

use super::common::{XMLNS_XML, XMLNS_XMLNS};

/// Namespace declarations of a single start tag, in document order.
#[derive(Debug)]
struct Frame {
	decls: Vec<Namespace>,
}

impl Frame {
	fn get(&self, prefix: Option<&str>) -> Option<&NamespaceUri> {
		self.decls
			.iter()
			.find(|decl| decl.prefix.as_deref() == prefix)
			.map(|decl| &decl.uri)
	}
}

#[derive(Debug)]
struct ElementScope {
	local_name: SmartString,
	/// Whether the element pushed a frame
	declared: bool,
}

/// Split a qualified name into prefix and local name.
fn split_qname<'x>(name: &'x str, ctx: &'static str) -> Result<(Option<&'x str>, &'x str)> {
	match name.find(':') {
		None => Ok((None, name)),
		Some(i) => {
			let prefix = &name[..i];
			let local_name = &name[i + 1..];
			if prefix.len() == 0 || local_name.len() == 0 || local_name.contains(':') {
				return Err(MarkupError::InvalidQName(ctx).into());
			}
			Ok((Some(prefix), local_name))
		}
	}
}

/**
# Namespace/Attribute resolver

This struct implements the resolution logic to convert namespace prefixes into
namespace URIs, as described in Namespaces in XML 1.0.

Each start tag which declares at least one namespace pushes a frame of
declarations; the frame is popped when the element ends. Prefixes are looked
up from the innermost frame outward. The `xml` prefix is always bound to
[`XMLNS_XML`].

## Caveat

This struct does *not* check that start and end tags are balanced; that is
the job of the [`Lexer`](crate::Lexer).
*/
pub struct NamespaceResolver {
	xml_namespace: NamespaceUri,
	frames: Vec<Frame>,
	elements: Vec<ElementScope>,
}

impl NamespaceResolver {
	/// Create a resolver with no open elements.
	pub fn new() -> Self {
		Self {
			xml_namespace: XMLNS_XML.into(),
			frames: Vec::new(),
			elements: Vec::new(),
		}
	}

	/// Number of open elements.
	pub fn depth(&self) -> usize {
		self.elements.len()
	}

	/// Number of frames, i.e. open elements which declared namespaces.
	pub fn frame_depth(&self) -> usize {
		self.frames.len()
	}

	/// Resolve a prefix in the current scope, without any pending
	/// declarations.
	///
	/// `None` stands for the default namespace. Returns `None` if the prefix
	/// is not bound (or the default namespace is not declared).
	pub fn resolve_prefix(&self, prefix: Option<&str>) -> Option<NamespaceUri> {
		self.lookup(prefix, &[]).ok().flatten()
	}

	fn lookup(&self, prefix: Option<&str>, pending: &[Namespace]) -> Result<Option<NamespaceUri>> {
		match prefix {
			Some("xml") => return Ok(Some(self.xml_namespace.clone())),
			Some("xmlns") => return Err(MarkupError::ReservedNamespace("the xmlns prefix cannot be used in names").into()),
			_ => (),
		}
		let found = pending
			.iter()
			.find(|decl| decl.prefix.as_deref() == prefix)
			.map(|decl| &decl.uri)
			.or_else(|| self.frames.iter().rev().find_map(|frame| frame.get(prefix)));
		match (prefix, found) {
			// xmlns="" undeclares the default namespace
			(None, Some(uri)) if uri.len() == 0 => Ok(None),
			(None, found) => Ok(found.cloned()),
			(Some(_), Some(uri)) => Ok(Some(uri.clone())),
			// Namespaces in XML 1.0
			// Namespace constraint: Prefix Declared
			(Some(prefix), None) => Err(Error::UndeclaredPrefix {
				prefix: prefix.into(),
				ctx: ERRCTX_UNKNOWN,
			}),
		}
	}

	fn declare(decls: &mut Vec<Namespace>, prefix: Option<&str>, uri: String) -> Result<()> {
		match prefix {
			Some("xmlns") => {
				return Err(MarkupError::ReservedNamespace("the xmlns prefix cannot be declared").into())
			}
			Some("xml") => {
				if uri != XMLNS_XML {
					return Err(MarkupError::ReservedNamespace("the xml prefix cannot be rebound").into());
				}
			}
			Some(_) => {
				if uri.len() == 0 {
					return Err(MarkupError::InvalidSyntax("namespace prefixes cannot be undeclared").into());
				}
				if uri == XMLNS_XML || uri == XMLNS_XMLNS {
					return Err(MarkupError::ReservedNamespace("reserved namespace URI bound to prefix").into());
				}
			}
			None => {
				if uri == XMLNS_XML || uri == XMLNS_XMLNS {
					return Err(MarkupError::ReservedNamespace("reserved namespace URI used as default").into());
				}
			}
		}
		if decls.iter().any(|decl| decl.prefix.as_deref() == prefix) {
			// XML 1.0
			// Well-formedness constraint: Unique Att Spec
			return Err(match prefix {
				Some(prefix) => Error::DuplicateAttribute {
					namespace_uri: Some(XMLNS_XMLNS.to_string()),
					local_name: prefix.into(),
				},
				None => Error::DuplicateAttribute {
					namespace_uri: None,
					local_name: "xmlns".into(),
				},
			});
		}
		decls.push(Namespace {
			uri: uri.into(),
			prefix: prefix.map(|x| x.into()),
		});
		Ok(())
	}

	/// Process a start tag.
	///
	/// Registers the namespace declarations among `attributes` as a new
	/// scope and resolves the names of the element and its remaining
	/// attributes against it.
	///
	/// On error, the resolver state is not modified.
	pub fn start_element(&mut self, name: &str, attributes: Vec<RawAttribute>) -> Result<StartElement> {
		let (prefix, local_name) = split_qname(name, ERRCTX_NAME)?;

		let mut decls = Vec::new();
		let mut ordinary = Vec::with_capacity(attributes.len());
		for (attrname, value) in attributes {
			let (attrprefix, attrlocal) = split_qname(&attrname, ERRCTX_ATTNAME)?;
			match (attrprefix, attrlocal) {
				(None, "xmlns") => add_context(Self::declare(&mut decls, None, value), ERRCTX_NAMESPACE_DECL)?,
				(Some("xmlns"), declared) => {
					add_context(Self::declare(&mut decls, Some(declared), value), ERRCTX_NAMESPACE_DECL)?
				}
				(attrprefix, attrlocal) => {
					ordinary.push((attrprefix.map(SmartString::from), SmartString::from(attrlocal), value))
				}
			}
		}

		let namespace = add_context(self.lookup(prefix, &decls[..]), ERRCTX_NAME)?;

		let mut seen = HashSet::with_capacity(ordinary.len());
		let mut resolved = Vec::with_capacity(ordinary.len());
		for (attrprefix, attrlocal, value) in ordinary {
			// Namespaces in XML 1.0, section 6.2: unprefixed attributes are
			// in no namespace
			let namespace_uri = match attrprefix.as_deref() {
				None => None,
				Some(p) => add_context(self.lookup(Some(p), &decls[..]), ERRCTX_ATTNAME)?,
			};
			if !seen.insert((namespace_uri.clone(), attrlocal.clone())) {
				// XML 1.0
				// Well-formedness constraint: Unique Att Spec
				// Namespaces in XML 1.0
				// Namespace constraint: Attributes Unique
				return Err(Error::DuplicateAttribute {
					namespace_uri: namespace_uri.map(|uri| uri.to_string()),
					local_name: attrlocal,
				});
			}
			resolved.push(Attribute {
				local_name: attrlocal,
				value,
				prefix: attrprefix,
				namespace_uri,
			});
		}

		let declared = decls.len() > 0;
		if declared {
			log::debug!(
				"pushing namespace frame with {} declaration(s) at depth {}",
				decls.len(),
				self.elements.len()
			);
			self.frames.push(Frame { decls: decls.clone() });
		}
		let local_name = SmartString::from(local_name);
		self.elements.push(ElementScope {
			local_name: local_name.clone(),
			declared,
		});

		Ok(StartElement {
			local_name,
			attributes: resolved,
			namespace,
			prefix: prefix.map(|x| x.into()),
			namespace_context: decls,
		})
	}

	/// Process an end tag and return the local name of the closed element.
	///
	/// `name` is only used for error reporting.
	pub fn end_element(&mut self, name: &str) -> Result<SmartString> {
		let scope = match self.elements.pop() {
			Some(v) => v,
			None => return Err(BalanceError::NoOpenElement(name.into()).into()),
		};
		if scope.declared {
			self.frames.pop();
			log::debug!("popped namespace frame at depth {}", self.elements.len());
		}
		Ok(scope.local_name)
	}
}

impl Default for NamespaceResolver {
	fn default() -> Self {
		Self::new()
	}
}
