/*!
# Parse events

The types in this module make up the output of the parser. The term *Event*
is borrowed from SAX terminology: each [`Event`] describes a structural or
content fragment of the document, in document order.
*/
#[cfg(not(feature = "mt"))]
use std::rc::Rc;
#[cfg(feature = "mt")]
use std::sync::Arc;

use smartstring::alias::String as SmartString;

/// Wrapper pointer around namespace URIs
///
/// In builds with the `mt` feature, this is a [`Arc`]. In non-`mt` builds,
/// this is a [`std::rc::Rc`]
#[cfg(feature = "mt")]
pub type RcPtr<T> = Arc<T>;
/// Wrapper pointer around namespace URIs
///
/// In builds with the `mt` feature, this is a [`std::sync::Arc`].
/// In non-`mt` builds, this is a [`Rc`].
#[cfg(not(feature = "mt"))]
pub type RcPtr<T> = Rc<T>;

/// Shared namespace URI
///
/// A URI declared on an element is allocated once and shared by all names
/// which resolve to it.
pub type NamespaceUri = RcPtr<str>;

/// A namespace declared on an element.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Namespace {
	/// Declared URI. Empty for `xmlns=""`, which undeclares the default
	/// namespace.
	pub uri: NamespaceUri,
	/// Declared prefix, or `None` for the default namespace.
	pub prefix: Option<SmartString>,
}

impl Namespace {
	pub fn new<U: Into<NamespaceUri>>(uri: U, prefix: Option<&str>) -> Namespace {
		Namespace {
			uri: uri.into(),
			prefix: prefix.map(|x| x.into()),
		}
	}

	/// Return true if this declares the default namespace.
	pub fn is_default(&self) -> bool {
		self.prefix.is_none()
	}
}

/// An attribute of an element, with its name resolved.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Attribute {
	pub local_name: SmartString,
	/// Value with all references expanded. No whitespace normalization is
	/// applied.
	pub value: String,
	pub prefix: Option<SmartString>,
	/// Namespace the prefix resolved to. Unprefixed attributes have no
	/// namespace.
	pub namespace_uri: Option<NamespaceUri>,
}

impl Attribute {
	/// Create an attribute without namespace.
	pub fn new<N: Into<SmartString>, V: Into<String>>(local_name: N, value: V) -> Attribute {
		Attribute {
			local_name: local_name.into(),
			value: value.into(),
			prefix: None,
			namespace_uri: None,
		}
	}

	/// Create an attribute with a prefix bound to a namespace.
	pub fn with_namespace<N: Into<SmartString>, V: Into<String>, U: Into<NamespaceUri>>(
		local_name: N,
		value: V,
		prefix: &str,
		namespace_uri: U,
	) -> Attribute {
		Attribute {
			local_name: local_name.into(),
			value: value.into(),
			prefix: Some(prefix.into()),
			namespace_uri: Some(namespace_uri.into()),
		}
	}
}

/// Contents of an [`Event::StartElement`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StartElement {
	pub local_name: SmartString,
	/// Attributes in document order, without namespace declarations.
	pub attributes: Vec<Attribute>,
	/// Resolved namespace of the element.
	pub namespace: Option<NamespaceUri>,
	pub prefix: Option<SmartString>,
	/// Namespaces declared on this element, in document order.
	///
	/// Namespaces declared on ancestors are not repeated here.
	pub namespace_context: Vec<Namespace>,
}

impl StartElement {
	/// Look up an attribute value by its resolved name.
	///
	/// # Example
	///
	/// ```
	/// use xmlfeed::{FeedParser, Next, Event};
	/// let mut fp = FeedParser::new();
	/// fp.feed(b"<a xmlns:p='urn:p' p:x='1' x='2'/>");
	/// fp.finish();
	/// fp.next().unwrap();
	/// match fp.next().unwrap() {
	/// 	Next::Event(Event::StartElement(el)) => {
	/// 		assert_eq!(el.attribute(Some("urn:p"), "x"), Some("1"));
	/// 		assert_eq!(el.attribute(None, "x"), Some("2"));
	/// 		assert_eq!(el.attribute(None, "y"), None);
	/// 	}
	/// 	other => panic!("unexpected result: {:?}", other),
	/// }
	/// ```
	pub fn attribute(&self, namespace_uri: Option<&str>, local_name: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|attr| attr.local_name.as_str() == local_name && attr.namespace_uri.as_deref() == namespace_uri)
			.map(|attr| attr.value.as_str())
	}
}

/**
# Logical XML document parts

For a well-formed document, the first event is [`Event::StartDocument`] and
the last is [`Event::EndDocument`], each exactly once. Start and end events of
elements are properly nested.
*/
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Event {
	/// Emitted before anything else, including events for comments and
	/// processing instructions before the root element.
	StartDocument,

	/// Emitted after the root element has been closed and the end of input
	/// has been signalled.
	EndDocument,

	/// The start of an element.
	///
	/// For empty elements (`<x/>`), it is immediately followed by the
	/// matching [`Event::EndElement`].
	StartElement(StartElement),

	/// The end of an element.
	EndElement { local_name: SmartString },

	/// Text content, with references expanded.
	///
	/// A run of text between two pieces of markup is always emitted as one
	/// event, no matter how the input was chunked.
	Characters(String),

	/// The verbatim contents of a CDATA section.
	CData(String),

	/// The contents of a comment.
	Comment(String),

	/// A processing instruction.
	ProcessingInstruction {
		target: Option<SmartString>,
		data: Option<String>,
	},
}

/// Outcome of a successful attempt to read an event.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Next {
	/// The next event of the document.
	Event(Event),
	/// No event can be produced from the input available so far.
	NeedInput,
	/// [`Event::EndDocument`] has been returned already.
	Complete,
}

impl Next {
	/// Return the event, if any.
	pub fn into_event(self) -> Option<Event> {
		match self {
			Self::Event(ev) => Some(ev),
			_ => None,
		}
	}
}
