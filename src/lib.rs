/*!
# Streaming XML event parsing

This crate provides incremental, namespace-aware parsing of XML 1.0
documents which arrive in arbitrary chunks, for example from a network
stream.

## Features (some call them restrictions)

* No external resources
* No custom entities
* No DTD whatsoever
* UTF-8 input only
* Namespacing-well-formedness enforced
* XML 1.0 only
* Streamed parsing (parser emits a subset of SAX events)
* The event sequence does not depend on where the input was split into chunks
* Can be driven push- and pull-based
* Tokio-based asynchronicity supported via the `async` feature and
  [`AsyncParser`].

## Example

```
use xmlfeed::{Event, EventRead, FeedParser};
let mut fp = FeedParser::new();
fp.feed(b"<?xml version='1.0'?><hello xmlns='urn:x'>Wor");
fp.feed(b"ld!</hello>");
fp.finish();
let mut events = Vec::new();
let result = fp.read_all(|ev| events.push(ev));
// true indicates that the document is complete
assert_eq!(result.unwrap(), true);
assert_eq!(events[0], Event::StartDocument);
assert_eq!(events[2], Event::Characters("World!".to_string()));
assert_eq!(events[4], Event::EndDocument);
```

## High-level usage

### Push-based usage

The [`FeedParser`] allows to push bits of XML into the parser as they arrive
in the application and process the resulting [`Event`]s as they happen.
[`Next::NeedInput`] signals that more bytes have to be fed before another
event can be produced.

### Pull-based usage

If the parser should block while waiting for more data to arrive, a
[`PullParser`] can be used instead. The `PullParser` requires a source which
implements [`io::BufRead`](std::io::BufRead).

### Usage with Tokio

Tokio is supported with the `async` feature. It offers the [`AsyncParser`]
and the [`AsyncEventRead`] trait, which work similar to the `PullParser`.
Instead of blocking, however, the async parser will yield control to other
tasks.

## Low-level usage

The [`Lexer`] turns bytes into [`Token`]s, the [`Parser`] turns tokens into
[`Event`]s, resolving namespaces with a [`NamespaceResolver`] on the way.
Both can be used directly with the [`SliceAdapter`] and [`LexerAdapter`]
glue.
*/
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod buffer;
pub mod driver;
pub mod error;
pub mod event;
#[cfg(feature = "async")]
pub mod future;
pub mod lexer;
pub mod parser;


#[doc(inline)]
pub use buffer::ChunkBuffer;
#[doc(inline)]
pub use driver::{EventRead, FeedParser, PullParser};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use event::{Attribute, Event, Namespace, NamespaceUri, Next, RcPtr, StartElement};
#[doc(inline)]
pub use lexer::{Lexed, Lexer, LexerOptions, Token};
#[doc(inline)]
pub use parser::{
	LexerAdapter, NamespaceResolver, Parse, Parser, SliceAdapter, TokenRead, XMLNS_XML,
	XMLNS_XMLNS,
};

#[cfg(feature = "async")]
#[doc(inline)]
pub use future::{AsyncEventRead, AsyncEventReadExt, AsyncParser};

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
