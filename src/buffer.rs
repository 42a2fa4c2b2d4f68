/*!
# Chunk buffer

Holds the not-yet-tokenized suffix of the input between calls to the lexer.
*/
use bytes::{Buf, BytesMut};

/**
Contiguous buffer for input chunks of arbitrary size.

Chunks are appended at the tail and consumed from the head. Consumed bytes are
never copied again; the storage they occupied is reclaimed the next time a
chunk is appended and the backing allocation can be reused.

The buffer imposes no upper bound on its size.
*/
#[derive(Debug, Default)]
pub struct ChunkBuffer {
	buf: BytesMut,
	eof: bool,
}

impl ChunkBuffer {
	/// Create a new, empty buffer.
	pub fn new() -> ChunkBuffer {
		ChunkBuffer {
			buf: BytesMut::new(),
			eof: false,
		}
	}

	/// Append a chunk to the end of the buffer.
	///
	/// # Panics
	///
	/// If [`push_eof()`](Self::push_eof) has been called before.
	pub fn append(&mut self, data: &[u8]) {
		if self.eof {
			panic!("cannot append behind eof");
		}
		if data.len() == 0 {
			return;
		}
		// reserve() moves the unconsumed tail to the front of the
		// allocation if that makes enough room.
		self.buf.reserve(data.len());
		self.buf.extend_from_slice(data);
	}

	/// Return the unconsumed bytes.
	#[inline]
	pub fn remaining(&self) -> &[u8] {
		&self.buf[..]
	}

	/// Discard the first `offset` bytes of [`remaining()`](Self::remaining).
	///
	/// # Panics
	///
	/// If `offset` is larger than the number of unconsumed bytes.
	pub fn consume_up_to(&mut self, offset: usize) {
		if offset > self.buf.len() {
			panic!("attempt to consume beyond end of buffer");
		}
		self.buf.advance(offset);
	}

	/// Number of unconsumed bytes.
	pub fn len(&self) -> usize {
		self.buf.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	/// Mark the end of the input.
	///
	/// Afterwards, no further chunks can be appended.
	pub fn push_eof(&mut self) {
		self.eof = true;
	}

	/// Return whether the end of input has been marked.
	pub fn eof_pushed(&self) -> bool {
		self.eof
	}

	/// Drop the backing allocation if no unconsumed bytes remain.
	pub fn release_temporaries(&mut self) {
		if self.buf.is_empty() {
			self.buf = BytesMut::new();
		}
	}
}
