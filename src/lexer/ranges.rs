/*!
Byte classes used by the lexer.

The lexer works on bytes, not on decoded characters. The classes here are
supersets of the corresponding XML 1.0 character classes, projected onto UTF-8
bytes: every byte of the UTF-8 encoding of an acceptable character is
selected. Invalid UTF-8 is caught when a token is converted into a string.
*/

pub trait ByteSelect {
	fn select(&self, b: u8) -> bool;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ByteRange(pub u8, pub u8);

impl ByteSelect for ByteRange {
	fn select(&self, b: u8) -> bool {
		self.0 <= b && b <= self.1
	}
}

impl ByteSelect for u8 {
	fn select(&self, b: u8) -> bool {
		b == *self
	}
}

impl ByteSelect for &'_ [u8] {
	fn select(&self, b: u8) -> bool {
		self.contains(&b)
	}
}

impl ByteSelect for &'_ [ByteRange] {
	fn select(&self, b: u8) -> bool {
		for r in *self {
			if r.select(b) {
				return true;
			}
		}
		false
	}
}

#[cfg(test)]
pub struct AnyByte();

#[cfg(test)]
impl ByteSelect for AnyByte {
	fn select(&self, _b: u8) -> bool {
		true
	}
}

pub static CLASS_XML_NAMESTART_BYTE: &'static [ByteRange] = &[
	ByteRange(b':', b':'),
	ByteRange(b'A', b'Z'),
	ByteRange(b'_', b'_'),
	ByteRange(b'a', b'z'),
	// all multi-byte start bytes which can encode a NameStartChar
	ByteRange(b'\xc3', b'\xf7'),
];

pub static CLASS_XML_NAME_BYTE: &'static [ByteRange] = &[
	ByteRange(b':', b':'),
	ByteRange(b'-', b'-'),
	ByteRange(b'.', b'.'),
	ByteRange(b'A', b'Z'),
	ByteRange(b'_', b'_'),
	ByteRange(b'0', b'9'),
	ByteRange(b'a', b'z'),
	ByteRange(b'\x80', b'\xff'),
];

/// Bytes which are never valid on their own in an XML 1.0 document (C0
/// controls except TAB, LF and CR).
pub static CLASS_XML_MAY_NONCHAR_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x00', b'\x08'),
	ByteRange(b'\x0b', b'\x0c'),
	ByteRange(b'\x0e', b'\x1f'),
];

/// XML whitespace
pub static CLASS_XML_SPACE_BYTE: &'static [u8] = b" \t\r\n";

/// Character data in element content, excluding `&`, `<` and `]`.
pub static CLASS_XML_TEXT_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x0d', b'\x0d'),
	ByteRange(b'\x20', b'\x25'), // excludes &
	ByteRange(b'\x27', b'\x3b'), // excludes <
	ByteRange(b'\x3d', b'\x5c'), // excludes ]
	ByteRange(b'\x5e', b'\xff'),
];

/// CDATA section contents, excluding `]`.
pub static CLASS_XML_CDATA_SECTION_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x0d', b'\x0d'),
	ByteRange(b'\x20', b'\x5c'), // excludes ]
	ByteRange(b'\x5e', b'\xff'),
];

/// Comment contents, excluding `-`.
pub static CLASS_XML_COMMENT_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x0d', b'\x0d'),
	ByteRange(b'\x20', b'\x2c'), // excludes -
	ByteRange(b'\x2e', b'\xff'),
];

/// Processing instruction data, excluding `?`.
pub static CLASS_XML_PI_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x0d', b'\x0d'),
	ByteRange(b'\x20', b'\x3e'), // excludes ?
	ByteRange(b'\x40', b'\xff'),
];

/// Attribute value delimited by `'`, excluding `&` and `<`.
pub static CLASS_XML_ATT_APOS_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x0d', b'\x0d'),
	ByteRange(b'\x20', b'\x25'), // excludes &, '
	ByteRange(b'\x28', b'\x3b'), // excludes <
	ByteRange(b'\x3d', b'\xff'),
];

/// Attribute value delimited by `"`, excluding `&` and `<`.
pub static CLASS_XML_ATT_QUOT_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x0d', b'\x0d'),
	ByteRange(b'\x20', b'\x21'), // excludes "
	ByteRange(b'\x23', b'\x25'), // excludes &
	ByteRange(b'\x27', b'\x3b'), // excludes <
	ByteRange(b'\x3d', b'\xff'),
];

pub static CLASS_XML_DECIMAL_DIGIT_BYTE: ByteRange = ByteRange(b'0', b'9');

pub static CLASS_XML_HEXADECIMAL_DIGIT_BYTE: &'static [ByteRange] = &[
	ByteRange(b'0', b'9'),
	ByteRange(b'a', b'f'),
	ByteRange(b'A', b'F'),
];
