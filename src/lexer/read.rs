use super::ranges::ByteSelect;

/// Reason why a scan over a byte slice stopped.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Endbyte {
	/// The slice was exhausted.
	Eof,
	/// The length limit was reached before a delimiter was found.
	Limit,
	/// A byte outside of the selector was found (and consumed).
	Delimiter(u8),
}

#[inline]
fn find_first_not<B: ByteSelect>(src: &[u8], s: &B) -> Option<usize> {
	src.iter().position(|b| !s.select(*b))
}

/// Move bytes matching `selector` from `r` into `into`, up to `limit` bytes.
///
/// If a non-matching byte is found within the limit, it is consumed from `r`
/// and returned as delimiter, but not copied into `into`.
pub fn read_validated_bytes<B: ByteSelect>(
	r: &mut &[u8],
	selector: &B,
	limit: usize,
	into: &mut Vec<u8>,
) -> Endbyte {
	let src = *r;
	let (end_pos, delimited) = match find_first_not(src, selector) {
		Some(p) if p <= limit => (p, true),
		Some(_) => (limit, false),
		None => (src.len().min(limit), false),
	};
	into.extend_from_slice(&src[..end_pos]);
	if delimited {
		*r = &src[end_pos + 1..];
		Endbyte::Delimiter(src[end_pos])
	} else if end_pos < src.len() {
		*r = &src[end_pos..];
		Endbyte::Limit
	} else {
		*r = &[];
		Endbyte::Eof
	}
}

/// Skip bytes matching `selector`, returning the number of skipped bytes.
///
/// A non-matching byte is consumed and returned as delimiter.
pub fn skip_matching_bytes<B: ByteSelect>(r: &mut &[u8], selector: &B) -> (usize, Endbyte) {
	let src = *r;
	match find_first_not(src, selector) {
		Some(p) => {
			*r = &src[p + 1..];
			(p, Endbyte::Delimiter(src[p]))
		}
		None => {
			*r = &[];
			(src.len(), Endbyte::Eof)
		}
	}
}
