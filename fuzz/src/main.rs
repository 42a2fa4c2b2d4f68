#[macro_use]
extern crate afl;
extern crate xmlfeed;

use xmlfeed::{Event, EventRead};

fn parse_chunked(chunks: &[&[u8]]) -> (Vec<Event>, xmlfeed::Result<()>) {
	let mut events = Vec::new();
	let mut parser = xmlfeed::FeedParser::new();

	for chunk in chunks {
		parser.feed(chunk);
		match parser.read_all(|ev| events.push(ev)) {
			Ok(false) => (),
			Ok(true) => panic!("document complete before end of input"),
			Err(e) => return (events, Err(e)),
		}
	}

	parser.finish();
	match parser.read_all(|ev| events.push(ev)) {
		Ok(true) => (events, Ok(())),
		Ok(false) => panic!("parser wants input after end of input"),
		Err(e) => (events, Err(e)),
	}
}

fn main() {
	fuzz!(|data: &[u8]| {
		// NUL is never valid in a document, so it is used as chunk separator
		let chunks: Vec<&[u8]> = data.split(|b| *b == b'\0').collect();
		let whole = chunks.concat();

		let (chunked_events, chunked_result) = parse_chunked(&chunks);
		let (whole_events, whole_result) = parse_chunked(&[&whole]);

		if chunked_result.is_err() != whole_result.is_err() {
			panic!(
				"error state depends on chunking: {:?} vs. {:?}",
				chunked_result, whole_result
			);
		}
		if chunked_result.is_ok() && chunked_events != whole_events {
			panic!("event sequence depends on chunking");
		}
	});
}
