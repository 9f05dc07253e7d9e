//! Fuzz target: `ResponseParser::feed`
//!
//! Drives arbitrary bytes into the streaming parser, split at a
//! fuzzer-chosen point, and classifies every decoded response.  The
//! parser must never panic, never buffer more than one frame, and must
//! produce the same results whether the input arrives whole or in two
//! chunks.
//!
//! cargo fuzz run fuzz_response_parser

#![no_main]

use busbridge::protocol::{MAX_FRAME_LEN, ResponseParser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&split, body)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(body.len());

    let mut whole = ResponseParser::new();
    let expected = whole.feed(body);
    assert!(whole.pending() <= MAX_FRAME_LEN);

    let mut chunked = ResponseParser::new();
    let mut got = chunked.feed(&body[..split]);
    got.extend(chunked.feed(&body[split..]));
    assert_eq!(got, expected, "chunking changed the decoded frames");

    for response in expected.into_iter().flatten() {
        let _ = response.classify();
    }
});
