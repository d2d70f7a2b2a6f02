//! Fuzz target for `LineFramer`
//!
//! # Invariants
//!
//! - Buffered bytes never exceed `max_len + 1`
//! - Every `\n` in the input yields exactly one record
//! - Splitting the input differently never changes the records

#![no_main]

use arbitrary::Arbitrary;
use dih_proto::LineFramer;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    max_len: u8,
    splits: Vec<u8>,
    data: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let max_len = usize::from(input.max_len).max(1);

    let mut whole = LineFramer::new(max_len);
    let expected = whole.push(&input.data);
    assert_eq!(expected.len(), input.data.iter().filter(|&&b| b == b'\n').count());

    let mut chunked = LineFramer::new(max_len);
    let mut records = Vec::new();
    let mut rest = input.data.as_slice();
    for split in input.splits {
        let at = usize::from(split).min(rest.len());
        let (head, tail) = rest.split_at(at);
        records.extend(chunked.push(head));
        assert!(chunked.buffered() <= max_len + 1);
        rest = tail;
    }
    records.extend(chunked.push(rest));
    assert!(chunked.buffered() <= max_len + 1);

    assert_eq!(records, expected);
});
