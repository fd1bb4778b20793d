//! Property-based test generators using proptest.

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for keys the engine accepts: 1 to 64 arbitrary bytes.
pub fn arb_key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=64)
}

/// Strategy for values, including empty ones.
pub fn arb_value() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Strategy for n-gram-like string keys without NUL bytes.
pub fn arb_ngram() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z_(){};.=]{1,8}( [a-z_(){};.=]{1,8}){0,3}")
        .expect("Invalid regex")
}

/// Strategy for a batch of distinct keys with values.
pub fn arb_entries(max: usize) -> impl Strategy<Value = BTreeMap<Vec<u8>, Vec<u8>>> {
    prop::collection::btree_map(arb_key(), arb_value(), 0..max)
}

/// Strategy for a batch of distinct string keys with counts.
pub fn arb_counters(max: usize) -> impl Strategy<Value = BTreeMap<String, u64>> {
    prop::collection::btree_map(arb_ngram(), any::<u64>(), 0..max)
}
