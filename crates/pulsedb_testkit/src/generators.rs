//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use proptest::prelude::*;
use pulsedb_core::{ClientRecord, Revision};
use serde_json::Value;

/// Strategy for generating document uids.
pub fn uid_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating host serials.
pub fn serial_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("SN[0-9A-F]{4,8}").expect("Invalid regex")
}

/// Strategy for generating free-form JSON payloads.
///
/// Floats are excluded so payloads compare exactly after a round trip.
pub fn payload_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Strategy for generating client records.
pub fn client_record_strategy() -> impl Strategy<Value = ClientRecord> {
    (uid_strategy(), prop::option::of("[a-z]{3,10}")).prop_map(|(uid, kind)| ClientRecord {
        uid,
        kind,
    })
}

/// Strategy for generating valid revisions.
pub fn revision_strategy() -> impl Strategy<Value = Revision> {
    (1u64..1_000, "[0-9a-f]{32}").prop_map(|(generation, hash)| {
        format!("{generation}-{hash}")
            .parse()
            .expect("generated revision must parse")
    })
}

/// A step in a generated sequence of recorder operations.
#[derive(Debug, Clone)]
pub enum RecorderOp {
    /// Save a payload for a uid.
    Save(String, Value),
    /// Delete the document of a uid.
    Delete(String),
}

/// Strategy for sequences of saves and deletes over a small uid pool.
pub fn recorder_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<RecorderOp>> {
    let uid = prop::sample::select(vec!["a", "b", "c"]).prop_map(str::to_string);
    let op = prop_oneof![
        3 => (uid.clone(), payload_strategy()).prop_map(|(uid, payload)| RecorderOp::Save(uid, payload)),
        1 => uid.prop_map(RecorderOp::Delete),
    ];
    prop::collection::vec(op, 1..max_len.max(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::test_runner::TestRunner;

    #[test]
    fn uids_are_non_empty() {
        let mut runner = TestRunner::default();
        runner
            .run(&uid_strategy(), |uid| {
                prop_assert!(!uid.is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn revisions_parse() {
        let mut runner = TestRunner::default();
        runner
            .run(&revision_strategy(), |rev| {
                prop_assert!(rev.generation() >= 1);
                prop_assert_eq!(rev.hash().len(), 32);
                Ok(())
            })
            .unwrap();
    }
}
