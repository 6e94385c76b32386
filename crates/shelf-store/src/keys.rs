//! Flat key layout of the bucket hierarchy.
//!
//! Every bucket and value lives in one redb table, keyed by its full path
//! from the top level. Each path segment is written as its bytes with `0x00`
//! escaped to `0x00 0xFF`, then closed with the terminator `0x00 0x01`. The
//! encoding preserves segment order, so byte order of encoded keys is the
//! order of paths compared segment by segment, and everything below a bucket
//! sorts between the bucket's own key and [`subtree_end`] of it.
//!
//! Stored values carry a one-byte tag telling buckets from plain values:
//!
//! ```text
//! [0x00]                 bucket marker
//! [0x01][value bytes]    value
//! ```

use redb::TableDefinition;

use crate::error::{display_key, StoreError, StoreResult};

/// Buckets and values, keyed by encoded path.
pub(crate) const DATA_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("shelf_data");

/// Store metadata: key = name, value = counter.
pub(crate) const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("shelf_meta");

pub(crate) const GENERATION_KEY: &str = "generation";

const ESCAPE: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

const BUCKET_TAG: u8 = 0x00;
const VALUE_TAG: u8 = 0x01;

pub(crate) const BUCKET_MARKER: &[u8] = &[BUCKET_TAG];

/// What a key in the data table holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Node {
    Bucket,
    Value(Vec<u8>),
}

/// Key of `name` directly under the bucket keyed `parent`.
pub(crate) fn child_key(parent: &[u8], name: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(parent.len() + name.len() + 2);
    key.extend_from_slice(parent);
    for &byte in name {
        key.push(byte);
        if byte == 0 {
            key.push(ESCAPE);
        }
    }
    key.extend_from_slice(&[0, TERMINATOR]);
    key
}

/// Smallest key that sorts after `key` and after every key below it.
///
/// `key` must be a non-empty encoded path, which always ends in the
/// terminator byte.
pub(crate) fn subtree_end(key: &[u8]) -> Vec<u8> {
    let mut end = key.to_vec();
    if let Some(last) = end.last_mut() {
        *last += 1;
    }
    end
}

/// Decode the name of `key` when it sits directly under `parent`.
pub(crate) fn child_name(parent: &[u8], key: &[u8]) -> Option<Vec<u8>> {
    let rest = key.strip_prefix(parent)?;
    let mut name = Vec::with_capacity(rest.len());
    let mut bytes = rest.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte != 0 {
            name.push(byte);
            continue;
        }
        match bytes.next()? {
            ESCAPE => name.push(0),
            TERMINATOR => return bytes.next().is_none().then_some(name),
            _ => return None,
        }
    }
    None
}

pub(crate) fn encode_value(value: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(value.len() + 1);
    record.push(VALUE_TAG);
    record.extend_from_slice(value);
    record
}

pub(crate) fn decode_node(key: &[u8], record: &[u8]) -> StoreResult<Node> {
    match record.split_first() {
        Some((&BUCKET_TAG, [])) => Ok(Node::Bucket),
        Some((&VALUE_TAG, value)) => Ok(Node::Value(value.to_vec())),
        _ => Err(StoreError::Corrupt(format!(
            "unrecognized record under key {}",
            display_key(key)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn child_key_escapes_zero_bytes() {
        assert_eq!(child_key(b"", b"ab"), vec![b'a', b'b', 0, TERMINATOR]);
        assert_eq!(child_key(b"", &[0]), vec![0, ESCAPE, 0, TERMINATOR]);
    }

    #[test]
    fn child_name_only_matches_direct_children() {
        let parent = child_key(b"", b"Person");
        let child = child_key(&parent, b"p\x001");
        let grandchild = child_key(&child, b"Name");

        assert_eq!(child_name(&parent, &child), Some(b"p\x001".to_vec()));
        assert_eq!(child_name(&parent, &grandchild), None);
        assert_eq!(child_name(&child, &parent), None);
        assert_eq!(child_name(b"", &parent), Some(b"Person".to_vec()));
    }

    #[test]
    fn node_tags() {
        assert_eq!(decode_node(b"k", BUCKET_MARKER).unwrap(), Node::Bucket);
        assert_eq!(
            decode_node(b"k", &encode_value(b"v")).unwrap(),
            Node::Value(b"v".to_vec())
        );
        assert_eq!(
            decode_node(b"k", &encode_value(b"")).unwrap(),
            Node::Value(Vec::new())
        );
        assert!(matches!(decode_node(b"k", &[]), Err(StoreError::Corrupt(_))));
        assert!(matches!(decode_node(b"k", &[7, 1]), Err(StoreError::Corrupt(_))));
        assert!(matches!(decode_node(b"k", &[BUCKET_TAG, 1]), Err(StoreError::Corrupt(_))));
    }

    fn name() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(prop_oneof![Just(0u8), Just(1u8), Just(0xFFu8), any::<u8>()], 1..6)
    }

    proptest! {
        #[test]
        fn encoding_preserves_name_order(a in name(), b in name()) {
            let (ka, kb) = (child_key(b"", &a), child_key(b"", &b));
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
            prop_assert_eq!(child_name(b"", &ka), Some(a));
        }

        #[test]
        fn subtree_sorts_before_next_sibling(a in name(), b in name(), tail in name()) {
            prop_assume!(a < b);
            let (ka, kb) = (child_key(b"", &a), child_key(b"", &b));
            let below = child_key(&ka, &tail);
            let end = subtree_end(&ka);
            prop_assert!(ka < below);
            prop_assert!(below < end);
            prop_assert!(end <= kb);
        }
    }
}
