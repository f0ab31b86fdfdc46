//! Single-level tag dereference.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::traits::ObjectStore;

/// Read the tag `hash` and return the id named by its leading `object` line.
///
/// The caller must already know `hash` is a tag. Only one level is peeled and
/// the target's type is not checked; chains of tags are left to the store's
/// reference-resolution read.
pub fn peel_once(store: &dyn ObjectStore, hash: &Hash) -> Result<Hash> {
    let (payload, _) = store.read_raw(hash)?;
    parse_target(&payload).ok_or_else(|| Error::invalid_tag(hash.to_hex()))
}

fn parse_target(payload: &[u8]) -> Option<Hash> {
    let target = payload.strip_prefix(b"object ")?;
    Hash::from_hex_prefix_of(target).ok()
}
