//! Collaborator interfaces consumed by the materialization engine.
//!
//! The engine never reaches for a global store or session: every collaborator
//! is handed to it explicitly as one of these trait objects.

use crate::error::Result;
use crate::hash::Hash;
use crate::object::{ObjectMetadata, ObjectType, ResolvedObject};
use crate::tree::FileMode;
use std::io::Write;

/// Read-only view of a content-addressed object store.
///
/// Implementations must treat every call as a fresh lookup; the engine relies
/// on metadata never being served from a cache shared across requests.
pub trait ObjectStore {
    /// Type and size of an object.
    ///
    /// Objects whose header names a non-standard type fail unless
    /// `allow_unknown_type` is set, in which case they are reported as
    /// [`ObjectType::Unknown`].
    fn get_metadata(&self, hash: &Hash, allow_unknown_type: bool) -> Result<ObjectMetadata>;

    /// The full, decompressed content of an object.
    fn read_raw(&self, hash: &Hash) -> Result<(Vec<u8>, ObjectMetadata)>;

    /// Read an object as `expected`, following references until it is reached.
    ///
    /// Tags are followed through their `object` header and commits through
    /// their `tree` header. How far the chain is followed is up to the store.
    fn read_with_reference_resolution(&self, hash: &Hash, expected: ObjectType)
    -> Result<Vec<u8>>;

    /// Whether the object is present.
    fn exists(&self, hash: &Hash) -> bool;

    /// Copy the object's content into `sink` using bounded memory.
    ///
    /// Returns the number of bytes written.
    fn stream_to(&self, hash: &Hash, sink: &mut dyn Write) -> Result<u64>;
}

/// Turns a user-supplied object reference into a resolved object.
pub trait NameResolver {
    /// Resolve `spec`, recording the path of a `<rev>:<path>` form.
    fn resolve(&self, spec: &str) -> Result<ResolvedObject>;
}

/// What a working-tree filter gets to know about the object it converts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub hash: Hash,
    pub metadata: ObjectMetadata,
}

/// Content conversion applied when materializing stored content for on-disk use.
pub trait WorkingTreeFilter {
    /// Convert `content` stored at `path`.
    ///
    /// `Ok(None)` means no conversion applies and the content is used as is.
    fn apply(
        &self,
        path: &str,
        content: &[u8],
        checkout: &CheckoutMetadata,
    ) -> Result<Option<Vec<u8>>>;
}

/// Display-only conversion of an object reached through `path`.
pub trait TextConvFilter {
    /// `Ok(None)` means no conversion driver is configured for `path`.
    fn convert(&self, path: &str, mode: FileMode, hash: &Hash) -> Result<Option<Vec<u8>>>;
}

/// Renders a tree object.
pub trait TreeLister {
    fn render(&self, hash: &Hash, sink: &mut dyn Write) -> Result<()>;
}

/// A filter that never converts anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl WorkingTreeFilter for NoFilter {
    fn apply(&self, _: &str, _: &[u8], _: &CheckoutMetadata) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

impl TextConvFilter for NoFilter {
    fn convert(&self, _: &str, _: FileMode, _: &Hash) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}
