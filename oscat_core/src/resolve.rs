//! Object name resolution.
//!
//! A reference is `<rev>` or `<rev>:<path>`. The revision is a full hex id, a
//! ref name, or a unique hex prefix of at least [`MIN_PREFIX_LEN`] characters.
//! A path is looked up in the tree the revision peels to.

use crate::error::{Error, Result};
use crate::hash::{HEX_LEN, Hash, is_hex};
use crate::object::{ObjectType, ResolvedObject};
use crate::store::{MIN_PREFIX_LEN, Store};
use crate::traits::NameResolver;
use crate::tree::{EntryType, FileMode, file_modes};
use tracing::debug;

/// Resolves references against a [`Store`] and its refs.
pub struct StoreResolver<'a> {
    store: &'a Store,
}

impl<'a> StoreResolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Resolve a revision to an object id.
    ///
    /// A full-length hex id is accepted without checking that the object
    /// exists. Ref names take precedence over hex prefixes.
    pub fn resolve_rev(&self, rev: &str) -> Result<Option<Hash>> {
        if rev.is_empty() {
            return Ok(None);
        }
        if rev.len() == HEX_LEN && is_hex(rev) {
            return Hash::from_hex(&rev.to_ascii_lowercase()).map(Some);
        }
        if let Some(hash) = self.store.refs().lookup(rev)? {
            debug!(rev, hash = %hash, "resolved ref");
            return Ok(Some(hash));
        }
        if rev.len() >= MIN_PREFIX_LEN && rev.len() < HEX_LEN && is_hex(rev) {
            return self.store.find_by_prefix(rev);
        }
        Ok(None)
    }

    /// Walk `path` from the tree `root` peels to.
    fn lookup_path(&self, rev: &str, root: &Hash, path: &str) -> Result<(Hash, FileMode)> {
        let mut current = self.store.peel(root, ObjectType::Tree)?;
        let mut mode = file_modes::DIRECTORY;
        let mut is_tree = true;

        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !is_tree {
                return Err(Error::path_not_found(rev, path));
            }
            let entry = self
                .store
                .get_tree(&current)?
                .into_iter()
                .find(|entry| entry.name == component)
                .ok_or_else(|| Error::path_not_found(rev, path))?;

            current = entry.hash;
            mode = entry.mode;
            is_tree = entry.entry_type == EntryType::Tree;
        }

        Ok((current, mode))
    }
}

impl NameResolver for StoreResolver<'_> {
    fn resolve(&self, spec: &str) -> Result<ResolvedObject> {
        let (rev, path) = match spec.split_once(':') {
            Some((rev, path)) => (rev, Some(path)),
            None => (spec, None),
        };

        let hash = self
            .resolve_rev(rev)?
            .ok_or_else(|| Error::invalid_object_name(spec))?;

        match path {
            None => Ok(ResolvedObject::bare(hash)),
            // `<rev>:` names the revision's tree.
            Some("") => Ok(ResolvedObject::bare(
                self.store.peel(&hash, ObjectType::Tree)?,
            )),
            Some(path) => {
                let (hash, mode) = self.lookup_path(rev, &hash, path)?;
                debug!(spec, hash = %hash, mode, "resolved path");
                Ok(ResolvedObject {
                    hash,
                    path: Some(path.to_string()),
                    mode,
                })
            }
        }
    }
}
