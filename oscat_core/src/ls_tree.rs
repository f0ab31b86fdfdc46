//! Tree listing.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::store::Store;
use crate::traits::TreeLister;
use std::io::Write;

/// Lists a tree as `<mode> <type> <hash>\t<name>` lines.
pub struct TreeListing<'a> {
    store: &'a Store,
}

impl<'a> TreeListing<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl TreeLister for TreeListing<'_> {
    fn render(&self, hash: &Hash, sink: &mut dyn Write) -> Result<()> {
        for entry in self.store.get_tree(hash)? {
            writeln!(
                sink,
                "{:06o} {} {}\t{}",
                entry.mode,
                entry.entry_type.object_type(),
                entry.hash,
                entry.name
            )
            .map_err(Error::output)?;
        }
        sink.flush().map_err(Error::output)
    }
}
