//! # Oscat Core
//!
//! Object resolution and materialization for a content-addressed object store.
//!
//! A user supplies an object reference (`<hash>`, a ref name, a unique hex
//! prefix, or `<rev>:<path>`) and one operation. The [`Engine`] resolves the
//! reference and renders the object: its type or size, an existence check,
//! typed extraction, working-tree filtered content, textconv output, or a
//! pretty-printed form.
//!
//! ## Features
//!
//! - BLAKE3 object ids with a typed header
//! - zstd compression for large payloads, streamed back in bounded memory
//! - Named refs and unique-prefix lookup
//! - Tag and commit dereferencing
//! - Attribute-driven ident, eol, smudge and textconv conversion
//!
//! ## Example
//!
//! ```no_run
//! use oscat_core::{
//!     AttributeFilters, Engine, Operation, Request, Store, StoreResolver, TreeListing,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::open("./oscat-store")?;
//! let resolver = StoreResolver::new(&store);
//! let lister = TreeListing::new(&store);
//! let filters = AttributeFilters::load(&store)?;
//!
//! let engine = Engine::new(&store, &resolver, &lister)
//!     .with_filter(&filters)
//!     .with_textconv(&filters);
//!
//! let request = Request::new("main:readme.txt", Operation::FilteredWorkingTree);
//! engine.execute(&request, &mut std::io::stdout().lock())?;
//! # Ok(())
//! # }
//! ```

mod attributes;
mod config;
mod engine;
mod error;
mod filter;
mod hash;
mod ls_tree;
mod object;
mod refs;
mod resolve;
mod store;
mod stream;
mod tag;
mod traits;
mod tree;
mod walk;

pub use attributes::{AttrSet, AttrValue, Attributes};
pub use config::Config;
pub use engine::{Engine, Operation, Outcome, Request};
pub use error::{Error, Result};
pub use filter::AttributeFilters;
pub use hash::{Algorithm, Hash};
pub use ls_tree::TreeListing;
pub use object::{ObjectMetadata, ObjectType, ResolvedObject};
pub use refs::RefManager;
pub use resolve::StoreResolver;
pub use store::Store;
pub use stream::{STREAM_CHUNK_SIZE, copy_chunked};
pub use tag::peel_once;
pub use traits::{
    CheckoutMetadata, NameResolver, NoFilter, ObjectStore, TextConvFilter, TreeLister,
    WorkingTreeFilter,
};
pub use tree::{EntryType, FileMode, TreeEntry, file_modes};
