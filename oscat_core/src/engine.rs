//! The materialization engine.
//!
//! One request names an object and one [`Operation`]. The engine resolves the
//! name, picks a code path for the operation and writes the rendered bytes to
//! the caller's sink. Blob content is streamed where possible; every other
//! path writes one buffer.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{ObjectMetadata, ObjectType, ResolvedObject};
use crate::tag;
use crate::traits::{
    CheckoutMetadata, NameResolver, NoFilter, ObjectStore, TextConvFilter, TreeLister,
    WorkingTreeFilter,
};
use crate::tree::file_modes;
use std::io::Write;
use tracing::debug;

/// What to do with the resolved object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Print the type name.
    PrintType,
    /// Print the content size in bytes.
    PrintSize,
    /// Report whether the object exists. Prints nothing.
    CheckExists,
    /// Print the content as the given type, dereferencing as needed.
    ExtractTyped(ObjectType),
    /// Print blob content converted for the working tree.
    FilteredWorkingTree,
    /// Print blob content through its textconv driver, or pretty-print it.
    TextConv,
    /// Print the content in a human-readable form.
    Pretty,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::PrintType => "type",
            Operation::PrintSize => "size",
            Operation::CheckExists => "exists",
            Operation::ExtractTyped(_) => "extract",
            Operation::FilteredWorkingTree => "filters",
            Operation::TextConv => "textconv",
            Operation::Pretty => "show",
        }
    }
}

/// A single materialization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    /// Object reference, optionally `<rev>:<path>`.
    pub spec: &'a str,
    pub operation: Operation,
    /// Path used for attribute lookup; wins over a path embedded in `spec`.
    pub path_override: Option<&'a str>,
    /// Report non-standard object types instead of failing.
    pub allow_unknown_type: bool,
}

impl<'a> Request<'a> {
    pub fn new(spec: &'a str, operation: Operation) -> Self {
        Self {
            spec,
            operation,
            path_override: None,
            allow_unknown_type: false,
        }
    }

    /// Set or clear the attribute path override.
    pub fn with_path(mut self, path: Option<&'a str>) -> Self {
        self.path_override = path;
        self
    }

    pub fn allow_unknown_type(mut self, allow: bool) -> Self {
        self.allow_unknown_type = allow;
        self
    }
}

/// How a request finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The object does not exist. Only [`Operation::CheckExists`] reports this.
    Missing,
}

/// Dispatches requests over a set of collaborators.
pub struct Engine<'a> {
    store: &'a dyn ObjectStore,
    resolver: &'a dyn NameResolver,
    tree_lister: &'a dyn TreeLister,
    filter: &'a dyn WorkingTreeFilter,
    textconv: &'a dyn TextConvFilter,
}

impl<'a> Engine<'a> {
    /// An engine with no working-tree or textconv conversion.
    pub fn new(
        store: &'a dyn ObjectStore,
        resolver: &'a dyn NameResolver,
        tree_lister: &'a dyn TreeLister,
    ) -> Self {
        Self {
            store,
            resolver,
            tree_lister,
            filter: &NoFilter,
            textconv: &NoFilter,
        }
    }

    pub fn with_filter(mut self, filter: &'a dyn WorkingTreeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_textconv(mut self, textconv: &'a dyn TextConvFilter) -> Self {
        self.textconv = textconv;
        self
    }

    /// Run one request, writing its output to `sink`.
    ///
    /// Output written before a failure is not rolled back.
    pub fn execute(&self, request: &Request<'_>, sink: &mut dyn Write) -> Result<Outcome> {
        let resolved = self.resolver.resolve(request.spec)?;
        debug!(
            spec = request.spec,
            hash = %resolved.hash,
            operation = request.operation.name(),
            "resolved object"
        );

        match request.operation {
            Operation::PrintType => {
                let metadata = self.metadata_of(request, &resolved)?;
                write_line(sink, &metadata.object_type.to_string())?;
            }
            Operation::PrintSize => {
                let metadata = self.metadata_of(request, &resolved)?;
                write_line(sink, &metadata.size.to_string())?;
            }
            Operation::CheckExists => {
                if !self.store.exists(&resolved.hash) {
                    return Ok(Outcome::Missing);
                }
            }
            Operation::ExtractTyped(expected) => {
                self.extract_typed(&resolved.hash, expected, sink)?;
            }
            Operation::FilteredWorkingTree => {
                let path = required_path(request, &resolved)?;
                self.filtered(&resolved, path, sink)?;
            }
            Operation::TextConv => {
                let path = required_path(request, &resolved)?;
                match self.textconv.convert(path, resolved.mode, &resolved.hash)? {
                    Some(converted) => write_buffer(sink, &converted)?,
                    None => {
                        debug!(path, "no textconv driver, pretty-printing");
                        self.pretty(&resolved.hash, sink)?;
                    }
                }
            }
            Operation::Pretty => self.pretty(&resolved.hash, sink)?,
        }

        Ok(Outcome::Done)
    }

    /// Resolve the request's object and return its type and size.
    ///
    /// This is what [`Operation::PrintType`] and [`Operation::PrintSize`]
    /// print, for callers that want the values instead of text.
    pub fn metadata(&self, request: &Request<'_>) -> Result<ObjectMetadata> {
        let resolved = self.resolver.resolve(request.spec)?;
        self.metadata_of(request, &resolved)
    }

    fn metadata_of(
        &self,
        request: &Request<'_>,
        resolved: &ResolvedObject,
    ) -> Result<ObjectMetadata> {
        self.store
            .get_metadata(&resolved.hash, request.allow_unknown_type)
    }

    fn pretty(&self, hash: &Hash, sink: &mut dyn Write) -> Result<()> {
        match self.store.get_metadata(hash, false)?.object_type {
            ObjectType::Tree => self.tree_lister.render(hash, sink),
            ObjectType::Blob => self.stream(hash, sink),
            other => {
                let content = self.store.read_with_reference_resolution(hash, other)?;
                write_buffer(sink, &content)
            }
        }
    }

    fn extract_typed(&self, hash: &Hash, expected: ObjectType, sink: &mut dyn Write) -> Result<()> {
        if expected == ObjectType::Blob {
            let candidate = if self.is_type(hash, ObjectType::Tag) {
                tag::peel_once(self.store, hash)?
            } else {
                *hash
            };
            if self.is_type(&candidate, ObjectType::Blob) {
                return self.stream(&candidate, sink);
            }
            debug!(hash = %hash, candidate = %candidate, "not a blob, resolving references");
        }

        let content = self.store.read_with_reference_resolution(hash, expected)?;
        write_buffer(sink, &content)
    }

    fn filtered(&self, resolved: &ResolvedObject, path: &str, sink: &mut dyn Write) -> Result<()> {
        let (content, metadata) = self.store.read_raw(&resolved.hash)?;

        if metadata.object_type == ObjectType::Blob && file_modes::is_regular(resolved.mode) {
            let checkout = CheckoutMetadata {
                hash: resolved.hash,
                metadata,
            };
            if let Some(converted) = self.filter.apply(path, &content, &checkout)? {
                debug!(path, before = content.len(), after = converted.len(), "filtered");
                return write_buffer(sink, &converted);
            }
        }
        write_buffer(sink, &content)
    }

    fn stream(&self, hash: &Hash, sink: &mut dyn Write) -> Result<()> {
        let written = self.store.stream_to(hash, sink)?;
        debug!(hash = %hash, bytes = written, "streamed blob");
        Ok(())
    }

    /// Metadata lookup used for dispatch decisions; a failed lookup counts as
    /// a different type.
    fn is_type(&self, hash: &Hash, object_type: ObjectType) -> bool {
        self.store
            .get_metadata(hash, false)
            .is_ok_and(|metadata| metadata.object_type == object_type)
    }
}

fn required_path<'r>(request: &'r Request<'_>, resolved: &'r ResolvedObject) -> Result<&'r str> {
    request
        .path_override
        .or(resolved.path.as_deref())
        .filter(|path| !path.is_empty())
        .ok_or_else(|| Error::path_required(request.operation.name(), request.spec))
}

fn write_line(sink: &mut dyn Write, line: &str) -> Result<()> {
    writeln!(sink, "{}", line).map_err(Error::output)?;
    sink.flush().map_err(Error::output)
}

fn write_buffer(sink: &mut dyn Write, content: &[u8]) -> Result<()> {
    sink.write_all(content).map_err(Error::output)?;
    sink.flush().map_err(Error::output)
}
