//! Named references.
//!
//! A ref is a file under `refs/` holding one hex object id. Names may be
//! nested (`heads/main`, `tags/v1.0`).

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::store::Store;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directories searched, in order, when a short ref name is looked up.
const SEARCH_PREFIXES: &[&str] = &["", "tags/", "heads/"];

/// Manages named references in the store.
pub struct RefManager<'a> {
    store: &'a Store,
}

impl<'a> RefManager<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    fn refs_dir(&self) -> PathBuf {
        self.store.root().join("refs")
    }

    /// Get the path to a reference file.
    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.refs_dir().join(name))
    }

    /// Create or overwrite a reference.
    pub fn set(&self, name: &str, hash: &Hash) -> Result<()> {
        let path = self.ref_path(name)?;
        let parent = path
            .parent()
            .ok_or_else(|| Error::invalid_ref(format!("no parent directory for {}", name)))?;
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        writeln!(temp_file, "{}", hash.to_hex())?;
        temp_file.persist(&path)?;
        Ok(())
    }

    /// Get the value of a reference by its exact name.
    pub fn get(&self, name: &str) -> Result<Option<Hash>> {
        let path = self.ref_path(name)?;
        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let line = content.trim();
        Hash::from_hex(line)
            .map(Some)
            .map_err(|_| Error::invalid_ref(format!("{} does not hold an object id", name)))
    }

    /// Look up a short name as `<name>`, `tags/<name>`, then `heads/<name>`.
    pub fn lookup(&self, name: &str) -> Result<Option<Hash>> {
        if validate_name(name).is_err() {
            return Ok(None);
        }
        for prefix in SEARCH_PREFIXES {
            if let Some(hash) = self.get(&format!("{}{}", prefix, name))? {
                return Ok(Some(hash));
            }
        }
        Ok(None)
    }

    /// List all references as (name, hash) pairs sorted by name.
    pub fn list(&self) -> Result<Vec<(String, Hash)>> {
        let mut refs = Vec::new();
        let refs_dir = self.refs_dir();
        if refs_dir.exists() {
            self.collect(&refs_dir, &refs_dir, &mut refs)?;
        }
        refs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(refs)
    }

    fn collect(&self, base: &Path, dir: &Path, out: &mut Vec<(String, Hash)>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect(base, &path, out)?;
                continue;
            }
            let Some(name) = path
                .strip_prefix(base)
                .ok()
                .and_then(|rel| rel.to_str())
                .map(|rel| rel.replace(std::path::MAIN_SEPARATOR, "/"))
            else {
                continue;
            };
            if let Some(hash) = self.get(&name)? {
                out.push((name, hash));
            }
        }
        Ok(())
    }

    /// Remove a reference.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.ref_path(name)?;
        if !path.is_file() {
            return Err(Error::ref_not_found(name));
        }
        fs::remove_file(&path)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_ref("Ref name cannot be empty"));
    }
    if name.starts_with('/')
        || name.ends_with('/')
        || name.contains('\\')
        || name.contains(':')
        || name.split('/').any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(Error::invalid_ref(format!(
            "Invalid ref name: {} (must be relative, without '..', ':' or empty components)",
            name
        )));
    }
    Ok(())
}
