//! Importing files and directories into the store.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::ObjectType;
use crate::store::Store;
use crate::tree::{EntryType, FileMode, TreeEntry, file_modes};
use std::fs;
use std::path::Path;
use tracing::debug;

impl Store {
    /// Add a file or directory to the store.
    ///
    /// A file becomes a blob. A directory becomes a tree, built recursively
    /// while honouring `.gitignore` files. Returns the resulting id.
    pub fn add_path(&self, path: &Path) -> Result<Hash> {
        let metadata = fs::symlink_metadata(path)?;

        if metadata.is_dir() {
            self.add_directory(path)
        } else if metadata.is_file() {
            self.write_object(ObjectType::Blob, &fs::read(path)?)
        } else {
            Err(Error::invalid_tree_entry(format!(
                "Unsupported file type: {}",
                path.display()
            )))
        }
    }

    fn add_directory(&self, path: &Path) -> Result<Hash> {
        let mut entries = Vec::new();

        let walker = ignore::WalkBuilder::new(path)
            .max_depth(Some(1))
            .hidden(false)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(|entry| entry.file_name() != ".git")
            .build();

        for entry in walker {
            let entry = entry?;
            let entry_path = entry.path();
            if entry.depth() == 0 {
                continue;
            }

            let name = entry_path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    Error::invalid_tree_entry(format!("Invalid filename: {}", entry_path.display()))
                })?
                .to_string();

            let metadata = fs::symlink_metadata(entry_path)?;
            let tree_entry = if metadata.is_dir() {
                let hash = self.add_directory(entry_path)?;
                TreeEntry::new(EntryType::Tree, file_modes::DIRECTORY, hash, name)?
            } else if metadata.file_type().is_symlink() {
                let target = fs::read_link(entry_path)?;
                let hash = self.write_object(
                    ObjectType::Blob,
                    target.to_string_lossy().as_bytes(),
                )?;
                TreeEntry::new(EntryType::Blob, file_modes::SYMLINK, hash, name)?
            } else {
                let hash = self.write_object(ObjectType::Blob, &fs::read(entry_path)?)?;
                TreeEntry::new(EntryType::Blob, file_mode(&metadata), hash, name)?
            };
            entries.push(tree_entry);
        }

        debug!(path = %path.display(), entries = entries.len(), "adding directory");
        self.put_tree(entries)
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> FileMode {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        file_modes::EXECUTABLE
    } else {
        file_modes::REGULAR
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> FileMode {
    file_modes::REGULAR
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Algorithm;
    use crate::traits::ObjectStore;
    use tempfile::TempDir;

    #[test]
    fn test_add_file_is_blob() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path().join("store"), Algorithm::Blake3).unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, b"alpha").unwrap();

        let hash = store.add_path(&file).unwrap();
        let (data, metadata) = store.read_raw(&hash).unwrap();
        assert_eq!(data, b"alpha");
        assert_eq!(metadata.object_type, ObjectType::Blob);
    }

    #[test]
    fn test_add_nested_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path().join("store"), Algorithm::Blake3).unwrap();
        let source = temp_dir.path().join("source");
        fs::create_dir_all(source.join("sub")).unwrap();
        fs::write(source.join("root.txt"), b"root").unwrap();
        fs::write(source.join("sub/nested.txt"), b"nested").unwrap();

        let hash = store.add_path(&source).unwrap();
        let entries = store.get_tree(&hash).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "root.txt");
        assert_eq!(entries[1].name, "sub");
        assert_eq!(entries[1].mode, file_modes::DIRECTORY);

        let sub = store.get_tree(&entries[1].hash).unwrap();
        assert_eq!(sub[0].name, "nested.txt");
    }

    #[test]
    fn test_add_directory_respects_gitignore() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path().join("store"), Algorithm::Blake3).unwrap();
        let source = temp_dir.path().join("source");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join(".gitignore"), b"*.log\n").unwrap();
        fs::write(source.join("keep.txt"), b"keep").unwrap();
        fs::write(source.join("drop.log"), b"drop").unwrap();

        let hash = store.add_path(&source).unwrap();
        let names: Vec<String> = store
            .get_tree(&hash)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec![".gitignore", "keep.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_add_executable_and_symlink_modes() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path().join("store"), Algorithm::Blake3).unwrap();
        let source = temp_dir.path().join("source");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("run.sh"), b"#!/bin/sh\n").unwrap();
        fs::set_permissions(source.join("run.sh"), fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("run.sh", source.join("link")).unwrap();

        let hash = store.add_path(&source).unwrap();
        let entries = store.get_tree(&hash).unwrap();
        assert_eq!(entries[0].name, "link");
        assert_eq!(entries[0].mode, file_modes::SYMLINK);
        assert_eq!(store.read_raw(&entries[0].hash).unwrap().0, b"run.sh");
        assert_eq!(entries[1].mode, file_modes::EXECUTABLE);
    }
}
