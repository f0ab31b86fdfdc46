//! Store management and object I/O.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hash::{Algorithm, HEX_LEN, Hash};
use crate::object::{CompressionType, HEADER_SIZE, ObjectHeader, ObjectMetadata, ObjectType, header_field};
use crate::refs::RefManager;
use crate::stream::copy_chunked;
use crate::traits::ObjectStore;
use crate::tree::{self, TreeEntry};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Compression threshold: payloads >= 4KB are compressed.
const COMPRESSION_THRESHOLD: usize = 4096;

/// Shortest hex prefix accepted for abbreviated object ids.
pub const MIN_PREFIX_LEN: usize = 4;

/// A content-addressed store on disk.
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    config: Config,
}

impl Store {
    /// Initialize a new store at the given path.
    ///
    /// Creates the directory structure:
    /// - `objects/<algo>/` for storing objects
    /// - `refs/` for named references
    /// - `config` file with version and algorithm
    pub fn init<P: AsRef<Path>>(root: P, algorithm: Algorithm) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("objects").join(algorithm.as_str()))?;
        fs::create_dir_all(root.join("refs"))?;

        let config = Config::new(algorithm);
        fs::write(root.join("config"), config.render())?;

        Ok(Self { root, config })
    }

    /// Open an existing store at the given path.
    ///
    /// Validates the store structure and reads the configuration.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            return Err(Error::invalid_store(&root, "directory does not exist"));
        }

        let config_path = root.join("config");
        if !config_path.exists() {
            return Err(Error::invalid_store(&root, "config file not found"));
        }
        let config = Config::parse(&fs::read_to_string(&config_path)?)?;

        if !root.join("objects").join(config.algorithm().as_str()).exists() {
            return Err(Error::invalid_store(
                &root,
                "objects directory structure missing",
            ));
        }
        if !root.join("refs").exists() {
            return Err(Error::invalid_store(&root, "refs directory missing"));
        }

        Ok(Self { root, config })
    }

    /// Get the path to an object file given its hash.
    ///
    /// Returns: `objects/{algorithm}/{prefix}/{suffix}`
    pub fn object_path(&self, hash: &Hash) -> PathBuf {
        self.objects_dir().join(hash.prefix()).join(hash.suffix())
    }

    fn objects_dir(&self) -> PathBuf {
        self.root.join("objects").join(self.algorithm().as_str())
    }

    /// Get the root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the algorithm used by this store.
    pub fn algorithm(&self) -> Algorithm {
        self.config.algorithm()
    }

    /// The parsed store configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the reference manager for this store.
    pub fn refs(&self) -> RefManager<'_> {
        RefManager::new(self)
    }

    /// Compute the id an object of `object_type` with `data` is stored under.
    ///
    /// The type and length are hashed ahead of the content, so equal bytes
    /// stored as different types get different ids.
    pub fn object_id(object_type: ObjectType, data: &[u8]) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(format!("{} {}\0", object_type, data.len()).as_bytes());
        hasher.update(data);
        Hash::from_bytes(*hasher.finalize().as_bytes())
    }

    /// Open an object file and decode its header.
    fn open_object(&self, hash: &Hash) -> Result<(fs::File, ObjectHeader)> {
        let obj_path = self.object_path(hash);
        let mut file = match fs::File::open(&obj_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::object_not_found(hash.to_hex()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut header_buf = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_buf)
            .map_err(|e| Error::corrupted_object(&obj_path, format!("short header: {}", e)))?;
        let header = ObjectHeader::decode(&header_buf).map_err(|e| match e {
            Error::InvalidHeader { reason } => Error::corrupted_object(&obj_path, reason),
            other => Error::corrupted_object(&obj_path, other.to_string()),
        })?;
        Ok((file, header))
    }

    /// A reader over the decompressed content following the header.
    fn content_reader(file: fs::File, header: &ObjectHeader) -> Result<Box<dyn Read>> {
        Ok(match header.compression {
            CompressionType::None => Box::new(file),
            CompressionType::Zstd => Box::new(
                zstd::stream::read::Decoder::new(file)
                    .map_err(|e| Error::compression_error(format!("zstd decoder: {}", e)))?,
            ),
        })
    }

    /// Write an object and return its id. Existing objects are left untouched.
    pub fn write_object(&self, object_type: ObjectType, data: &[u8]) -> Result<Hash> {
        let hash = Self::object_id(object_type, data);
        let obj_path = self.object_path(&hash);
        if obj_path.exists() {
            return Ok(hash);
        }

        let (payload, compression) = if data.len() >= COMPRESSION_THRESHOLD {
            (compress_zstd(data)?, CompressionType::Zstd)
        } else {
            (data.to_vec(), CompressionType::None)
        };
        let header = ObjectHeader::new(
            object_type,
            self.algorithm(),
            compression,
            data.len() as u64,
        );

        let parent = obj_path
            .parent()
            .ok_or_else(|| Error::invalid_store(&self.root, "object path has no parent"))?;
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(&header.encode())?;
        temp_file.write_all(&payload)?;
        temp_file.flush()?;
        temp_file.persist(&obj_path)?;

        debug!(hash = %hash, object_type = %object_type, size = data.len(), "wrote object");
        Ok(hash)
    }

    /// Store a tree from a list of entries (sorted canonically).
    pub fn put_tree(&self, entries: Vec<TreeEntry>) -> Result<Hash> {
        self.write_object(ObjectType::Tree, &tree::encode_tree(entries))
    }

    /// Retrieve and decode a tree.
    pub fn get_tree(&self, hash: &Hash) -> Result<Vec<TreeEntry>> {
        let (payload, metadata) = self.read_raw(hash)?;
        if metadata.object_type != ObjectType::Tree {
            return Err(Error::invalid_object_type(
                ObjectType::Tree.to_string(),
                metadata.object_type.to_string(),
            ));
        }
        tree::decode_tree(&payload)
    }

    /// Follow tags (and, when a tree is wanted, commits) from `hash` until an
    /// object of type `expected` is reached. Returns that object's id.
    ///
    /// Only headers are read for objects that are not followed. There is no
    /// depth limit: ids are content hashes, so a chain cannot loop back.
    pub fn peel(&self, hash: &Hash, expected: ObjectType) -> Result<Hash> {
        let mut current = *hash;
        loop {
            let object_type = self.get_metadata(&current, false)?.object_type;
            if object_type == expected {
                return Ok(current);
            }

            let field = match object_type {
                ObjectType::Tag => "object",
                ObjectType::Commit if expected == ObjectType::Tree => "tree",
                got => {
                    return Err(Error::invalid_object_type(
                        expected.to_string(),
                        got.to_string(),
                    ));
                }
            };
            let (payload, _) = self.read_raw(&current)?;
            let next = header_field(&payload, field)
                .and_then(|value| std::str::from_utf8(value).ok())
                .and_then(|value| Hash::from_hex(value.trim()).ok())
                .ok_or_else(|| {
                    Error::corrupted_object(
                        self.object_path(&current),
                        format!("{} has no valid '{}' header", object_type, field),
                    )
                })?;

            debug!(from = %current, to = %next, via = field, "following reference");
            current = next;
        }
    }

    /// Expand an abbreviated hex id to the one object it names.
    ///
    /// Returns `Ok(None)` when nothing matches and an ambiguity error when more
    /// than one object does.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Option<Hash>> {
        let prefix = prefix.to_ascii_lowercase();
        if prefix.len() < MIN_PREFIX_LEN
            || prefix.len() > HEX_LEN
            || !crate::hash::is_hex(&prefix)
        {
            return Err(Error::invalid_object_name(prefix));
        }

        let (shard, rest) = prefix.split_at(2);
        let shard_dir = self.objects_dir().join(shard);
        if !shard_dir.is_dir() {
            return Ok(None);
        }

        let mut found = None;
        for entry in fs::read_dir(&shard_dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.len() != HEX_LEN - 2 || !name.starts_with(rest) {
                continue;
            }
            if found.is_some() {
                return Err(Error::ambiguous_object_name(prefix));
            }
            found = Some(Hash::from_hex(&format!("{}{}", shard, name))?);
        }
        Ok(found)
    }
}

impl ObjectStore for Store {
    fn get_metadata(&self, hash: &Hash, allow_unknown_type: bool) -> Result<ObjectMetadata> {
        let (_, header) = self.open_object(hash)?;
        if !allow_unknown_type && !header.object_type.is_known() {
            return Err(Error::unknown_object_type(
                hash.to_hex(),
                header.object_type.to_u8(),
            ));
        }
        Ok(header.metadata())
    }

    fn read_raw(&self, hash: &Hash) -> Result<(Vec<u8>, ObjectMetadata)> {
        let (file, header) = self.open_object(hash)?;
        // The recorded size is untrusted until the length check below.
        let mut payload = Vec::new();
        Self::content_reader(file, &header)?
            .take(header.size.saturating_add(1))
            .read_to_end(&mut payload)?;

        let obj_path = self.object_path(hash);
        if payload.len() as u64 != header.size {
            return Err(Error::corrupted_object(
                &obj_path,
                format!(
                    "Payload length mismatch: expected {}, got {}",
                    header.size,
                    payload.len()
                ),
            ));
        }

        let computed = Self::object_id(header.object_type, &payload);
        if computed != *hash {
            return Err(Error::corrupted_object(
                &obj_path,
                format!("Hash mismatch: expected {}, got {}", hash, computed),
            ));
        }

        Ok((payload, header.metadata()))
    }

    fn read_with_reference_resolution(
        &self,
        hash: &Hash,
        expected: ObjectType,
    ) -> Result<Vec<u8>> {
        let target = self.peel(hash, expected)?;
        Ok(self.read_raw(&target)?.0)
    }

    fn exists(&self, hash: &Hash) -> bool {
        self.object_path(hash).is_file()
    }

    fn stream_to(&self, hash: &Hash, sink: &mut dyn Write) -> Result<u64> {
        let (file, header) = self.open_object(hash)?;
        let mut reader = Self::content_reader(file, &header)?;
        let written = copy_chunked(&mut reader, sink)?;

        if written != header.size {
            return Err(Error::corrupted_object(
                self.object_path(hash),
                format!(
                    "Payload length mismatch: expected {}, got {}",
                    header.size, written
                ),
            ));
        }
        Ok(written)
    }
}

/// Compress data using zstd.
fn compress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::encode_all(data, 3) // Level 3 = fast compression
        .map_err(|e| Error::compression_error(format!("zstd compression failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{EntryType, file_modes};
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path().join("store"), Algorithm::Blake3).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_store_init_layout() {
        let (temp_dir, store) = store();
        let root = temp_dir.path().join("store");
        assert_eq!(store.root(), root);
        assert!(root.join("objects/blake3-256").exists());
        assert!(root.join("refs").exists());
        let config = fs::read_to_string(root.join("config")).unwrap();
        assert!(config.contains("version=1"));
        assert!(config.contains("algo=blake3-256"));
    }

    #[test]
    fn test_store_open() {
        let (temp_dir, _) = store();
        let store = Store::open(temp_dir.path().join("store")).unwrap();
        assert_eq!(store.algorithm(), Algorithm::Blake3);
    }

    #[test]
    fn test_store_open_invalid() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Store::open(temp_dir.path().join("nonexistent")).is_err());
        assert!(Store::open(temp_dir.path()).is_err());
    }

    #[test]
    fn test_object_id_depends_on_type() {
        assert_ne!(
            Store::object_id(ObjectType::Blob, b"same"),
            Store::object_id(ObjectType::Tag, b"same")
        );
    }

    #[test]
    fn test_write_read_small_and_large() {
        let (_tmp, store) = store();
        for data in [b"hello".to_vec(), vec![0xAB; COMPRESSION_THRESHOLD * 3]] {
            let hash = store.write_object(ObjectType::Blob, &data).unwrap();
            let (read, metadata) = store.read_raw(&hash).unwrap();
            assert_eq!(read, data);
            assert_eq!(metadata, ObjectMetadata::new(ObjectType::Blob, data.len() as u64));
        }
    }

    #[test]
    fn test_large_payload_is_compressed_on_disk() {
        let (_tmp, store) = store();
        let data = vec![b'a'; COMPRESSION_THRESHOLD * 4];
        let hash = store.write_object(ObjectType::Blob, &data).unwrap();

        let on_disk = fs::read(store.object_path(&hash)).unwrap();
        let header = ObjectHeader::decode(&on_disk).unwrap();
        assert_eq!(header.compression, CompressionType::Zstd);
        assert!(on_disk.len() < data.len());
        assert_eq!(
            store.get_metadata(&hash, false).unwrap().size,
            data.len() as u64
        );
    }

    #[test]
    fn test_write_deduplicates() {
        let (_tmp, store) = store();
        let a = store.write_object(ObjectType::Blob, b"same").unwrap();
        let b = store.write_object(ObjectType::Blob, b"same").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_object() {
        let (_tmp, store) = store();
        let hash = Hash::hash_bytes(b"nonexistent");
        assert!(!store.exists(&hash));
        assert!(matches!(
            store.get_metadata(&hash, false),
            Err(Error::ObjectNotFound { .. })
        ));
        assert!(store.read_raw(&hash).is_err());
    }

    #[test]
    fn test_corruption_detection() {
        let (_tmp, store) = store();
        let hash = store.write_object(ObjectType::Blob, b"test").unwrap();

        let obj_path = store.object_path(&hash);
        let mut file_data = fs::read(&obj_path).unwrap();
        file_data[HEADER_SIZE] ^= 0xFF;
        fs::write(&obj_path, file_data).unwrap();

        assert!(matches!(
            store.read_raw(&hash),
            Err(Error::CorruptedObject { .. })
        ));
    }

    #[test]
    fn test_corrupt_header_size_is_reported() {
        let (_tmp, store) = store();
        let hash = store.write_object(ObjectType::Blob, b"test").unwrap();

        let obj_path = store.object_path(&hash);
        let mut file_data = fs::read(&obj_path).unwrap();
        file_data[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
        fs::write(&obj_path, file_data).unwrap();

        assert!(matches!(
            store.read_raw(&hash),
            Err(Error::CorruptedObject { .. })
        ));
    }

    #[test]
    fn test_bad_magic_is_corruption() {
        let (_tmp, store) = store();
        let hash = store.write_object(ObjectType::Blob, b"test").unwrap();

        let obj_path = store.object_path(&hash);
        let mut file_data = fs::read(&obj_path).unwrap();
        file_data[0..4].copy_from_slice(b"JUNK");
        fs::write(&obj_path, file_data).unwrap();

        let err = store.get_metadata(&hash, false).unwrap_err();
        assert!(matches!(&err, Error::CorruptedObject { reason, .. } if reason.contains("magic")));
        assert!(matches!(
            store.read_raw(&hash),
            Err(Error::CorruptedObject { .. })
        ));
    }

    #[test]
    fn test_unknown_type_needs_permission() {
        let (_tmp, store) = store();
        let hash = store
            .write_object(ObjectType::Unknown(9), b"mystery")
            .unwrap();

        assert!(matches!(
            store.get_metadata(&hash, false),
            Err(Error::UnknownObjectType { type_id: 9, .. })
        ));
        let metadata = store.get_metadata(&hash, true).unwrap();
        assert_eq!(metadata.object_type, ObjectType::Unknown(9));
        assert_eq!(metadata.size, 7);
    }

    #[test]
    fn test_stream_to_compressed() {
        let (_tmp, store) = store();
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let hash = store.write_object(ObjectType::Blob, &data).unwrap();

        let mut out = Vec::new();
        assert_eq!(store.stream_to(&hash, &mut out).unwrap(), data.len() as u64);
        assert_eq!(out, data);
    }

    #[test]
    fn test_tree_roundtrip() {
        let (_tmp, store) = store();
        let blob = store.write_object(ObjectType::Blob, b"file").unwrap();
        let entries = vec![
            TreeEntry::new(EntryType::Blob, file_modes::EXECUTABLE, blob, "run.sh".into()).unwrap(),
            TreeEntry::new(EntryType::Blob, file_modes::REGULAR, blob, "a.txt".into()).unwrap(),
        ];
        let tree_hash = store.put_tree(entries).unwrap();

        let read = store.get_tree(&tree_hash).unwrap();
        assert_eq!(read[0].name, "a.txt");
        assert_eq!(read[1].mode, file_modes::EXECUTABLE);
        assert!(store.get_tree(&blob).is_err());
    }

    #[test]
    fn test_reference_resolution_through_tag_and_commit() {
        let (_tmp, store) = store();
        let blob = store.write_object(ObjectType::Blob, b"content").unwrap();
        let tree_hash = store
            .put_tree(vec![
                TreeEntry::new(EntryType::Blob, file_modes::REGULAR, blob, "f".into()).unwrap(),
            ])
            .unwrap();
        let commit = store
            .write_object(ObjectType::Commit, format!("tree {}\n\nmsg\n", tree_hash).as_bytes())
            .unwrap();
        let tag = store
            .write_object(
                ObjectType::Tag,
                format!("object {}\ntype commit\ntag v1\n\nrelease\n", commit).as_bytes(),
            )
            .unwrap();
        let tag_of_tag = store
            .write_object(
                ObjectType::Tag,
                format!("object {}\ntype tag\ntag v1-signed\n\n", tag).as_bytes(),
            )
            .unwrap();

        let tree_bytes = store
            .read_with_reference_resolution(&tag_of_tag, ObjectType::Tree)
            .unwrap();
        assert_eq!(store.get_tree(&tree_hash).unwrap(), tree::decode_tree(&tree_bytes).unwrap());

        let commit_bytes = store
            .read_with_reference_resolution(&tag_of_tag, ObjectType::Commit)
            .unwrap();
        assert!(commit_bytes.starts_with(b"tree "));

        // A commit never leads to a blob.
        assert!(matches!(
            store.read_with_reference_resolution(&tag_of_tag, ObjectType::Blob),
            Err(Error::InvalidObjectType { .. })
        ));
    }

    #[test]
    fn test_find_by_prefix() {
        let (_tmp, store) = store();
        let hash = store.write_object(ObjectType::Blob, b"prefixed").unwrap();
        let hex = hash.to_hex();

        assert_eq!(store.find_by_prefix(&hex[..8]).unwrap(), Some(hash));
        assert_eq!(store.find_by_prefix(&hex.to_uppercase()[..10]).unwrap(), Some(hash));
        assert!(store.find_by_prefix(&hex[..3]).is_err());
        assert!(store.find_by_prefix("zzzz").is_err());

        let other = if hex.starts_with("00") { "ffff" } else { "0000" };
        assert_eq!(store.find_by_prefix(other).unwrap(), None);
    }

    #[test]
    fn test_find_by_prefix_ambiguous() {
        let (_tmp, store) = store();
        // Two files in one shard sharing a 4-character prefix.
        let shard = store.objects_dir().join("ab");
        fs::create_dir_all(&shard).unwrap();
        fs::write(shard.join(format!("cd{}", "0".repeat(HEX_LEN - 4))), b"").unwrap();
        fs::write(shard.join(format!("cd{}", "1".repeat(HEX_LEN - 4))), b"").unwrap();

        assert!(matches!(
            store.find_by_prefix("abcd"),
            Err(Error::AmbiguousObjectName { .. })
        ));
        assert!(store.find_by_prefix(&format!("abcd{}", "1".repeat(4))).unwrap().is_some());
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 32,
            ..ProptestConfig::default()
        })]

        /// The reported size always equals the stored content length,
        /// on either side of the compression threshold.
        #[test]
        fn prop_size_matches_content(data in prop::collection::vec(any::<u8>(), 0..10_000)) {
            let (_tmp, store) = store();
            let hash = store.write_object(ObjectType::Blob, &data)?;
            prop_assert_eq!(store.get_metadata(&hash, false)?.size, data.len() as u64);
            prop_assert_eq!(store.read_raw(&hash)?.0, data);
        }
    }
}
