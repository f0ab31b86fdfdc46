//! Object model and the binary object file header.
//!
//! Every object file starts with a 16-byte header followed by the payload:
//!
//! ```text
//! 0x00  4   "OSCT" magic
//! 0x04  1   version (u8) = 1
//! 0x05  1   type: 1=blob, 2=tree, 3=commit, 4=tag
//! 0x06  1   algo: 1=blake3-256
//! 0x07  1   compression: 0=none, 1=zstd
//! 0x08  8   content size (u64 LE) - uncompressed
//! 0x10  ... payload
//! ```

use crate::error::{Error, Result};
use crate::hash::{Algorithm, Hash};
use crate::tree::{FileMode, file_modes};
use std::fmt;

/// Magic bytes at the start of every object file.
pub const MAGIC: &[u8; 4] = b"OSCT";

/// Current object format version.
pub const VERSION: u8 = 1;

/// Size of the object header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Object types.
///
/// `Unknown` carries a header type id outside the standard set. Stores only
/// hand it out when the caller explicitly allows unknown types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// Raw file content.
    Blob,
    /// Directory listing.
    Tree,
    /// Snapshot plus metadata.
    Commit,
    /// Annotated reference to another object.
    Tag,
    /// A type id this build does not know about.
    Unknown(u8),
}

impl ObjectType {
    /// Convert to byte representation.
    pub fn to_u8(self) -> u8 {
        match self {
            ObjectType::Blob => 1,
            ObjectType::Tree => 2,
            ObjectType::Commit => 3,
            ObjectType::Tag => 4,
            ObjectType::Unknown(id) => id,
        }
    }

    /// Parse from byte representation. Never fails; unrecognised ids map to `Unknown`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ObjectType::Blob,
            2 => ObjectType::Tree,
            3 => ObjectType::Commit,
            4 => ObjectType::Tag,
            other => ObjectType::Unknown(other),
        }
    }

    /// Parse one of the standard type names.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            "tag" => Ok(ObjectType::Tag),
            _ => Err(Error::invalid_object_type("blob, tree, commit or tag", name)),
        }
    }

    /// Whether this is one of the four standard types.
    pub fn is_known(self) -> bool {
        !matches!(self, ObjectType::Unknown(_))
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectType::Blob => f.write_str("blob"),
            ObjectType::Tree => f.write_str("tree"),
            ObjectType::Commit => f.write_str("commit"),
            ObjectType::Tag => f.write_str("tag"),
            ObjectType::Unknown(id) => write!(f, "unknown-{}", id),
        }
    }
}

/// Type and size of a stored object, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Object type.
    pub object_type: ObjectType,
    /// Uncompressed content size in bytes.
    pub size: u64,
}

impl ObjectMetadata {
    pub fn new(object_type: ObjectType, size: u64) -> Self {
        Self { object_type, size }
    }
}

/// An object reference after name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedObject {
    /// The object's id.
    pub hash: Hash,
    /// Path recorded from a `<rev>:<path>` reference.
    pub path: Option<String>,
    /// Mode of the tree entry the object was reached through.
    pub mode: FileMode,
}

impl ResolvedObject {
    /// A bare object lookup: no path, regular-file mode.
    pub fn bare(hash: Hash) -> Self {
        Self {
            hash,
            path: None,
            mode: file_modes::REGULAR,
        }
    }
}

/// Compression types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// No compression.
    None = 0,
    /// Zstandard compression.
    Zstd = 1,
}

impl CompressionType {
    /// Convert to byte representation.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse from byte representation.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Zstd),
            _ => Err(Error::compression_error(format!(
                "Invalid compression type: {}",
                value
            ))),
        }
    }
}

/// A 16-byte object header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    pub version: u8,
    pub object_type: ObjectType,
    pub algorithm: Algorithm,
    pub compression: CompressionType,
    /// Content size before compression.
    pub size: u64,
}

impl ObjectHeader {
    /// Create a new object header.
    pub fn new(
        object_type: ObjectType,
        algorithm: Algorithm,
        compression: CompressionType,
        size: u64,
    ) -> Self {
        Self {
            version: VERSION,
            object_type,
            algorithm,
            compression,
            size,
        }
    }

    /// Encode the header to a 16-byte array.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version;
        buf[5] = self.object_type.to_u8();
        buf[6] = self.algorithm.id();
        buf[7] = self.compression.to_u8();
        buf[8..16].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    /// Decode a header from the first 16 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::invalid_header(format!(
                "Header too short: {} bytes (expected {})",
                buf.len(),
                HEADER_SIZE
            )));
        }

        if &buf[0..4] != MAGIC {
            return Err(Error::invalid_header(format!(
                "Invalid magic: expected {:?}, got {:?}",
                MAGIC,
                &buf[0..4]
            )));
        }

        let version = buf[4];
        if version != VERSION {
            return Err(Error::invalid_header(format!(
                "Unsupported version: {} (expected {})",
                version, VERSION
            )));
        }

        let object_type = ObjectType::from_u8(buf[5]);
        let algorithm = Algorithm::from_id(buf[6])?;
        let compression = CompressionType::from_u8(buf[7])?;

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&buf[8..16]);
        let size = u64::from_le_bytes(len_bytes);

        Ok(Self {
            version,
            object_type,
            algorithm,
            compression,
            size,
        })
    }

    pub fn metadata(&self) -> ObjectMetadata {
        ObjectMetadata::new(self.object_type, self.size)
    }
}

/// Find the value of a `<field> <value>` line in the header block of a
/// commit or tag payload. The header block ends at the first blank line.
pub fn header_field<'a>(payload: &'a [u8], field: &str) -> Option<&'a [u8]> {
    for line in payload.split(|&b| b == b'\n') {
        if line.is_empty() {
            break;
        }
        if let Some(rest) = line.strip_prefix(field.as_bytes())
            && let Some(value) = rest.strip_prefix(b" ")
        {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_type_conversions() {
        assert_eq!(ObjectType::Blob.to_u8(), 1);
        assert_eq!(ObjectType::Tag.to_u8(), 4);
        assert_eq!(ObjectType::from_u8(3), ObjectType::Commit);
        assert_eq!(ObjectType::from_u8(9), ObjectType::Unknown(9));
        assert!(!ObjectType::from_u8(0).is_known());
    }

    #[test]
    fn test_object_type_names() {
        assert_eq!(ObjectType::Commit.to_string(), "commit");
        assert_eq!(ObjectType::Unknown(7).to_string(), "unknown-7");
        assert_eq!(ObjectType::parse("tag").unwrap(), ObjectType::Tag);
        assert!(ObjectType::parse("unknown-7").is_err());
    }

    #[test]
    fn test_header_decode_invalid_magic() {
        let mut buf = ObjectHeader::new(
            ObjectType::Blob,
            Algorithm::Blake3,
            CompressionType::None,
            5,
        )
        .encode();
        buf[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            ObjectHeader::decode(&buf),
            Err(Error::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_header_decode_keeps_unknown_type() {
        let header = ObjectHeader::new(
            ObjectType::Unknown(42),
            Algorithm::Blake3,
            CompressionType::None,
            3,
        );
        let decoded = ObjectHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded.object_type, ObjectType::Unknown(42));
    }

    #[test]
    fn test_header_decode_invalid_compression() {
        let mut buf = ObjectHeader::new(
            ObjectType::Blob,
            Algorithm::Blake3,
            CompressionType::None,
            0,
        )
        .encode();
        buf[7] = 99;
        assert!(ObjectHeader::decode(&buf).is_err());
    }

    #[test]
    fn test_header_too_short() {
        assert!(ObjectHeader::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_header_field_stops_at_blank_line() {
        let payload = b"object abc\ntype blob\n\nobject not-a-header\n";
        assert_eq!(header_field(payload, "object"), Some(&b"abc"[..]));
        assert_eq!(header_field(payload, "type"), Some(&b"blob"[..]));
        assert_eq!(header_field(payload, "tagger"), None);
        assert_eq!(header_field(b"objectabc\n", "object"), None);
    }

    use proptest::prelude::*;

    fn arb_object_header() -> impl Strategy<Value = ObjectHeader> {
        (
            any::<u8>(),
            prop::sample::select(vec![CompressionType::None, CompressionType::Zstd]),
            any::<u64>(),
        )
            .prop_map(|(type_id, compression, size)| {
                ObjectHeader::new(
                    ObjectType::from_u8(type_id),
                    Algorithm::Blake3,
                    compression,
                    size,
                )
            })
    }

    proptest! {
        /// The header carries type, compression and size through encoding.
        #[test]
        fn prop_header_preserves_fields(header in arb_object_header()) {
            let decoded = ObjectHeader::decode(&header.encode())?;
            prop_assert_eq!(decoded.metadata(), header.metadata());
            prop_assert_eq!(decoded.compression, header.compression);
        }
    }
}
