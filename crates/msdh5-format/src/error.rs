//! Error types for HDF5 structure parsing.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use core::fmt;

/// Errors raised while decoding the on-disk structures of a song file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The HDF5 magic signature was not found at any valid offset.
    SignatureNotFound,
    /// The superblock version is not one of the old-style versions (0, 1).
    UnsupportedVersion(u8),
    /// A structure extends past the end of the file image.
    UnexpectedEof {
        /// Byte position one past the last byte that was needed.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
    /// Invalid offset size (must be 2, 4, or 8).
    InvalidOffsetSize(u8),
    /// Invalid length size (must be 2, 4, or 8).
    InvalidLengthSize(u8),
    /// Object header version other than 1.
    UnsupportedObjectHeaderVersion(u8),
    /// Unknown message type that is marked as must-understand.
    UnsupportedMessage(u16),
    /// An object header continuation points back at a block already visited.
    ContinuationLoop(u64),
    /// B-tree node without the `TREE` signature.
    InvalidBTreeSignature,
    /// B-tree node of the wrong kind (0 = group, 1 = raw data chunks).
    InvalidBTreeNodeType(u8),
    /// A child B-tree node does not sit exactly one level below its parent.
    InvalidBTreeLevel {
        /// Level the child was expected to have.
        expected: u8,
        /// Level found in the child node.
        found: u8,
    },
    /// Symbol table node without the `SNOD` signature.
    InvalidSymbolTableNodeSignature,
    /// Symbol table node version other than 1.
    InvalidSymbolTableNodeVersion(u8),
    /// Local heap without the `HEAP` signature.
    InvalidLocalHeapSignature,
    /// Local heap version other than 0.
    InvalidLocalHeapVersion(u8),
    /// A link name in the local heap is not valid UTF-8.
    InvalidLinkName(u64),
    /// Datatype class this reader does not decode.
    UnsupportedDatatypeClass(u8),
    /// Invalid datatype version for a given class.
    InvalidDatatypeVersion {
        /// Datatype class.
        class: u8,
        /// Version found.
        version: u8,
    },
    /// Invalid string padding type.
    InvalidStringPadding(u8),
    /// Invalid character set.
    InvalidCharacterSet(u8),
    /// Invalid dataspace version.
    InvalidDataspaceVersion(u8),
    /// Invalid dataspace type (v2).
    InvalidDataspaceType(u8),
    /// Invalid data layout version (only version 3 is written for song files).
    InvalidLayoutVersion(u8),
    /// Invalid data layout class.
    InvalidLayoutClass(u8),
    /// Invalid filter pipeline version.
    InvalidFilterPipelineVersion(u8),
    /// Filter ID without a decoder.
    UnsupportedFilter(u16),
    /// A filter rejected its input.
    FilterError(String),
    /// Zlib stream could not be inflated.
    DecompressionError(String),
    /// Fletcher32 checksum stored with a chunk does not match its payload.
    Fletcher32Mismatch {
        /// Checksum stored in the chunk.
        expected: u32,
        /// Checksum computed over the payload.
        computed: u32,
    },
    /// Raw data of a different class than the conversion requested.
    TypeMismatch {
        /// Class the conversion accepts.
        expected: &'static str,
        /// Class the data actually has.
        actual: &'static str,
    },
    /// Stored byte count disagrees with dataspace × element size.
    DataSizeMismatch {
        /// Bytes implied by the dataspace and datatype.
        expected: usize,
        /// Bytes actually stored.
        actual: usize,
    },
    /// Chunk index and dataspace disagree.
    ChunkedReadError(String),
    /// An address or length does not fit in `usize`.
    AddressOverflow(u64),
    /// The dataspace needs more bytes than the dataset's storage can supply.
    DatasetTooLarge {
        /// Bytes implied by the dataspace and datatype.
        bytes: usize,
        /// Most bytes the storage can account for.
        limit: usize,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::SignatureNotFound => {
                write!(f, "HDF5 signature not found at any valid offset")
            }
            FormatError::UnsupportedVersion(v) => {
                write!(f, "unsupported superblock version: {v}")
            }
            FormatError::UnexpectedEof {
                expected,
                available,
            } => {
                write!(f, "unexpected EOF: need {expected} bytes, have {available}")
            }
            FormatError::InvalidOffsetSize(s) => {
                write!(f, "invalid offset size: {s} (must be 2, 4, or 8)")
            }
            FormatError::InvalidLengthSize(s) => {
                write!(f, "invalid length size: {s} (must be 2, 4, or 8)")
            }
            FormatError::UnsupportedObjectHeaderVersion(v) => {
                write!(f, "unsupported object header version: {v}")
            }
            FormatError::UnsupportedMessage(id) => {
                write!(
                    f,
                    "unsupported message type {id:#06x} marked as must-understand"
                )
            }
            FormatError::ContinuationLoop(addr) => {
                write!(f, "object header continuation loop at {addr:#x}")
            }
            FormatError::InvalidBTreeSignature => write!(f, "invalid B-tree node signature"),
            FormatError::InvalidBTreeNodeType(t) => write!(f, "unexpected B-tree node type: {t}"),
            FormatError::InvalidBTreeLevel { expected, found } => {
                write!(f, "B-tree child at level {found}, expected level {expected}")
            }
            FormatError::InvalidSymbolTableNodeSignature => {
                write!(f, "invalid symbol table node signature")
            }
            FormatError::InvalidSymbolTableNodeVersion(v) => {
                write!(f, "invalid symbol table node version: {v}")
            }
            FormatError::InvalidLocalHeapSignature => write!(f, "invalid local heap signature"),
            FormatError::InvalidLocalHeapVersion(v) => {
                write!(f, "invalid local heap version: {v}")
            }
            FormatError::InvalidLinkName(off) => {
                write!(f, "link name at heap offset {off} is not valid UTF-8")
            }
            FormatError::UnsupportedDatatypeClass(c) => {
                write!(f, "unsupported datatype class: {c}")
            }
            FormatError::InvalidDatatypeVersion { class, version } => {
                write!(f, "invalid version {version} for datatype class {class}")
            }
            FormatError::InvalidStringPadding(p) => write!(f, "invalid string padding: {p}"),
            FormatError::InvalidCharacterSet(c) => write!(f, "invalid character set: {c}"),
            FormatError::InvalidDataspaceVersion(v) => {
                write!(f, "invalid dataspace version: {v}")
            }
            FormatError::InvalidDataspaceType(t) => write!(f, "invalid dataspace type: {t}"),
            FormatError::InvalidLayoutVersion(v) => {
                write!(f, "unsupported data layout version: {v}")
            }
            FormatError::InvalidLayoutClass(c) => write!(f, "invalid data layout class: {c}"),
            FormatError::InvalidFilterPipelineVersion(v) => {
                write!(f, "invalid filter pipeline version: {v}")
            }
            FormatError::UnsupportedFilter(id) => write!(f, "unsupported filter: {id}"),
            FormatError::FilterError(msg) => write!(f, "filter error: {msg}"),
            FormatError::DecompressionError(msg) => write!(f, "decompression failed: {msg}"),
            FormatError::Fletcher32Mismatch { expected, computed } => {
                write!(
                    f,
                    "fletcher32 mismatch: stored {expected:#010x}, computed {computed:#010x}"
                )
            }
            FormatError::TypeMismatch { expected, actual } => {
                write!(f, "type mismatch: expected {expected}, found {actual}")
            }
            FormatError::DataSizeMismatch { expected, actual } => {
                write!(f, "data size mismatch: expected {expected} bytes, found {actual}")
            }
            FormatError::ChunkedReadError(msg) => write!(f, "chunked read error: {msg}"),
            FormatError::AddressOverflow(addr) => {
                write!(f, "address {addr:#x} does not fit in memory")
            }
            FormatError::DatasetTooLarge { bytes, limit } => {
                write!(f, "dataset needs {bytes} bytes, storage supplies at most {limit}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FormatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_positions() {
        let e = FormatError::UnexpectedEof {
            expected: 96,
            available: 40,
        };
        assert_eq!(e.to_string(), "unexpected EOF: need 96 bytes, have 40");
    }

    #[test]
    fn display_oversized_reads() {
        assert_eq!(
            FormatError::AddressOverflow(1 << 40).to_string(),
            "address 0x10000000000 does not fit in memory"
        );
        let e = FormatError::DatasetTooLarge {
            bytes: 1 << 45,
            limit: 4096,
        };
        assert_eq!(
            e.to_string(),
            "dataset needs 35184372088832 bytes, storage supplies at most 4096"
        );
    }

    #[test]
    fn display_filter_ids_and_checksums() {
        assert_eq!(
            FormatError::UnsupportedFilter(32001).to_string(),
            "unsupported filter: 32001"
        );
        let e = FormatError::Fletcher32Mismatch {
            expected: 0x1234,
            computed: 0xabcd,
        };
        assert_eq!(
            e.to_string(),
            "fletcher32 mismatch: stored 0x00001234, computed 0x0000abcd"
        );
    }
}
