//! Superblock parsing for the old-style layouts (versions 0 and 1).
//!
//! Song files are written by PyTables on top of HDF5 1.8 with default file
//! creation properties, which always yields a version 0 superblock whose root
//! group is described by a symbol table entry.

use crate::error::FormatError;
use crate::signature::HDF5_SIGNATURE;
use crate::util::{ensure_len, read_address, read_u16, read_u32, read_uint};

/// Parsed superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Superblock version (0 or 1).
    pub version: u8,
    /// Size of file addresses in bytes.
    pub offset_size: u8,
    /// Size of lengths in bytes.
    pub length_size: u8,
    /// Leaf node K for group B-trees.
    pub group_leaf_node_k: u16,
    /// Internal node K for group B-trees.
    pub group_internal_node_k: u16,
    /// Internal node K for chunk B-trees (version 1 only).
    pub indexed_storage_internal_node_k: Option<u16>,
    /// Absolute address that all other addresses are relative to.
    pub base_address: u64,
    /// End-of-file address recorded by the writer.
    pub eof_address: u64,
    /// Object header address of the root group.
    pub root_group_address: u64,
    /// Symbol table B-tree and heap cached in the root entry's scratch pad.
    pub root_cached_symbol_table: Option<(u64, u64)>,
}

fn validate_sizes(offset_size: u8, length_size: u8) -> Result<(), FormatError> {
    if !matches!(offset_size, 2 | 4 | 8) {
        return Err(FormatError::InvalidOffsetSize(offset_size));
    }
    if !matches!(length_size, 2 | 4 | 8) {
        return Err(FormatError::InvalidLengthSize(length_size));
    }
    Ok(())
}

impl Superblock {
    /// Parse the superblock whose signature starts at `signature_offset`.
    pub fn parse(data: &[u8], signature_offset: usize) -> Result<Superblock, FormatError> {
        ensure_len(data, signature_offset, 9)?;
        let d = &data[signature_offset..];
        if d[..8] != HDF5_SIGNATURE {
            return Err(FormatError::SignatureNotFound);
        }

        let version = d[8];
        // Fixed prefix: 24 bytes for v0, v1 adds the indexed storage K + 2 reserved.
        let fixed = match version {
            0 => 24,
            1 => 28,
            v => return Err(FormatError::UnsupportedVersion(v)),
        };
        ensure_len(d, 0, fixed)?;

        let offset_size = d[13];
        let length_size = d[14];
        validate_sizes(offset_size, length_size)?;

        let group_leaf_node_k = read_u16(d, 16)?;
        let group_internal_node_k = read_u16(d, 18)?;
        let indexed_storage_internal_node_k = if version == 1 {
            Some(read_u16(d, 20)?)
        } else {
            None
        };

        let os = offset_size as usize;
        // base, free-space, eof, driver-info addresses, then the root entry:
        // link name offset, header address, cache type, reserved, scratch(16).
        let mut pos = fixed;
        ensure_len(d, pos, 4 * os + 2 * os + 8 + 16)?;
        let base_address = read_uint(d, pos, offset_size)?;
        pos += 2 * os;
        let eof_address = read_uint(d, pos, offset_size)?;
        pos += 2 * os;

        pos += os; // root link name offset
        let root_group_address = read_uint(d, pos, offset_size)?;
        pos += os;
        let cache_type = read_u32(d, pos)?;
        pos += 8;
        let root_cached_symbol_table = if cache_type == 1 {
            match (
                read_address(d, pos, offset_size)?,
                read_address(d, pos + os, offset_size)?,
            ) {
                (Some(btree), Some(heap)) => Some((btree, heap)),
                _ => None,
            }
        } else {
            None
        };

        Ok(Superblock {
            version,
            offset_size,
            length_size,
            group_leaf_node_k,
            group_internal_node_k,
            indexed_storage_internal_node_k,
            base_address,
            eof_address,
            root_group_address,
            root_cached_symbol_table,
        })
    }
}
