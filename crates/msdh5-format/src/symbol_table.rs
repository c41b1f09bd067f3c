//! Symbol Table message and Symbol Table Node (SNOD) parsing.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::error::FormatError;
use crate::util::{ensure_len, read_u16, read_u32, read_uint};

/// Symbol Table message (type 0x0011) carried by every old-style group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTableMessage {
    /// Address of the group's B-tree (type 0).
    pub btree_address: u64,
    /// Address of the group's local heap.
    pub local_heap_address: u64,
}

impl SymbolTableMessage {
    /// Parse the message body.
    pub fn parse(data: &[u8], offset_size: u8) -> Result<SymbolTableMessage, FormatError> {
        let os = offset_size as usize;
        Ok(SymbolTableMessage {
            btree_address: read_uint(data, 0, offset_size)?,
            local_heap_address: read_uint(data, os, offset_size)?,
        })
    }
}

/// One link stored in a symbol table node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableEntry {
    /// Offset of the link name in the group's local heap.
    pub link_name_offset: u64,
    /// Address of the child's object header.
    pub object_header_address: u64,
    /// Scratch-pad cache type: 0 = none, 1 = group, 2 = soft link.
    pub cache_type: u32,
}

/// A parsed symbol table node.
#[derive(Debug, Clone)]
pub struct SymbolTableNode {
    /// Entries in name order.
    pub entries: Vec<SymbolTableEntry>,
}

impl SymbolTableNode {
    /// Parse the node at `offset`.
    pub fn parse(
        data: &[u8],
        offset: usize,
        offset_size: u8,
    ) -> Result<SymbolTableNode, FormatError> {
        // signature(4) version(1) reserved(1) symbols(2)
        ensure_len(data, offset, 8)?;
        if &data[offset..offset + 4] != b"SNOD" {
            return Err(FormatError::InvalidSymbolTableNodeSignature);
        }
        let version = data[offset + 4];
        if version != 1 {
            return Err(FormatError::InvalidSymbolTableNodeVersion(version));
        }
        let count = read_u16(data, offset + 6)? as usize;

        let os = offset_size as usize;
        // name offset, header address, cache type(4), reserved(4), scratch(16)
        let entry_size = 2 * os + 24;
        let start = offset + 8;
        ensure_len(data, start, count * entry_size)?;

        let entries = (0..count)
            .map(|i| {
                let pos = start + i * entry_size;
                Ok(SymbolTableEntry {
                    link_name_offset: read_uint(data, pos, offset_size)?,
                    object_header_address: read_uint(data, pos + os, offset_size)?,
                    cache_type: read_u32(data, pos + 2 * os)?,
                })
            })
            .collect::<Result<Vec<_>, FormatError>>()?;

        Ok(SymbolTableNode { entries })
    }
}
