//! Old-style group traversal: symbol table → B-tree → SNODs → heap names.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use crate::btree_v1::collect_symbol_table_nodes;
use crate::error::FormatError;
use crate::local_heap::LocalHeap;
use crate::message_type::MessageType;
use crate::object_header::ObjectHeader;
use crate::symbol_table::{SymbolTableMessage, SymbolTableNode};
use crate::util::to_index;

/// A resolved link inside a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    /// Link name.
    pub name: String,
    /// Address of the child's object header.
    pub object_header_address: u64,
    /// Scratch-pad cache type (1 marks a child group).
    pub cache_type: u32,
}

/// Resolve every link of the group described by `sym_table`.
pub fn resolve_v1_group_entries(
    data: &[u8],
    sym_table: &SymbolTableMessage,
    offset_size: u8,
    length_size: u8,
) -> Result<Vec<GroupEntry>, FormatError> {
    let heap = LocalHeap::parse(
        data,
        to_index(sym_table.local_heap_address)?,
        offset_size,
        length_size,
    )?;
    let snods = collect_symbol_table_nodes(data, sym_table.btree_address, offset_size, length_size)?;

    let mut entries = Vec::new();
    for addr in snods {
        let node = SymbolTableNode::parse(data, to_index(addr)?, offset_size)?;
        for entry in node.entries {
            entries.push(GroupEntry {
                name: heap.read_name(data, entry.link_name_offset)?,
                object_header_address: entry.object_header_address,
                cache_type: entry.cache_type,
            });
        }
    }
    Ok(entries)
}

/// The Symbol Table message of a group's object header, if it has one.
pub fn symbol_table_message(
    header: &ObjectHeader,
    offset_size: u8,
) -> Result<Option<SymbolTableMessage>, FormatError> {
    header
        .find(MessageType::SymbolTable)
        .map(|msg| SymbolTableMessage::parse(&msg.data, offset_size))
        .transpose()
}

/// Look up a link by name.
pub fn find_entry<'a>(entries: &'a [GroupEntry], name: &str) -> Option<&'a GroupEntry> {
    entries.iter().find(|e| e.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Heap at 0, heap data at 32, SNOD after, B-tree leaf last.
    fn build_group(children: &[(&str, u64)]) -> (Vec<u8>, SymbolTableMessage) {
        let mut segment = vec![0u8; 8];
        let mut name_offsets = Vec::new();
        for (name, _) in children {
            name_offsets.push(segment.len() as u64);
            segment.extend_from_slice(name.as_bytes());
            segment.push(0);
            segment.resize((segment.len() + 7) & !7, 0);
        }

        let mut data = b"HEAP\0\0\0\0".to_vec();
        data.extend_from_slice(&(segment.len() as u64).to_le_bytes());
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        data.extend_from_slice(&32u64.to_le_bytes());
        data.extend_from_slice(&segment);

        let snod_addr = data.len() as u64;
        data.extend_from_slice(b"SNOD\x01\x00");
        data.extend_from_slice(&(children.len() as u16).to_le_bytes());
        for ((_, addr), off) in children.iter().zip(&name_offsets) {
            data.extend_from_slice(&off.to_le_bytes());
            data.extend_from_slice(&addr.to_le_bytes());
            data.extend_from_slice(&[0; 24]);
        }

        let btree_addr = data.len() as u64;
        data.extend_from_slice(b"TREE\x00\x00\x01\x00");
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());
        data.extend_from_slice(&snod_addr.to_le_bytes());
        data.extend_from_slice(&name_offsets.last().copied().unwrap_or(0).to_le_bytes());

        (
            data,
            SymbolTableMessage {
                btree_address: btree_addr,
                local_heap_address: 0,
            },
        )
    }

    #[test]
    fn resolves_names_and_addresses() {
        let (data, stm) = build_group(&[("analysis", 1000), ("metadata", 2000), ("musicbrainz", 3000)]);
        let entries = resolve_v1_group_entries(&data, &stm, 8, 8).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["analysis", "metadata", "musicbrainz"]);
        assert_eq!(find_entry(&entries, "metadata").unwrap().object_header_address, 2000);
        assert!(find_entry(&entries, "songs").is_none());
    }

    #[test]
    fn broken_heap_address() {
        let (data, mut stm) = build_group(&[("songs", 64)]);
        stm.local_heap_address = 8;
        assert_eq!(
            resolve_v1_group_entries(&data, &stm, 8, 8).unwrap_err(),
            FormatError::InvalidLocalHeapSignature
        );
    }
}
