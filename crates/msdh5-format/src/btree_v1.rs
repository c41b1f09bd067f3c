//! Version 1 B-tree traversal.
//!
//! Old-style files use one B-tree flavour for two jobs: type 0 nodes index a
//! group's symbol table nodes, type 1 nodes index the chunks of a dataset.
//! Only the leaf level carries payload addresses; internal levels are walked
//! depth-first so leaves come back in key order.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::error::FormatError;
use crate::util::{ensure_len, read_address, read_u16, read_uint, to_index};

/// Node type for group B-trees.
pub const NODE_TYPE_GROUP: u8 = 0;
/// Node type for raw data chunk B-trees.
pub const NODE_TYPE_CHUNK: u8 = 1;

/// A parsed B-tree v1 node.
#[derive(Debug, Clone)]
pub struct BTreeV1Node {
    /// 0 = group, 1 = raw data chunks.
    pub node_type: u8,
    /// 0 for leaves.
    pub node_level: u8,
    /// Left sibling, if any.
    pub left_sibling: Option<u64>,
    /// Right sibling, if any.
    pub right_sibling: Option<u64>,
    /// Absolute file position of each key (`children.len() + 1` keys).
    pub key_positions: Vec<usize>,
    /// Child addresses.
    pub children: Vec<u64>,
}

impl BTreeV1Node {
    /// Parse the node at `offset` whose keys are `key_size` bytes wide.
    pub fn parse(
        data: &[u8],
        offset: usize,
        offset_size: u8,
        key_size: usize,
    ) -> Result<BTreeV1Node, FormatError> {
        let os = offset_size as usize;
        // signature(4) type(1) level(1) entries(2) left(O) right(O)
        ensure_len(data, offset, 8 + 2 * os)?;
        if &data[offset..offset + 4] != b"TREE" {
            return Err(FormatError::InvalidBTreeSignature);
        }
        let node_type = data[offset + 4];
        let node_level = data[offset + 5];
        let entries = read_u16(data, offset + 6)? as usize;
        let left_sibling = read_address(data, offset + 8, offset_size)?;
        let right_sibling = read_address(data, offset + 8 + os, offset_size)?;

        // key[0] child[0] key[1] ... child[n-1] key[n]
        let mut pos = offset + 8 + 2 * os;
        ensure_len(data, pos, entries * (key_size + os) + key_size)?;
        let mut key_positions = Vec::with_capacity(entries + 1);
        let mut children = Vec::with_capacity(entries);
        for _ in 0..entries {
            key_positions.push(pos);
            pos += key_size;
            children.push(read_uint(data, pos, offset_size)?);
            pos += os;
        }
        key_positions.push(pos);

        Ok(BTreeV1Node {
            node_type,
            node_level,
            left_sibling,
            right_sibling,
            key_positions,
            children,
        })
    }
}

/// Collect `(key position, child address)` for every leaf entry under `root`.
///
/// Each child must sit exactly one level below its parent, which also rules
/// out cycles.
pub fn collect_leaf_entries(
    data: &[u8],
    root: u64,
    node_type: u8,
    offset_size: u8,
    key_size: usize,
) -> Result<Vec<(usize, u64)>, FormatError> {
    let mut out = Vec::new();
    visit(data, root, node_type, None, offset_size, key_size, &mut out)?;
    Ok(out)
}

fn visit(
    data: &[u8],
    address: u64,
    node_type: u8,
    expected_level: Option<u8>,
    offset_size: u8,
    key_size: usize,
    out: &mut Vec<(usize, u64)>,
) -> Result<(), FormatError> {
    let node = BTreeV1Node::parse(data, to_index(address)?, offset_size, key_size)?;
    if node.node_type != node_type {
        return Err(FormatError::InvalidBTreeNodeType(node.node_type));
    }
    if let Some(expected) = expected_level {
        if node.node_level != expected {
            return Err(FormatError::InvalidBTreeLevel {
                expected,
                found: node.node_level,
            });
        }
    }

    if node.node_level == 0 {
        out.extend(node.key_positions.iter().copied().zip(node.children.iter().copied()));
        return Ok(());
    }
    for &child in &node.children {
        visit(
            data,
            child,
            node_type,
            Some(node.node_level - 1),
            offset_size,
            key_size,
            out,
        )?;
    }
    Ok(())
}

/// Addresses of all symbol table nodes of a group, in name order.
pub fn collect_symbol_table_nodes(
    data: &[u8],
    btree_address: u64,
    offset_size: u8,
    length_size: u8,
) -> Result<Vec<u64>, FormatError> {
    // group keys are local heap offsets
    let leaves = collect_leaf_entries(
        data,
        btree_address,
        NODE_TYPE_GROUP,
        offset_size,
        length_size as usize,
    )?;
    Ok(leaves.into_iter().map(|(_, child)| child).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_node(node_type: u8, level: u8, keys: &[u64], children: &[u64]) -> Vec<u8> {
        assert_eq!(keys.len(), children.len() + 1);
        let mut buf = b"TREE".to_vec();
        buf.push(node_type);
        buf.push(level);
        buf.extend_from_slice(&(children.len() as u16).to_le_bytes());
        buf.extend_from_slice(&u64::MAX.to_le_bytes());
        buf.extend_from_slice(&u64::MAX.to_le_bytes());
        for (k, c) in keys.iter().zip(children) {
            buf.extend_from_slice(&k.to_le_bytes());
            buf.extend_from_slice(&c.to_le_bytes());
        }
        buf.extend_from_slice(&keys[keys.len() - 1].to_le_bytes());
        buf
    }

    #[test]
    fn leaf_node() {
        let data = build_node(0, 0, &[0, 8, 24], &[500, 900]);
        let node = BTreeV1Node::parse(&data, 0, 8, 8).unwrap();
        assert_eq!(node.node_type, 0);
        assert_eq!(node.node_level, 0);
        assert_eq!(node.left_sibling, None);
        assert_eq!(node.children, vec![500, 900]);
        assert_eq!(node.key_positions, vec![24, 40, 56]);
        assert_eq!(
            collect_symbol_table_nodes(&data, 0, 8, 8).unwrap(),
            vec![500, 900]
        );
    }

    #[test]
    fn internal_node_recurses_in_order() {
        let mut data = build_node(0, 1, &[0, 16, 32], &[0, 0]);
        let leaf_a = data.len() as u64;
        data.extend(build_node(0, 0, &[0, 8], &[1000]));
        let leaf_b = data.len() as u64;
        data.extend(build_node(0, 0, &[16, 24], &[2000]));
        // patch child addresses of the root
        data[32..40].copy_from_slice(&leaf_a.to_le_bytes());
        data[48..56].copy_from_slice(&leaf_b.to_le_bytes());

        assert_eq!(
            collect_symbol_table_nodes(&data, 0, 8, 8).unwrap(),
            vec![1000, 2000]
        );
    }

    #[test]
    fn self_referencing_node_fails() {
        let data = build_node(0, 1, &[0, 8], &[0]);
        assert_eq!(
            collect_symbol_table_nodes(&data, 0, 8, 8).unwrap_err(),
            FormatError::InvalidBTreeLevel {
                expected: 0,
                found: 1
            }
        );
    }

    #[test]
    fn wrong_node_type() {
        let data = build_node(1, 0, &[0, 0], &[64]);
        assert_eq!(
            collect_symbol_table_nodes(&data, 0, 8, 8).unwrap_err(),
            FormatError::InvalidBTreeNodeType(1)
        );
    }

    #[test]
    fn bad_signature() {
        let mut data = build_node(0, 0, &[0], &[]);
        data[0] = b'X';
        assert_eq!(
            BTreeV1Node::parse(&data, 0, 8, 8).unwrap_err(),
            FormatError::InvalidBTreeSignature
        );
    }
}
