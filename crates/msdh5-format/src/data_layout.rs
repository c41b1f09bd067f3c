//! Data layout message parsing (message type 0x0008, version 3).

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::error::FormatError;
use crate::util::{ensure_len, read_address, read_u16, read_u32, read_uint};

/// Where a dataset's raw data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLayout {
    /// Raw data stored inline in the message.
    Compact {
        /// The inline bytes.
        data: Vec<u8>,
    },
    /// One contiguous block in the file.
    Contiguous {
        /// Address of the block, `None` if never allocated.
        address: Option<u64>,
        /// Size of the block in bytes.
        size: u64,
    },
    /// Chunks indexed by a type 1 B-tree.
    Chunked {
        /// Chunk shape; the last entry is the element size in bytes.
        chunk_dimensions: Vec<u32>,
        /// B-tree address, `None` if no chunk was ever written.
        btree_address: Option<u64>,
    },
}

impl DataLayout {
    /// Parse a layout message body.
    pub fn parse(data: &[u8], offset_size: u8, length_size: u8) -> Result<DataLayout, FormatError> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        if version != 3 {
            return Err(FormatError::InvalidLayoutVersion(version));
        }
        let os = offset_size as usize;
        match data[1] {
            0 => {
                let size = read_u16(data, 2)? as usize;
                ensure_len(data, 4, size)?;
                Ok(DataLayout::Compact {
                    data: data[4..4 + size].to_vec(),
                })
            }
            1 => Ok(DataLayout::Contiguous {
                address: read_address(data, 2, offset_size)?,
                size: read_uint(data, 2 + os, length_size)?,
            }),
            2 => {
                ensure_len(data, 2, 1)?;
                let dimensionality = data[2] as usize;
                let btree_address = read_address(data, 3, offset_size)?;
                let mut pos = 3 + os;
                let mut chunk_dimensions = Vec::with_capacity(dimensionality);
                for _ in 0..dimensionality {
                    chunk_dimensions.push(read_u32(data, pos)?);
                    pos += 4;
                }
                Ok(DataLayout::Chunked {
                    chunk_dimensions,
                    btree_address,
                })
            }
            class => Err(FormatError::InvalidLayoutClass(class)),
        }
    }
}
