//! Local heap parsing. Old-style groups keep their link names here.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::error::FormatError;
use crate::util::{ensure_len, read_uint, to_index};

/// Parsed local heap header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalHeap {
    /// Size of the data segment in bytes.
    pub data_segment_size: u64,
    /// Address of the data segment.
    pub data_segment_address: u64,
}

impl LocalHeap {
    /// Parse the heap header at `offset`.
    pub fn parse(
        data: &[u8],
        offset: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<LocalHeap, FormatError> {
        // signature(4) version(1) reserved(3) size(L) free-list(L) address(O)
        let ls = length_size as usize;
        ensure_len(data, offset, 8 + 2 * ls + offset_size as usize)?;
        if &data[offset..offset + 4] != b"HEAP" {
            return Err(FormatError::InvalidLocalHeapSignature);
        }
        let version = data[offset + 4];
        if version != 0 {
            return Err(FormatError::InvalidLocalHeapVersion(version));
        }
        Ok(LocalHeap {
            data_segment_size: read_uint(data, offset + 8, length_size)?,
            data_segment_address: read_uint(data, offset + 8 + 2 * ls, offset_size)?,
        })
    }

    /// Read the NUL-terminated name at `name_offset` in the data segment.
    pub fn read_name(&self, data: &[u8], name_offset: u64) -> Result<String, FormatError> {
        let seg_start = to_index(self.data_segment_address)?;
        let seg_len = to_index(self.data_segment_size)?;
        ensure_len(data, seg_start, seg_len)?;
        let segment = &data[seg_start..seg_start + seg_len];

        let start = to_index(name_offset)?;
        if start >= segment.len() {
            return Err(FormatError::UnexpectedEof {
                expected: seg_start.saturating_add(start) + 1,
                available: seg_start + segment.len(),
            });
        }
        let len = segment[start..].iter().position(|&b| b == 0).ok_or(
            FormatError::UnexpectedEof {
                expected: seg_start + segment.len() + 1,
                available: seg_start + segment.len(),
            },
        )?;
        core::str::from_utf8(&segment[start..start + len])
            .map(String::from)
            .map_err(|_| FormatError::InvalidLinkName(name_offset))
    }
}
