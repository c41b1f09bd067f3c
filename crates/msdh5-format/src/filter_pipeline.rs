//! Filter pipeline message parsing (message type 0x000B).

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use crate::error::FormatError;
use crate::util::{ensure_len, read_u16, read_u32};

/// Zlib deflate.
pub const FILTER_DEFLATE: u16 = 1;
/// Byte shuffle.
pub const FILTER_SHUFFLE: u16 = 2;
/// Fletcher32 checksum.
pub const FILTER_FLETCHER32: u16 = 3;

/// Filter flag bit: the filter may be skipped when it fails.
pub const FLAG_OPTIONAL: u16 = 0x0001;

/// One filter in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDescription {
    /// Filter identification value.
    pub filter_id: u16,
    /// Optional name.
    pub name: Option<String>,
    /// Filter flags.
    pub flags: u16,
    /// Client data values.
    pub client_data: Vec<u32>,
}

/// Ordered filters applied to every chunk on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPipeline {
    /// Filters in write order.
    pub filters: Vec<FilterDescription>,
}

fn read_filter_name(data: &[u8], pos: usize, len: usize) -> Result<String, FormatError> {
    ensure_len(data, pos, len)?;
    let raw = &data[pos..pos + len];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

impl FilterPipeline {
    /// Parse a pipeline message body (versions 1 and 2).
    pub fn parse(data: &[u8]) -> Result<FilterPipeline, FormatError> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        let count = data[1] as usize;
        let mut pos = match version {
            // version(1) count(1) reserved(6)
            1 => 8,
            2 => 2,
            v => return Err(FormatError::InvalidFilterPipelineVersion(v)),
        };

        let mut filters = Vec::with_capacity(count);
        for _ in 0..count {
            let filter_id = read_u16(data, pos)?;
            pos += 2;
            let name_len = if version == 1 || filter_id >= 256 {
                let n = read_u16(data, pos)? as usize;
                pos += 2;
                n
            } else {
                0
            };
            let flags = read_u16(data, pos)?;
            let values = read_u16(data, pos + 2)? as usize;
            pos += 4;

            let name = if name_len > 0 {
                let name = read_filter_name(data, pos, name_len)?;
                // v1 names are padded to a multiple of eight
                pos += if version == 1 { (name_len + 7) & !7 } else { name_len };
                Some(name)
            } else {
                None
            };

            let mut client_data = Vec::with_capacity(values);
            for _ in 0..values {
                client_data.push(read_u32(data, pos)?);
                pos += 4;
            }
            if version == 1 && values % 2 == 1 {
                pos += 4;
            }

            filters.push(FilterDescription {
                filter_id,
                name,
                flags,
                client_data,
            });
        }
        Ok(FilterPipeline { filters })
    }
}
