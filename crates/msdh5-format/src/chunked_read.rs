//! Chunked dataset reading: type 1 B-tree traversal and chunk assembly.

#[cfg(not(feature = "std"))]
use alloc::{format, vec, vec::Vec};

use crate::btree_v1::{collect_leaf_entries, NODE_TYPE_CHUNK};
use crate::dataspace::Dataspace;
use crate::error::FormatError;
use crate::filter_pipeline::FilterPipeline;
use crate::filters::decode_chunk;
use crate::util::{ensure_fill_fits, ensure_len, read_u32, read_uint, to_index};

/// Location of one stored chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Stored (filtered) size in bytes.
    pub chunk_size: u32,
    /// Filters skipped for this chunk.
    pub filter_mask: u32,
    /// Element offset of the chunk in each dimension, plus a trailing 0.
    pub offsets: Vec<u64>,
    /// Address of the stored bytes.
    pub address: u64,
}

/// Collect every chunk indexed by the B-tree at `btree_address`.
///
/// `ndims` is the layout's dimensionality, i.e. dataset rank + 1.
pub fn collect_chunk_info(
    data: &[u8],
    btree_address: u64,
    ndims: usize,
    offset_size: u8,
) -> Result<Vec<ChunkInfo>, FormatError> {
    // size(4) filter mask(4) one 8-byte offset per dimension
    let key_size = 8 + 8 * ndims;
    let leaves = collect_leaf_entries(data, btree_address, NODE_TYPE_CHUNK, offset_size, key_size)?;
    leaves
        .into_iter()
        .map(|(key, address)| {
            let mut offsets = Vec::with_capacity(ndims);
            for d in 0..ndims {
                offsets.push(read_uint(data, key + 8 + 8 * d, 8)?);
            }
            Ok(ChunkInfo {
                chunk_size: read_u32(data, key)?,
                filter_mask: read_u32(data, key + 4)?,
                offsets,
                address,
            })
        })
        .collect()
}

/// Assemble the full dataset from its chunks.
///
/// Regions no chunk covers read as zeros, as does a dataset whose B-tree was
/// never allocated.
pub fn read_chunked_data(
    data: &[u8],
    chunk_dimensions: &[u32],
    btree_address: Option<u64>,
    dataspace: &Dataspace,
    element_size: usize,
    pipeline: Option<&FilterPipeline>,
    offset_size: u8,
) -> Result<Vec<u8>, FormatError> {
    let (last, spatial) = chunk_dimensions
        .split_last()
        .ok_or_else(|| FormatError::ChunkedReadError("layout has no dimensions".into()))?;
    if *last as usize != element_size {
        return Err(FormatError::ChunkedReadError(format!(
            "chunk element size {last} differs from datatype size {element_size}"
        )));
    }
    if spatial.len() != dataspace.rank() || spatial.contains(&0) {
        return Err(FormatError::ChunkedReadError(format!(
            "chunk shape {spatial:?} does not fit dataspace {:?}",
            dataspace.dimensions
        )));
    }

    let ds_dims = dataspace
        .dimensions
        .iter()
        .map(|&d| to_index(d))
        .collect::<Result<Vec<usize>, _>>()?;
    let chunk_dims: Vec<usize> = spatial.iter().map(|&d| d as usize).collect();
    let overflow = || FormatError::ChunkedReadError("dataset size overflows".into());
    let total = ds_dims
        .iter()
        .try_fold(element_size, |acc, &d| acc.checked_mul(d))
        .ok_or_else(overflow)?;
    let chunk_bytes = chunk_dims
        .iter()
        .try_fold(element_size, |acc, &d| acc.checked_mul(d))
        .ok_or_else(overflow)?;

    let chunks = match btree_address {
        Some(address) if total > 0 => {
            collect_chunk_info(data, address, chunk_dimensions.len(), offset_size)?
        }
        _ => Vec::new(),
    };
    // the output may not outgrow what the stored chunks can fill
    ensure_fill_fits(total, chunks.len().saturating_mul(chunk_bytes), data.len())?;
    let mut output = vec![0u8; total];

    for chunk in chunks {
        let start = to_index(chunk.address)?;
        let size = chunk.chunk_size as usize;
        ensure_len(data, start, size)?;
        let stored = &data[start..start + size];
        let decoded = match pipeline {
            Some(pl) => decode_chunk(stored, pl, chunk.filter_mask, element_size)?,
            None => stored.to_vec(),
        };
        copy_chunk(
            &decoded,
            &mut output,
            &chunk.offsets,
            &chunk_dims,
            &ds_dims,
            element_size,
        );
    }
    Ok(output)
}

/// Copy one decoded chunk into the row-major output, clipping at the
/// dataset edge. Runs along the fastest dimension are copied whole.
fn copy_chunk(
    chunk: &[u8],
    output: &mut [u8],
    offsets: &[u64],
    chunk_dims: &[usize],
    ds_dims: &[usize],
    elem: usize,
) {
    let rank = chunk_dims.len();
    if rank == 0 || offsets.len() < rank {
        return;
    }
    let last = rank - 1;
    let last_off = offsets[last] as usize;
    let run = chunk_dims[last].min(ds_dims[last].saturating_sub(last_off));
    if run == 0 {
        return;
    }

    let rows: usize = chunk_dims[..last].iter().product();
    let mut coord = vec![0usize; last];
    'rows: for row in 0..rows {
        let mut r = row;
        for d in (0..last).rev() {
            coord[d] = r % chunk_dims[d];
            r /= chunk_dims[d];
        }
        let mut dst = 0usize;
        for d in 0..last {
            let g = (offsets[d] as usize).saturating_add(coord[d]);
            if g >= ds_dims[d] {
                continue 'rows;
            }
            dst = dst * ds_dims[d] + g;
        }
        let dst = (dst * ds_dims[last] + last_off) * elem;
        let src = row * chunk_dims[last] * elem;
        if src >= chunk.len() {
            break;
        }
        let len = (run * elem).min(chunk.len().saturating_sub(src));
        if len > 0 && dst + len <= output.len() {
            output[dst..dst + len].copy_from_slice(&chunk[src..src + len]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataspace::DataspaceType;

    fn space(dims: &[u64]) -> Dataspace {
        Dataspace {
            space_type: DataspaceType::Simple,
            dimensions: dims.to_vec(),
            max_dimensions: None,
        }
    }

    /// Leaf B-tree at 0 followed by the raw chunks, unfiltered.
    fn build_chunked(chunks: &[(Vec<u64>, Vec<u8>)], ndims: usize) -> (Vec<u8>, u64) {
        let key_size = 8 + 8 * ndims;
        let header = 8 + 16;
        let node_len = header + chunks.len() * (key_size + 8) + key_size;
        let mut data = b"TREE\x01\x00".to_vec();
        data.extend_from_slice(&(chunks.len() as u16).to_le_bytes());
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        let mut addr = node_len as u64;
        for (offs, bytes) in chunks {
            data.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());
            for o in offs {
                data.extend_from_slice(&o.to_le_bytes());
            }
            data.extend_from_slice(&addr.to_le_bytes());
            addr += bytes.len() as u64;
        }
        data.extend_from_slice(&[0; 8]);
        data.extend(core::iter::repeat(0u8).take(8 * ndims));
        assert_eq!(data.len(), node_len);
        for (_, bytes) in chunks {
            data.extend_from_slice(bytes);
        }
        (data, 0)
    }

    fn f64s(vals: &[f64]) -> Vec<u8> {
        vals.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn one_dimension_with_partial_last_chunk() {
        // 5 rows in chunks of 2; the last chunk is padded on disk
        let (data, root) = build_chunked(
            &[
                (vec![0, 0], f64s(&[0.0, 0.5])),
                (vec![2, 0], f64s(&[1.2, 1.9])),
                (vec![4, 0], f64s(&[2.4, 0.0])),
            ],
            2,
        );
        let out = read_chunked_data(&data, &[2, 8], Some(root), &space(&[5]), 8, None, 8).unwrap();
        assert_eq!(out, f64s(&[0.0, 0.5, 1.2, 1.9, 2.4]));
    }

    #[test]
    fn two_dimensions_row_chunks() {
        // 3 x 12 matrix, 2-row chunks
        let rows: Vec<f64> = (0..36).map(|v| v as f64).collect();
        let mut second: Vec<f64> = rows[24..36].to_vec();
        second.extend(core::iter::repeat(0.0).take(12));
        let (data, root) = build_chunked(
            &[
                (vec![0, 0, 0], f64s(&rows[..24])),
                (vec![2, 0, 0], f64s(&second)),
            ],
            3,
        );
        let out =
            read_chunked_data(&data, &[2, 12, 8], Some(root), &space(&[3, 12]), 8, None, 8).unwrap();
        assert_eq!(out, f64s(&rows));
    }

    #[test]
    fn missing_chunks_read_as_zero() {
        let (data, root) = build_chunked(&[(vec![2, 0], f64s(&[7.0, 8.0]))], 2);
        let out = read_chunked_data(&data, &[2, 8], Some(root), &space(&[4]), 8, None, 8).unwrap();
        assert_eq!(out, f64s(&[0.0, 0.0, 7.0, 8.0]));

        let out = read_chunked_data(&[], &[2, 8], None, &space(&[3]), 8, None, 8).unwrap();
        assert_eq!(out, vec![0u8; 24]);
    }

    #[test]
    fn dataspace_larger_than_its_chunks() {
        let (data, root) = build_chunked(&[(vec![0, 0], f64s(&[1.0, 2.0]))], 2);
        let err = read_chunked_data(&data, &[2, 8], Some(root), &space(&[1 << 42]), 8, None, 8)
            .unwrap_err();
        assert!(matches!(
            err,
            FormatError::DatasetTooLarge {
                bytes,
                ..
            } if bytes == 8 << 42
        ));
        assert!(matches!(
            read_chunked_data(&[], &[2, 8], None, &space(&[1 << 42]), 8, None, 8),
            Err(FormatError::DatasetTooLarge { .. })
        ));
    }

    #[test]
    fn shape_checks() {
        assert!(matches!(
            read_chunked_data(&[], &[2, 4], None, &space(&[3]), 8, None, 8),
            Err(FormatError::ChunkedReadError(_))
        ));
        assert!(matches!(
            read_chunked_data(&[], &[2, 2, 8], None, &space(&[3]), 8, None, 8),
            Err(FormatError::ChunkedReadError(_))
        ));
        assert!(matches!(
            read_chunked_data(&[], &[], None, &space(&[3]), 8, None, 8),
            Err(FormatError::ChunkedReadError(_))
        ));
    }

    #[test]
    fn chunk_past_end_of_file() {
        let (mut data, root) = build_chunked(&[(vec![0, 0], f64s(&[1.0, 2.0]))], 2);
        data.truncate(data.len() - 4);
        assert!(matches!(
            read_chunked_data(&data, &[2, 8], Some(root), &space(&[2]), 8, None, 8),
            Err(FormatError::UnexpectedEof { .. })
        ));
    }
}
