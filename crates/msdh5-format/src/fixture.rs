//! Synthetic song-file writer for tests and benches.
//!
//! Produces the same old-style structures PyTables leaves on disk: a version 0
//! superblock, symbol-table groups with local heaps, version 1 object headers
//! and version 3 layouts, with every dataset either contiguous or chunked
//! through a shuffle/deflate/fletcher32 pipeline. Data is appended bottom-up,
//! children before their parents, and the superblock is patched last.

use crate::datatype::{CharacterSet, CompoundMember, Datatype, DatatypeByteOrder, StringPadding};
use crate::error::FormatError;
use crate::filter_pipeline::{
    FilterDescription, FilterPipeline, FILTER_DEFLATE, FILTER_FLETCHER32, FILTER_SHUFFLE,
    FLAG_OPTIONAL,
};
use crate::filters::encode_chunk;
use crate::signature::HDF5_SIGNATURE;

const UNDEF: u64 = u64::MAX;
const SUPERBLOCK_SIZE: usize = 96;
const GROUP_LEAF_K: usize = 4;
const GROUP_INTERNAL_K: u16 = 16;
const SNOD_ENTRY_SIZE: usize = 40;

const MSG_DATASPACE: u16 = 0x0001;
const MSG_DATATYPE: u16 = 0x0003;
const MSG_LAYOUT: u16 = 0x0008;
const MSG_PIPELINE: u16 = 0x000B;
const MSG_CONTINUATION: u16 = 0x0010;
const MSG_SYMBOL_TABLE: u16 = 0x0011;

/// How dataset bytes are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// One contiguous block per dataset.
    Contiguous,
    /// Row chunks indexed by a chunk B-tree, optionally filtered.
    Chunked {
        /// Rows per chunk (at least 1).
        chunk_rows: u64,
        /// Apply the byte shuffle filter.
        shuffle: bool,
        /// Deflate at this level.
        deflate: Option<u32>,
        /// Append a fletcher32 checksum to every chunk.
        fletcher32: bool,
    },
}

impl Storage {
    /// Chunked, shuffled and deflated at level 1, the way PyTables writes song files.
    pub fn pytables() -> Storage {
        Storage::Chunked {
            chunk_rows: 2,
            shuffle: true,
            deflate: Some(1),
            fletcher32: false,
        }
    }
}

enum ColumnData {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Str {
        width: u32,
        padding: StringPadding,
        values: Vec<String>,
    },
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::F64(v) => v.len(),
            ColumnData::F32(v) => v.len(),
            ColumnData::I32(v) => v.len(),
            ColumnData::I64(v) => v.len(),
            ColumnData::Str { values, .. } => values.len(),
        }
    }

    fn datatype(&self) -> Datatype {
        match self {
            ColumnData::F64(_) => f64_type(),
            ColumnData::F32(_) => float_type(4),
            ColumnData::I32(_) => int_type(4),
            ColumnData::I64(_) => int_type(8),
            ColumnData::Str { width, padding, .. } => string_type(*width, *padding),
        }
    }

    /// Stored bytes of row `row`; zeros past the end of the column.
    fn cell(&self, row: usize) -> Vec<u8> {
        match self {
            ColumnData::F64(v) => v.get(row).copied().unwrap_or(0.0).to_le_bytes().to_vec(),
            ColumnData::F32(v) => v.get(row).copied().unwrap_or(0.0).to_le_bytes().to_vec(),
            ColumnData::I32(v) => v.get(row).copied().unwrap_or(0).to_le_bytes().to_vec(),
            ColumnData::I64(v) => v.get(row).copied().unwrap_or(0).to_le_bytes().to_vec(),
            ColumnData::Str {
                width,
                padding,
                values,
            } => string_slot(values.get(row).map_or("", String::as_str), *width, *padding),
        }
    }
}

struct ArrayFixture {
    datatype: Datatype,
    dims: Vec<u64>,
    bytes: Vec<u8>,
}

/// One group: an optional `songs` table, array datasets and subgroups.
#[derive(Default)]
pub struct GroupFixture {
    columns: Vec<(String, ColumnData)>,
    has_table: bool,
    arrays: Vec<(String, ArrayFixture)>,
    groups: Vec<(String, GroupFixture)>,
}

impl GroupFixture {
    fn column(&mut self, name: &str, data: ColumnData) -> &mut Self {
        self.has_table = true;
        self.columns.retain(|(n, _)| n != name);
        self.columns.push((name.to_string(), data));
        self
    }

    fn array(&mut self, name: &str, array: ArrayFixture) -> &mut Self {
        self.remove(name);
        self.arrays.push((name.to_string(), array));
        self
    }

    /// Declare an empty `songs` table (zero rows until columns are added).
    pub fn empty_table(&mut self) -> &mut Self {
        self.has_table = true;
        self
    }

    /// 64-bit float column.
    pub fn float_column(&mut self, name: &str, values: &[f64]) -> &mut Self {
        self.column(name, ColumnData::F64(values.to_vec()))
    }

    /// 32-bit float column.
    pub fn f32_column(&mut self, name: &str, values: &[f32]) -> &mut Self {
        self.column(name, ColumnData::F32(values.to_vec()))
    }

    /// 32-bit signed integer column.
    pub fn int_column(&mut self, name: &str, values: &[i32]) -> &mut Self {
        self.column(name, ColumnData::I32(values.to_vec()))
    }

    /// 64-bit signed integer column.
    pub fn i64_column(&mut self, name: &str, values: &[i64]) -> &mut Self {
        self.column(name, ColumnData::I64(values.to_vec()))
    }

    /// NUL-padded fixed-width string column. Longer values are cut at `width`.
    pub fn string_column(&mut self, name: &str, width: u32, values: &[&str]) -> &mut Self {
        self.string_column_padded(name, width, StringPadding::NullPad, values)
    }

    /// Fixed-width string column with an explicit padding mode.
    pub fn string_column_padded(
        &mut self,
        name: &str,
        width: u32,
        padding: StringPadding,
        values: &[&str],
    ) -> &mut Self {
        let values = values.iter().map(|s| s.to_string()).collect();
        self.column(
            name,
            ColumnData::Str {
                width,
                padding,
                values,
            },
        )
    }

    /// Float64 array dataset of shape `dims`; missing values are zero.
    pub fn float_array(&mut self, name: &str, dims: &[u64], values: &[f64]) -> &mut Self {
        let bytes = fill(dims, 8, values.iter().flat_map(|v| v.to_le_bytes()));
        self.array(
            name,
            ArrayFixture {
                datatype: f64_type(),
                dims: dims.to_vec(),
                bytes,
            },
        )
    }

    /// Int32 array dataset of shape `dims`; missing values are zero.
    pub fn int_array(&mut self, name: &str, dims: &[u64], values: &[i32]) -> &mut Self {
        let bytes = fill(dims, 4, values.iter().flat_map(|v| v.to_le_bytes()));
        self.array(
            name,
            ArrayFixture {
                datatype: int_type(4),
                dims: dims.to_vec(),
                bytes,
            },
        )
    }

    /// One-dimensional NUL-padded string array with `width`-byte slots.
    pub fn string_array(&mut self, name: &str, width: u32, values: &[&str]) -> &mut Self {
        self.string_array_padded(name, width, StringPadding::NullPad, values)
    }

    /// One-dimensional string array with an explicit padding mode.
    pub fn string_array_padded(
        &mut self,
        name: &str,
        width: u32,
        padding: StringPadding,
        values: &[&str],
    ) -> &mut Self {
        let bytes = values
            .iter()
            .flat_map(|s| string_slot(s, width, padding))
            .collect();
        self.array(
            name,
            ArrayFixture {
                datatype: string_type(width, padding),
                dims: vec![values.len() as u64],
                bytes,
            },
        )
    }

    /// Child group, created on first use.
    pub fn subgroup(&mut self, name: &str) -> &mut GroupFixture {
        let pos = match self.groups.iter().position(|(n, _)| n == name) {
            Some(pos) => pos,
            None => {
                self.remove(name);
                self.groups.push((name.to_string(), GroupFixture::default()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[pos].1
    }

    /// Drop a child or a table column of that name.
    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.arrays.retain(|(n, _)| n != name);
        self.groups.retain(|(n, _)| n != name);
        self.columns.retain(|(n, _)| n != name);
        self
    }

    fn rows(&self) -> usize {
        self.columns.iter().map(|(_, c)| c.len()).max().unwrap_or(0)
    }

    fn write(&self, w: &mut Writer, storage: Storage) -> Result<GroupAddrs, FormatError> {
        let mut links: Vec<Link> = Vec::new();

        if self.has_table {
            let mut offset = 0u64;
            let mut members = Vec::with_capacity(self.columns.len());
            for (name, col) in &self.columns {
                let dt = col.datatype();
                let size = dt.type_size() as u64;
                members.push(CompoundMember {
                    name: name.clone(),
                    byte_offset: offset,
                    datatype: dt,
                });
                offset += size;
            }
            let compound = Datatype::Compound {
                size: offset as u32,
                members,
            };
            let rows = self.rows();
            let mut bytes = Vec::with_capacity(rows * offset as usize);
            for row in 0..rows {
                for (_, col) in &self.columns {
                    bytes.extend_from_slice(&col.cell(row));
                }
            }
            let address = w.dataset(&compound, &[rows as u64], &bytes, storage, true)?;
            links.push(Link::object("songs", address));
        }

        for (name, a) in &self.arrays {
            let address = w.dataset(&a.datatype, &a.dims, &a.bytes, storage, false)?;
            links.push(Link::object(name, address));
        }
        for (name, g) in &self.groups {
            let addrs = g.write(w, storage)?;
            links.push(Link {
                name: name.clone(),
                address: addrs.header,
                scratch: Some((addrs.btree, addrs.heap)),
            });
        }
        w.group(links)
    }
}

/// Builds a complete song-shaped file image.
pub struct FixtureBuilder {
    root: GroupFixture,
    storage: Storage,
}

impl Default for FixtureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureBuilder {
    /// Empty file with contiguous storage.
    pub fn new() -> Self {
        FixtureBuilder {
            root: GroupFixture::default(),
            storage: Storage::Contiguous,
        }
    }

    /// Storage used for every dataset.
    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    /// The root group.
    pub fn root_mut(&mut self) -> &mut GroupFixture {
        &mut self.root
    }

    /// A top-level group, created on first use.
    pub fn group_mut(&mut self, name: &str) -> &mut GroupFixture {
        self.root.subgroup(name)
    }

    /// Serialize the file image.
    pub fn build(&self) -> Result<Vec<u8>, FormatError> {
        let mut w = Writer {
            buf: vec![0u8; SUPERBLOCK_SIZE],
        };
        let root = self.root.write(&mut w, self.storage)?;
        let eof = w.buf.len() as u64;
        write_superblock(&mut w.buf[..SUPERBLOCK_SIZE], &root, eof);
        Ok(w.buf)
    }

    /// Serialize and write to `path`.
    #[cfg(feature = "std")]
    pub fn write(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let bytes = self
            .build()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, bytes)
    }
}

/// A fully populated single-song file covering every field song files carry.
pub fn sample_song() -> FixtureBuilder {
    let mut b = FixtureBuilder::new();

    b.group_mut("metadata")
        .string_column("analyzer_version", 32, &[""])
        .int_column("artist_7digitalid", &[4069])
        .float_column("artist_familiarity", &[0.649822])
        .float_column("artist_hotttnesss", &[0.394032])
        .string_column("artist_id", 32, &["ARYZTJS1187B98C555"])
        .float_column("artist_latitude", &[52.48093])
        .string_column("artist_location", 1024, &["Birmingham, England"])
        .float_column("artist_longitude", &[-1.89086])
        .string_column("artist_mbid", 40, &["357ff05d-848a-44cf-b608-cb34b5701ae5"])
        .string_column("artist_name", 1024, &["Test Artist"])
        .int_column("artist_playmeid", &[1338])
        .string_column("genre", 1024, &[""])
        .int_column("idx_artist_terms", &[0])
        .int_column("idx_similar_artists", &[0])
        .string_column("release", 1024, &["Test Release"])
        .int_column("release_7digitalid", &[633681])
        .float_column("song_hotttnesss", &[0.542899])
        .string_column("song_id", 32, &["SOQMMHC12AB0180CB8"])
        .string_column("title", 1024, &["Test Title"])
        .int_column("track_7digitalid", &[7032331])
        .string_array("artist_terms", 256, &["rock", "indie", "alternative"])
        .float_array("artist_terms_freq", &[3], &[1.0, 0.8, 0.6])
        .float_array("artist_terms_weight", &[3], &[1.0, 0.9, 0.7])
        .string_array("similar_artists", 20, &["AR001", "AR002", "AR003"]);

    let pitches: Vec<f64> = (0..36).map(|i| (i % 12) as f64 / 12.0).collect();
    let timbre: Vec<f64> = (0..36).map(|i| i as f64 - 18.0).collect();
    b.group_mut("analysis")
        .int_column("analysis_sample_rate", &[22050])
        .string_column("audio_md5", 32, &["aee9820911781c734e7694c5432990ca"])
        .float_column("danceability", &[0.0])
        .float_column("duration", &[215.5])
        .float_column("end_of_fade_in", &[0.25])
        .float_column("energy", &[0.0])
        .int_column("idx_bars_confidence", &[0])
        .int_column("idx_segments_start", &[0])
        .int_column("key", &[5])
        .float_column("key_confidence", &[0.6])
        .float_column("loudness", &[-7.5])
        .int_column("mode", &[1])
        .float_column("mode_confidence", &[0.45])
        .float_column("start_of_fade_out", &[210.0])
        .float_column("tempo", &[120.0])
        .int_column("time_signature", &[4])
        .float_column("time_signature_confidence", &[0.9])
        .string_column("track_id", 32, &["TRAAAAW128F429D538"])
        .float_array("bars_start", &[2], &[0.5, 2.5])
        .float_array("bars_confidence", &[2], &[0.3, 0.4])
        .float_array("beats_start", &[4], &[0.5, 1.0, 1.5, 2.0])
        .float_array("beats_confidence", &[4], &[0.9, 0.8, 0.7, 0.6])
        .float_array("sections_start", &[1], &[0.0])
        .float_array("sections_confidence", &[1], &[1.0])
        .float_array("segments_start", &[3], &[0.0, 0.5, 1.2])
        .float_array("segments_confidence", &[3], &[0.9, 0.8, 0.7])
        .float_array("segments_loudness_max", &[3], &[-20.0, -15.0, -10.0])
        .float_array("segments_loudness_max_time", &[3], &[0.1, 0.2, 0.1])
        .float_array("segments_loudness_start", &[3], &[-60.0, -30.0, -25.0])
        .float_array("segments_pitches", &[3, 12], &pitches)
        .float_array("segments_timbre", &[3, 12], &timbre)
        .float_array("tatums_start", &[0], &[])
        .float_array("tatums_confidence", &[0], &[]);

    b.group_mut("musicbrainz")
        .int_column("idx_artist_mbtags", &[0])
        .int_column("year", &[1999])
        .string_array("artist_mbtags", 256, &["british", "rock"])
        .int_array("artist_mbtags_count", &[2], &[3, 1]);

    b
}

// ---- encoding helpers ----

fn f64_type() -> Datatype {
    float_type(8)
}

fn float_type(size: u32) -> Datatype {
    Datatype::FloatingPoint {
        size,
        byte_order: DatatypeByteOrder::LittleEndian,
    }
}

fn int_type(size: u32) -> Datatype {
    Datatype::FixedPoint {
        size,
        byte_order: DatatypeByteOrder::LittleEndian,
        signed: true,
    }
}

fn string_type(width: u32, padding: StringPadding) -> Datatype {
    Datatype::String {
        size: width,
        padding,
        charset: CharacterSet::Ascii,
    }
}

fn string_slot(value: &str, width: u32, padding: StringPadding) -> Vec<u8> {
    let width = width as usize;
    let pad = if padding == StringPadding::SpacePad {
        b' '
    } else {
        0
    };
    let mut slot = value.as_bytes()[..value.len().min(width)].to_vec();
    slot.resize(width, pad);
    slot
}

fn fill(dims: &[u64], elem: usize, bytes: impl Iterator<Item = u8>) -> Vec<u8> {
    let len = dims.iter().product::<u64>() as usize * elem;
    let mut out: Vec<u8> = bytes.take(len).collect();
    out.resize(len, 0);
    out
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn pad8(buf: &mut Vec<u8>) {
    let padded = (buf.len() + 7) & !7;
    buf.resize(padded, 0);
}

fn encode_datatype(dt: &Datatype) -> Vec<u8> {
    let mut b = Vec::new();
    match dt {
        Datatype::FixedPoint {
            size,
            byte_order,
            signed,
        } => {
            let bf0 = order_bit(*byte_order) | if *signed { 0x08 } else { 0 };
            b.extend_from_slice(&[0x10, bf0, 0, 0]);
            put_u32(&mut b, *size);
            put_u16(&mut b, 0);
            put_u16(&mut b, (*size * 8) as u16);
        }
        Datatype::FloatingPoint { size, byte_order } => {
            // implied mantissa msb, IEEE layout for the given width
            let (sign, exp_loc, exp_size, mant_size, bias) = if *size == 4 {
                (31u8, 23u8, 8u8, 23u8, 127u32)
            } else {
                (63, 52, 11, 52, 1023)
            };
            b.extend_from_slice(&[0x11, 0x20 | order_bit(*byte_order), sign, 0]);
            put_u32(&mut b, *size);
            put_u16(&mut b, 0);
            put_u16(&mut b, (*size * 8) as u16);
            b.extend_from_slice(&[exp_loc, exp_size, 0, mant_size]);
            put_u32(&mut b, bias);
        }
        Datatype::String {
            size,
            padding,
            charset,
        } => {
            let pad = match padding {
                StringPadding::NullTerminate => 0,
                StringPadding::NullPad => 1,
                StringPadding::SpacePad => 2,
            };
            let cset = match charset {
                CharacterSet::Ascii => 0,
                CharacterSet::Utf8 => 1,
            };
            b.extend_from_slice(&[0x13, pad | (cset << 4), 0, 0]);
            put_u32(&mut b, *size);
        }
        Datatype::Compound { size, members } => {
            let n = members.len();
            b.extend_from_slice(&[0x16, (n & 0xFF) as u8, (n >> 8) as u8, 0]);
            put_u32(&mut b, *size);
            for m in members {
                b.extend_from_slice(m.name.as_bytes());
                b.push(0);
                pad8(&mut b);
                put_u32(&mut b, m.byte_offset as u32);
                // rank(1) reserved(3) permutation(4) reserved(4) dims(16)
                b.extend_from_slice(&[0; 28]);
                b.extend_from_slice(&encode_datatype(&m.datatype));
            }
        }
        Datatype::Array {
            base_type,
            dimensions,
        } => {
            b.extend_from_slice(&[0x3A, 0, 0, 0]);
            put_u32(&mut b, dt.type_size());
            b.push(dimensions.len() as u8);
            for d in dimensions {
                put_u32(&mut b, *d);
            }
            b.extend_from_slice(&encode_datatype(base_type));
        }
    }
    b
}

fn order_bit(order: DatatypeByteOrder) -> u8 {
    match order {
        DatatypeByteOrder::LittleEndian => 0,
        DatatypeByteOrder::BigEndian => 1,
    }
}

fn encode_dataspace(dims: &[u64], max: Option<&[u64]>) -> Vec<u8> {
    let mut b = vec![1, dims.len() as u8, max.is_some() as u8, 0, 0, 0, 0, 0];
    for d in dims {
        put_u64(&mut b, *d);
    }
    for d in max.unwrap_or(&[]) {
        put_u64(&mut b, *d);
    }
    b
}

fn pipeline_for(storage: Storage) -> Option<FilterPipeline> {
    let Storage::Chunked {
        shuffle,
        deflate,
        fletcher32,
        ..
    } = storage
    else {
        return None;
    };
    let mut filters = Vec::new();
    if shuffle {
        filters.push(FilterDescription {
            filter_id: FILTER_SHUFFLE,
            name: Some("shuffle".into()),
            flags: FLAG_OPTIONAL,
            client_data: Vec::new(),
        });
    }
    if let Some(level) = deflate {
        filters.push(FilterDescription {
            filter_id: FILTER_DEFLATE,
            name: Some("deflate".into()),
            flags: FLAG_OPTIONAL,
            client_data: vec![level],
        });
    }
    if fletcher32 {
        filters.push(FilterDescription {
            filter_id: FILTER_FLETCHER32,
            name: Some("fletcher32".into()),
            flags: 0,
            client_data: Vec::new(),
        });
    }
    (!filters.is_empty()).then_some(FilterPipeline { filters })
}

fn encode_pipeline(pipeline: &FilterPipeline) -> Vec<u8> {
    let mut b = vec![1, pipeline.filters.len() as u8, 0, 0, 0, 0, 0, 0];
    for f in &pipeline.filters {
        let name = f.name.as_deref().unwrap_or("");
        let name_len = if name.is_empty() {
            0
        } else {
            (name.len() + 8) & !7
        };
        put_u16(&mut b, f.filter_id);
        put_u16(&mut b, name_len as u16);
        put_u16(&mut b, f.flags);
        put_u16(&mut b, f.client_data.len() as u16);
        if name_len > 0 {
            let start = b.len();
            b.extend_from_slice(name.as_bytes());
            b.resize(start + name_len, 0);
        }
        for v in &f.client_data {
            put_u32(&mut b, *v);
        }
        if f.client_data.len() % 2 == 1 {
            put_u32(&mut b, 0);
        }
    }
    b
}

fn encode_messages(messages: &[(u16, u8, Vec<u8>)]) -> Vec<u8> {
    let mut block = Vec::new();
    for (msg_type, flags, body) in messages {
        let padded = (body.len() + 7) & !7;
        put_u16(&mut block, *msg_type);
        put_u16(&mut block, padded as u16);
        block.push(*flags);
        block.extend_from_slice(&[0; 3]);
        block.extend_from_slice(body);
        block.resize(block.len() + padded - body.len(), 0);
    }
    block
}

fn write_superblock(sb: &mut [u8], root: &GroupAddrs, eof: u64) {
    let mut b = HDF5_SIGNATURE.to_vec();
    // versions: superblock, free-space, root symbol table, reserved, shared header
    b.extend_from_slice(&[0, 0, 0, 0, 0]);
    b.extend_from_slice(&[8, 8, 0]);
    put_u16(&mut b, GROUP_LEAF_K as u16);
    put_u16(&mut b, GROUP_INTERNAL_K);
    put_u32(&mut b, 0);
    put_u64(&mut b, 0);
    put_u64(&mut b, UNDEF);
    put_u64(&mut b, eof);
    put_u64(&mut b, UNDEF);
    // root symbol table entry
    put_u64(&mut b, 0);
    put_u64(&mut b, root.header);
    put_u32(&mut b, 1);
    put_u32(&mut b, 0);
    put_u64(&mut b, root.btree);
    put_u64(&mut b, root.heap);
    sb.copy_from_slice(&b);
}

struct GroupAddrs {
    header: u64,
    btree: u64,
    heap: u64,
}

struct Link {
    name: String,
    address: u64,
    scratch: Option<(u64, u64)>,
}

impl Link {
    fn object(name: &str, address: u64) -> Link {
        Link {
            name: name.to_string(),
            address,
            scratch: None,
        }
    }
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Append at the next 8-byte boundary and return the address.
    fn append(&mut self, bytes: &[u8]) -> u64 {
        pad8(&mut self.buf);
        let addr = self.buf.len() as u64;
        self.buf.extend_from_slice(bytes);
        addr
    }

    fn object_header(&mut self, messages: &[(u16, u8, Vec<u8>)], split: bool) -> u64 {
        let mut count = messages.len();
        let block = if split && messages.len() > 1 {
            let cont = encode_messages(&messages[1..]);
            let cont_addr = self.append(&cont);
            let mut body = Vec::new();
            put_u64(&mut body, cont_addr);
            put_u64(&mut body, cont.len() as u64);
            count += 1;
            let mut head = messages[..1].to_vec();
            head.push((MSG_CONTINUATION, 0, body));
            encode_messages(&head)
        } else {
            encode_messages(messages)
        };

        let mut h = vec![1, 0];
        put_u16(&mut h, count as u16);
        put_u32(&mut h, 1);
        put_u32(&mut h, block.len() as u32);
        put_u32(&mut h, 0);
        h.extend_from_slice(&block);
        self.append(&h)
    }

    fn dataset(
        &mut self,
        datatype: &Datatype,
        dims: &[u64],
        bytes: &[u8],
        storage: Storage,
        split_header: bool,
    ) -> Result<u64, FormatError> {
        let elem = datatype.type_size();
        let pipeline = pipeline_for(storage);

        let (space, layout) = match storage {
            Storage::Contiguous => {
                let mut layout = vec![3, 1];
                if bytes.is_empty() {
                    put_u64(&mut layout, UNDEF);
                    put_u64(&mut layout, 0);
                } else {
                    put_u64(&mut layout, self.append(bytes));
                    put_u64(&mut layout, bytes.len() as u64);
                }
                (encode_dataspace(dims, None), layout)
            }
            Storage::Chunked { chunk_rows, .. } => {
                let chunk_rows = chunk_rows.max(1);
                let row_elems: u64 = dims.iter().skip(1).product();
                let row_bytes = row_elems as usize * elem as usize;
                let chunk_len = chunk_rows as usize * row_bytes;

                let btree = if bytes.is_empty() || row_bytes == 0 {
                    UNDEF
                } else {
                    let mut chunks = Vec::new();
                    for (i, rows) in bytes.chunks(chunk_len).enumerate() {
                        let mut raw = rows.to_vec();
                        raw.resize(chunk_len, 0);
                        let stored = match &pipeline {
                            Some(pl) => encode_chunk(&raw, pl, elem as usize)?,
                            None => raw,
                        };
                        let addr = self.append(&stored);
                        chunks.push((stored.len() as u32, i as u64 * chunk_rows, addr));
                    }
                    self.chunk_btree(&chunks, dims)
                };

                let mut layout = vec![3, 2, dims.len() as u8 + 1];
                put_u64(&mut layout, btree);
                put_u32(&mut layout, chunk_rows as u32);
                for d in dims.iter().skip(1) {
                    put_u32(&mut layout, *d as u32);
                }
                put_u32(&mut layout, elem);

                let mut max = dims.to_vec();
                if let Some(first) = max.first_mut() {
                    *first = UNDEF;
                }
                (encode_dataspace(dims, Some(&max)), layout)
            }
        };

        let mut messages = vec![
            (MSG_DATASPACE, 0, space),
            (MSG_DATATYPE, 1, encode_datatype(datatype)),
            (MSG_LAYOUT, 0, layout),
        ];
        if let Some(pl) = &pipeline {
            messages.push((MSG_PIPELINE, 0, encode_pipeline(pl)));
        }
        Ok(self.object_header(&messages, split_header))
    }

    /// Single leaf chunk B-tree; `chunks` holds (stored size, first row, address).
    fn chunk_btree(&mut self, chunks: &[(u32, u64, u64)], dims: &[u64]) -> u64 {
        let mut b = b"TREE".to_vec();
        b.extend_from_slice(&[1, 0]);
        put_u16(&mut b, chunks.len() as u16);
        put_u64(&mut b, UNDEF);
        put_u64(&mut b, UNDEF);
        for &(size, row, addr) in chunks {
            put_u32(&mut b, size);
            put_u32(&mut b, 0);
            put_u64(&mut b, row);
            for _ in 0..dims.len() {
                put_u64(&mut b, 0);
            }
            put_u64(&mut b, addr);
        }
        put_u32(&mut b, 0);
        put_u32(&mut b, 0);
        for d in dims {
            put_u64(&mut b, *d);
        }
        put_u64(&mut b, 0);
        self.append(&b)
    }

    fn group(&mut self, mut links: Vec<Link>) -> Result<GroupAddrs, FormatError> {
        links.sort_by(|a, b| a.name.cmp(&b.name));

        // offset 0 holds the empty name
        let mut segment = vec![0u8; 8];
        let mut name_offsets = Vec::with_capacity(links.len());
        for link in &links {
            name_offsets.push(segment.len() as u64);
            segment.extend_from_slice(link.name.as_bytes());
            segment.push(0);
            pad8(&mut segment);
        }
        let segment_addr = self.append(&segment);
        let mut heap = b"HEAP".to_vec();
        heap.extend_from_slice(&[0, 0, 0, 0]);
        put_u64(&mut heap, segment.len() as u64);
        put_u64(&mut heap, UNDEF);
        put_u64(&mut heap, segment_addr);
        let heap_addr = self.append(&heap);

        let capacity = 2 * GROUP_LEAF_K;
        let mut snods = Vec::new();
        for (chunk_idx, chunk) in links.chunks(capacity).enumerate() {
            let mut node = b"SNOD".to_vec();
            node.extend_from_slice(&[1, 0]);
            put_u16(&mut node, chunk.len() as u16);
            for (i, link) in chunk.iter().enumerate() {
                put_u64(&mut node, name_offsets[chunk_idx * capacity + i]);
                put_u64(&mut node, link.address);
                match link.scratch {
                    Some((btree, heap)) => {
                        put_u32(&mut node, 1);
                        put_u32(&mut node, 0);
                        put_u64(&mut node, btree);
                        put_u64(&mut node, heap);
                    }
                    None => node.extend_from_slice(&[0; 24]),
                }
            }
            node.resize(8 + capacity * SNOD_ENTRY_SIZE, 0);
            let last_name = name_offsets[chunk_idx * capacity + chunk.len() - 1];
            snods.push((self.append(&node), last_name));
        }

        let mut tree = b"TREE".to_vec();
        tree.extend_from_slice(&[0, 0]);
        put_u16(&mut tree, snods.len() as u16);
        put_u64(&mut tree, UNDEF);
        put_u64(&mut tree, UNDEF);
        put_u64(&mut tree, 0);
        for (addr, last_name) in &snods {
            put_u64(&mut tree, *addr);
            put_u64(&mut tree, *last_name);
        }
        let btree_addr = self.append(&tree);

        let mut stab = Vec::new();
        put_u64(&mut stab, btree_addr);
        put_u64(&mut stab, heap_addr);
        let header = self.object_header(&[(MSG_SYMBOL_TABLE, 0, stab)], false);
        Ok(GroupAddrs {
            header,
            btree: btree_addr,
            heap: heap_addr,
        })
    }
}
