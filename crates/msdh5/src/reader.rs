//! [`RecordReader`]: typed reads of one song record.
//!
//! A reader resolves the superblock and the three field groups once, at open.
//! Every read then parses the target dataset's object header, decodes what it
//! needs and drops that state before returning; nothing is cached between
//! reads.

use std::path::Path;

use msdh5_format::data_layout::DataLayout;
use msdh5_format::data_read::{
    compound_member_bytes, element_as_f64, element_as_i64, read_as_f64, read_raw_data,
};
use msdh5_format::dataspace::Dataspace;
use msdh5_format::datatype::Datatype;
use msdh5_format::error::FormatError;
use msdh5_format::filter_pipeline::FilterPipeline;
use msdh5_format::message_type::MessageType;
use msdh5_format::object_header::ObjectHeader;
use msdh5_format::signature::find_signature;
use msdh5_format::superblock::Superblock;
use tracing::{debug, trace, warn};

use crate::error::{Error, FileError, SchemaError};
use crate::group::{to_usize, GroupHandle, SongGroup, SongGroups};
use crate::storage::FileData;
use crate::strings::{clamp_scalar, split_packed, to_word_slots};

/// Name of the per-group table holding the scalar fields.
pub const SONGS_TABLE: &str = "songs";

/// Columns of the fixed-width-12 arrays (`segments_pitches`, `segments_timbre`).
pub const MATRIX_COLUMNS: u64 = 12;

/// An open song file.
///
/// The file is opened read-only and released when the reader is dropped or
/// [`close`](RecordReader::close)d.
pub struct RecordReader {
    data: FileData,
    /// Offset of the superblock; file addresses are relative to it.
    base: usize,
    superblock: Superblock,
    groups: SongGroups,
    source: String,
}

/// The header messages of one dataset, parsed for a single read.
struct DatasetHeader {
    dataspace: Dataspace,
    datatype: Datatype,
    layout: DataLayout,
    pipeline: Option<FilterPipeline>,
}

impl RecordReader {
    /// Open the song file at `path`.
    ///
    /// The file is memory-mapped when the `mmap` feature is enabled (the
    /// default), otherwise read into memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<RecordReader, Error> {
        let path = path.as_ref();
        let data = FileData::open(path)?;
        Self::from_data(data, path.display().to_string())
    }

    /// Open a song file image held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<RecordReader, Error> {
        Self::from_data(FileData::Owned(bytes), "<memory>".to_string())
    }

    fn from_data(data: FileData, source: String) -> Result<RecordReader, Error> {
        let bytes = data.as_bytes();
        let base = find_signature(bytes).map_err(FileError::NotHdf5)?;
        let superblock = Superblock::parse(bytes, base).map_err(FileError::NotHdf5)?;
        let groups = SongGroups::resolve(&bytes[base..], &superblock)?;
        debug!(
            source = %source,
            size = data.len(),
            superblock = superblock.version,
            mmap = data.is_mmap(),
            "opened song file"
        );
        Ok(RecordReader {
            data,
            base,
            superblock,
            groups,
            source,
        })
    }

    /// Release the file now. Dropping the reader has the same effect.
    pub fn close(self) {
        debug!(source = %self.source, "closing song file");
    }

    /// The resolved handle of one field group.
    pub fn group(&self, group: SongGroup) -> &GroupHandle {
        self.groups.get(group)
    }

    /// Number of rows in `metadata/songs`: 1 for song files, more for
    /// aggregate files.
    pub fn num_songs(&self) -> Result<u64, Error> {
        let table = self.table(SongGroup::Metadata)?;
        Ok(table.dataspace.rows())
    }

    /// Whether the file is backed by a memory map.
    pub fn is_mmap(&self) -> bool {
        self.data.is_mmap()
    }

    /// Read a numeric member of row 0 of the group's `songs` table as `f64`.
    ///
    /// Integer members are converted.
    pub fn read_scalar_double(&self, group: SongGroup, field: &str) -> Result<f64, Error> {
        let (bytes, datatype) = self.scalar_member(group, field)?;
        match datatype {
            Datatype::FloatingPoint { .. } | Datatype::FixedPoint { .. } => {
                Ok(element_as_f64(&bytes, &datatype)?)
            }
            other => Err(type_mismatch(group, field, "number", &other)),
        }
    }

    /// Read an integer member of row 0 of the group's `songs` table.
    pub fn read_scalar_int(&self, group: SongGroup, field: &str) -> Result<i64, Error> {
        let (bytes, datatype) = self.scalar_member(group, field)?;
        match datatype {
            Datatype::FixedPoint { .. } => Ok(element_as_i64(&bytes, &datatype)?),
            other => Err(type_mismatch(group, field, "integer", &other)),
        }
    }

    /// Read a fixed-width string member of row 0 of the group's `songs` table.
    ///
    /// At most `buffer_width` stored bytes are kept, so the result never has
    /// more than `buffer_width` characters.
    pub fn read_scalar_string(
        &self,
        group: SongGroup,
        field: &str,
        buffer_width: usize,
    ) -> Result<String, Error> {
        let (bytes, datatype) = self.scalar_member(group, field)?;
        match datatype {
            Datatype::String { padding, .. } => Ok(clamp_scalar(&bytes, padding, buffer_width)),
            other => Err(type_mismatch(group, field, "string", &other)),
        }
    }

    /// Read a 1-D numeric array dataset as `f64`, in storage order.
    ///
    /// An absent or empty dataset yields an empty vector.
    pub fn read_vector_double(&self, group: SongGroup, field: &str) -> Result<Vec<f64>, Error> {
        let Some(ds) = self.array_dataset(group, field)? else {
            return Ok(Vec::new());
        };
        if ds.dataspace.num_elements() == 0 {
            trace!(group = %group, field, "empty array");
            return Ok(Vec::new());
        }
        if !is_numeric(&ds.datatype) {
            return Err(type_mismatch(group, field, "number", &ds.datatype));
        }
        let raw = self.read_raw(&ds)?;
        let values = read_as_f64(&raw, &ds.datatype)?;
        trace!(group = %group, field, len = values.len(), "read array");
        Ok(values)
    }

    /// Read an `[R, 12]` numeric array, flattened row-major to `12 * R` values.
    ///
    /// An absent or empty dataset yields an empty vector; any other shape is a
    /// [`SchemaError::ShapeMismatch`].
    pub fn read_matrix_double_12(&self, group: SongGroup, field: &str) -> Result<Vec<f64>, Error> {
        let Some(ds) = self.array_dataset(group, field)? else {
            return Ok(Vec::new());
        };
        if ds.dataspace.num_elements() == 0 {
            trace!(group = %group, field, "empty matrix");
            return Ok(Vec::new());
        }
        let dims = &ds.dataspace.dimensions;
        if dims.len() != 2 || dims[1] != MATRIX_COLUMNS {
            return Err(SchemaError::ShapeMismatch {
                group,
                field: field.to_string(),
                dims: dims.clone(),
            }
            .into());
        }
        if !is_numeric(&ds.datatype) {
            return Err(type_mismatch(group, field, "number", &ds.datatype));
        }
        let raw = self.read_raw(&ds)?;
        let values = read_as_f64(&raw, &ds.datatype)?;
        trace!(group = %group, field, rows = dims[0], "read matrix");
        Ok(values)
    }

    /// Read a packed fixed-width string array.
    ///
    /// Every stored slot is narrowed or widened to `word_width` bytes with a
    /// NUL terminator, then the packed buffer is split into exactly as many
    /// strings as the dataset has rows.
    pub fn read_string_array(
        &self,
        group: SongGroup,
        field: &str,
        word_width: usize,
    ) -> Result<Vec<String>, Error> {
        if word_width == 0 {
            return Err(SchemaError::InvalidWidth.into());
        }
        let Some(ds) = self.array_dataset(group, field)? else {
            return Ok(Vec::new());
        };
        let rows = to_usize(ds.dataspace.rows())?;
        if rows == 0 || ds.dataspace.num_elements() == 0 {
            trace!(group = %group, field, "empty string array");
            return Ok(Vec::new());
        }
        let Datatype::String { size, padding, .. } = ds.datatype else {
            return Err(type_mismatch(group, field, "string", &ds.datatype));
        };
        let raw = self.read_raw(&ds)?;
        let packed = to_word_slots(&raw, size as usize, padding, word_width);
        let words = split_packed(&packed, rows).map_err(|found| SchemaError::MalformedStringArray {
            group,
            field: field.to_string(),
            expected: rows,
            found,
        })?;
        trace!(group = %group, field, len = words.len(), "read string array");
        Ok(words)
    }

    // ---- internals ----

    fn image(&self) -> &[u8] {
        &self.data.as_bytes()[self.base..]
    }

    /// Parse the dataset linked as `name` in `group`, or `None` if absent.
    fn dataset(&self, group: SongGroup, name: &str) -> Result<Option<DatasetHeader>, Error> {
        let Some(entry) = self.group(group).entry(name) else {
            return Ok(None);
        };
        let header = ObjectHeader::parse(
            self.image(),
            to_usize(entry.object_header_address)?,
            self.superblock.offset_size,
            self.superblock.length_size,
        )?;
        let not_a_dataset = || SchemaError::NotADataset {
            group,
            name: name.to_string(),
        };
        let (Some(space), Some(dtype), Some(layout)) = (
            header.find(MessageType::Dataspace),
            header.find(MessageType::Datatype),
            header.find(MessageType::DataLayout),
        ) else {
            return Err(not_a_dataset().into());
        };

        let ls = self.superblock.length_size;
        let os = self.superblock.offset_size;
        let pipeline = header
            .find(MessageType::FilterPipeline)
            .map(|m| FilterPipeline::parse(&m.data))
            .transpose()?;
        Ok(Some(DatasetHeader {
            dataspace: Dataspace::parse(&space.data, ls)?,
            datatype: Datatype::parse(&dtype.data)?.0,
            layout: DataLayout::parse(&layout.data, os, ls)?,
            pipeline,
        }))
    }

    fn array_dataset(&self, group: SongGroup, field: &str) -> Result<Option<DatasetHeader>, Error> {
        let ds = self.dataset(group, field)?;
        if ds.is_none() {
            warn!(group = %group, field, "array dataset not found, reading as empty");
        }
        Ok(ds)
    }

    fn table(&self, group: SongGroup) -> Result<DatasetHeader, Error> {
        self.dataset(group, SONGS_TABLE)?
            .ok_or_else(|| SchemaError::MissingTable(group).into())
    }

    /// Bytes and type of one member of row 0 of the group's table.
    fn scalar_member(&self, group: SongGroup, field: &str) -> Result<(Vec<u8>, Datatype), Error> {
        let table = self.table(group)?;
        let unknown = || SchemaError::UnknownField {
            group,
            field: field.to_string(),
        };
        let member = table.datatype.member(field).ok_or_else(unknown)?;
        if table.dataspace.rows() == 0 {
            return Err(SchemaError::EmptyTable(group).into());
        }

        let raw = self.read_raw(&table)?;
        let record_size = table.datatype.type_size() as usize;
        let row = raw.get(..record_size).ok_or(FormatError::DataSizeMismatch {
            expected: record_size,
            actual: raw.len(),
        })?;
        let bytes = compound_member_bytes(row, member)?.to_vec();
        trace!(group = %group, field, class = member.datatype.class_name(), "read scalar");
        Ok((bytes, member.datatype.clone()))
    }

    fn read_raw(&self, ds: &DatasetHeader) -> Result<Vec<u8>, FormatError> {
        read_raw_data(
            self.image(),
            &ds.layout,
            &ds.dataspace,
            &ds.datatype,
            ds.pipeline.as_ref(),
            self.superblock.offset_size,
        )
    }
}

impl Drop for RecordReader {
    fn drop(&mut self) {
        trace!(source = %self.source, "released song file");
    }
}

impl std::fmt::Debug for RecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader")
            .field("source", &self.source)
            .field("size", &self.data.len())
            .field("superblock_version", &self.superblock.version)
            .field("mmap", &self.is_mmap())
            .finish()
    }
}

fn is_numeric(datatype: &Datatype) -> bool {
    matches!(
        datatype,
        Datatype::FloatingPoint { .. } | Datatype::FixedPoint { .. }
    )
}

fn type_mismatch(group: SongGroup, field: &str, expected: &'static str, actual: &Datatype) -> Error {
    SchemaError::TypeMismatch {
        group,
        field: field.to_string(),
        expected,
        actual: actual.class_name(),
    }
    .into()
}
