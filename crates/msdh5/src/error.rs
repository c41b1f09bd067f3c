//! Error types for song-file access.

use std::fmt;
use std::path::PathBuf;

use msdh5_format::error::FormatError;

use crate::group::SongGroup;

/// Failures while opening a song file. A reader is never built half-way.
#[derive(Debug)]
pub enum FileError {
    /// The path could not be opened or read.
    Io {
        /// Path that was being opened.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The bytes are not a readable HDF5 file.
    NotHdf5(FormatError),
    /// One of the three required groups is missing.
    MissingGroup(SongGroup),
    /// A required group name resolves to something that is not a group.
    NotAGroup(SongGroup),
}

/// The file is readable but does not hold what a field read expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The `songs` table of the group has no member of that name.
    UnknownField {
        /// Group that was searched.
        group: SongGroup,
        /// Requested member.
        field: String,
    },
    /// The group has no `songs` table.
    MissingTable(SongGroup),
    /// The stored type cannot be converted to the requested one.
    TypeMismatch {
        /// Group holding the field.
        group: SongGroup,
        /// Field name.
        field: String,
        /// What the read expected.
        expected: &'static str,
        /// What the file stores.
        actual: &'static str,
    },
    /// The dataset shape does not match the read shape.
    ShapeMismatch {
        /// Group holding the dataset.
        group: SongGroup,
        /// Dataset name.
        field: String,
        /// Shape found on disk.
        dims: Vec<u64>,
    },
    /// The `songs` table has zero rows.
    EmptyTable(SongGroup),
    /// A packed string array holds fewer entries than its row count.
    MalformedStringArray {
        /// Group holding the dataset.
        group: SongGroup,
        /// Dataset name.
        field: String,
        /// Declared row count.
        expected: usize,
        /// Entries actually found.
        found: usize,
    },
    /// A width of zero was requested for a string array.
    InvalidWidth,
    /// No catalog entry has that name.
    UnknownCatalogField(String),
    /// The name resolves to a group, not a dataset.
    NotADataset {
        /// Group holding the link.
        group: SongGroup,
        /// Link name.
        name: String,
    },
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Opening failed.
    File,
    /// A read did not match the file's schema.
    Schema,
    /// The file structure is corrupt.
    Format,
}

/// Errors returned by this crate.
#[derive(Debug)]
pub enum Error {
    /// Opening the file failed.
    File(FileError),
    /// A read did not match the file's schema.
    Schema(SchemaError),
    /// Corrupt or unsupported structure found while reading.
    Format(FormatError),
}

impl Error {
    /// Which family this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::File(_) => ErrorKind::File,
            Error::Schema(_) => ErrorKind::Schema,
            Error::Format(_) => ErrorKind::Format,
        }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::Io { path, source } => {
                write!(f, "cannot open {}: {source}", path.display())
            }
            FileError::NotHdf5(e) => write!(f, "not a readable HDF5 file: {e}"),
            FileError::MissingGroup(g) => write!(f, "missing group /{g}"),
            FileError::NotAGroup(g) => write!(f, "/{g} is not a group"),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::UnknownField { group, field } => {
                write!(f, "no field '{field}' in /{group}/songs")
            }
            SchemaError::MissingTable(g) => write!(f, "/{g} has no songs table"),
            SchemaError::TypeMismatch {
                group,
                field,
                expected,
                actual,
            } => write!(f, "/{group}/{field}: expected {expected}, found {actual}"),
            SchemaError::ShapeMismatch { group, field, dims } => {
                write!(f, "/{group}/{field}: unexpected shape {dims:?}")
            }
            SchemaError::EmptyTable(g) => write!(f, "/{g}/songs has no rows"),
            SchemaError::MalformedStringArray {
                group,
                field,
                expected,
                found,
            } => write!(
                f,
                "/{group}/{field}: expected {expected} strings, buffer holds {found}"
            ),
            SchemaError::InvalidWidth => write!(f, "string width must be at least 1"),
            SchemaError::UnknownCatalogField(name) => write!(f, "unknown field '{name}'"),
            SchemaError::NotADataset { group, name } => {
                write!(f, "/{group}/{name} is not a dataset")
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::File(e) => write!(f, "file error: {e}"),
            Error::Schema(e) => write!(f, "schema error: {e}"),
            Error::Format(e) => write!(f, "HDF5 format error: {e}"),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::Io { source, .. } => Some(source),
            FileError::NotHdf5(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for SchemaError {}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::File(e) => Some(e),
            Error::Schema(e) => Some(e),
            Error::Format(e) => Some(e),
        }
    }
}

impl From<FileError> for Error {
    fn from(e: FileError) -> Self {
        Error::File(e)
    }
}

impl From<SchemaError> for Error {
    fn from(e: SchemaError) -> Self {
        Error::Schema(e)
    }
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        Error::Format(e)
    }
}
