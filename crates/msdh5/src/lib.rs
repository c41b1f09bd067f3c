//! Typed access to the fields of Million Song Dataset song files.
//!
//! A song file is an HDF5 file with three groups, `metadata`, `analysis` and
//! `musicbrainz`. Each group holds a one-row `songs` table with the scalar
//! fields plus one dataset per array field. [`RecordReader`] reads them in
//! four shapes: scalars, 1-D arrays, `[R, 12]` matrices and packed string
//! arrays. The [`catalog`] lists every field with a typed getter.
//!
//! ```no_run
//! use msdh5::{RecordReader, SongGroup};
//!
//! let song = RecordReader::open("TRAXLZU12903D05F94.h5").unwrap();
//! println!("{} - {}", song.artist_name().unwrap(), song.title().unwrap());
//! println!("tempo: {}", song.tempo().unwrap());
//! let timbre = song.read_matrix_double_12(SongGroup::Analysis, "segments_timbre").unwrap();
//! println!("{} segments", timbre.len() / 12);
//! ```

pub mod catalog;
pub mod error;
pub mod group;
pub mod reader;
mod storage;
mod strings;

pub use catalog::{lookup, FieldShape, FieldSpec, FieldValue, FIELDS};
pub use error::{Error, ErrorKind, FileError, SchemaError};
pub use group::{GroupHandle, SongGroup};
pub use reader::RecordReader;
