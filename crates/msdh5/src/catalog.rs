//! The field catalog: every field of a song record with its group, shape and
//! display label.
//!
//! [`FIELDS`] and the typed getters on [`RecordReader`] (`reader.tempo()`,
//! `reader.similar_artists()`, ...) are generated from one table, so a field
//! cannot be listed without a getter or read with the wrong shape.

use std::fmt;

use crate::error::{Error, SchemaError};
use crate::group::SongGroup;
use crate::reader::RecordReader;

/// Buffer width for scalar string fields.
pub const DEFAULT_STRING_WIDTH: usize = 1024;
/// Slot width for packed string arrays.
pub const DEFAULT_WORD_WIDTH: usize = 1026;
/// `analysis/songs.audio_md5` holds a 32-character hex digest.
pub const AUDIO_MD5_WIDTH: usize = 32;
/// `metadata/similar_artists` slots hold 18-character artist IDs.
pub const SIMILAR_ARTISTS_WIDTH: usize = 20;

/// How a field is stored and read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// `songs` member read as `f64`.
    ScalarDouble,
    /// `songs` member read as `i64`.
    ScalarInt,
    /// `songs` member read as a string of at most `width` characters.
    ScalarString { width: usize },
    /// 1-D array dataset.
    VectorDouble,
    /// `[R, 12]` array dataset, flattened.
    Matrix12Double,
    /// Packed string array dataset.
    VectorString { word_width: usize },
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub group: SongGroup,
    /// Member or dataset name, also the getter name.
    pub name: &'static str,
    pub shape: FieldShape,
    /// Human-readable label, as printed by dumpers.
    pub label: &'static str,
}

/// A field value of any shape.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Double(f64),
    Int(i64),
    Text(String),
    Doubles(Vec<f64>),
    /// Row-major `[R, 12]` values.
    Matrix12(Vec<f64>),
    Texts(Vec<String>),
}

/// Leading array values shown by [`FieldValue`]'s `Display`.
const PREVIEW: usize = 5;

fn write_preview<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, v) in values.iter().take(PREVIEW).enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{v}")?;
    }
    if values.len() > PREVIEW {
        f.write_str(", ...")?;
    }
    f.write_str("]")
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Double(v) => write!(f, "{v}"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Doubles(v) => {
                write!(f, "{} values ", v.len())?;
                write_preview(f, v)
            }
            FieldValue::Matrix12(v) => {
                write!(f, "{} x 12 values ", v.len() / 12)?;
                write_preview(f, v)
            }
            FieldValue::Texts(v) => {
                write!(f, "{} values ", v.len())?;
                write_preview(f, v)
            }
        }
    }
}

macro_rules! song_fields {
    (@shape double) => { FieldShape::ScalarDouble };
    (@shape int) => { FieldShape::ScalarInt };
    (@shape string($w:expr)) => { FieldShape::ScalarString { width: $w } };
    (@shape doubles) => { FieldShape::VectorDouble };
    (@shape matrix12) => { FieldShape::Matrix12Double };
    (@shape strings($w:expr)) => { FieldShape::VectorString { word_width: $w } };

    (@getter $name:ident, $group:ident, $label:literal, double) => {
        #[doc = concat!("Reads the ", $label, ".")]
        pub fn $name(&self) -> Result<f64, Error> {
            self.read_scalar_double(SongGroup::$group, stringify!($name))
        }
    };
    (@getter $name:ident, $group:ident, $label:literal, int) => {
        #[doc = concat!("Reads the ", $label, ".")]
        pub fn $name(&self) -> Result<i64, Error> {
            self.read_scalar_int(SongGroup::$group, stringify!($name))
        }
    };
    (@getter $name:ident, $group:ident, $label:literal, string($w:expr)) => {
        #[doc = concat!("Reads the ", $label, ".")]
        pub fn $name(&self) -> Result<String, Error> {
            self.read_scalar_string(SongGroup::$group, stringify!($name), $w)
        }
    };
    (@getter $name:ident, $group:ident, $label:literal, doubles) => {
        #[doc = concat!("Reads the ", $label, " array.")]
        pub fn $name(&self) -> Result<Vec<f64>, Error> {
            self.read_vector_double(SongGroup::$group, stringify!($name))
        }
    };
    (@getter $name:ident, $group:ident, $label:literal, matrix12) => {
        #[doc = concat!("Reads the ", $label, " matrix, flattened row-major.")]
        pub fn $name(&self) -> Result<Vec<f64>, Error> {
            self.read_matrix_double_12(SongGroup::$group, stringify!($name))
        }
    };
    (@getter $name:ident, $group:ident, $label:literal, strings($w:expr)) => {
        #[doc = concat!("Reads the ", $label, " list.")]
        pub fn $name(&self) -> Result<Vec<String>, Error> {
            self.read_string_array(SongGroup::$group, stringify!($name), $w)
        }
    };

    ($( $name:ident => $group:ident, $kind:ident $(($width:expr))?, $label:literal; )*) => {
        /// Every field of a song record, in display order.
        pub static FIELDS: &[FieldSpec] = &[
            $(
                FieldSpec {
                    group: SongGroup::$group,
                    name: stringify!($name),
                    shape: song_fields!(@shape $kind $(($width))?),
                    label: $label,
                },
            )*
        ];

        impl RecordReader {
            $( song_fields!(@getter $name, $group, $label, $kind $(($width))?); )*
        }
    };
}

song_fields! {
    artist_familiarity => Metadata, double, "artist familiarity";
    artist_hotttnesss => Metadata, double, "artist hotttnesss";
    artist_id => Metadata, string(DEFAULT_STRING_WIDTH), "artist id";
    artist_mbid => Metadata, string(DEFAULT_STRING_WIDTH), "artist mbid";
    artist_playmeid => Metadata, int, "artist playmeid";
    artist_7digitalid => Metadata, int, "artist 7digitalid";
    artist_latitude => Metadata, double, "artist latitude";
    artist_longitude => Metadata, double, "artist longitude";
    artist_location => Metadata, string(DEFAULT_STRING_WIDTH), "artist location";
    artist_name => Metadata, string(DEFAULT_STRING_WIDTH), "artist name";
    release => Metadata, string(DEFAULT_STRING_WIDTH), "release";
    release_7digitalid => Metadata, int, "release 7digitalid";
    song_id => Metadata, string(DEFAULT_STRING_WIDTH), "song id";
    song_hotttnesss => Metadata, double, "song hotttnesss";
    title => Metadata, string(DEFAULT_STRING_WIDTH), "title";
    track_7digitalid => Metadata, int, "track 7digitalid";
    similar_artists => Metadata, strings(SIMILAR_ARTISTS_WIDTH), "similar artists";
    artist_terms => Metadata, strings(DEFAULT_WORD_WIDTH), "artist terms";
    artist_terms_freq => Metadata, doubles, "artist terms freq";
    artist_terms_weight => Metadata, doubles, "artist terms weight";
    analysis_sample_rate => Analysis, double, "analysis sample rate";
    audio_md5 => Analysis, string(AUDIO_MD5_WIDTH), "audio md5";
    danceability => Analysis, double, "danceability";
    duration => Analysis, double, "duration";
    end_of_fade_in => Analysis, double, "end of fade in";
    energy => Analysis, double, "energy";
    key => Analysis, int, "key";
    key_confidence => Analysis, double, "key confidence";
    loudness => Analysis, double, "loudness";
    mode => Analysis, int, "mode";
    mode_confidence => Analysis, double, "mode confidence";
    start_of_fade_out => Analysis, double, "start of fade out";
    tempo => Analysis, double, "tempo";
    time_signature => Analysis, int, "time signature";
    time_signature_confidence => Analysis, double, "time signature confidence";
    track_id => Analysis, string(DEFAULT_STRING_WIDTH), "track id";
    segments_start => Analysis, doubles, "segments start";
    segments_confidence => Analysis, doubles, "segments confidence";
    segments_pitches => Analysis, matrix12, "segments pitches";
    segments_timbre => Analysis, matrix12, "segments timbre";
    segments_loudness_max => Analysis, doubles, "segments loudness max";
    segments_loudness_max_time => Analysis, doubles, "segments loudness max time";
    segments_loudness_start => Analysis, doubles, "segments loudness start";
    sections_start => Analysis, doubles, "sections start";
    sections_confidence => Analysis, doubles, "sections confidence";
    beats_start => Analysis, doubles, "beats start";
    beats_confidence => Analysis, doubles, "beats confidence";
    bars_start => Analysis, doubles, "bars start";
    bars_confidence => Analysis, doubles, "bars confidence";
    tatums_start => Analysis, doubles, "tatums start";
    tatums_confidence => Analysis, doubles, "tatums confidence";
    artist_mbtags => Musicbrainz, strings(DEFAULT_WORD_WIDTH), "artist mbtags";
    artist_mbtags_count => Musicbrainz, doubles, "artist mbtags count";
    year => Musicbrainz, int, "year";
}

/// Find a catalog entry by field name.
pub fn lookup(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

impl RecordReader {
    /// Read any catalog field by name.
    pub fn get(&self, name: &str) -> Result<FieldValue, Error> {
        let spec = lookup(name).ok_or_else(|| SchemaError::UnknownCatalogField(name.to_string()))?;
        self.read_field(spec)
    }

    /// Read the field described by `spec`.
    pub fn read_field(&self, spec: &FieldSpec) -> Result<FieldValue, Error> {
        let (group, name) = (spec.group, spec.name);
        Ok(match spec.shape {
            FieldShape::ScalarDouble => FieldValue::Double(self.read_scalar_double(group, name)?),
            FieldShape::ScalarInt => FieldValue::Int(self.read_scalar_int(group, name)?),
            FieldShape::ScalarString { width } => {
                FieldValue::Text(self.read_scalar_string(group, name, width)?)
            }
            FieldShape::VectorDouble => FieldValue::Doubles(self.read_vector_double(group, name)?),
            FieldShape::Matrix12Double => {
                FieldValue::Matrix12(self.read_matrix_double_12(group, name)?)
            }
            FieldShape::VectorString { word_width } => {
                FieldValue::Texts(self.read_string_array(group, name, word_width)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names.len(), FIELDS.len());
        assert_eq!(FIELDS.len(), 54);
    }

    #[test]
    fn labels_spell_out_names() {
        for f in FIELDS {
            assert_eq!(f.label, f.name.replace('_', " "));
        }
    }

    #[test]
    fn lookup_finds_shapes_and_widths() {
        assert_eq!(lookup("tempo").unwrap().shape, FieldShape::ScalarDouble);
        assert_eq!(lookup("tempo").unwrap().group, SongGroup::Analysis);
        assert_eq!(
            lookup("audio_md5").unwrap().shape,
            FieldShape::ScalarString { width: 32 }
        );
        assert_eq!(
            lookup("similar_artists").unwrap().shape,
            FieldShape::VectorString { word_width: 20 }
        );
        assert_eq!(
            lookup("artist_mbtags").unwrap().shape,
            FieldShape::VectorString { word_width: 1026 }
        );
        assert_eq!(lookup("segments_timbre").unwrap().shape, FieldShape::Matrix12Double);
        assert_eq!(lookup("year").unwrap().group, SongGroup::Musicbrainz);
        assert!(lookup("nonexistent").is_none());
    }

    #[test]
    fn every_group_is_covered() {
        for g in SongGroup::ALL {
            assert!(FIELDS.iter().any(|f| f.group == g));
        }
    }

    #[test]
    fn value_display() {
        assert_eq!(FieldValue::Double(120.0).to_string(), "120");
        assert_eq!(FieldValue::Int(-3).to_string(), "-3");
        assert_eq!(FieldValue::Text("Test Artist".into()).to_string(), "Test Artist");
        assert_eq!(
            FieldValue::Doubles(vec![0.0, 0.5, 1.2]).to_string(),
            "3 values [0, 0.5, 1.2]"
        );
        assert_eq!(
            FieldValue::Doubles((0..7).map(f64::from).collect()).to_string(),
            "7 values [0, 1, 2, 3, 4, ...]"
        );
        assert_eq!(FieldValue::Doubles(vec![]).to_string(), "0 values []");
        assert_eq!(
            FieldValue::Matrix12(vec![1.0; 24]).to_string(),
            "2 x 12 values [1, 1, 1, 1, 1, ...]"
        );
        assert_eq!(
            FieldValue::Texts(vec!["AR001".into(), "AR002".into()]).to_string(),
            "2 values [AR001, AR002]"
        );
    }
}
