//! End-to-end reads of synthetic song files: every catalog field, chunked and
//! filtered storage, on-disk opening, and the error paths of each read shape.

use msdh5::catalog::{DEFAULT_STRING_WIDTH, DEFAULT_WORD_WIDTH};
use msdh5::{
    lookup, Error, ErrorKind, FieldShape, FieldValue, FileError, RecordReader, SchemaError,
    SongGroup, FIELDS,
};
use msdh5_format::datatype::StringPadding;
use msdh5_format::fixture::{sample_song, FixtureBuilder, Storage};

fn open(builder: &FixtureBuilder) -> RecordReader {
    RecordReader::from_bytes(builder.build().unwrap()).unwrap()
}

fn minimal() -> FixtureBuilder {
    let mut b = FixtureBuilder::new();
    b.group_mut("metadata").string_column("artist_name", 16, &["x"]);
    b.group_mut("analysis").float_column("tempo", &[100.0]);
    b.group_mut("musicbrainz").int_column("year", &[2001]);
    b
}

// ---------------------------------------------------------------------------
// Catalog reads
// ---------------------------------------------------------------------------

#[test]
fn every_catalog_field_reads_with_its_shape() {
    let song = open(&sample_song());
    for spec in FIELDS {
        let value = song
            .read_field(spec)
            .unwrap_or_else(|e| panic!("{}: {e}", spec.name));
        let shape_ok = match (spec.shape, &value) {
            (FieldShape::ScalarDouble, FieldValue::Double(_)) => true,
            (FieldShape::ScalarInt, FieldValue::Int(_)) => true,
            (FieldShape::ScalarString { width }, FieldValue::Text(s)) => s.chars().count() <= width,
            (FieldShape::VectorDouble, FieldValue::Doubles(_)) => true,
            (FieldShape::Matrix12Double, FieldValue::Matrix12(v)) => v.len() % 12 == 0,
            (FieldShape::VectorString { .. }, FieldValue::Texts(_)) => true,
            _ => false,
        };
        assert!(shape_ok, "{} read as {value:?}", spec.name);
    }
}

#[test]
fn known_values_read_back_exactly() {
    let song = open(&sample_song());
    assert_eq!(song.artist_name().unwrap(), "Test Artist");
    assert_eq!(song.key().unwrap(), 5);
    assert_eq!(song.tempo().unwrap(), 120.0);
    assert_eq!(song.segments_start().unwrap(), vec![0.0, 0.5, 1.2]);
    assert_eq!(song.similar_artists().unwrap(), ["AR001", "AR002", "AR003"]);
    assert_eq!(song.artist_terms().unwrap(), ["rock", "indie", "alternative"]);
    assert_eq!(song.artist_terms_freq().unwrap(), vec![1.0, 0.8, 0.6]);
    assert_eq!(song.audio_md5().unwrap(), "aee9820911781c734e7694c5432990ca");
    assert_eq!(song.track_id().unwrap(), "TRAAAAW128F429D538");
    assert_eq!(song.duration().unwrap(), 215.5);
    assert_eq!(song.loudness().unwrap(), -7.5);
    assert_eq!(song.mode().unwrap(), 1);
    assert_eq!(song.time_signature().unwrap(), 4);
    assert_eq!(song.artist_7digitalid().unwrap(), 4069);
    assert_eq!(song.artist_longitude().unwrap(), -1.89086);
    assert_eq!(song.year().unwrap(), 1999);
    assert_eq!(song.artist_mbtags().unwrap(), ["british", "rock"]);
}

#[test]
fn integer_columns_widen_to_double() {
    let song = open(&sample_song());
    assert_eq!(song.analysis_sample_rate().unwrap(), 22050.0);
    assert_eq!(song.artist_mbtags_count().unwrap(), vec![3.0, 1.0]);
}

#[test]
fn matrices_are_row_major() {
    let song = open(&sample_song());
    let pitches = song.segments_pitches().unwrap();
    assert_eq!(pitches.len(), 3 * 12);
    assert_eq!(pitches[0], 0.0);
    assert_eq!(pitches[6], 0.5);
    assert_eq!(pitches[12], 0.0);

    let timbre = song.segments_timbre().unwrap();
    let expected: Vec<f64> = (0..36).map(|i| i as f64 - 18.0).collect();
    assert_eq!(timbre, expected);
}

#[test]
fn zero_row_arrays_read_empty() {
    let song = open(&sample_song());
    assert!(song.tatums_start().unwrap().is_empty());
    assert!(song.tatums_confidence().unwrap().is_empty());

    let mut b = sample_song();
    b.group_mut("analysis")
        .float_array("segments_timbre", &[0, 12], &[]);
    b.group_mut("metadata").string_array("similar_artists", 20, &[]);
    let song = open(&b);
    assert!(song.segments_timbre().unwrap().is_empty());
    assert!(song.similar_artists().unwrap().is_empty());
}

#[test]
fn get_dispatches_by_name() {
    let song = open(&sample_song());
    assert_eq!(song.get("tempo").unwrap(), FieldValue::Double(120.0));
    assert_eq!(song.get("year").unwrap(), FieldValue::Int(1999));
    assert_eq!(
        song.get("title").unwrap(),
        FieldValue::Text("Test Title".to_string())
    );
    assert_eq!(
        song.get("bars_start").unwrap().to_string(),
        "2 values [0.5, 2.5]"
    );
    let err = song.get("bogus").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(matches!(
        err,
        Error::Schema(SchemaError::UnknownCatalogField(ref n)) if n == "bogus"
    ));
}

#[test]
fn num_songs_counts_table_rows() {
    assert_eq!(open(&sample_song()).num_songs().unwrap(), 1);

    let mut b = minimal();
    b.group_mut("metadata")
        .string_column("artist_name", 16, &["first", "second", "third"]);
    let song = open(&b);
    assert_eq!(song.num_songs().unwrap(), 3);
    // scalar reads look at row 0 only
    assert_eq!(song.artist_name().unwrap(), "first");
}

#[test]
fn group_handles_list_datasets() {
    let song = open(&sample_song());
    let meta = song.group(SongGroup::Metadata);
    assert_eq!(meta.group(), SongGroup::Metadata);
    let names: Vec<&str> = meta.dataset_names().collect();
    assert!(names.contains(&"songs"));
    assert!(names.contains(&"similar_artists"));
    assert_eq!(
        song.group(SongGroup::Musicbrainz).member_names().count(),
        3
    );
}

// ---------------------------------------------------------------------------
// Storage layouts
// ---------------------------------------------------------------------------

#[test]
fn chunked_deflated_matches_contiguous() {
    let plain = open(&sample_song());
    let packed = open(&sample_song().storage(Storage::pytables()));
    for spec in FIELDS {
        assert_eq!(
            plain.read_field(spec).unwrap(),
            packed.read_field(spec).unwrap(),
            "{}",
            spec.name
        );
    }
}

#[test]
fn chunked_with_checksums_matches_contiguous() {
    let storage = Storage::Chunked {
        chunk_rows: 3,
        shuffle: false,
        deflate: None,
        fletcher32: true,
    };
    let plain = open(&sample_song());
    let checked = open(&sample_song().storage(storage));
    assert_eq!(plain.segments_timbre().unwrap(), checked.segments_timbre().unwrap());
    assert_eq!(plain.artist_terms().unwrap(), checked.artist_terms().unwrap());
    assert_eq!(plain.artist_name().unwrap(), checked.artist_name().unwrap());
}

#[test]
fn corrupted_checksum_is_format_error() {
    let marker = 12345.678_f64;
    let mut b = minimal();
    b.group_mut("analysis")
        .float_array("beats_start", &[4], &[marker, 1.0, 2.0, 3.0]);
    let b = b.storage(Storage::Chunked {
        chunk_rows: 4,
        shuffle: false,
        deflate: None,
        fletcher32: true,
    });
    let mut bytes = b.build().unwrap();
    let needle = marker.to_le_bytes();
    let pos = bytes
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("marker stored unfiltered");
    bytes[pos] ^= 0xFF;

    let song = RecordReader::from_bytes(bytes).unwrap();
    let err = song.beats_start().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    // the table is untouched
    assert_eq!(song.tempo().unwrap(), 100.0);
}

#[test]
fn oversized_dataspace_is_format_error() {
    let beats: Vec<f64> = (0..1234).map(|i| i as f64 * 0.5).collect();
    let mut b = minimal();
    b.group_mut("analysis")
        .float_array("beats_start", &[1234], &beats);
    let mut bytes = b.storage(Storage::pytables()).build().unwrap();

    // version 1, rank 1, max dims present, then the current dimension
    let mut needle = vec![1u8, 1, 1, 0, 0, 0, 0, 0];
    needle.extend_from_slice(&1234u64.to_le_bytes());
    let pos = bytes
        .windows(needle.len())
        .position(|w| w == needle.as_slice())
        .expect("beats_start dataspace");
    bytes[pos + 8..pos + 16].copy_from_slice(&(1u64 << 42).to_le_bytes());

    let song = RecordReader::from_bytes(bytes).unwrap();
    let err = song.beats_start().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(err.to_string().contains("storage supplies at most"), "{err}");
    assert_eq!(song.tempo().unwrap(), 100.0);
}

#[test]
fn narrow_float_columns() {
    let mut b = minimal();
    b.group_mut("analysis").f32_column("energy", &[0.25]);
    b.group_mut("metadata").i64_column("track_7digitalid", &[-9_000_000_000]);
    let song = open(&b);
    assert_eq!(song.energy().unwrap(), 0.25);
    assert_eq!(song.track_7digitalid().unwrap(), -9_000_000_000);
}

// ---------------------------------------------------------------------------
// Opening
// ---------------------------------------------------------------------------

#[test]
fn opens_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("TRTEST.h5");
    sample_song().write(&path).unwrap();

    let song = RecordReader::open(&path).unwrap();
    assert_eq!(song.is_mmap(), cfg!(feature = "mmap"));
    assert_eq!(song.title().unwrap(), "Test Title");
    song.close();

    // a second reader on the same path is independent
    let a = RecordReader::open(&path).unwrap();
    let b = RecordReader::open(&path).unwrap();
    assert_eq!(a.year().unwrap(), b.year().unwrap());
}

#[test]
fn missing_path_is_file_error() {
    let err = RecordReader::open("/no/such/dir/TRMISSING.h5").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::File);
    assert!(matches!(err, Error::File(FileError::Io { .. })));
    assert!(err.to_string().starts_with("file error: cannot open"));
}

#[test]
fn garbage_is_not_hdf5() {
    let err = RecordReader::from_bytes(vec![0x42; 4096]).unwrap_err();
    assert!(matches!(err, Error::File(FileError::NotHdf5(_))));

    let err = RecordReader::from_bytes(Vec::new()).unwrap_err();
    assert!(matches!(err, Error::File(FileError::NotHdf5(_))));
}

#[test]
fn truncated_image_is_not_hdf5() {
    let bytes = sample_song().build().unwrap();
    let err = RecordReader::from_bytes(bytes[..200].to_vec()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::File);
}

#[test]
fn missing_group_fails_open() {
    let mut b = sample_song();
    b.root_mut().remove("musicbrainz");
    let err = RecordReader::from_bytes(b.build().unwrap()).unwrap_err();
    assert!(matches!(
        err,
        Error::File(FileError::MissingGroup(SongGroup::Musicbrainz))
    ));
    assert_eq!(err.to_string(), "file error: missing group /musicbrainz");
}

#[test]
fn dataset_in_place_of_group_fails_open() {
    let mut b = sample_song();
    b.root_mut()
        .remove("analysis")
        .float_array("analysis", &[1], &[1.0]);
    let err = RecordReader::from_bytes(b.build().unwrap()).unwrap_err();
    assert!(matches!(
        err,
        Error::File(FileError::NotAGroup(SongGroup::Analysis))
    ));
}

// ---------------------------------------------------------------------------
// Schema errors
// ---------------------------------------------------------------------------

#[test]
fn unknown_member_is_schema_error() {
    let song = open(&sample_song());
    let err = song
        .read_scalar_double(SongGroup::Metadata, "bogus")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(
        err.to_string(),
        "schema error: no field 'bogus' in /metadata/songs"
    );
}

#[test]
fn wrong_type_is_schema_error() {
    let song = open(&sample_song());
    assert!(matches!(
        song.read_scalar_int(SongGroup::Metadata, "artist_name"),
        Err(Error::Schema(SchemaError::TypeMismatch { expected: "integer", actual: "string", .. }))
    ));
    assert!(matches!(
        song.read_scalar_string(SongGroup::Analysis, "tempo", 8),
        Err(Error::Schema(SchemaError::TypeMismatch { expected: "string", .. }))
    ));
    assert!(matches!(
        song.read_vector_double(SongGroup::Metadata, "similar_artists"),
        Err(Error::Schema(SchemaError::TypeMismatch { .. }))
    ));
    assert!(matches!(
        song.read_string_array(SongGroup::Analysis, "beats_start", 20),
        Err(Error::Schema(SchemaError::TypeMismatch { expected: "string", .. }))
    ));
}

#[test]
fn matrix_of_wrong_width_is_shape_error() {
    let mut b = sample_song();
    let flat: Vec<f64> = (0..36).map(f64::from).collect();
    b.group_mut("analysis")
        .float_array("segments_pitches", &[36], &flat)
        .float_array("segments_timbre", &[3, 11], &flat[..33]);
    let song = open(&b);
    match song.segments_pitches().unwrap_err() {
        Error::Schema(SchemaError::ShapeMismatch { dims, field, .. }) => {
            assert_eq!(dims, vec![36]);
            assert_eq!(field, "segments_pitches");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        song.segments_timbre(),
        Err(Error::Schema(SchemaError::ShapeMismatch { .. }))
    ));
}

#[test]
fn subgroup_is_not_a_dataset() {
    let mut b = sample_song();
    b.group_mut("analysis").subgroup("beats_start");
    let song = open(&b);
    assert!(matches!(
        song.beats_start(),
        Err(Error::Schema(SchemaError::NotADataset { group: SongGroup::Analysis, .. }))
    ));
    assert!(!song
        .group(SongGroup::Analysis)
        .dataset_names()
        .any(|n| n == "beats_start"));
}

// ---------------------------------------------------------------------------
// String widths
// ---------------------------------------------------------------------------

#[test]
fn scalar_string_clamps_to_buffer_width() {
    let song = open(&sample_song());
    let full = song
        .read_scalar_string(SongGroup::Metadata, "artist_name", DEFAULT_STRING_WIDTH)
        .unwrap();
    assert_eq!(full, "Test Artist");
    for width in 0..full.len() {
        let s = song
            .read_scalar_string(SongGroup::Metadata, "artist_name", width)
            .unwrap();
        assert_eq!(s, &full[..width]);
    }
}

#[test]
fn unterminated_value_at_boundary_keeps_every_byte() {
    let mut b = minimal();
    // the stored value fills its 32-byte slot with no NUL
    let digest = "0123456789abcdef0123456789abcdef";
    b.group_mut("analysis").string_column("audio_md5", 32, &[digest]);
    let song = open(&b);
    assert_eq!(song.audio_md5().unwrap(), digest);
    let s = song
        .read_scalar_string(SongGroup::Analysis, "audio_md5", 32)
        .unwrap();
    assert_eq!(s.len(), 32);
    let s = song
        .read_scalar_string(SongGroup::Analysis, "audio_md5", 31)
        .unwrap();
    assert_eq!(s, &digest[..31]);
}

#[test]
fn space_padded_strings_are_trimmed() {
    let mut b = minimal();
    b.group_mut("metadata")
        .string_column_padded("title", 12, StringPadding::SpacePad, &["Padded"])
        .string_array_padded("similar_artists", 20, StringPadding::SpacePad, &["AR1", "AR2"]);
    let song = open(&b);
    assert_eq!(song.title().unwrap(), "Padded");
    assert_eq!(song.similar_artists().unwrap(), ["AR1", "AR2"]);
}

#[test]
fn string_array_slots_narrow_to_word_width() {
    let song = open(&sample_song());
    let words = song
        .read_string_array(SongGroup::Metadata, "artist_terms", 4)
        .unwrap();
    assert_eq!(words, ["roc", "ind", "alt"]);
    let words = song
        .read_string_array(SongGroup::Metadata, "artist_terms", DEFAULT_WORD_WIDTH)
        .unwrap();
    assert_eq!(words.len(), 3);
}

#[test]
fn zero_word_width_is_rejected() {
    let song = open(&sample_song());
    assert!(matches!(
        song.read_string_array(SongGroup::Metadata, "similar_artists", 0),
        Err(Error::Schema(SchemaError::InvalidWidth))
    ));
}

#[test]
fn empty_entry_collapses_into_padding() {
    let mut b = minimal();
    b.group_mut("metadata")
        .string_array("similar_artists", 20, &["AR001", "", "AR003"]);
    let song = open(&b);
    match song.similar_artists().unwrap_err() {
        Error::Schema(SchemaError::MalformedStringArray {
            expected, found, ..
        }) => {
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn catalog_widths_match_lookup() {
    let song = open(&sample_song());
    let spec = lookup("similar_artists").unwrap();
    let FieldShape::VectorString { word_width } = spec.shape else {
        panic!("similar_artists is a string array");
    };
    assert_eq!(
        song.read_string_array(spec.group, spec.name, word_width).unwrap(),
        song.similar_artists().unwrap()
    );
}
