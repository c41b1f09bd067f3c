//! Pure-Rust parsing of the HDF5 structures found in Million Song Dataset files.
//!
//! Song files are written by PyTables on HDF5 1.8 with default creation
//! properties, so this crate covers the old-style subset: version 0/1
//! superblocks, version 1 object headers, symbol-table groups, and chunked or
//! contiguous datasets of numeric, string and compound types. Every function
//! works on a borrowed file image and reports malformed input as a
//! [`FormatError`](error::FormatError).
//!
//! It supports `no_std` environments with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod btree_v1;
pub mod chunked_read;
pub mod data_layout;
pub mod data_read;
pub mod dataspace;
pub mod datatype;
pub mod error;
pub mod filter_pipeline;
pub mod filters;
pub mod group_v1;
pub mod local_heap;
pub mod message_type;
pub mod object_header;
pub mod signature;
pub mod superblock;
pub mod symbol_table;

mod util;

#[cfg(any(test, feature = "fixture"))]
pub mod fixture;
