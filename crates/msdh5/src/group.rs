//! The three top-level groups of a song file.

use std::fmt;

use msdh5_format::error::FormatError;
use msdh5_format::group_v1::{
    find_entry, resolve_v1_group_entries, symbol_table_message, GroupEntry,
};
use msdh5_format::object_header::ObjectHeader;
use msdh5_format::superblock::Superblock;
use msdh5_format::symbol_table::SymbolTableMessage;
use tracing::debug;

use crate::error::{Error, FileError};

/// A named field group of a song record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SongGroup {
    /// Song and artist descriptions.
    Metadata,
    /// Acoustic analysis.
    Analysis,
    /// MusicBrainz tags and release year.
    Musicbrainz,
}

impl SongGroup {
    /// Every group, in file order.
    pub const ALL: [SongGroup; 3] = [SongGroup::Metadata, SongGroup::Analysis, SongGroup::Musicbrainz];

    /// Link name under the root group.
    pub fn name(self) -> &'static str {
        match self {
            SongGroup::Metadata => "metadata",
            SongGroup::Analysis => "analysis",
            SongGroup::Musicbrainz => "musicbrainz",
        }
    }

    fn index(self) -> usize {
        match self {
            SongGroup::Metadata => 0,
            SongGroup::Analysis => 1,
            SongGroup::Musicbrainz => 2,
        }
    }
}

impl fmt::Display for SongGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved group: its header address and links, read once at open.
#[derive(Debug, Clone)]
pub struct GroupHandle {
    group: SongGroup,
    address: u64,
    entries: Vec<GroupEntry>,
}

impl GroupHandle {
    /// Which group this is.
    pub fn group(&self) -> SongGroup {
        self.group
    }

    /// Object header address of the group.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Names of every link in the group, in name order.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Names of the datasets in the group (links that are not subgroups).
    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.cache_type != 1)
            .map(|e| e.name.as_str())
    }

    pub(crate) fn entry(&self, name: &str) -> Option<&GroupEntry> {
        find_entry(&self.entries, name)
    }
}

/// The three group handles of an open file.
#[derive(Debug, Clone)]
pub(crate) struct SongGroups([GroupHandle; 3]);

impl SongGroups {
    /// Resolve all three groups; any failure aborts the open.
    pub(crate) fn resolve(data: &[u8], superblock: &Superblock) -> Result<SongGroups, Error> {
        let os = superblock.offset_size;
        let ls = superblock.length_size;
        let not_hdf5 = |e| Error::File(FileError::NotHdf5(e));

        let root_address = to_usize(superblock.root_group_address).map_err(not_hdf5)?;
        let root = ObjectHeader::parse(data, root_address, os, ls).map_err(not_hdf5)?;
        let root_table = symbol_table_message(&root, os).map_err(not_hdf5)?.or(
            superblock
                .root_cached_symbol_table
                .map(|(btree_address, local_heap_address)| SymbolTableMessage {
                    btree_address,
                    local_heap_address,
                }),
        );
        let root_entries = match root_table {
            Some(table) => resolve_v1_group_entries(data, &table, os, ls).map_err(not_hdf5)?,
            None => Vec::new(),
        };

        let [m, a, b] = SongGroup::ALL.map(|group| resolve_one(data, &root_entries, group, os, ls));
        Ok(SongGroups([m?, a?, b?]))
    }

    pub(crate) fn get(&self, group: SongGroup) -> &GroupHandle {
        &self.0[group.index()]
    }
}

fn resolve_one(
    data: &[u8],
    root_entries: &[GroupEntry],
    group: SongGroup,
    os: u8,
    ls: u8,
) -> Result<GroupHandle, Error> {
    let entry = find_entry(root_entries, group.name())
        .ok_or(Error::File(FileError::MissingGroup(group)))?;
    let header = to_usize(entry.object_header_address)
        .and_then(|addr| ObjectHeader::parse(data, addr, os, ls))
        .map_err(|e| Error::File(FileError::NotHdf5(e)))?;
    let table = symbol_table_message(&header, os)
        .map_err(|e| Error::File(FileError::NotHdf5(e)))?
        .ok_or(Error::File(FileError::NotAGroup(group)))?;
    let entries = resolve_v1_group_entries(data, &table, os, ls)
        .map_err(|e| Error::File(FileError::NotHdf5(e)))?;
    debug!(group = %group, links = entries.len(), "resolved group");
    Ok(GroupHandle {
        group,
        address: entry.object_header_address,
        entries,
    })
}

pub(crate) fn to_usize(address: u64) -> Result<usize, FormatError> {
    usize::try_from(address).map_err(|_| FormatError::AddressOverflow(address))
}
