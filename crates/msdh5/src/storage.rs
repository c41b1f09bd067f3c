//! Backing bytes of an open song file: owned or memory-mapped.

use std::path::Path;

use crate::error::FileError;

/// Either an owned `Vec<u8>` or a read-only memory map.
pub(crate) enum FileData {
    Owned(Vec<u8>),
    #[cfg(feature = "mmap")]
    Mapped(memmap2::Mmap),
}

impl FileData {
    /// Open `path` read-only. Maps the file when the `mmap` feature is on.
    pub(crate) fn open(path: &Path) -> Result<FileData, FileError> {
        let io_err = |source| FileError::Io {
            path: path.to_path_buf(),
            source,
        };

        #[cfg(feature = "mmap")]
        {
            let file = std::fs::File::open(path).map_err(io_err)?;
            // empty files cannot be mapped on every platform
            if file.metadata().map_err(io_err)?.len() == 0 {
                return Ok(FileData::Owned(Vec::new()));
            }
            // SAFETY: the mapping is read-only; song files are not modified
            // while a reader holds them open.
            let map = unsafe { memmap2::Mmap::map(&file) }.map_err(io_err)?;
            Ok(FileData::Mapped(map))
        }
        #[cfg(not(feature = "mmap"))]
        {
            std::fs::read(path).map(FileData::Owned).map_err(io_err)
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            FileData::Owned(v) => v,
            #[cfg(feature = "mmap")]
            FileData::Mapped(m) => m,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub(crate) fn is_mmap(&self) -> bool {
        match self {
            FileData::Owned(_) => false,
            #[cfg(feature = "mmap")]
            FileData::Mapped(_) => true,
        }
    }
}
