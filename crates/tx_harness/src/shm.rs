//! File-backed shared-memory mapping for the inter-process ring.
//!
//! One party creates the mapping, the other opens it by path; both end up
//! with the same zeroed, cache-line-aligned region to hand to
//! [`ShmRing::from_region`](txring_rs::ShmRing::from_region). The first cache
//! line of the file is a small header carrying a magic number and the region
//! length, so an opener can tell a live mapping from a stale or foreign file.

use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use txring_rs::{region_len, CACHE_LINE_SIZE};

/// File identification, "txq ring" in little-endian ASCII.
const MAGIC: u64 = 0x676E_6972_2071_7874;

/// Bytes reserved for the mapping header: one cache line, so the ring region
/// that follows keeps the alignment of the page-aligned mapping.
const HEADER_SIZE: usize = CACHE_LINE_SIZE;

/// Errors from creating or attaching to a mapping.
#[derive(Debug, Error)]
pub enum ShmError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("not a ring mapping (bad magic or truncated header)")]
    Format,

    #[error("ring capacity {0} is not a power of two of at least 64 bytes")]
    Capacity(u64),
}

/// A named mapping shared between two processes.
///
/// The creator unlinks the backing file on drop; openers leave it alone. The
/// region handed out by [`region`](Self::region) arrives zeroed on creation
/// because a freshly grown file reads back as zeros.
pub struct SharedMemory {
    map: MmapMut,
    path: PathBuf,
    region_len: u64,
    created: bool,
}

impl SharedMemory {
    /// Creates the mapping for a ring of `capacity` bytes (a power of two of
    /// at least one cache line). Fails if the file already exists.
    pub fn create(path: impl AsRef<Path>, capacity: u64) -> Result<Self, ShmError> {
        if !capacity.is_power_of_two() || capacity < CACHE_LINE_SIZE as u64 {
            return Err(ShmError::Capacity(capacity));
        }

        let path = path.as_ref().to_path_buf();
        let region_len = region_len(capacity);
        let total = HEADER_SIZE as u64 + region_len;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.set_len(total)?;

        // Safety: the file is exclusively created and sized; peers attach
        // through the same file and coordinate only through the ring's atomic
        // protocol.
        let mut map = unsafe { MmapMut::map_mut(&file)? };
        map[0..8].copy_from_slice(&MAGIC.to_le_bytes());
        map[8..16].copy_from_slice(&region_len.to_le_bytes());

        Ok(Self {
            map,
            path,
            region_len,
            created: true,
        })
    }

    /// Attaches to an existing mapping. Fails if the file is missing, carries
    /// the wrong magic, or is shorter than its header claims.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ShmError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // Safety: as in `create`; the creator sized and tagged the file.
        let map = unsafe { MmapMut::map_mut(&file)? };
        if map.len() < HEADER_SIZE {
            return Err(ShmError::Format);
        }

        let mut field = [0u8; 8];
        field.copy_from_slice(&map[0..8]);
        let magic = u64::from_le_bytes(field);
        field.copy_from_slice(&map[8..16]);
        let region_len = u64::from_le_bytes(field);
        if magic != MAGIC || (map.len() as u64) < HEADER_SIZE as u64 + region_len {
            return Err(ShmError::Format);
        }

        Ok(Self {
            map,
            path,
            region_len,
            created: false,
        })
    }

    /// The ring region: cache-line aligned, `region_len` bytes, starting one
    /// cache line into the mapping. Feed both values straight into
    /// [`ShmRing::from_region`](txring_rs::ShmRing::from_region).
    pub fn region(&mut self) -> (*mut u8, u64) {
        // The mapping is page aligned and the header is one full cache line.
        (
            unsafe { self.map.as_mut_ptr().add(HEADER_SIZE) },
            self.region_len,
        )
    }

    /// Length of the ring region in bytes (indices plus storage).
    pub fn region_len(&self) -> u64 {
        self.region_len
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        if self.created {
            // The opener's mapping survives the unlink.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
