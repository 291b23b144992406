//! Packed Archive
//!
//! A packed container is a single binary file holding cooked asset blobs
//! behind a directory:
//!
//! ```text
//! [magic "CPAK"][version u32][entry_count u32]
//! [directory: {asset_key[16], offset u64, size u64} x entry_count]
//! [payload blobs]
//! ```
//!
//! The payload region is opaque; only the directory is parsed, and every
//! recorded `(offset, size)` range must fall inside the file. Any
//! corruption is [`EngineError::InvalidContainer`].

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::errors::{EngineError, Result};
use crate::io::{BinaryReader, BinaryWriter};

use super::key::AssetKey;

/// Archive magic tag.
pub const PAK_MAGIC: [u8; 4] = *b"CPAK";
/// Archive version this build understands.
pub const PAK_VERSION: u32 = 1;

const DIRECTORY_ENTRY_SIZE: u64 = 32;

#[derive(Debug)]
struct DirectoryEntry {
    offset: u64,
    size: u64,
}

/// A mounted packed archive, held fully in memory.
#[derive(Debug)]
pub struct PakArchive {
    path: PathBuf,
    directory: FxHashMap<AssetKey, DirectoryEntry>,
    order: Vec<AssetKey>,
    data: Vec<u8>,
}

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::InvalidContainer(msg.into())
}

impl PakArchive {
    /// Opens and validates a packed archive.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| invalid(format!("cannot read {}: {e}", path.display())))?;
        let mut r = BinaryReader::new(&data);

        let magic = r.read_array::<4>("pak.magic")?;
        if magic != PAK_MAGIC {
            return Err(invalid(format!("bad pak magic {magic:02x?}")));
        }
        let version = r.read_u32("pak.version")?;
        if version != PAK_VERSION {
            return Err(invalid(format!(
                "unsupported pak version {version} (expected {PAK_VERSION})"
            )));
        }
        let entry_count = r.read_u32("pak.entry_count")?;

        let directory_end = 12 + u64::from(entry_count) * DIRECTORY_ENTRY_SIZE;
        if directory_end > data.len() as u64 {
            return Err(invalid("pak directory extends past end of file"));
        }

        let mut directory = FxHashMap::default();
        let mut order = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let key = AssetKey::from_bytes(r.read_array("pak.entry.key")?);
            let offset = r.read_u64("pak.entry.offset")?;
            let size = r.read_u64("pak.entry.size")?;
            let end = offset
                .checked_add(size)
                .ok_or_else(|| invalid("pak entry range overflows"))?;
            if offset < directory_end || end > data.len() as u64 {
                return Err(invalid(format!(
                    "pak entry for {key} out of bounds (offset {offset}, size {size})"
                )));
            }
            if directory
                .insert(key, DirectoryEntry { offset, size })
                .is_some()
            {
                return Err(invalid(format!("duplicate pak entry for {key}")));
            }
            order.push(key);
        }

        log::debug!(
            "mounted pak {} ({} entries, {} bytes)",
            path.display(),
            order.len(),
            data.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            directory,
            order,
            data,
        })
    }

    /// Path the archive was opened from.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory lists `key`.
    #[must_use]
    pub fn contains(&self, key: AssetKey) -> bool {
        self.directory.contains_key(&key)
    }

    /// Borrows the cooked bytes for `key`, if present.
    #[must_use]
    pub fn asset_bytes(&self, key: AssetKey) -> Option<&[u8]> {
        let entry = self.directory.get(&key)?;
        Some(&self.data[entry.offset as usize..(entry.offset + entry.size) as usize])
    }

    /// All asset keys in directory order.
    pub fn asset_keys(&self) -> impl Iterator<Item = AssetKey> + '_ {
        self.order.iter().copied()
    }
}

/// Authors a packed archive. Emit-side counterpart of [`PakArchive`].
#[derive(Default)]
pub struct PakWriter {
    entries: Vec<(AssetKey, Vec<u8>)>,
}

impl PakWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one cooked asset blob.
    pub fn add_asset(&mut self, key: AssetKey, bytes: Vec<u8>) -> &mut Self {
        self.entries.push((key, bytes));
        self
    }

    /// Serializes the archive.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        let mut w = BinaryWriter::new();
        w.write_bytes(&PAK_MAGIC);
        w.write_u32(PAK_VERSION);
        w.write_u32(self.entries.len() as u32);

        let mut offset = 12 + self.entries.len() as u64 * DIRECTORY_ENTRY_SIZE;
        for (key, bytes) in &self.entries {
            w.write_bytes(key.as_bytes());
            w.write_u64(offset);
            w.write_u64(bytes.len() as u64);
            offset += bytes.len() as u64;
        }
        for (_, bytes) in &self.entries {
            w.write_bytes(bytes);
        }
        w.into_bytes()
    }

    /// Writes the archive to a file.
    pub fn write_to(self, path: &Path) -> Result<()> {
        std::fs::write(path, self.into_bytes())?;
        Ok(())
    }
}
