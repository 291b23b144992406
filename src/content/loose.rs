//! Loose Cooked Root
//!
//! A "loose cooked" mount is a directory rooted by a binary index file,
//! `container.index.bin`, with per-asset descriptor files stored alongside
//! it and optional table/data resource file pairs. The index is:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ IndexHeader (72 bytes)                       │
//! │ String table (NUL-separated, "" at offset 0) │
//! │ AssetEntry[asset_count]   (64 bytes each)    │
//! │ FileRecord[file_record_count] (32 bytes)     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! All integers little-endian. Mounting validates the index exhaustively —
//! every structural violation is a hard [`EngineError::InvalidContainer`]
//! error, and (when enabled) every descriptor's SHA-256 digest is checked
//! against the index entry.

use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use sha2::{Digest, Sha256};

use crate::errors::{EngineError, Result};
use crate::io::{BinaryReader, BinaryWriter};

use super::key::AssetKey;

// ============================================================================
// Format constants
// ============================================================================

/// Name of the index file at the root of a loose cooked directory.
pub const INDEX_FILE_NAME: &str = "container.index.bin";

/// Index schema version this build understands.
pub const SUPPORTED_VERSION: u16 = 1;

/// Header flag: the index carries virtual path strings.
pub const FLAG_HAS_VIRTUAL_PATHS: u32 = 1 << 0;
/// Header flag: the index carries a file-record table.
pub const FLAG_HAS_FILE_RECORDS: u32 = 1 << 1;
/// Union of all flags this build understands.
pub const KNOWN_FLAGS: u32 = FLAG_HAS_VIRTUAL_PATHS | FLAG_HAS_FILE_RECORDS;

/// Size of the serialized [`IndexHeader`].
pub const INDEX_HEADER_SIZE: u64 = 72;
/// Size of one serialized [`AssetEntryRecord`].
pub const ASSET_ENTRY_SIZE: u32 = 64;
/// Size of one serialized [`FileRecord`].
pub const FILE_RECORD_SIZE: u32 = 32;

/// Kinds of auxiliary resource files a loose root may carry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u32)]
pub enum FileKind {
    /// Texture directory table.
    TexturesTable = 1,
    /// Texture payload blob.
    TexturesData = 2,
    /// Buffer directory table.
    BuffersTable = 3,
    /// Buffer payload blob.
    BuffersData = 4,
}

impl FileKind {
    /// Maps the on-disk kind code; unknown codes return `None`.
    #[must_use]
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::TexturesTable),
            2 => Some(Self::TexturesData),
            3 => Some(Self::BuffersTable),
            4 => Some(Self::BuffersData),
            _ => None,
        }
    }

    /// The table/data partner this kind must be paired with.
    #[must_use]
    pub fn partner(self) -> Self {
        match self {
            Self::TexturesTable => Self::TexturesData,
            Self::TexturesData => Self::TexturesTable,
            Self::BuffersTable => Self::BuffersData,
            Self::BuffersData => Self::BuffersTable,
        }
    }
}

// ============================================================================
// On-disk records
// ============================================================================

/// Index file header. Field order matches the serialized layout.
#[derive(Clone, Debug)]
pub struct IndexHeader {
    pub guid: [u8; 16],
    pub version: u16,
    pub content_version: u16,
    pub flags: u32,
    pub string_table_offset: u64,
    pub string_table_size: u64,
    pub asset_entries_offset: u64,
    pub asset_count: u32,
    pub asset_entry_size: u32,
    pub file_records_offset: u64,
    pub file_record_count: u32,
    pub file_record_size: u32,
}

impl IndexHeader {
    /// Serializes the header to a writer.
    pub fn write_to(&self, w: &mut BinaryWriter) {
        w.write_bytes(&self.guid);
        w.write_u16(self.version);
        w.write_u16(self.content_version);
        w.write_u32(self.flags);
        w.write_u64(self.string_table_offset);
        w.write_u64(self.string_table_size);
        w.write_u64(self.asset_entries_offset);
        w.write_u32(self.asset_count);
        w.write_u32(self.asset_entry_size);
        w.write_u64(self.file_records_offset);
        w.write_u32(self.file_record_count);
        w.write_u32(self.file_record_size);
    }

    /// Parses a header from a reader positioned at offset 0.
    pub fn parse(r: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            guid: r.read_array("header.guid")?,
            version: r.read_u16("header.version")?,
            content_version: r.read_u16("header.content_version")?,
            flags: r.read_u32("header.flags")?,
            string_table_offset: r.read_u64("header.string_table_offset")?,
            string_table_size: r.read_u64("header.string_table_size")?,
            asset_entries_offset: r.read_u64("header.asset_entries_offset")?,
            asset_count: r.read_u32("header.asset_count")?,
            asset_entry_size: r.read_u32("header.asset_entry_size")?,
            file_records_offset: r.read_u64("header.file_records_offset")?,
            file_record_count: r.read_u32("header.file_record_count")?,
            file_record_size: r.read_u32("header.file_record_size")?,
        })
    }
}

/// One asset entry in the index.
#[derive(Clone, Debug)]
pub struct AssetEntryRecord {
    pub asset_key: AssetKey,
    pub descriptor_relpath_offset: u32,
    pub virtual_path_offset: u32,
    pub asset_type: u32,
    pub descriptor_size: u32,
    pub descriptor_sha256: [u8; 32],
}

impl AssetEntryRecord {
    /// Serializes the entry to a writer.
    pub fn write_to(&self, w: &mut BinaryWriter) {
        w.write_bytes(self.asset_key.as_bytes());
        w.write_u32(self.descriptor_relpath_offset);
        w.write_u32(self.virtual_path_offset);
        w.write_u32(self.asset_type);
        w.write_u32(self.descriptor_size);
        w.write_bytes(&self.descriptor_sha256);
    }

    /// Parses one entry.
    pub fn parse(r: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            asset_key: AssetKey::from_bytes(r.read_array("entry.asset_key")?),
            descriptor_relpath_offset: r.read_u32("entry.descriptor_relpath_offset")?,
            virtual_path_offset: r.read_u32("entry.virtual_path_offset")?,
            asset_type: r.read_u32("entry.asset_type")?,
            descriptor_size: r.read_u32("entry.descriptor_size")?,
            descriptor_sha256: r.read_array("entry.descriptor_sha256")?,
        })
    }
}

/// One auxiliary file record in the index.
///
/// `reserved1` held legacy digest bytes in older cookers; it is parsed and
/// ignored.
#[derive(Clone, Debug)]
pub struct FileRecord {
    pub kind: u32,
    pub relpath_offset: u32,
    pub size: u64,
    pub reserved1: [u8; 16],
}

impl FileRecord {
    /// Serializes the record to a writer.
    pub fn write_to(&self, w: &mut BinaryWriter) {
        w.write_u32(self.kind);
        w.write_u32(self.relpath_offset);
        w.write_u64(self.size);
        w.write_bytes(&self.reserved1);
    }

    /// Parses one record.
    pub fn parse(r: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            kind: r.read_u32("record.kind")?,
            relpath_offset: r.read_u32("record.relpath_offset")?,
            size: r.read_u64("record.size")?,
            reserved1: r.read_array("record.reserved1")?,
        })
    }
}

// ============================================================================
// Mounted root
// ============================================================================

/// A validated asset entry with its strings resolved.
#[derive(Clone, Debug)]
pub struct LooseAssetEntry {
    pub key: AssetKey,
    pub descriptor_relpath: String,
    pub virtual_path: String,
    pub asset_type: u32,
    pub descriptor_size: u32,
    pub descriptor_sha256: [u8; 32],
}

/// A mounted, fully validated loose cooked root.
#[derive(Debug)]
pub struct LooseCookedRoot {
    root: PathBuf,
    guid: [u8; 16],
    entries: Vec<LooseAssetEntry>,
    by_key: FxHashMap<AssetKey, usize>,
    files: FxHashMap<FileKind, String>,
}

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::InvalidContainer(msg.into())
}

/// SHA-256 digest of a byte slice.
#[must_use]
pub fn compute_sha256(bytes: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Resolves a NUL-terminated string at `offset` in the string table.
fn string_at(table: &[u8], offset: u32, what: &str) -> Result<String> {
    let offset = offset as usize;
    if offset >= table.len() {
        return Err(invalid(format!(
            "{what}: string offset {offset} outside table of {} bytes",
            table.len()
        )));
    }
    let tail = &table[offset..];
    let end = tail
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| invalid(format!("{what}: unterminated string at offset {offset}")))?;
    String::from_utf8(tail[..end].to_vec())
        .map_err(|_| invalid(format!("{what}: string at offset {offset} is not UTF-8")))
}

fn validate_relpath(path: &str, what: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(format!("{what}: empty relative path")));
    }
    if path.contains('\\') {
        return Err(invalid(format!(
            "{what}: relative path '{path}' uses backslash separators"
        )));
    }
    Ok(())
}

fn validate_virtual_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(invalid(format!(
            "virtual path '{path}' does not start with '/'"
        )));
    }
    if path.split('/').any(|seg| seg == "..") {
        return Err(invalid(format!(
            "virtual path '{path}' contains a '..' segment"
        )));
    }
    Ok(())
}

impl LooseCookedRoot {
    /// Mounts and validates a loose cooked root directory.
    ///
    /// Every rule listed in the module docs is enforced here; the mount
    /// either succeeds completely or fails with [`EngineError::InvalidContainer`]
    /// (or [`EngineError::ContentHashMismatch`] when hash verification is
    /// enabled and a descriptor is stale).
    pub fn open(root: &Path, verify_hashes: bool) -> Result<Self> {
        let index_path = root.join(INDEX_FILE_NAME);
        let bytes = std::fs::read(&index_path)
            .map_err(|e| invalid(format!("cannot read {}: {e}", index_path.display())))?;
        let mut r = BinaryReader::new(&bytes);
        let header = IndexHeader::parse(&mut r)?;

        // Schema and flag validation.
        if header.version != SUPPORTED_VERSION {
            return Err(invalid(format!(
                "unsupported schema version {} (expected {SUPPORTED_VERSION})",
                header.version
            )));
        }
        if header.flags & !KNOWN_FLAGS != 0 {
            return Err(invalid(format!(
                "unknown header flags {:#010x}",
                header.flags
            )));
        }
        if header.flags != 0 && header.flags & FLAG_HAS_VIRTUAL_PATHS == 0 {
            return Err(invalid(
                "non-zero flags must include the virtual-paths bit",
            ));
        }
        if header.file_record_count > 0 && header.flags & FLAG_HAS_FILE_RECORDS == 0 {
            return Err(invalid(
                "file records present without the file-records flag",
            ));
        }
        if header.guid == [0u8; 16] {
            return Err(invalid("container GUID is all zero"));
        }

        // Section layout validation.
        if header.string_table_offset < INDEX_HEADER_SIZE {
            return Err(invalid(format!(
                "string table offset {} overlaps the header",
                header.string_table_offset
            )));
        }
        let string_table_end = header
            .string_table_offset
            .checked_add(header.string_table_size)
            .ok_or_else(|| invalid("string table range overflows"))?;
        if header.asset_entries_offset < string_table_end {
            return Err(invalid(format!(
                "asset entries offset {} overlaps the string table (ends at {string_table_end})",
                header.asset_entries_offset
            )));
        }
        if header.asset_count > 0 && header.asset_entry_size != ASSET_ENTRY_SIZE {
            return Err(invalid(format!(
                "unexpected asset entry size {} (expected {ASSET_ENTRY_SIZE})",
                header.asset_entry_size
            )));
        }
        if header.file_record_count > 0 && header.file_record_size != FILE_RECORD_SIZE {
            return Err(invalid(format!(
                "unexpected file record size {} (expected {FILE_RECORD_SIZE})",
                header.file_record_size
            )));
        }

        let file_len = bytes.len() as u64;
        let entries_end = header
            .asset_entries_offset
            .checked_add(u64::from(header.asset_count) * u64::from(ASSET_ENTRY_SIZE))
            .ok_or_else(|| invalid("asset entry range overflows"))?;
        let records_end = header
            .file_records_offset
            .checked_add(u64::from(header.file_record_count) * u64::from(FILE_RECORD_SIZE))
            .ok_or_else(|| invalid("file record range overflows"))?;
        if string_table_end > file_len || entries_end > file_len {
            return Err(invalid("index sections extend past end of file"));
        }
        if header.file_record_count > 0
            && (header.file_records_offset < entries_end || records_end > file_len)
        {
            return Err(invalid("file record section out of bounds"));
        }

        // String table: NUL-separated, empty string at offset 0.
        let table =
            &bytes[header.string_table_offset as usize..string_table_end as usize];
        if !table.is_empty() && table[0] != 0 {
            return Err(invalid("string table does not start with the empty string"));
        }

        // Asset entries.
        r.seek(header.asset_entries_offset as usize, "asset entries")?;
        let mut entries = Vec::with_capacity(header.asset_count as usize);
        let mut by_key = FxHashMap::default();
        let mut seen_vpaths = FxHashSet::default();
        for i in 0..header.asset_count {
            let record = AssetEntryRecord::parse(&mut r)?;
            let relpath = string_at(table, record.descriptor_relpath_offset, "asset entry")?;
            let vpath = string_at(table, record.virtual_path_offset, "asset entry")?;
            validate_relpath(&relpath, "asset entry")?;
            validate_virtual_path(&vpath)?;
            if by_key.insert(record.asset_key, i as usize).is_some() {
                return Err(invalid(format!(
                    "duplicate asset key {}",
                    record.asset_key
                )));
            }
            if !seen_vpaths.insert(vpath.clone()) {
                return Err(invalid(format!("duplicate virtual path '{vpath}'")));
            }
            entries.push(LooseAssetEntry {
                key: record.asset_key,
                descriptor_relpath: relpath,
                virtual_path: vpath,
                asset_type: record.asset_type,
                descriptor_size: record.descriptor_size,
                descriptor_sha256: record.descriptor_sha256,
            });
        }

        // File records.
        let mut files = FxHashMap::default();
        if header.file_record_count > 0 {
            r.seek(header.file_records_offset as usize, "file records")?;
            for _ in 0..header.file_record_count {
                let record = FileRecord::parse(&mut r)?;
                let kind = FileKind::from_u32(record.kind)
                    .ok_or_else(|| invalid(format!("unknown file kind {}", record.kind)))?;
                let relpath = string_at(table, record.relpath_offset, "file record")?;
                validate_relpath(&relpath, "file record")?;
                if files.insert(kind, relpath).is_some() {
                    return Err(invalid(format!("duplicate file kind {kind:?}")));
                }
            }
            for kind in files.keys() {
                if !files.contains_key(&kind.partner()) {
                    return Err(invalid(format!(
                        "file kind {kind:?} present without its partner {:?}",
                        kind.partner()
                    )));
                }
            }
        }

        // Descriptor content verification.
        if verify_hashes {
            for entry in &entries {
                let path = root.join(&entry.descriptor_relpath);
                let descriptor = std::fs::read(&path).map_err(|e| {
                    invalid(format!("cannot read descriptor {}: {e}", path.display()))
                })?;
                if compute_sha256(&descriptor) != entry.descriptor_sha256 {
                    return Err(EngineError::ContentHashMismatch {
                        path: entry.descriptor_relpath.clone(),
                    });
                }
            }
        }

        log::debug!(
            "mounted loose cooked root {} ({} assets, {} file records)",
            root.display(),
            entries.len(),
            files.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            guid: header.guid,
            entries,
            by_key,
            files,
        })
    }

    /// Container GUID.
    #[inline]
    #[must_use]
    pub fn guid(&self) -> &[u8; 16] {
        &self.guid
    }

    /// Root directory this mount reads from.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the index lists `key`.
    #[must_use]
    pub fn contains(&self, key: AssetKey) -> bool {
        self.by_key.contains_key(&key)
    }

    /// Looks up the validated entry for `key`.
    #[must_use]
    pub fn entry(&self, key: AssetKey) -> Option<&LooseAssetEntry> {
        self.by_key.get(&key).map(|i| &self.entries[*i])
    }

    /// All asset keys in index order.
    pub fn asset_keys(&self) -> impl Iterator<Item = AssetKey> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    /// Relative path of an auxiliary file, if recorded.
    #[must_use]
    pub fn file_path(&self, kind: FileKind) -> Option<&str> {
        self.files.get(&kind).map(String::as_str)
    }

    /// Reads the descriptor bytes for `key`; `None` when the key is not in
    /// this mount.
    pub fn descriptor_bytes(&self, key: AssetKey) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.entry(key) else {
            return Ok(None);
        };
        let path = self.root.join(&entry.descriptor_relpath);
        let bytes = std::fs::read(&path)?;
        Ok(Some(bytes))
    }
}

// ============================================================================
// Emit side
// ============================================================================

/// Authors a valid loose cooked root on disk.
///
/// Belongs to the cooking/emit path; the demo runtime and tests use it to
/// produce fixtures. For invalid-index scenarios, write records directly
/// through [`IndexHeader::write_to`] and friends.
pub struct LooseRootWriter {
    root: PathBuf,
    guid: [u8; 16],
    content_version: u16,
    assets: Vec<(AssetKey, String, String, u32, Vec<u8>)>,
    file_records: Vec<(FileKind, String, u64)>,
}

impl LooseRootWriter {
    /// Creates a writer rooted at `root` with a fresh GUID.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            guid: *AssetKey::generate().as_bytes(),
            content_version: 0,
            assets: Vec::new(),
            file_records: Vec::new(),
        }
    }

    /// Overrides the container GUID.
    pub fn set_guid(&mut self, guid: [u8; 16]) -> &mut Self {
        self.guid = guid;
        self
    }

    /// Registers one asset: descriptor bytes are written to `relpath` under
    /// the root and the SHA-256 digest is recorded in the index.
    pub fn add_asset(
        &mut self,
        key: AssetKey,
        relpath: &str,
        virtual_path: &str,
        asset_type: u32,
        descriptor: Vec<u8>,
    ) -> &mut Self {
        self.assets.push((
            key,
            relpath.to_string(),
            virtual_path.to_string(),
            asset_type,
            descriptor,
        ));
        self
    }

    /// Registers one auxiliary file record.
    pub fn add_file_record(&mut self, kind: FileKind, relpath: &str, size: u64) -> &mut Self {
        self.file_records.push((kind, relpath.to_string(), size));
        self
    }

    /// Writes descriptor files and the index; returns the index path.
    pub fn write(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;

        // String table: empty string first, then interned paths.
        let mut strings: Vec<u8> = vec![0];
        let intern = |s: &str, strings: &mut Vec<u8>| -> u32 {
            let off = strings.len() as u32;
            strings.extend_from_slice(s.as_bytes());
            strings.push(0);
            off
        };

        let mut entry_records = Vec::new();
        for (key, relpath, vpath, asset_type, descriptor) in &self.assets {
            let file_path = self.root.join(relpath);
            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&file_path, descriptor)?;
            entry_records.push(AssetEntryRecord {
                asset_key: *key,
                descriptor_relpath_offset: intern(relpath, &mut strings),
                virtual_path_offset: intern(vpath, &mut strings),
                asset_type: *asset_type,
                descriptor_size: descriptor.len() as u32,
                descriptor_sha256: compute_sha256(descriptor),
            });
        }

        let mut record_records = Vec::new();
        for (kind, relpath, size) in &self.file_records {
            record_records.push(FileRecord {
                kind: *kind as u32,
                relpath_offset: intern(relpath, &mut strings),
                size: *size,
                reserved1: [0; 16],
            });
        }

        let string_table_offset = INDEX_HEADER_SIZE;
        let asset_entries_offset = string_table_offset + strings.len() as u64;
        let file_records_offset = asset_entries_offset
            + entry_records.len() as u64 * u64::from(ASSET_ENTRY_SIZE);

        let mut flags = FLAG_HAS_VIRTUAL_PATHS;
        if !record_records.is_empty() {
            flags |= FLAG_HAS_FILE_RECORDS;
        }

        let header = IndexHeader {
            guid: self.guid,
            version: SUPPORTED_VERSION,
            content_version: self.content_version,
            flags,
            string_table_offset,
            string_table_size: strings.len() as u64,
            asset_entries_offset,
            asset_count: entry_records.len() as u32,
            asset_entry_size: ASSET_ENTRY_SIZE,
            file_records_offset,
            file_record_count: record_records.len() as u32,
            file_record_size: FILE_RECORD_SIZE,
        };

        let mut w = BinaryWriter::new();
        header.write_to(&mut w);
        w.write_bytes(&strings);
        for e in &entry_records {
            e.write_to(&mut w);
        }
        for rec in &record_records {
            rec.write_to(&mut w);
        }

        let index_path = self.root.join(INDEX_FILE_NAME);
        std::fs::write(&index_path, w.into_bytes())?;
        Ok(index_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = IndexHeader {
            guid: [7; 16],
            version: SUPPORTED_VERSION,
            content_version: 3,
            flags: KNOWN_FLAGS,
            string_table_offset: INDEX_HEADER_SIZE,
            string_table_size: 1,
            asset_entries_offset: INDEX_HEADER_SIZE + 1,
            asset_count: 0,
            asset_entry_size: ASSET_ENTRY_SIZE,
            file_records_offset: INDEX_HEADER_SIZE + 1,
            file_record_count: 0,
            file_record_size: FILE_RECORD_SIZE,
        };
        let mut w = BinaryWriter::new();
        header.write_to(&mut w);
        assert_eq!(w.len() as u64, INDEX_HEADER_SIZE);
        let bytes = w.into_bytes();
        let parsed = IndexHeader::parse(&mut BinaryReader::new(&bytes)).unwrap();
        assert_eq!(parsed.guid, [7; 16]);
        assert_eq!(parsed.content_version, 3);
        assert_eq!(parsed.flags, KNOWN_FLAGS);
    }

    #[test]
    fn sha256_of_abc_matches_known_digest() {
        let digest = compute_sha256(b"abc");
        assert_eq!(
            digest[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "SHA-256(\"abc\") should start with ba7816bf"
        );
    }

    #[test]
    fn virtual_path_rules() {
        assert!(validate_virtual_path("/a/b.bin").is_ok());
        assert!(validate_virtual_path("a/b.bin").is_err());
        assert!(validate_virtual_path("/a/../b.bin").is_err());
        assert!(validate_relpath("a\\b.bin", "t").is_err());
        assert!(validate_relpath("", "t").is_err());
    }
}
