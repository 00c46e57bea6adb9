//! On-disk records: the superblock and the directory-entry table.
//!
//! Records are encoded field by field as fixed-width little-endian values,
//! keeping the format independent of host endianness and struct layout.

/// MAGIC identifies a formatted volume.
pub const MAGIC: [u8; 2] = [0x0D, 0xF5];
/// NAME_LEN is the fixed capacity of an entry's name field, terminator
/// included.
pub const NAME_LEN: usize = 20;
/// SUPERBLOCK_SIZE is the encoded superblock footprint (the last two bytes
/// are reserved).
pub const SUPERBLOCK_SIZE: usize = 24;
/// ENTRY_SIZE is the encoded directory-entry footprint.
pub const ENTRY_SIZE: usize = NAME_LEN + 12;
/// ROOT_INO is the root directory's entry index.
pub const ROOT_INO: u32 = 0;
/// FLAG_DIRECTORY marks an entry as a directory.
pub const FLAG_DIRECTORY: u32 = 0o040000;
/// FLAG_REGULAR marks an entry as a regular file.
pub const FLAG_REGULAR: u32 = 0o100000;

/// entry_offset returns the flash offset of directory entry `n`.
#[must_use]
pub const fn entry_offset(n: u32) -> u64 {
    SUPERBLOCK_SIZE as u64 + n as u64 * ENTRY_SIZE as u64
}

/// table_end returns the first byte past a table of `max_inode_count`
/// entries; file data regions start here.
#[must_use]
pub const fn table_end(max_inode_count: u32) -> u64 {
    entry_offset(max_inode_count)
}

/// Superblock record stored at flash offset 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Superblock {
    /// Directory entries currently allocated, root included. Never
    /// decremented; there is no delete support.
    pub inode_count: u32,
    /// Table capacity fixed at format time (root plus the file slots).
    pub max_inode_count: u32,
    /// Per-file data region size fixed at format time.
    pub max_len: u32,
    /// Index of the reserved spare block at the device's end.
    pub buff_bk: u32,
    /// Offset of the next unallocated data region; advances by `max_len`
    /// on every create.
    pub free_space: u32,
}

impl Superblock {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        buf[0..2].copy_from_slice(&MAGIC);
        buf[2..6].copy_from_slice(&self.inode_count.to_le_bytes());
        buf[6..10].copy_from_slice(&self.max_inode_count.to_le_bytes());
        buf[10..14].copy_from_slice(&self.max_len.to_le_bytes());
        buf[14..18].copy_from_slice(&self.buff_bk.to_le_bytes());
        buf[18..22].copy_from_slice(&self.free_space.to_le_bytes());
        buf
    }

    /// from_bytes decodes a superblock; `None` when the magic bytes are
    /// absent or mismatched (unformatted or foreign volume).
    #[must_use]
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < SUPERBLOCK_SIZE || buf[0..2] != MAGIC {
            return None;
        }
        Some(Self {
            inode_count: u32::from_le_bytes(buf[2..6].try_into().ok()?),
            max_inode_count: u32::from_le_bytes(buf[6..10].try_into().ok()?),
            max_len: u32::from_le_bytes(buf[10..14].try_into().ok()?),
            buff_bk: u32::from_le_bytes(buf[14..18].try_into().ok()?),
            free_space: u32::from_le_bytes(buf[18..22].try_into().ok()?),
        })
    }
}

/// One fixed-size directory entry record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskEntry {
    /// Entry name; encoded null-terminated into `NAME_LEN` bytes.
    pub name: String,
    /// Byte offset of this entry's data region on flash.
    pub pos_start: u32,
    /// Current logical length of the entry's data. Append-only: truncate
    /// never shrinks it.
    pub len: u32,
    /// Entry kind plus mode bits.
    pub flags: u32,
}

impl DiskEntry {
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        let name = self.name.as_bytes();
        let max = name.len().min(NAME_LEN - 1);
        buf[..max].copy_from_slice(&name[..max]);
        buf[NAME_LEN..NAME_LEN + 4].copy_from_slice(&self.pos_start.to_le_bytes());
        buf[NAME_LEN + 4..NAME_LEN + 8].copy_from_slice(&self.len.to_le_bytes());
        buf[NAME_LEN + 8..NAME_LEN + 12].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }

    /// from_bytes decodes an entry; `None` for an empty slot. A slot is
    /// empty when its name starts with `0x00` (never written with a name)
    /// or `0xFF` (erased flash).
    #[must_use]
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < ENTRY_SIZE {
            return None;
        }
        let first = buf[0];
        if first == 0x00 || first == 0xFF {
            return None;
        }
        let name_bytes = &buf[..NAME_LEN];
        let end = name_bytes.iter().position(|b| *b == 0).unwrap_or(NAME_LEN);
        let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
        Some(Self {
            name,
            pos_start: u32::from_le_bytes(buf[NAME_LEN..NAME_LEN + 4].try_into().ok()?),
            len: u32::from_le_bytes(buf[NAME_LEN + 4..NAME_LEN + 8].try_into().ok()?),
            flags: u32::from_le_bytes(buf[NAME_LEN + 8..NAME_LEN + 12].try_into().ok()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superblock_round_trip_preserves_fields() {
        let sb = Superblock {
            inode_count: 3,
            max_inode_count: 5,
            max_len: 64,
            buff_bk: 15,
            free_space: 312,
        };
        let decoded = Superblock::from_bytes(&sb.to_bytes()).expect("decode superblock");
        assert_eq!(decoded, sb);
    }

    #[test]
    fn superblock_rejects_bad_magic() {
        let sb = Superblock {
            inode_count: 1,
            max_inode_count: 5,
            max_len: 64,
            buff_bk: 15,
            free_space: 184,
        };
        let mut bytes = sb.to_bytes();
        bytes[1] ^= 0xFF;
        assert!(Superblock::from_bytes(&bytes).is_none());
    }

    #[test]
    fn superblock_rejects_short_buffer() {
        assert!(Superblock::from_bytes(&[0u8; SUPERBLOCK_SIZE - 1]).is_none());
    }

    #[test]
    fn entry_round_trip_preserves_fields() {
        let entry = DiskEntry {
            name: "a.txt".to_string(),
            pos_start: 184,
            len: 5,
            flags: FLAG_REGULAR,
        };
        let decoded = DiskEntry::from_bytes(&entry.to_bytes()).expect("decode entry");
        assert_eq!(decoded, entry);
        assert!(!decoded.is_dir());
    }

    #[test]
    fn entry_clamps_long_names_with_terminator() {
        let entry = DiskEntry {
            name: "x".repeat(NAME_LEN + 10),
            pos_start: 0,
            len: 0,
            flags: FLAG_REGULAR,
        };
        let decoded = DiskEntry::from_bytes(&entry.to_bytes()).expect("decode entry");
        assert_eq!(decoded.name.len(), NAME_LEN - 1);
    }

    #[test]
    fn zeroed_and_erased_slots_decode_as_empty() {
        assert!(DiskEntry::from_bytes(&[0x00; ENTRY_SIZE]).is_none());
        assert!(DiskEntry::from_bytes(&[0xFF; ENTRY_SIZE]).is_none());
    }

    #[test]
    fn entry_offsets_are_densely_packed() {
        assert_eq!(entry_offset(0), SUPERBLOCK_SIZE as u64);
        assert_eq!(
            entry_offset(3) - entry_offset(2),
            ENTRY_SIZE as u64
        );
        assert_eq!(table_end(5), entry_offset(5));
    }
}
