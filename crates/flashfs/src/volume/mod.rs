//! Mounted-volume state and the directory/file operations on top of it.


use tracing::{debug, warn};

use crate::device::FlashDevice;
use crate::engine::write_buffered;
use crate::error::{FsError, Result};
use crate::layout::{
    self, DiskEntry, ENTRY_SIZE, FLAG_DIRECTORY, NAME_LEN, ROOT_INO, SUPERBLOCK_SIZE, Superblock,
};
use crate::scratch::Scratch;

/// Format-time volume parameters. Also consulted by [`Volume::mount`] when
/// an unformatted image has to be initialized on the spot.
#[derive(Clone, Debug)]
pub struct FormatOptions {
    /// Number of regular files the directory table can hold (root excluded).
    pub max_files: u32,
    /// Fixed per-file data region size in bytes.
    pub max_len: u32,
}

/// In-memory shell for one directory entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inode {
    pub ino: u32,
    pub pos_start: u32,
    pub len: u32,
    pub flags: u32,
}

impl Inode {
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }
}

/// NameStyle selects how [`Volume::pathname`] renders a name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameStyle {
    /// The bare entry name.
    Bare,
    /// The name prefixed with `/`.
    Rooted,
}

/// Resumable directory-scan position for [`Volume::iterate`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DirCursor(u32);

/// Open-file state: the resolved entry plus a byte cursor into its region.
#[derive(Clone, Debug)]
pub struct FileHandle {
    pub inode: Inode,
    pos: u64,
}

impl FileHandle {
    /// seek moves the cursor to an absolute position in the file region.
    pub const fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    #[must_use]
    pub const fn position(&self) -> u64 {
        self.pos
    }
}

/// One mounted flash volume: the device, the injected scratch backend and
/// an in-memory copy of the superblock. One instance per device; nothing
/// here is process-global.
pub struct Volume<D: FlashDevice, S: Scratch<D>> {
    device: D,
    scratch: S,
    sb: Superblock,
}

impl<D: FlashDevice, S: Scratch<D>> Volume<D, S> {
    /// format erases every block on the device and writes an empty volume
    /// holding only the root entry. Destructive.
    ///
    /// # Errors
    /// Fails on degenerate parameters or any device error.
    pub fn format(mut device: D, scratch: S, opts: &FormatOptions) -> Result<Self> {
        if opts.max_files == 0 || opts.max_len == 0 {
            return Err(FsError::InvalidArgument("max_files and max_len must be non-zero"));
        }
        let max_inode_count = opts
            .max_files
            .checked_add(1) // slot 0 is the root
            .ok_or(FsError::InvalidArgument("max_files out of range"))?;
        let free_space = u32::try_from(layout::table_end(max_inode_count))
            .map_err(|_| FsError::InvalidArgument("directory table exceeds field width"))?;

        for bk in 0..device.block_count() {
            device.erase(bk)?;
        }

        let sb = Superblock {
            inode_count: 1,
            max_inode_count,
            max_len: opts.max_len,
            buff_bk: u32::try_from(device.block_count() - 1)
                .map_err(|_| FsError::InvalidArgument("spare block index exceeds field width"))?,
            free_space,
        };
        let root = DiskEntry {
            name: "/".to_string(),
            pos_start: free_space,
            len: opts.max_files,
            flags: FLAG_DIRECTORY,
        };

        // Freshly erased device: superblock plus root entry go out as one
        // aligned write, no staging needed.
        let mut buf = [0u8; SUPERBLOCK_SIZE + ENTRY_SIZE];
        buf[..SUPERBLOCK_SIZE].copy_from_slice(&sb.to_bytes());
        buf[SUPERBLOCK_SIZE..].copy_from_slice(&root.to_bytes());
        device.write_aligned(0, &buf)?;

        debug!(
            max_files = opts.max_files,
            max_len = opts.max_len,
            "formatted volume"
        );
        Ok(Self { device, scratch, sb })
    }

    /// mount reads the superblock, auto-formatting the volume when the
    /// magic bytes are absent or mismatched. Mounting an already-formatted
    /// volume never touches flash.
    ///
    /// # Errors
    /// Propagates device errors, and format errors on an unformatted image.
    pub fn mount(device: D, scratch: S, opts: &FormatOptions) -> Result<Self> {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        device.read_aligned(0, &mut buf)?;
        match Superblock::from_bytes(&buf) {
            Some(sb) => Ok(Self { device, scratch, sb }),
            None => {
                warn!("no valid superblock, formatting");
                Self::format(device, scratch, opts)
            }
        }
    }

    /// superblock returns the mounted in-memory superblock snapshot.
    #[must_use]
    pub const fn superblock(&self) -> &Superblock {
        &self.sb
    }

    /// root returns the root directory's inode.
    ///
    /// # Errors
    /// Fails if the root entry cannot be read back.
    pub fn root(&mut self) -> Result<Inode> {
        self.inode(ROOT_INO)
    }

    /// create allocates the next directory entry and its data region.
    ///
    /// # Errors
    /// `CapacityExceeded` when the table is full or the region would reach
    /// the reserved spare block (superblock untouched in both cases),
    /// `InvalidArgument` for bad or duplicate names.
    pub fn create(&mut self, name: &str, flags: u32) -> Result<Inode> {
        let name = normalize_name(name)?;
        if self.sb.inode_count >= self.sb.max_inode_count {
            return Err(FsError::CapacityExceeded);
        }
        let region_end = u64::from(self.sb.free_space) + u64::from(self.sb.max_len);
        if region_end > u64::from(self.sb.buff_bk) * self.device.block_size() {
            return Err(FsError::CapacityExceeded);
        }
        let next_free = u32::try_from(region_end).map_err(|_| FsError::CapacityExceeded)?;
        if self.path_to_inode(name).is_ok() {
            return Err(FsError::InvalidArgument("name already exists"));
        }

        let ino = self.sb.inode_count;
        let entry = DiskEntry {
            name: name.to_string(),
            pos_start: self.sb.free_space,
            len: 0,
            flags,
        };
        self.write_entry(ino, &entry)?;

        self.sb.inode_count += 1;
        self.sb.free_space = next_free;
        self.write_superblock()?;

        debug!(ino, name, "created entry");
        Ok(Inode {
            ino,
            pos_start: entry.pos_start,
            len: 0,
            flags,
        })
    }

    /// lookup resolves a path to a fresh inode shell. A bare `/` (or the
    /// empty path) resolves to the root.
    ///
    /// # Errors
    /// `NotFound` when no entry matches.
    pub fn lookup(&mut self, path: &str) -> Result<Inode> {
        let name = path.strip_prefix('/').unwrap_or(path);
        if name.is_empty() {
            return self.root();
        }
        let ino = self.path_to_inode(name)?;
        self.inode(ino)
    }

    /// iterate returns the next live entry strictly after the cursor, or
    /// `None` at end of directory. The parent must be the root; the scan is
    /// bounded by the root entry's length (its file-slot count) and is not
    /// stable across concurrent mutation.
    ///
    /// # Errors
    /// Propagates device errors.
    pub fn iterate(
        &mut self,
        parent: &Inode,
        cursor: &mut DirCursor,
    ) -> Result<Option<(String, Inode)>> {
        let mut pos = cursor.0.max(1); // slot 0 is the parent itself
        while pos <= parent.len {
            match self.read_entry(pos) {
                Ok(entry) => {
                    cursor.0 = pos + 1;
                    let inode = Inode {
                        ino: pos,
                        pos_start: entry.pos_start,
                        len: entry.len,
                        flags: entry.flags,
                    };
                    return Ok(Some((entry.name, inode)));
                }
                Err(FsError::NotFound) => pos += 1,
                Err(e) => return Err(e),
            }
        }
        cursor.0 = pos;
        Ok(None)
    }

    /// truncate grows an entry's logical length. Shrinking is a structural
    /// limitation of this filesystem, not a policy choice: it always fails.
    ///
    /// # Errors
    /// `InvalidArgument` on shrink attempts or lengths beyond the per-file
    /// maximum; the stored length is untouched in both cases.
    pub fn truncate(&mut self, inode: &mut Inode, new_len: u32) -> Result<()> {
        if new_len > self.sb.max_len {
            return Err(FsError::InvalidArgument("length beyond per-file maximum"));
        }
        let mut entry = self.read_entry(inode.ino)?;
        if new_len == entry.len {
            return Ok(()); // nothing to persist
        }
        if new_len < entry.len {
            return Err(FsError::InvalidArgument("shrinking is not supported"));
        }
        entry.len = new_len;
        self.write_entry(inode.ino, &entry)?;
        inode.len = new_len;
        Ok(())
    }

    /// pathname renders an entry's stored name, bare or `/`-prefixed.
    ///
    /// # Errors
    /// Fails if the entry cannot be read back.
    pub fn pathname(&mut self, inode: &Inode, style: NameStyle) -> Result<String> {
        let entry = self.read_entry(inode.ino)?;
        Ok(match style {
            NameStyle::Bare => entry.name,
            NameStyle::Rooted => format!("/{}", entry.name.trim_start_matches('/')),
        })
    }

    /// open resolves a path into a file handle with its cursor at 0.
    ///
    /// # Errors
    /// `NotFound` when no entry matches.
    pub fn open(&mut self, path: &str) -> Result<FileHandle> {
        let inode = self.lookup(path)?;
        Ok(FileHandle { inode, pos: 0 })
    }

    /// close releases a handle. Nothing is buffered, so there is nothing to
    /// flush.
    #[allow(clippy::unused_self, clippy::needless_pass_by_value)]
    pub fn close(&mut self, _handle: FileHandle) -> Result<()> {
        Ok(())
    }

    /// read copies bytes at the handle's cursor, clamped to the logical
    /// length, advancing the cursor by the clamped count.
    ///
    /// # Errors
    /// `SizeExceeded` when the clamp comes out empty (cursor at or past the
    /// logical length, or an empty buffer).
    pub fn read(&mut self, handle: &mut FileHandle, buf: &mut [u8]) -> Result<usize> {
        let remaining = u64::from(handle.inode.len).saturating_sub(handle.pos);
        let l = usize::try_from((buf.len() as u64).min(remaining)).unwrap_or(0);
        if l == 0 {
            return Err(FsError::SizeExceeded);
        }
        let pos = u64::from(handle.inode.pos_start) + handle.pos;
        self.device.read_aligned(pos, &mut buf[..l])?;
        handle.pos += l as u64;
        Ok(l)
    }

    /// write programs bytes at the handle's cursor, clamped to the file
    /// region, advancing the cursor by the clamped count. The logical
    /// length is persisted separately via [`Self::truncate`].
    ///
    /// # Errors
    /// `SizeExceeded` when the clamp comes out empty (region exhausted or
    /// empty payload); device errors from the buffered write otherwise.
    pub fn write(&mut self, handle: &mut FileHandle, data: &[u8]) -> Result<usize> {
        let remaining = u64::from(self.sb.max_len).saturating_sub(handle.pos);
        let l = usize::try_from((data.len() as u64).min(remaining)).unwrap_or(0);
        if l == 0 {
            return Err(FsError::SizeExceeded);
        }
        let pos = u64::from(handle.inode.pos_start) + handle.pos;
        write_buffered(&mut self.device, &mut self.scratch, pos, &data[..l])?;
        handle.pos += l as u64;
        Ok(l)
    }

    fn inode(&mut self, ino: u32) -> Result<Inode> {
        let entry = self.read_entry(ino)?;
        Ok(Inode {
            ino,
            pos_start: entry.pos_start,
            len: entry.len,
            flags: entry.flags,
        })
    }

    fn write_superblock(&mut self) -> Result<()> {
        let bytes = self.sb.to_bytes();
        write_buffered(&mut self.device, &mut self.scratch, 0, &bytes)
    }

    fn read_entry(&mut self, n: u32) -> Result<DiskEntry> {
        if n >= self.sb.max_inode_count {
            return Err(FsError::NotFound);
        }
        let mut buf = [0u8; ENTRY_SIZE];
        self.device.read_aligned(layout::entry_offset(n), &mut buf)?;
        DiskEntry::from_bytes(&buf).ok_or(FsError::NotFound)
    }

    fn write_entry(&mut self, n: u32, entry: &DiskEntry) -> Result<()> {
        let bytes = entry.to_bytes();
        write_buffered(
            &mut self.device,
            &mut self.scratch,
            layout::entry_offset(n),
            &bytes,
        )
    }

    /// Linear scan over the table; O(n) is fine for the small fixed
    /// directory capacities typical of flash volumes.
    fn path_to_inode(&mut self, name: &str) -> Result<u32> {
        for n in 0..self.sb.max_inode_count {
            match self.read_entry(n) {
                Ok(entry) if entry.name == name => return Ok(n),
                Ok(_) | Err(FsError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Err(FsError::NotFound)
    }
}

fn normalize_name(path: &str) -> Result<&str> {
    let name = path.strip_prefix('/').unwrap_or(path);
    if name.is_empty() {
        return Err(FsError::InvalidArgument("empty name"));
    }
    if name.contains('/') {
        return Err(FsError::InvalidArgument("subdirectories are not supported"));
    }
    if name.len() >= NAME_LEN {
        return Err(FsError::InvalidArgument("name too long"));
    }
    Ok(name)
}
