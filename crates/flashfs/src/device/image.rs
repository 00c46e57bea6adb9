use memmap2::{MmapMut, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};

use super::{ERASED_BYTE, FlashDevice};
use crate::error::{FsError, Result};

/// File-backed flash image modelling NAND semantics: `erase` fills a block
/// with `0xFF`, and programming can only clear bits (`new = old & data`).
/// A write to a region that was not erased first is therefore visibly
/// corrupt rather than silently accepted.
#[derive(Debug)]
pub struct ImageFlash {
    path: PathBuf,
    _file: File,
    map: MmapMut,
    block_size: u64,
    page_size: u64,
    block_count: u64,
}

impl ImageFlash {
    /// Opens a flash image, creating and pre-sizing it if needed. A fresh
    /// image starts fully erased.
    ///
    /// # Errors
    /// Returns an error if the image cannot be created/opened or mapped, or
    /// if the geometry is degenerate.
    pub fn open_prealloc(
        path: &Path,
        block_size: u64,
        block_count: u64,
        page_size: u64,
    ) -> Result<Self> {
        if block_size == 0 || block_count == 0 || page_size == 0 || block_size % page_size != 0 {
            return Err(FsError::InvalidArgument("bad flash geometry"));
        }

        let existed = path.exists();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = block_size
            .checked_mul(block_count)
            .ok_or(FsError::InvalidArgument("image length overflow"))?;
        let prev_len = file.metadata().map(|m| m.len()).unwrap_or(0);
        file.set_len(len)?;

        let map_len = usize::try_from(len)
            .map_err(|_| FsError::InvalidArgument("image length exceeds addressable size"))?;
        let mut map = unsafe { MmapOptions::new().len(map_len).map_mut(&file)? };

        if !existed || prev_len == 0 {
            map.fill(ERASED_BYTE);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
            map,
            block_size,
            page_size,
            block_count,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn range(&self, offset: u64, len: usize) -> Result<std::ops::Range<usize>> {
        let end = offset
            .checked_add(len as u64)
            .ok_or(FsError::InvalidArgument("access length overflow"))?;
        if end > self.capacity() {
            return Err(FsError::InvalidArgument("access past end of device"));
        }
        let start = usize::try_from(offset)
            .map_err(|_| FsError::InvalidArgument("offset exceeds addressable size"))?;
        Ok(start..start + len)
    }
}

impl FlashDevice for ImageFlash {
    fn block_size(&self) -> u64 {
        self.block_size
    }

    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn erase(&mut self, block: u64) -> Result<()> {
        if block >= self.block_count {
            return Err(FsError::InvalidArgument("erase past end of device"));
        }
        let range = self.range(block * self.block_size, self.block_size as usize)?;
        self.map[range].fill(ERASED_BYTE);
        Ok(())
    }

    fn read_aligned(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.map[range]);
        Ok(())
    }

    fn write_aligned(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let range = self.range(offset, data.len())?;
        for (cell, byte) in self.map[range].iter_mut().zip(data) {
            *cell &= *byte;
        }
        Ok(())
    }

    fn copy_aligned(&mut self, dst: u64, src: u64, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        // Page-sized bounce buffer, chunked like the hardware would program.
        let page = usize::try_from(self.page_size)
            .map_err(|_| FsError::InvalidArgument("page size exceeds addressable size"))?;
        let mut bounce = vec![0u8; page.min(len)];
        let mut copied = 0usize;
        while copied < len {
            let take = page.min(len - copied);
            self.read_aligned(src + copied as u64, &mut bounce[..take])?;
            let range = self.range(dst + copied as u64, take)?;
            for (cell, byte) in self.map[range].iter_mut().zip(&bounce[..take]) {
                *cell &= *byte;
            }
            copied += take;
        }
        Ok(())
    }

    fn copy_block(&mut self, dst_block: u64, src_block: u64) -> Result<()> {
        if src_block >= self.block_count {
            return Err(FsError::InvalidArgument("copy source past end of device"));
        }
        self.erase(dst_block)?;
        self.copy_aligned(
            dst_block * self.block_size,
            src_block * self.block_size,
            self.block_size as usize,
        )
    }
}
