use super::Scratch;
use crate::device::{ERASED_BYTE, FlashDevice};
use crate::error::{FsError, Result};

/// Block-sized RAM staging buffer.
pub struct RamScratch {
    buf: Vec<u8>,
}

impl RamScratch {
    /// Allocates a buffer matching the device's block size.
    #[must_use]
    pub fn new(block_size: u64) -> Self {
        Self {
            buf: vec![ERASED_BYTE; usize::try_from(block_size).unwrap_or(0)],
        }
    }

    fn slice_mut(&mut self, off: u64, len: usize) -> Result<&mut [u8]> {
        let start = usize::try_from(off)
            .map_err(|_| FsError::InvalidArgument("scratch offset exceeds block size"))?;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(FsError::InvalidArgument("staging past end of scratch block"))?;
        Ok(&mut self.buf[start..end])
    }
}

impl<D: FlashDevice> Scratch<D> for RamScratch {
    fn erase(&mut self, _dev: &mut D) -> Result<()> {
        // RAM needs no real erasure; resetting to the erased pattern keeps
        // untouched bytes committing as erased cells.
        self.buf.fill(ERASED_BYTE);
        Ok(())
    }

    fn stage(&mut self, dev: &mut D, dst_off: u64, src: u64, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let dst = self.slice_mut(dst_off, len)?;
        dev.read_aligned(src, dst)
    }

    fn write(&mut self, _dev: &mut D, off: u64, data: &[u8]) -> Result<()> {
        let dst = self.slice_mut(off, data.len())?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self, dev: &mut D, target_block: u64) -> Result<()> {
        dev.erase(target_block)?;
        dev.write_aligned(target_block * dev.block_size(), &self.buf)
    }
}
