use super::Scratch;
use crate::device::FlashDevice;
use crate::error::Result;

/// Reserved spare flash block used as the staging area. By convention the
/// volume reserves the device's last block for this.
pub struct SpareScratch {
    spare: u64,
}

impl SpareScratch {
    #[must_use]
    pub const fn new(spare_block: u64) -> Self {
        Self { spare: spare_block }
    }

    /// block returns the reserved block's index.
    #[must_use]
    pub const fn block(&self) -> u64 {
        self.spare
    }
}

impl<D: FlashDevice> Scratch<D> for SpareScratch {
    fn erase(&mut self, dev: &mut D) -> Result<()> {
        dev.erase(self.spare)
    }

    fn stage(&mut self, dev: &mut D, dst_off: u64, src: u64, len: usize) -> Result<()> {
        dev.copy_aligned(self.spare * dev.block_size() + dst_off, src, len)
    }

    fn write(&mut self, dev: &mut D, off: u64, data: &[u8]) -> Result<()> {
        dev.write_aligned(self.spare * dev.block_size() + off, data)
    }

    fn commit(&mut self, dev: &mut D, target_block: u64) -> Result<()> {
        dev.copy_block(target_block, self.spare)
    }
}
