//! Flash device primitives and the file-backed image implementation.

mod image;

pub use image::ImageFlash;

use crate::error::Result;

/// Erased NAND cells read back as all-ones.
pub const ERASED_BYTE: u8 = 0xFF;

/// FlashDevice is the raw NAND contract the write engine is built against.
///
/// Blocks are the erase unit, pages the program unit. A block must be erased
/// before any byte inside it is programmed again; programming a non-erased
/// region yields corrupt data, not an error.
pub trait FlashDevice {
    /// block_size returns the erase-unit size in bytes.
    fn block_size(&self) -> u64;
    /// page_size returns the program-unit size in bytes.
    fn page_size(&self) -> u64;
    /// block_count returns the number of erase blocks on the device.
    fn block_count(&self) -> u64;

    /// erase wipes one block back to the erased (all-ones) state.
    ///
    /// # Errors
    /// Fails if the block index is out of range or the device errors out.
    fn erase(&mut self, block: u64) -> Result<()>;

    /// read_aligned copies `buf.len()` bytes at `offset` into `buf`.
    ///
    /// # Errors
    /// Fails if the range runs past the device or the device errors out.
    fn read_aligned(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// write_aligned programs `data` at `offset`. The target bytes must have
    /// been erased since they were last programmed.
    ///
    /// # Errors
    /// Fails if the range runs past the device or the device errors out.
    fn write_aligned(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// copy_aligned programs `len` bytes read from `src` at `dst`.
    ///
    /// # Errors
    /// Fails if either range runs past the device or the device errors out.
    fn copy_aligned(&mut self, dst: u64, src: u64, len: usize) -> Result<()>;

    /// copy_block erases `dst_block`, then programs it with the full
    /// contents of `src_block`.
    ///
    /// # Errors
    /// Fails if either block index is out of range or the device errors out.
    fn copy_block(&mut self, dst_block: u64, src_block: u64) -> Result<()>;

    /// capacity returns the device size in bytes.
    fn capacity(&self) -> u64 {
        self.block_size() * self.block_count()
    }
}
