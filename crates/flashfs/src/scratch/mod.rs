//! Scratch backends staging block contents during buffered writes.

mod ram;
mod spare;

pub use ram::RamScratch;
pub use spare::SpareScratch;

use crate::device::FlashDevice;
use crate::error::Result;

/// Scratch is the capability set the write engine stages block content
/// through. The backend is picked once at volume-configuration time; the
/// engine never branches on the variant.
///
/// A scratch is an exclusively owned resource: at most one buffered write
/// may be using it at a time.
pub trait Scratch<D: FlashDevice> {
    /// erase resets the scratch to the erased state.
    ///
    /// # Errors
    /// Propagates device errors for flash-resident scratch blocks.
    fn erase(&mut self, dev: &mut D) -> Result<()>;

    /// stage copies `len` bytes from flash offset `src` into the scratch at
    /// `dst_off`. Used to capture the surviving parts of a block before its
    /// erasure.
    ///
    /// # Errors
    /// Fails if the range does not fit the scratch or the device errors out.
    fn stage(&mut self, dev: &mut D, dst_off: u64, src: u64, len: usize) -> Result<()>;

    /// write places caller bytes into the scratch at `off`.
    ///
    /// # Errors
    /// Fails if the range does not fit the scratch or the device errors out.
    fn write(&mut self, dev: &mut D, off: u64, data: &[u8]) -> Result<()>;

    /// commit erases `target_block` and programs it with the scratch's full
    /// block contents. The target must not be read between its erasure and
    /// the rewrite; commit performs both back to back.
    ///
    /// # Errors
    /// Propagates the first device error.
    fn commit(&mut self, dev: &mut D, target_block: u64) -> Result<()>;
}
