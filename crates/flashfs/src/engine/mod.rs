//! Buffered unaligned-write engine.
//!
//! Flash is rewritten erase-then-program, a whole block at a time. This
//! module reconciles that with byte-granular writes by rebuilding each
//! partially covered block inside the scratch resource before committing it.

#[cfg(test)]
mod engine_tests;

use tracing::trace;

use crate::device::FlashDevice;
use crate::error::{FsError, Result};
use crate::scratch::Scratch;

/// write_buffered programs `data` at absolute byte offset `pos`, honoring
/// erase/program granularity while preserving every byte of the touched
/// blocks outside `[pos, pos + data.len())`.
///
/// A write spanning n blocks performs n erase/program cycles on the targets
/// plus up to two scratch round-trips (head and tail). A failure partway
/// propagates the first error and leaves already-committed blocks in place;
/// there is no rollback.
///
/// # Errors
/// Fails with `InvalidArgument` when the write runs past the device, and
/// with the underlying device error otherwise.
pub fn write_buffered<D, S>(dev: &mut D, scratch: &mut S, pos: u64, data: &[u8]) -> Result<()>
where
    D: FlashDevice,
    S: Scratch<D>,
{
    if data.is_empty() {
        return Ok(());
    }

    let bs = dev.block_size();
    let end = pos
        .checked_add(data.len() as u64)
        .ok_or(FsError::InvalidArgument("write offset overflow"))?;
    if end > dev.capacity() {
        return Err(FsError::InvalidArgument("write past end of device"));
    }

    let start_bk = pos / bs;
    let end_bk = end / bs;
    let mut in_pos = pos % bs;

    trace!(pos, len = data.len(), start_bk, end_bk, "buffered write");

    scratch.erase(dev)?;
    // Surviving prefix of the first block, captured before anything is
    // erased.
    scratch.stage(dev, 0, start_bk * bs, in_pos as usize)?;

    if start_bk == end_bk {
        scratch.write(dev, in_pos, data)?;
        in_pos += data.len() as u64;
    } else {
        let head = (bs - in_pos) as usize;
        scratch.write(dev, in_pos, &data[..head])?;
        scratch.commit(dev, start_bk)?;

        let block = bs as usize;
        let mut rest = &data[head..];
        for bk in start_bk + 1..end_bk {
            // Fully covered: erase and program the whole block, no staging.
            dev.erase(bk)?;
            dev.write_aligned(bk * bs, &rest[..block])?;
            rest = &rest[block..];
        }

        if rest.is_empty() {
            // The write ends exactly on a block boundary; there is no
            // partial tail block to rebuild.
            return Ok(());
        }

        scratch.erase(dev)?;
        scratch.write(dev, 0, rest)?;
        in_pos = rest.len() as u64;
    }

    // Surviving suffix of the last block, read from flash before commit
    // erases it.
    scratch.stage(dev, in_pos, end_bk * bs + in_pos, (bs - in_pos) as usize)?;
    scratch.commit(dev, end_bk)
}
