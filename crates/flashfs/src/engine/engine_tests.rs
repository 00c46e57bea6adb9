use rand::RngCore;
use tempfile::TempDir;

use super::write_buffered;
use crate::device::{ERASED_BYTE, FlashDevice, ImageFlash};
use crate::error::FsError;
use crate::scratch::{RamScratch, Scratch, SpareScratch};

const BLOCK_SIZE: u64 = 64;
const PAGE_SIZE: u64 = 16;
const BLOCK_COUNT: u64 = 8;
const SPARE: u64 = BLOCK_COUNT - 1;

fn open_flash(dir: &TempDir) -> ImageFlash {
    ImageFlash::open_prealloc(&dir.path().join("flash.img"), BLOCK_SIZE, BLOCK_COUNT, PAGE_SIZE)
        .expect("open image")
}

/// Programs a random background over every block except the spare and
/// returns the expected device contents.
fn fill_background(flash: &mut ImageFlash) -> Vec<u8> {
    let data_len = (BLOCK_SIZE * SPARE) as usize;
    let mut background = vec![0u8; data_len];
    rand::rng().fill_bytes(&mut background);
    flash.write_aligned(0, &background).unwrap();

    let mut expected = background;
    expected.extend(std::iter::repeat_n(ERASED_BYTE, BLOCK_SIZE as usize));
    expected
}

fn check_patch<S: Scratch<ImageFlash>>(scratch: &mut S, pos: u64, len: usize) {
    let dir = TempDir::new().unwrap();
    let mut flash = open_flash(&dir);
    let mut expected = fill_background(&mut flash);

    let patch: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    write_buffered(&mut flash, scratch, pos, &patch).unwrap();

    let pos = usize::try_from(pos).unwrap();
    expected[pos..pos + len].copy_from_slice(&patch);
    // The spare block's contents are staging noise; only the data area is
    // meaningful after a spare-backed write.
    let data_end = (BLOCK_SIZE * SPARE) as usize;
    let mut out = vec![0u8; data_end];
    flash.read_aligned(0, &mut out).unwrap();
    assert_eq!(out, expected[..data_end]);
}

#[test]
fn single_block_write_preserves_surrounding_bytes() {
    check_patch(&mut RamScratch::new(BLOCK_SIZE), 2 * BLOCK_SIZE + 7, 10);
}

#[test]
fn write_spanning_three_blocks() {
    let len = usize::try_from(2 * BLOCK_SIZE).unwrap();
    check_patch(&mut RamScratch::new(BLOCK_SIZE), BLOCK_SIZE + 13, len);
}

#[test]
fn write_starting_on_block_boundary() {
    check_patch(&mut RamScratch::new(BLOCK_SIZE), 3 * BLOCK_SIZE, 20);
}

#[test]
fn write_ending_on_block_boundary_leaves_next_block_alone() {
    let len = usize::try_from(BLOCK_SIZE + (BLOCK_SIZE - 13)).unwrap();
    check_patch(&mut RamScratch::new(BLOCK_SIZE), 13, len);
}

#[test]
fn write_reaching_the_last_data_byte() {
    // Ends exactly at the data area's upper edge; the engine must not
    // reach past it to stage a suffix.
    check_patch(&mut RamScratch::new(BLOCK_SIZE), (SPARE - 1) * BLOCK_SIZE + 30, 34);
}

#[test]
fn spare_scratch_single_block_write() {
    check_patch(&mut SpareScratch::new(SPARE), 2 * BLOCK_SIZE + 7, 10);
}

#[test]
fn spare_scratch_multi_block_write() {
    let len = usize::try_from(BLOCK_SIZE + 21).unwrap();
    check_patch(&mut SpareScratch::new(SPARE), BLOCK_SIZE + 40, len);
}

#[test]
fn repeated_overwrites_land_exactly() {
    let dir = TempDir::new().unwrap();
    let mut flash = open_flash(&dir);
    let mut scratch = RamScratch::new(BLOCK_SIZE);
    fill_background(&mut flash);

    write_buffered(&mut flash, &mut scratch, 100, b"first pass").unwrap();
    write_buffered(&mut flash, &mut scratch, 100, b"second").unwrap();

    let mut out = [0u8; 10];
    flash.read_aligned(100, &mut out).unwrap();
    assert_eq!(&out, b"secondpass");
}

#[test]
fn empty_write_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let mut flash = open_flash(&dir);
    let mut scratch = RamScratch::new(BLOCK_SIZE);
    let expected = fill_background(&mut flash);

    write_buffered(&mut flash, &mut scratch, 10, &[]).unwrap();

    let mut out = vec![0u8; expected.len()];
    flash.read_aligned(0, &mut out).unwrap();
    assert_eq!(out, expected);
}

#[test]
fn write_past_the_device_fails() {
    let dir = TempDir::new().unwrap();
    let mut flash = open_flash(&dir);
    let mut scratch = RamScratch::new(BLOCK_SIZE);

    let err = write_buffered(&mut flash, &mut scratch, BLOCK_SIZE * BLOCK_COUNT - 2, &[0u8; 4])
        .unwrap_err();
    assert!(matches!(err, FsError::InvalidArgument(_)));
}
