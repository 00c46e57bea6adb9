//! Minimal filesystem driver for raw NAND flash images.
//!
//! Flash cannot be rewritten in place: a block must be fully erased before
//! any byte within it is programmed again. This crate offers byte-granular
//! file reads and writes on top of that constraint, staging the surviving
//! parts of partially covered blocks through a single scratch resource.
#![allow(clippy::cargo_common_metadata)]

pub mod device;
pub mod engine;
pub mod error;
pub mod layout;
pub mod scratch;
pub mod volume;
