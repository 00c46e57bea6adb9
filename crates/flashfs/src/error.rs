//! Error types shared across the crate.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FsError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FsError {
    /// Any erase/read/write failure on the underlying flash image.
    #[error("flash device i/o failure")]
    DeviceIo(#[from] std::io::Error),
    /// The directory entry table (or the data area) is exhausted.
    #[error("directory entry table is full")]
    CapacityExceeded,
    /// No directory entry matches the requested name.
    #[error("no entry matches the requested name")]
    NotFound,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// A read/write clamped against its file region came out empty.
    #[error("request does not fit in the file region")]
    SizeExceeded,
}
