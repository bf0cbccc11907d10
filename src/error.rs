use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors produced while decoding or splitting a boot image
#[derive(Debug, Error)]
pub enum Error {
    #[error("Not a recognized boot image: unknown magic \"{}\"", .0.escape_ascii())]
    UnknownMagic([u8; 8]),
    #[error("Page size must not be zero")]
    PageSizeZero,
    #[error("Boot image is truncated: {section} needs bytes {offset}..{end}, but the image is {len} bytes")]
    Truncated {
        section: &'static str,
        offset: u64,
        end: u64,
        len: u64,
    },
    #[error("Failed to read boot image header")]
    HeaderRead(#[source] binrw::Error),
    #[error("Failed to read {0} from boot image")]
    DataRead(&'static str, #[source] io::Error),
    #[error("Failed to write {path:?}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Returns whether the input is not a usable boot image at all, as opposed
    /// to being cut short or failing on I/O.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::UnknownMagic(_) | Self::PageSizeZero)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
