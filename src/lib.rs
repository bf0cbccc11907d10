//! Splits Android boot images into the kernel, ramdisk and second stage they
//! carry.
//!
//! ```no_run
//! use std::{fs::File, io::BufReader, path::Path};
//!
//! use abootimg_split::{base_name, split, BootImageHeader, DecodeOptions};
//!
//! let path = Path::new("boot.img");
//! let mut r = BufReader::new(File::open(path)?);
//! let hdr = BootImageHeader::decode(&mut r, &DecodeOptions::default())?;
//! split(r.get_mut(), &hdr, Path::new("."), &base_name(path))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
pub mod extract;
mod header;
pub mod layout;

pub use error::{Error, Result};
pub use extract::{base_name, split};
pub use header::{
    BootImageHeader, DecodeOptions, MagicCheck, BOOT_ARGS_SIZE, BOOT_ID_SIZE, BOOT_MAGIC,
    BOOT_MAGIC_SIZE, BOOT_NAME_SIZE, HEADER_SIZE,
};
pub use layout::Layout;
