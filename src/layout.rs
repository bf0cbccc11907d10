//! Page-aligned positions of the payloads inside a boot image
//!
//! ```text
//! +-----------------+
//! | boot header     | 1 page
//! +-----------------+
//! | kernel          | n pages
//! +-----------------+
//! | ramdisk         | m pages
//! +-----------------+
//! | second stage    | o pages
//! +-----------------+
//! ```

use std::ffi::{OsStr, OsString};

use log::debug;

use crate::{BootImageHeader, Error, Result};

/// Number of whole pages needed to hold `size` bytes.
///
/// `page_size` must not be zero.
pub fn page_count(size: u32, page_size: u32) -> u64 {
    u64::from(size).div_ceil(u64::from(page_size))
}

/// Rounds `size` up to a multiple of `page_size`.
///
/// `page_size` must not be zero.
pub fn align_up(size: u32, page_size: u32) -> u64 {
    page_count(size, page_size) * u64::from(page_size)
}

/// A payload stored in the boot image
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Payload {
    Kernel,
    Ramdisk,
    Second,
}

impl Payload {
    /// Human-readable name used in messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::Ramdisk => "ramdisk",
            Self::Second => "second stage",
        }
    }

    /// Suffix appended to the base name of the extracted file.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::Ramdisk => "ramdisk.gz",
            Self::Second => "second.gz",
        }
    }

    /// File name of the extracted payload, `<base>-<suffix>`.
    pub fn file_name(self, base: &OsStr) -> OsString {
        let mut name = base.to_owned();
        name.push("-");
        name.push(self.suffix());
        name
    }
}

/// Byte range of one payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Section {
    pub offset: u64,
    /// Exact payload size, without page padding
    pub size: u32,
}

impl Section {
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.size)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Layout {
    pub page_size: u32,
    pub kernel: Section,
    pub ramdisk: Section,
    /// `None` if the image has no second stage
    pub second: Option<Section>,
    end: u64,
}

impl Layout {
    pub fn new(header: &BootImageHeader) -> Result<Self> {
        let (page_size, kernel_size, ramdisk_size, second_size) = header.sizes();
        Self::from_sizes(page_size, kernel_size, ramdisk_size, second_size)
    }

    pub fn from_sizes(
        page_size: u32,
        kernel_size: u32,
        ramdisk_size: u32,
        second_size: u32,
    ) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::PageSizeZero);
        }

        // The header always takes exactly one page
        let kernel_offset = u64::from(page_size);
        let ramdisk_offset = kernel_offset + align_up(kernel_size, page_size);
        let second_offset = ramdisk_offset + align_up(ramdisk_size, page_size);
        let end = second_offset + align_up(second_size, page_size);

        let layout = Self {
            page_size,
            kernel: Section {
                offset: kernel_offset,
                size: kernel_size,
            },
            ramdisk: Section {
                offset: ramdisk_offset,
                size: ramdisk_size,
            },
            second: (second_size != 0).then_some(Section {
                offset: second_offset,
                size: second_size,
            }),
            end,
        };
        debug!("Layout: {layout:?}");

        Ok(layout)
    }

    /// Offset just past the last padded payload.
    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn section(&self, payload: Payload) -> Option<Section> {
        match payload {
            Payload::Kernel => Some(self.kernel),
            Payload::Ramdisk => Some(self.ramdisk),
            Payload::Second => self.second,
        }
    }

    /// Payloads present in the image, in on-disk order.
    pub fn sections(&self) -> impl Iterator<Item = (Payload, Section)> + '_ {
        [Payload::Kernel, Payload::Ramdisk, Payload::Second]
            .into_iter()
            .filter_map(|payload| Some((payload, self.section(payload)?)))
    }
}
