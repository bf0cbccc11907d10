use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{io::NoSeek, BinRead, BinWrite};
use log::{debug, warn};

use crate::{Error, Result};

pub const BOOT_MAGIC_SIZE: usize = 8;
pub const BOOT_MAGIC: [u8; BOOT_MAGIC_SIZE] = *b"ANDROID!";
pub const BOOT_NAME_SIZE: usize = 16;
pub const BOOT_ARGS_SIZE: usize = 512;
/// Number of 32-bit words in the `id` field
pub const BOOT_ID_SIZE: usize = 8;

const UNSIGNED_SIZE: usize = 4;

/// On-disk size of [`BootImageHeader`] in bytes
pub const HEADER_SIZE: usize = BOOT_MAGIC_SIZE
    + 2 * UNSIGNED_SIZE // kernel size and address
    + 2 * UNSIGNED_SIZE // ramdisk size and address
    + 2 * UNSIGNED_SIZE // second stage size and address
    + UNSIGNED_SIZE // tags address
    + UNSIGNED_SIZE // page size
    + 2 * UNSIGNED_SIZE // unused
    + BOOT_NAME_SIZE
    + BOOT_ARGS_SIZE
    + BOOT_ID_SIZE * UNSIGNED_SIZE;

/// How to treat an image that doesn't start with [`BOOT_MAGIC`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MagicCheck {
    /// Fail with [`Error::UnknownMagic`]
    #[default]
    Strict,
    /// Log a warning and keep going with whatever sizes were read
    Permissive,
}

/// Options for [`BootImageHeader::decode`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DecodeOptions {
    pub magic: MagicCheck,
}

/// Android boot image header, as laid out by the original `mkbootimg`
///
/// The header fills the first page of the image and is followed by the
/// kernel, the ramdisk and the optional second stage, each padded to a whole
/// number of pages.
#[derive(BinRead, BinWrite, Clone, Debug, PartialEq, Eq, Hash)]
#[brw(little)]
pub struct BootImageHeader {
    /// Should be equal to [`BOOT_MAGIC`]
    pub magic: [u8; BOOT_MAGIC_SIZE],
    /// Kernel size
    pub kernel_size: u32,
    /// Kernel physical load addr
    pub kernel_addr: u32,
    /// Ramdisk size
    pub ramdisk_size: u32,
    /// Ramdisk physical load addr
    pub ramdisk_addr: u32,
    /// Second stage size, zero if there is none
    pub second_size: u32,
    /// Second stage physical load addr
    pub second_addr: u32,
    pub tags_addr: u32,
    /// Flash page size in bytes
    pub page_size: u32,
    pub unused: [u32; 2],
    /// NUL-padded board or product name
    pub board_name: [u8; BOOT_NAME_SIZE],
    /// NUL-padded kernel command line
    pub cmdline: Box<[u8; BOOT_ARGS_SIZE]>,
    /// Timestamp, checksum or whatever else `mkbootimg` put there
    pub id: [u32; BOOT_ID_SIZE],
}

impl BootImageHeader {
    /// Creates an empty header with the boot magic and the given page size.
    pub fn new(page_size: u32) -> Self {
        Self {
            magic: BOOT_MAGIC,
            kernel_size: 0,
            kernel_addr: 0,
            ramdisk_size: 0,
            ramdisk_addr: 0,
            second_size: 0,
            second_addr: 0,
            tags_addr: 0,
            page_size,
            unused: [0; 2],
            board_name: [0; BOOT_NAME_SIZE],
            cmdline: Box::new([0; BOOT_ARGS_SIZE]),
            id: [0; BOOT_ID_SIZE],
        }
    }

    /// Reads the header from the start of `reader`.
    ///
    /// The reader is rewound to offset 0 first. Fails if the image is too
    /// short to hold a header, if the page size is zero, or, unless
    /// [`MagicCheck::Permissive`] is set, if the magic doesn't match.
    pub fn decode<R: Read + Seek>(reader: &mut R, options: &DecodeOptions) -> Result<Self> {
        let len = reader
            .seek(SeekFrom::End(0))
            .map_err(|e| Error::DataRead("header", e))?;
        if len < HEADER_SIZE as u64 {
            return Err(Error::Truncated {
                section: "header",
                offset: 0,
                end: HEADER_SIZE as u64,
                len,
            });
        }
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::DataRead("header", e))?;

        let header = Self::read(reader).map_err(Error::HeaderRead)?;

        if !header.has_valid_magic() {
            match options.magic {
                MagicCheck::Strict => return Err(Error::UnknownMagic(header.magic)),
                MagicCheck::Permissive => warn!(
                    "Android magic not found (got \"{}\"), continuing anyway",
                    header.magic.escape_ascii()
                ),
            }
        }
        if header.page_size == 0 {
            return Err(Error::PageSizeZero);
        }

        debug!(
            "Decoded header: page size {}, kernel {}, ramdisk {}, second {}",
            header.page_size, header.kernel_size, header.ramdisk_size, header.second_size
        );

        Ok(header)
    }

    /// Writes the exact on-disk form of the header, [`HEADER_SIZE`] bytes.
    pub fn encode<W: Write>(&self, writer: &mut W) -> binrw::BinResult<()> {
        self.write(&mut NoSeek::new(writer))
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == BOOT_MAGIC
    }

    /// Returns `(page_size, kernel_size, ramdisk_size, second_size)`.
    pub fn sizes(&self) -> (u32, u32, u32, u32) {
        (
            self.page_size,
            self.kernel_size,
            self.ramdisk_size,
            self.second_size,
        )
    }

    /// Board name up to the first NUL
    pub fn board_name(&self) -> &[u8] {
        take_until_null(&self.board_name)
    }

    /// Kernel command line up to the first NUL
    pub fn cmdline(&self) -> &[u8] {
        take_until_null(&*self.cmdline)
    }
}

fn take_until_null(input: &[u8]) -> &[u8] {
    match input.iter().position(|x| *x == 0) {
        Some(null_idx) => &input[..null_idx],
        None => input,
    }
}
