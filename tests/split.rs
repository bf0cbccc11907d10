use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use abootimg_split::{
    base_name, layout::align_up, split, BootImageHeader, DecodeOptions, Error, MagicCheck,
};

struct Image {
    header: BootImageHeader,
    kernel: Vec<u8>,
    ramdisk: Vec<u8>,
    second: Vec<u8>,
}

impl Image {
    fn new(page_size: u32, kernel_size: u32, ramdisk_size: u32, second_size: u32) -> Self {
        let mut header = BootImageHeader::new(page_size);
        header.kernel_size = kernel_size;
        header.ramdisk_size = ramdisk_size;
        header.second_size = second_size;
        header.board_name[..4].copy_from_slice(b"test");

        Self {
            header,
            kernel: pattern(kernel_size, 1),
            ramdisk: pattern(ramdisk_size, 2),
            second: pattern(second_size, 3),
        }
    }

    /// Lays out the image the way `mkbootimg` does, plus `trailer` extra bytes.
    fn build(&self, trailer: usize) -> Vec<u8> {
        let page_size = self.header.page_size;
        let mut data = Vec::new();
        self.header.encode(&mut data).unwrap();
        data.resize(page_size as usize, 0);

        for payload in [&self.kernel, &self.ramdisk, &self.second] {
            let start = data.len();
            data.extend_from_slice(payload);
            data.resize(start + align_up(payload.len() as u32, page_size) as usize, 0);
        }

        data.extend(std::iter::repeat(0xee).take(trailer));
        data
    }
}

fn pattern(size: u32, seed: u8) -> Vec<u8> {
    (0..size)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect::<Vec<_>>();
    files.sort();
    files
}

fn decode_and_split(data: &[u8], out: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut reader = Cursor::new(data);
    let header = BootImageHeader::decode(&mut reader, &DecodeOptions::default())?;
    split(&mut reader, &header, out, "boot")
}

#[test]
fn kernel_and_ramdisk_only() {
    let dir = tempfile::tempdir().unwrap();
    let image = Image::new(2048, 5000, 100, 0);
    let data = image.build(0);
    assert_eq!(data.len(), 10240);

    let written = decode_and_split(&data, dir.path()).unwrap();
    assert_eq!(
        written,
        [
            dir.path().join("boot-kernel"),
            dir.path().join("boot-ramdisk.gz"),
        ]
    );
    assert_eq!(files_in(dir.path()), written);

    let kernel = fs::read(&written[0]).unwrap();
    assert_eq!(kernel.len(), 5000);
    assert_eq!(kernel, &data[2048..7048]);
    assert_eq!(kernel, image.kernel);

    let ramdisk = fs::read(&written[1]).unwrap();
    assert_eq!(ramdisk.len(), 100);
    assert_eq!(ramdisk, &data[8192..8292]);
}

#[test]
fn with_second_stage() {
    let dir = tempfile::tempdir().unwrap();
    let image = Image::new(2048, 5000, 100, 50);
    let data = image.build(0);

    let written = decode_and_split(&data, dir.path()).unwrap();
    assert_eq!(written.len(), 3);
    assert_eq!(written[2], dir.path().join("boot-second.gz"));

    let second = fs::read(&written[2]).unwrap();
    assert_eq!(second.len(), 50);
    assert_eq!(second, &data[10240..10290]);
    assert_eq!(second, image.second);
}

#[test]
fn corrupted_magic() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = Image::new(2048, 5000, 100, 50).build(0);
    data[0] = b'X';

    let err = decode_and_split(&data, dir.path()).unwrap_err();
    assert!(err.is_format_error());
    assert!(matches!(err, Error::UnknownMagic(_)));
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn corrupted_magic_permissive() {
    let dir = tempfile::tempdir().unwrap();
    let image = Image::new(4096, 10, 20, 0);
    let mut data = image.build(0);
    data[..8].copy_from_slice(b"NOTBOOT!");

    let mut reader = Cursor::new(&data);
    let options = DecodeOptions {
        magic: MagicCheck::Permissive,
    };
    let header = BootImageHeader::decode(&mut reader, &options).unwrap();
    let written = split(&mut reader, &header, dir.path(), "boot").unwrap();

    assert_eq!(written.len(), 2);
    assert_eq!(fs::read(&written[0]).unwrap(), image.kernel);
}

#[test]
fn truncated_ramdisk() {
    let dir = tempfile::tempdir().unwrap();
    let image = Image::new(2048, 5000, 100, 0);
    let mut data = image.build(0);
    data.truncate(8192 + 99);

    let err = decode_and_split(&data, dir.path()).unwrap_err();
    assert!(matches!(
        err,
        Error::Truncated {
            section: "ramdisk",
            offset: 8192,
            end: 8292,
            len: 8291,
        }
    ));

    // The kernel was fully present and is kept
    assert_eq!(files_in(dir.path()), [dir.path().join("boot-kernel")]);
    assert_eq!(fs::read(dir.path().join("boot-kernel")).unwrap(), image.kernel);
}

#[test]
fn missing_padding_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    let image = Image::new(2048, 5000, 100, 0);
    let mut data = image.build(0);
    data.truncate(8192 + 100);

    let written = decode_and_split(&data, dir.path()).unwrap();
    assert_eq!(fs::read(&written[1]).unwrap(), image.ramdisk);
}

#[test]
fn trailing_data_is_not_read() {
    let dir = tempfile::tempdir().unwrap();
    let image = Image::new(2048, 2048, 2048, 2048);
    let data = image.build(4096);

    let written = decode_and_split(&data, dir.path()).unwrap();
    let second = fs::read(&written[2]).unwrap();
    assert_eq!(second.len(), 2048);
    assert_eq!(second, image.second);
}

#[test]
fn empty_ramdisk() {
    let dir = tempfile::tempdir().unwrap();
    let image = Image::new(4096, 100, 0, 7);
    let data = image.build(0);

    let written = decode_and_split(&data, dir.path()).unwrap();
    assert_eq!(written.len(), 3);
    assert!(fs::read(&written[1]).unwrap().is_empty());
    assert_eq!(fs::read(&written[2]).unwrap(), image.second);
}

#[test]
fn source_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boot.img.orig");
    let data = Image::new(2048, 5000, 100, 50).build(123);
    fs::write(&path, &data).unwrap();

    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();

    let mut file = fs::File::open(&path).unwrap();
    let header = BootImageHeader::decode(&mut file, &DecodeOptions::default()).unwrap();
    let written = split(&mut file, &header, &out, &base_name(&path)).unwrap();

    assert_eq!(
        written,
        [
            out.join("boot-kernel"),
            out.join("boot-ramdisk.gz"),
            out.join("boot-second.gz"),
        ]
    );
    assert_eq!(fs::read(&path).unwrap(), data);
}
