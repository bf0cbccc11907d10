use std::{
    ffi::{OsStr, OsString},
    fs::File,
    io::{self, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    layout::{Layout, Payload, Section},
    BootImageHeader, Error, Result,
};

/// One output file and the byte range it's copied from
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Artifact {
    pub payload: Payload,
    pub path: PathBuf,
    pub section: Section,
}

/// Derives the base name of the output files from the input image path.
///
/// Everything from the first `.` of the file name on is dropped, so both
/// `boot.img` and `boot.img.orig` give `boot`. Names that aren't valid UTF-8
/// are kept as they are.
pub fn base_name(path: &Path) -> OsString {
    let Some(name) = path.file_name() else {
        return OsString::new();
    };
    if name.as_encoded_bytes().starts_with(b".") {
        return OsString::new();
    }

    // Strip extensions one at a time until no dot is left
    let mut base = Path::new(name);
    while let Some(stem) = base
        .file_stem()
        .filter(|stem| stem.len() < base.as_os_str().len())
    {
        base = Path::new(stem);
    }

    base.as_os_str().to_owned()
}

/// Lists the files to write for `layout`, in on-disk order.
///
/// The kernel and ramdisk are always included, even if empty. The second
/// stage only if the image has one.
pub fn plan(layout: &Layout, out_dir: &Path, base: &OsStr) -> Vec<Artifact> {
    layout
        .sections()
        .map(|(payload, section)| Artifact {
            payload,
            path: out_dir.join(payload.file_name(base)),
            section,
        })
        .collect()
}

/// Copies the artifact's byte range from `source` into a new file.
///
/// Nothing is created if `source` is too short to hold the whole range.
pub fn extract<R: Read + Seek>(source: &mut R, artifact: &Artifact) -> Result<()> {
    let name = artifact.payload.name();
    let section = artifact.section;

    let len = source
        .seek(SeekFrom::End(0))
        .map_err(|e| Error::DataRead(name, e))?;
    if section.end() > len {
        return Err(Error::Truncated {
            section: name,
            offset: section.offset,
            end: section.end(),
            len,
        });
    }
    source
        .seek(SeekFrom::Start(section.offset))
        .map_err(|e| Error::DataRead(name, e))?;

    let output_error = |source| Error::OutputWrite {
        path: artifact.path.clone(),
        source,
    };
    let file = File::create(&artifact.path).map_err(output_error)?;
    let mut writer = BufWriter::new(file);

    debug!(
        "Copying {name}: {} bytes at {:#x} to {:?}",
        section.size, section.offset, artifact.path
    );
    copy_n(source, &mut writer, section.size.into(), name, output_error)?;
    writer.flush().map_err(output_error)?;

    info!("Wrote {name} to {:?}", artifact.path);

    Ok(())
}

/// Copy exactly `size` bytes from `reader` to `writer`, keeping read and write
/// failures apart.
fn copy_n(
    mut reader: impl Read,
    mut writer: impl Write,
    mut size: u64,
    name: &'static str,
    output_error: impl Fn(io::Error) -> Error,
) -> Result<()> {
    let mut buf = [0u8; 16384];

    while size > 0 {
        let to_read = size.min(buf.len() as u64) as usize;
        reader
            .read_exact(&mut buf[..to_read])
            .map_err(|e| Error::DataRead(name, e))?;

        writer.write_all(&buf[..to_read]).map_err(&output_error)?;

        size -= to_read as u64;
    }

    Ok(())
}

/// Splits the image into its payloads, writing `<base>-kernel`,
/// `<base>-ramdisk.gz` and, if present, `<base>-second.gz` into `out_dir`.
///
/// Payloads are extracted in on-disk order and the first failure stops the
/// rest. Files written before the failure are left in place.
pub fn split<R: Read + Seek>(
    source: &mut R,
    header: &BootImageHeader,
    out_dir: &Path,
    base: impl AsRef<OsStr>,
) -> Result<Vec<PathBuf>> {
    let layout = Layout::new(header)?;
    let mut written = Vec::new();

    for artifact in plan(&layout, out_dir, base.as_ref()) {
        extract(source, &artifact)?;
        written.push(artifact.path);
    }

    Ok(written)
}
