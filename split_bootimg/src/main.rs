use std::{
    borrow::Cow,
    fs::{create_dir_all, File},
    io::{self, stdout, BufReader, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use abootimg_split::{
    base_name,
    extract::{extract, plan, Artifact},
    layout::Payload,
    BootImageHeader, DecodeOptions, Layout, MagicCheck,
};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use log::{debug, error};

/// Split an Android boot image into its kernel, ramdisk and second stage
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the boot or recovery image
    boot_img: Option<PathBuf>,

    /// Output directory of the split images
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Warn instead of failing when the image doesn't start with the boot magic
    #[arg(long)]
    permissive: bool,

    /// Text output format
    #[arg(value_enum, long, default_value_t = TextOutputFormat::Info)]
    format: TextOutputFormat,

    /// Output null-terminated argument strings
    #[arg(short = '0', long)]
    null: bool,

    /// Don't print the header summary or progress
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum TextOutputFormat {
    /// Header summary and progress suitable for human inspection
    Info,
    /// Additionally output shell-escaped (quoted) argument strings that can be
    /// used to reconstruct the boot image using `mkbootimg`
    Mkbootimg,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let Some(boot_img) = args.boot_img.as_deref() else {
        println!("{}", Args::command().render_usage());
        return ExitCode::FAILURE;
    };

    match run(&args, boot_img) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, boot_img: &Path) -> Result<()> {
    let options = DecodeOptions {
        magic: if args.permissive {
            MagicCheck::Permissive
        } else {
            MagicCheck::Strict
        },
    };

    let file = File::open(boot_img)
        .with_context(|| format!("Failed to open for reading: {boot_img:?}"))?;
    let mut r = BufReader::new(file);
    let hdr = BootImageHeader::decode(&mut r, &options)
        .with_context(|| format!("Failed to decode boot image header: {boot_img:?}"))?;

    let mut out = stdout().lock();
    if !args.quiet {
        write_summary(&mut out, &hdr).context("Failed to write header summary")?;
    }

    let layout = Layout::new(&hdr)?;
    let len = r.get_ref().metadata()?.len();
    if len > layout.end() {
        debug!(
            "Ignoring {} bytes past the last payload at {:#x}",
            len - layout.end(),
            layout.end()
        );
    }

    create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output directory: {:?}", args.out))?;

    let base = base_name(boot_img);
    let artifacts = plan(&layout, &args.out, &base);

    // Get the inner File, reads are all seek + copy
    let r = r.get_mut();

    for artifact in &artifacts {
        if !args.quiet {
            write!(out, "Writing ")?;
            out.write_all(artifact.payload.file_name(&base).as_encoded_bytes())?;
            write!(out, " ...")?;
            out.flush()?;
        }
        let result = extract(r, artifact)
            .with_context(|| format!("Failed to extract {}", artifact.payload.name()));
        if !args.quiet {
            if result.is_ok() {
                writeln!(out, " complete.")?;
            } else {
                writeln!(out)?;
            }
        }
        result?;
    }

    if args.format == TextOutputFormat::Mkbootimg {
        write_mkbootimg_args(&mut out, &hdr, &artifacts, args.null)
            .context("Failed to write mkbootimg arguments")?;
    }

    Ok(())
}

fn write_summary(out: &mut impl Write, hdr: &BootImageHeader) -> io::Result<()> {
    writeln!(out, "Page size: \t{0} (0x{0:x})", hdr.page_size)?;
    writeln!(out, "Kernel size: \t{0} (0x{0:x})", hdr.kernel_size)?;
    writeln!(out, "Ramdisk size: \t{0} (0x{0:x})", hdr.ramdisk_size)?;
    writeln!(out, "Second size: \t{0} (0x{0:x})", hdr.second_size)?;
    write!(out, "Board name: \t")?;
    out.write_all(hdr.board_name())?;
    write!(out, "\nCommand line: \t")?;
    out.write_all(hdr.cmdline())?;
    writeln!(out)
}

fn write_mkbootimg_args(
    out: &mut impl Write,
    hdr: &BootImageHeader,
    artifacts: &[Artifact],
    null: bool,
) -> io::Result<()> {
    let mut argv: Vec<Cow<[u8]>> = Vec::new();
    let mut push = |flag: &'static str, value: Cow<'static, [u8]>| {
        argv.push(Cow::Borrowed(flag.as_bytes()));
        argv.push(value);
    };

    for artifact in artifacts {
        let flag = match artifact.payload {
            Payload::Kernel => "--kernel",
            Payload::Ramdisk => "--ramdisk",
            Payload::Second => "--second",
        };
        push(
            flag,
            Cow::Owned(artifact.path.as_os_str().as_encoded_bytes().to_vec()),
        );
    }
    push("--pagesize", hex(hdr.page_size));
    push("--base", hex(0));
    push("--kernel_offset", hex(hdr.kernel_addr));
    push("--ramdisk_offset", hex(hdr.ramdisk_addr));
    push("--second_offset", hex(hdr.second_addr));
    push("--tags_offset", hex(hdr.tags_addr));
    push("--board", Cow::Owned(hdr.board_name().to_vec()));
    push("--cmdline", Cow::Owned(hdr.cmdline().to_vec()));

    for (i, arg) in argv.iter().enumerate() {
        if i != 0 {
            out.write_all(if null { b"\0" } else { b" " })?;
        }
        if null {
            out.write_all(arg)?;
        } else {
            write_escaped(out, arg)?;
        }
    }
    out.write_all(if null { b"\0" } else { b"\n" })
}

fn hex(value: u32) -> Cow<'static, [u8]> {
    Cow::Owned(format!("0x{value:08x}").into_bytes())
}

fn write_escaped(out: &mut impl Write, input: &[u8]) -> io::Result<()> {
    let q = shlex::bytes::Quoter::new();
    match q.quote(input) {
        Ok(quoted) => out.write_all(&quoted),
        // Only fails on NUL bytes, which the header accessors already cut off
        Err(_) => out.write_all(input),
    }
}
