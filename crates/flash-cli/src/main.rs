//! Command-line glue for formatting and inspecting flashfs NAND images.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use flashfs::device::{FlashDevice, ImageFlash};
use flashfs::error::FsError;
use flashfs::layout::FLAG_REGULAR;
use flashfs::scratch::{RamScratch, Scratch, SpareScratch};
use flashfs::volume::{DirCursor, FormatOptions, NameStyle, Volume};

#[derive(Parser, Debug)]
#[command(name = "flash-cli", about = "Format and inspect flashfs NAND images")]
struct Args {
    /// Path to the flash image file.
    #[arg(long, env = "FLASHFS_IMAGE")]
    image: PathBuf,

    #[arg(long, env = "FLASHFS_BLOCK_SIZE", default_value_t = 4096)]
    block_size: u64,

    #[arg(long, env = "FLASHFS_BLOCK_COUNT", default_value_t = 64)]
    block_count: u64,

    #[arg(long, env = "FLASHFS_PAGE_SIZE", default_value_t = 512)]
    page_size: u64,

    /// Number of files the directory table holds (format parameter).
    #[arg(long, default_value_t = 16)]
    max_files: u32,

    /// Per-file region size in bytes (format parameter).
    #[arg(long, default_value_t = 4096)]
    max_len: u32,

    /// Stage writes in the reserved spare flash block instead of RAM.
    #[arg(long)]
    spare_scratch: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Erase the image and write a fresh volume.
    Format,
    /// Print the decoded superblock.
    Info,
    /// List the root directory.
    Ls,
    /// Create the file if needed and write `data` at offset 0.
    Write { name: String, data: String },
    /// Print a file's contents.
    Cat { name: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    let device = ImageFlash::open_prealloc(
        &args.image,
        args.block_size,
        args.block_count,
        args.page_size,
    )
    .with_context(|| format!("open image {}", args.image.display()))?;

    let opts = FormatOptions {
        max_files: args.max_files,
        max_len: args.max_len,
    };

    if args.spare_scratch {
        let spare = device.block_count() - 1;
        run(args.command, &args.image, &opts, device, SpareScratch::new(spare))
    } else {
        let block_size = device.block_size();
        run(args.command, &args.image, &opts, device, RamScratch::new(block_size))
    }
}

fn run<S: Scratch<ImageFlash>>(
    command: Command,
    image: &Path,
    opts: &FormatOptions,
    device: ImageFlash,
    scratch: S,
) -> anyhow::Result<()> {
    if matches!(command, Command::Format) {
        Volume::format(device, scratch, opts).context("format volume")?;
        info!("formatted {}", image.display());
        return Ok(());
    }

    let mut volume = Volume::mount(device, scratch, opts).context("mount volume")?;

    match command {
        Command::Format => unreachable!("handled above"),
        Command::Info => {
            let sb = volume.superblock();
            println!("inode_count:     {}", sb.inode_count);
            println!("max_inode_count: {}", sb.max_inode_count);
            println!("max_len:         {}", sb.max_len);
            println!("buff_bk:         {}", sb.buff_bk);
            println!("free_space:      {}", sb.free_space);
        }
        Command::Ls => {
            let root = volume.root()?;
            let mut cursor = DirCursor::default();
            while let Some((name, inode)) = volume.iterate(&root, &mut cursor)? {
                println!("{:>8}  {}", inode.len, name);
            }
        }
        Command::Write { name, data } => {
            match volume.lookup(&name) {
                Ok(_) => {}
                Err(FsError::NotFound) => {
                    volume.create(&name, FLAG_REGULAR)?;
                }
                Err(e) => return Err(e.into()),
            }
            let mut handle = volume.open(&name)?;
            let written = volume.write(&mut handle, data.as_bytes())?;
            let new_len = handle.inode.len.max(u32::try_from(written)?);
            volume.truncate(&mut handle.inode, new_len)?;
            let rendered = volume.pathname(&handle.inode, NameStyle::Rooted)?;
            info!("wrote {written} bytes to {rendered}");
        }
        Command::Cat { name } => {
            let mut handle = volume.open(&name)?;
            let mut buf = vec![0u8; handle.inode.len as usize];
            if !buf.is_empty() {
                volume.read(&mut handle, &mut buf)?;
            }
            use std::io::Write;
            std::io::stdout().write_all(&buf)?;
        }
    }

    Ok(())
}
