//! Mantle CLI Binary
//!
//! Inspect region and matter files, or read and write single cells.
//!
//! Usage:
//!   mantle inspect-region ./world/p.0.ttp
//!   mantle set ./world 256 i32 33 225 2344 69
//!   mantle get ./world 256 i32 33 225 2344

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use mantle::matter::{SliceRegistry, DEFAULT_AUTHOR};
use mantle::storage::SectionFactory;
use mantle::{Mantle, MantleConfig, MantleFlag, Matter, Region};
use tracing_subscriber::{fmt, EnvFilter};

/// Mantle CLI
#[derive(Parser, Debug)]
#[command(name = "mantle")]
#[command(about = "Inspect and edit Mantle region stores")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the chunks, sections and flags of a region file
    InspectRegion {
        file: PathBuf,

        /// World height the region was written with
        #[arg(long, default_value = "256")]
        height: usize,
    },

    /// Print the header and slices of a standalone matter file
    InspectMatter { file: PathBuf },

    /// Read one cell
    #[command(allow_negative_numbers = true)]
    Get {
        dir: PathBuf,
        height: usize,
        #[arg(value_enum)]
        kind: ValueKind,
        x: i32,
        y: i32,
        z: i32,
    },

    /// Write one cell
    #[command(allow_negative_numbers = true)]
    Set {
        dir: PathBuf,
        height: usize,
        #[arg(value_enum)]
        kind: ValueKind,
        x: i32,
        y: i32,
        z: i32,
        value: String,
    },
}

/// Built-in value types
#[derive(ValueEnum, Clone, Copy, Debug)]
enum ValueKind {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    String,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mantle=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::InspectRegion { file, height } => inspect_region(&file, height),
        Command::InspectMatter { file } => inspect_matter(&file),
        Command::Get {
            dir,
            height,
            kind,
            x,
            y,
            z,
        } => {
            let mantle = open(dir, height)?;
            let shown = match kind {
                ValueKind::I8 => show(mantle.get::<i8>(x, y, z)?),
                ValueKind::I16 => show(mantle.get::<i16>(x, y, z)?),
                ValueKind::I32 => show(mantle.get::<i32>(x, y, z)?),
                ValueKind::I64 => show(mantle.get::<i64>(x, y, z)?),
                ValueKind::F32 => show(mantle.get::<f32>(x, y, z)?),
                ValueKind::F64 => show(mantle.get::<f64>(x, y, z)?),
                ValueKind::Bool => show(mantle.get::<bool>(x, y, z)?),
                ValueKind::String => show(mantle.get::<String>(x, y, z)?),
            };
            println!("{}", shown);
            mantle.close()?;
            Ok(())
        }
        Command::Set {
            dir,
            height,
            kind,
            x,
            y,
            z,
            value,
        } => {
            let mantle = open(dir, height)?;
            match kind {
                ValueKind::I8 => mantle.set(x, y, z, value.parse::<i8>()?)?,
                ValueKind::I16 => mantle.set(x, y, z, value.parse::<i16>()?)?,
                ValueKind::I32 => mantle.set(x, y, z, value.parse::<i32>()?)?,
                ValueKind::I64 => mantle.set(x, y, z, value.parse::<i64>()?)?,
                ValueKind::F32 => mantle.set(x, y, z, value.parse::<f32>()?)?,
                ValueKind::F64 => mantle.set(x, y, z, value.parse::<f64>()?)?,
                ValueKind::Bool => mantle.set(x, y, z, value.parse::<bool>()?)?,
                ValueKind::String => mantle.set(x, y, z, value)?,
            }
            mantle.close()?;
            tracing::info!("Wrote {:?} at {},{},{}", kind, x, y, z);
            Ok(())
        }
    }
}

fn open(dir: PathBuf, height: usize) -> mantle::Result<Mantle> {
    Mantle::open(
        MantleConfig::builder()
            .data_dir(dir)
            .world_height(height)
            .multicore(false)
            .io_threads(1)
            .build(),
    )
}

fn show<T: std::fmt::Debug>(value: Option<T>) -> String {
    match value {
        Some(value) => format!("{:?}", value),
        None => "(absent)".to_string(),
    }
}

fn inspect_region(file: &Path, height: usize) -> Result<(), Box<dyn std::error::Error>> {
    let factory = Arc::new(SectionFactory::new(
        Arc::new(SliceRegistry::default()),
        DEFAULT_AUTHOR,
    ));
    let region = Region::read_file(height, file, factory)?;

    println!("Region {},{} (key {})", region.x(), region.z(), region.key());
    for (index, chunk) in region.populated_chunks() {
        let flags: Vec<MantleFlag> = MantleFlag::decode(chunk.flag_bits()).collect();
        println!("  chunk #{} ({}, {}) flags {:?}", index, chunk.x(), chunk.z(), flags);

        for section in 0..chunk.section_count() {
            if let Some(matter) = chunk.get(section) {
                let tags: Vec<&str> = matter.slice_tags().collect();
                println!(
                    "    section {} y={}..{}: {} cells in {:?}",
                    section,
                    section * 16,
                    section * 16 + 16,
                    matter.total_count(),
                    tags
                );
            }
        }
    }
    Ok(())
}

fn inspect_matter(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let matter = Matter::read_file(file, &Arc::new(SliceRegistry::default()))?;
    let header = matter.header();

    println!(
        "Matter {}x{}x{} by '{}' (version {}, created {})",
        matter.width(),
        matter.height(),
        matter.depth(),
        header.author,
        header.version,
        header.created_at
    );
    for tag in matter.slice_tags() {
        println!("  slice '{}'", tag);
    }
    println!("  {} cells total", matter.total_count());
    Ok(())
}
