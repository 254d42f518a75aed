use anyhow::{Context, Result};
use itertools::Itertools;
use memmap2::{Mmap, MmapOptions};
use std::{
    fs::{self, File},
    io::{BufWriter, Cursor, Write},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use colkit::FormatVersion;
use colkit::collision::{self, CollisionSummary, mesh::Mesh};

/// Inspect, dump, and build grouped mesh collision (.col) files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// How the two-byte group key is split. Files do not record this, so it
    /// must match whatever produced them.
    #[clap(short, long, value_enum, default_value_t = FormatVersion::Split, global = true)]
    format: FormatVersion,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the header and group table of one or more collision files
    Info {
        /// .col file(s)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Convert a collision file to JSON
    Dump {
        /// Input .col file
        input: PathBuf,

        /// Output path. Defaults to stdout.
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Build a collision file from JSON
    Build {
        /// Input .json mesh
        input: PathBuf,

        /// Output path. Defaults to the input path with a .col extension.
        #[clap(short, long)]
        output: Option<PathBuf>,

        /// Treat the input vertices as Z-up and convert them to Y-up
        #[clap(long)]
        z_up: bool,
    },
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    Ok(mmap)
}

fn load_summary(path: &Path, format: FormatVersion) -> Result<CollisionSummary> {
    let mmap = map_file(path)?;
    let summary = collision::inspect(&mut Cursor::new(&mmap[..]), format)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(summary)
}

fn print_summary(path: &Path, summary: &CollisionSummary) {
    let header = &summary.header;
    println!("{}", path.display());
    println!(
        "  {} vertices at 0x{:X}, {} groups at 0x{:X}, {} triangles",
        header.vertex_count,
        header.vertex_offset,
        header.group_count,
        header.group_offset,
        summary.triangle_count()
    );
    for (i, group) in summary.groups.iter().enumerate() {
        let offsets = [
            group.vertex_index_offset,
            group.terrain_offset,
            group.unknown_offset,
            group.parameter_offset,
        ]
        .iter()
        .map(|offset| format!("0x{offset:X}"))
        .join(", ");
        println!(
            "  group {i}: type 0x{:04X}, {} triangles, parameters: {}, sections [{offsets}]",
            group.col_type, group.triangle_count, group.has_parameter
        );
    }
}

fn info(files: Vec<PathBuf>, format: FormatVersion) -> Result<()> {
    let summaries: Vec<_> = files
        .par_iter()
        .map(|path| (path, load_summary(path, format)))
        .collect();

    let mut failed = 0;
    for (path, summary) in summaries {
        match summary {
            Ok(summary) => print_summary(path, &summary),
            Err(e) => {
                eprintln!("{}: {e:#}", path.display());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} files could not be read", files.len());
    }
    Ok(())
}

fn dump(input: &Path, output: Option<&Path>, format: FormatVersion) -> Result<()> {
    let mmap = map_file(input)?;
    let mesh = Mesh::from_collision(&mmap[..], format)
        .with_context(|| format!("failed to read {}", input.display()))?;
    info!(
        "{}: {} vertices, {} triangles",
        input.display(),
        mesh.vertices.len(),
        mesh.triangles.len()
    );

    let json = mesh.to_json()?;
    match output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&json)?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn build(input: &Path, output: Option<&Path>, z_up: bool, format: FormatVersion) -> Result<()> {
    let data = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let mut mesh = Mesh::from_json(&data)
        .with_context(|| format!("failed to parse {}", input.display()))?;
    if z_up {
        mesh.convert_z_up();
    }

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("col"));
    let file = File::create(&output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    collision::pack(&mut writer, &mesh.vertices, &mesh.triangles, format)
        .with_context(|| format!("failed to write {}", output.display()))?;
    writer.flush()?;

    info!(
        "wrote {} vertices and {} triangles to {}",
        mesh.vertices.len(),
        mesh.triangles.len(),
        output.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Info { files } => info(files, args.format),
        Command::Dump { input, output } => dump(&input, output.as_deref(), args.format),
        Command::Build {
            input,
            output,
            z_up,
        } => build(&input, output.as_deref(), z_up, args.format),
    }
}
