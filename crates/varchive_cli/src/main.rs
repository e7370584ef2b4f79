//! varchive CLI - inspect and manipulate versioned archive files.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use varchive_core::VersionedArchive;

#[derive(Parser)]
#[command(name = "varchive")]
#[command(about = "Versioned single-file archives", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty versioned archive
    Create {
        /// Archive file to create
        file: PathBuf,
    },
    /// Show the control record of an archive
    Info {
        /// Archive file to inspect
        file: PathBuf,
    },
    /// List all versions of an archive
    Log {
        /// Archive file to inspect
        file: PathBuf,
        /// Maximum number of versions to show (newest last)
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Extract a version of an archive into a directory
    Checkout {
        /// Archive file to read
        file: PathBuf,
        /// Version to extract (defaults to the latest)
        #[arg(short = 'v', long)]
        version: Option<usize>,
        /// Destination directory
        dest: PathBuf,
    },
}

fn main() -> Result<()> {
    // Respects RUST_LOG (e.g. RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create { file } => create(file),
        Commands::Info { file } => info(file),
        Commands::Log { file, limit } => log(file, limit),
        Commands::Checkout {
            file,
            version,
            dest,
        } => checkout(file, version, dest),
    }
}

fn create(file: PathBuf) -> Result<()> {
    let mut vf = VersionedArchive::new(&file)?;
    vf.create()
        .with_context(|| format!("failed to create {}", file.display()))?;
    println!("Created versioned archive: {}", file.display());
    Ok(())
}

fn info(file: PathBuf) -> Result<()> {
    let mut vf = VersionedArchive::new(&file)?;
    vf.open(false)
        .with_context(|| format!("failed to open {}", file.display()))?;

    let result = (|| -> Result<()> {
        let info = vf.archive_info()?;
        let versions = vf.number_of_versions()?;

        println!("Archive:     {}", file.display());
        println!("Format:      {}", info.version);
        println!("Description: {}", info.description);
        println!("Versions:    {}", versions);
        Ok(())
    })();

    vf.close()?;
    result
}

fn log(file: PathBuf, limit: Option<usize>) -> Result<()> {
    let mut vf = VersionedArchive::new(&file)?;
    vf.open(false)
        .with_context(|| format!("failed to open {}", file.display()))?;

    let result = (|| -> Result<()> {
        let versions = vf.versions()?;

        // index 0 is the internal root commit
        let visible = &versions[1..];
        let skip = limit
            .map(|l| visible.len().saturating_sub(l))
            .unwrap_or(0);

        for (i, commit) in visible.iter().enumerate().skip(skip) {
            println!(
                "version {:>4}  {}  {}  {}",
                i + 1,
                &commit.id.to_hex()[..12],
                commit.author,
                commit.message
            );
        }
        Ok(())
    })();

    vf.close()?;
    result
}

fn checkout(file: PathBuf, version: Option<usize>, dest: PathBuf) -> Result<()> {
    if dest.exists() && dest.read_dir()?.next().is_some() {
        bail!("destination is not empty: {}", dest.display());
    }

    let mut vf = VersionedArchive::new(&file)?;
    vf.open(false)
        .with_context(|| format!("failed to open {}", file.display()))?;

    let result = (|| -> Result<()> {
        match version {
            Some(v) => vf.checkout_version(v)?,
            None => vf.checkout_latest_version()?,
        }

        let content = vf.content()?;
        std::fs::create_dir_all(&dest)?;
        copy_tree(content, &dest)?;

        println!(
            "Checked out version {} to {}",
            vf.current_version()?,
            dest.display()
        );
        Ok(())
    })();

    vf.close()?;
    result
}

/// Copies the working area into the destination, skipping the history
/// store and control record.
fn copy_tree(src: &std::path::Path, dst: &std::path::Path) -> Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();

        if name == varchive_core::STORE_DIR || name == varchive_core::INFO_FILE {
            continue;
        }

        let dest_path = dst.join(&name);
        if entry.file_type()?.is_dir() {
            std::fs::create_dir_all(&dest_path)?;
            copy_tree(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}
