//! PDF Watermarker CLI tool
//!
//! A command-line front end for stamping an image onto every page of a PDF.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use pdf_watermarker::input::{read_source_pdf, read_watermark};
use pdf_watermarker::pdf::{count_pages, extract_metadata};
use pdf_watermarker::settings::{OPACITY_PERCENT_RANGE, SIZE_PERCENT_RANGE};
use pdf_watermarker::{Position, Session, Settings, DOWNLOAD_FILE_NAME};

/// PDF Watermarker - Stamp an image onto every page of a PDF
#[derive(Parser)]
#[command(name = "pdf-watermarker")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Faint logo centered on every page
    pdf-watermarker apply report.pdf --watermark logo.png --opacity 20 --position center

    # Half-height stamp on the right edge, written to a chosen file
    pdf-watermarker apply scan.pdf -w stamp.jpg --size 50 --position right -o stamped.pdf

    # Show page sizes
    pdf-watermarker info report.pdf")]
struct Cli {
    /// Increase log detail (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stamp a watermark image onto every page of a PDF
    Apply {
        /// Input PDF file
        input: PathBuf,

        /// Watermark image (PNG or JPEG)
        #[arg(short, long)]
        watermark: PathBuf,

        /// Output PDF file path
        #[arg(short, long, default_value = DOWNLOAD_FILE_NAME)]
        output: PathBuf,

        /// Opacity in percent (0 = invisible, 100 = opaque)
        #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(OPACITY_PERCENT_RANGE))]
        opacity: u8,

        /// Watermark height in percent of the page height
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u16).range(SIZE_PERCENT_RANGE))]
        size: u16,

        /// Horizontal position (the watermark is always centered vertically)
        #[arg(long, value_enum, default_value_t = PositionArg::Left)]
        position: PositionArg,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PositionArg {
    Left,
    Center,
    Right,
}

impl From<PositionArg> for Position {
    fn from(arg: PositionArg) -> Self {
        match arg {
            PositionArg::Left => Position::Left,
            PositionArg::Center => Position::Center,
            PositionArg::Right => Position::Right,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Apply {
            input, watermark, output, opacity, size, position, open,
        } => {
            let settings = Settings::from_percentages(opacity as f64, size as f64, position.into());
            cmd_apply(&input, &watermark, &output, settings, open)
        }
        Commands::Info { input } => cmd_info(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();
}

/// Open a file with the system default application
fn open_file(path: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Stamp the watermark and write the result
fn cmd_apply(
    input: &Path,
    watermark: &Path,
    output: &Path,
    settings: Settings,
    open: bool,
) -> Result<()> {
    let mut session = Session::new();
    session.set_source(
        read_source_pdf(input).with_context(|| format!("Cannot use {} as the PDF", input.display()))?,
    );
    session.set_watermark(
        read_watermark(watermark)
            .with_context(|| format!("Cannot use {} as the watermark", watermark.display()))?,
    );
    session.set_settings(settings);

    eprintln!(
        "Applying watermark (opacity {}%, size {}%, position {})...",
        settings.opacity_percent(),
        settings.size,
        settings.position
    );

    let pages = count_pages(session.apply()?)?;

    let download = session
        .download()
        .context("Watermarking produced no output")?;
    std::fs::write(output, &download.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!("Stamped {} page(s): {}", pages, output.display());

    if open {
        open_file(output)?;
    }

    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: &Path) -> Result<()> {
    let metadata = extract_metadata(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);

    for (i, size) in metadata.page_sizes.iter().enumerate() {
        println!("  Page {}: {:.2} x {:.2} pt", i + 1, size.width, size.height);
    }

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }
    if let Some(producer) = metadata.producer {
        println!("Producer: {}", producer);
    }

    Ok(())
}
