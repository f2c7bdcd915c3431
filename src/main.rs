//! Main entry point for the zipdex CLI application.
//!
//! Lists and extracts ZIP64 archives from the local filesystem or from
//! remote HTTP URLs.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::{self, Read, Seek, Write};
use std::path::Path;

use zipdex::cli::format_size;
use zipdex::{Cli, HttpRangeStream, LocalFile, ZipArchive, ZipFileEntry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.is_http_url() {
        // Remote archive via HTTP Range requests
        let mut stream = HttpRangeStream::new(cli.file.clone())?;
        process_zip(&mut stream, &cli)?;

        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {} of {}",
                format_size(stream.transferred_bytes()),
                format_size(stream.size())
            );
        }
    } else {
        let file = LocalFile::open(Path::new(&cli.file))
            .with_context(|| format!("cannot open {}", cli.file))?;
        process_zip(file, &cli)?;
    }

    Ok(())
}

/// Open the archive, then list or extract according to `cli`.
fn process_zip<S: Read + Seek>(stream: S, cli: &Cli) -> Result<()> {
    let mut archive =
        ZipArchive::open(stream).with_context(|| format!("{}: not a valid ZIP64 archive", cli.file))?;

    if cli.list || cli.verbose {
        list_files(&archive, cli.verbose);
        return Ok(());
    }

    // Directories are created on demand while extracting files.
    let selected: Vec<ZipFileEntry> = archive
        .entries()
        .iter()
        .filter(|e| !e.is_directory && cli.selects(&e.file_name))
        .cloned()
        .collect();

    if selected.is_empty() && !cli.files.is_empty() {
        bail!("caution: filename not matched: {}", cli.files.join(" "));
    }

    let show_filename = cli.pipe && selected.len() > 1;
    for entry in &selected {
        extract_file(&mut archive, entry, cli, show_filename)
            .with_context(|| format!("failed to extract {}", entry.file_name))?;
    }

    Ok(())
}

fn list_files<S>(archive: &ZipArchive<S>, verbose: bool) {
    if !verbose {
        for name in zipdex::list_entry_names(archive) {
            println!("{name}");
        }
        return;
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in archive.entries() {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );
}

/// Space saved by compression, as a right-aligned percentage.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

fn extract_file<S: Read + Seek>(
    archive: &mut ZipArchive<S>,
    entry: &ZipFileEntry,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    if cli.pipe {
        let mut stdout = io::stdout().lock();
        if show_filename {
            writeln!(stdout, "--- {} ---", entry.file_name)?;
        }
        archive.extract_to_writer(entry, &mut stdout)?;
        stdout.flush()?;
        return Ok(());
    }

    let Some(output_path) = cli.output_path(&entry.file_name) else {
        if !cli.is_very_quiet() {
            eprintln!("Skipping: {} (unsafe path)", entry.file_name);
        }
        return Ok(());
    };

    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.file_name);
            }
            return Ok(());
        }
        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.file_name);
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.file_name);
    }
    archive.extract_to_file(entry, &output_path)?;

    Ok(())
}
