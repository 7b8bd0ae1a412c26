//! # machsym - Main Entry Point
//!
//! Subcommands:
//! - **resolve**: resolve addresses against Mach-O files mapped at given slides
//! - **symbols**: export an image's symbol table as a JSON symbol map
//! - **lookup**: resolve addresses against a stored symbol map
//! - **self-test**: resolve functions of this process through dyld (Apple only)

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::io;
use std::path::Path;

use machsym::cli::{Args, Command, ImageArg};
use machsym::images::FileImages;
use machsym::report::{symbolicate, StackSymbol};
use machsym::symbol_map::SymbolMap;
use machsym::thread::MainThread;
use machsym::Resolver;

// Exit codes. Usage errors, malformed addresses included, exit with 2
// from `Args::parse`.
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

fn main() {
    env_logger::init();
    let main_thread = MainThread::capture();
    debug!("main thread is {}", main_thread.id());

    std::process::exit(match run(&main_thread) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run(main_thread: &MainThread) -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Resolve { images, addresses, json } => resolve(&images, &addresses, json),
        Command::Symbols { image, output } => export_symbols(&image, &output),
        Command::Lookup { map, slide, addresses, json } => lookup(&map, slide, &addresses, json),
        Command::SelfTest { json } => self_test(main_thread, json),
    }
}

fn resolve(images: &[ImageArg], addresses: &[u64], json: bool) -> Result<()> {
    let mut files = FileImages::new();
    for image in images {
        files
            .open(&image.path, image.slide)
            .with_context(|| format!("Failed to load {}", image.path.display()))?;
    }

    let resolver = Resolver::new(files);
    let unresolved =
        addresses.iter().filter(|&&address| resolver.locate(address).is_none()).count();
    if unresolved > 0 {
        warn!("{unresolved} of {} addresses are outside every loaded image", addresses.len());
    }
    print_frames(&symbolicate(&resolver, addresses), json)
}

fn export_symbols(image: &Path, output: &Path) -> Result<()> {
    let mut files = FileImages::new();
    let index =
        files.open(image, 0).with_context(|| format!("Failed to load {}", image.display()))?;

    let map = SymbolMap::from_image(&files, index)?;
    if map.is_empty() {
        warn!("{} has a symbol table but no named symbols", image.display());
    }
    map.save(output).with_context(|| format!("Failed to write {}", output.display()))?;

    println!("{} symbols written to {}", map.len(), output.display());
    Ok(())
}

fn lookup(map: &Path, slide: i64, addresses: &[u64], json: bool) -> Result<()> {
    let map = SymbolMap::load(map)
        .with_context(|| format!("Failed to read symbol map {}", map.display()))?;
    info!("Resolving {} addresses with slide {slide:#x}", addresses.len());
    print_frames(&map.symbolicate(addresses, slide), json)
}

fn print_frames(frames: &[StackSymbol], json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(io::stdout().lock(), frames).context("Failed to write JSON")?;
        println!();
    } else {
        for frame in frames {
            println!("{frame}");
        }
    }
    Ok(())
}

/// Resolve a few functions of this binary and of libSystem through dyld.
#[cfg(target_vendor = "apple")]
fn self_test(main_thread: &MainThread, json: bool) -> Result<()> {
    use machsym::images::{ImageSource, ProcessImages};
    use machsym::report::{Backtrace, UNKNOWN_IMAGE};

    let images = ProcessImages::capture();
    info!("dyld reports {} images", images.image_count());

    let main_fn: fn() = main;
    let run_fn: fn(&MainThread) -> Result<()> = run;
    let getpid_fn: unsafe extern "C" fn() -> libc::pid_t = libc::getpid;
    let addresses = [main_fn as usize as u64, run_fn as usize as u64, getpid_fn as usize as u64];

    let resolver = Resolver::new(images);
    let trace = Backtrace::new(&resolver, main_thread, main_thread.id(), &addresses);
    if json {
        trace.export(io::stdout().lock())?;
        println!();
    } else {
        print!("{trace}");
    }

    let missing = trace.frames.iter().filter(|frame| frame.image == UNKNOWN_IMAGE).count();
    anyhow::ensure!(
        missing == 0,
        "self-test failed: {missing} of {} functions were not attributed",
        addresses.len()
    );
    Ok(())
}

#[cfg(not(target_vendor = "apple"))]
fn self_test(_main_thread: &MainThread, _json: bool) -> Result<()> {
    anyhow::bail!("self-test reads the dyld image list and only runs on Apple platforms")
}
