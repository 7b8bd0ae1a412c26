//! # machsym - Mach-O Runtime Address Symbolication
//!
//! machsym turns raw instruction addresses, as captured while unwinding a
//! stack, into the loaded image that contains each one and the nearest symbol
//! table entry at or below it. It is the part of a crash or hang reporter that
//! makes `0x0000000100004f10` read as `App  run + 112`.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Host loader (dyld or files on disk)             │
//! │        image list: header address, slide, path per ordinal      │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ ImageSource + AddressSpace
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Resolver (symbolization)                       │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    Image     │──▶│  __LINKEDIT  │──▶│  Symbol table│         │
//! │  │   locator    │   │     base     │   │    scanner   │         │
//! │  └──────────────┘   └──────────────┘   └──────────────┘         │
//! │         └────────── load command walker ──────┘                 │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ ResolvedSymbol (borrowed, no allocation)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   Report (StackSymbol, Backtrace)   │   Symbol maps (JSON)      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`symbolization`]: the resolution engine. Walks load commands, finds the
//!   owning image, computes the `__LINKEDIT` base under ASLR, and scans
//!   `nlist` entries for the closest symbol.
//! - [`images`]: the loader seam. [`images::FileImages`] maps Mach-O files
//!   from disk at any slide; `images::ProcessImages` reads the live dyld
//!   image list on Apple targets.
//! - [`report`]: frame lines and per-thread backtraces, serializable to JSON.
//! - [`symbol_map`]: offline symbol maps for resolving addresses from another
//!   run of the same binary.
//! - [`thread`]: main thread identity, captured once by `main`.
//! - [`cli`]: command-line argument parsing.
//! - [`domain`]: newtypes and error types.
//!
//! ## Failure Model
//!
//! The resolver never fails and never logs. An address no image claims
//! resolves to `None`; corrupt images are skipped; images without symbols
//! still report their path and base. Errors only exist around it: loading
//! files, writing maps, parsing arguments.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Resolve two addresses against an executable slid by 0x4000
//! machsym resolve --image ./App@0x4000 0x100005f10 0x100006020
//!
//! # Keep the symbols of a build around, resolve crash addresses later
//! machsym symbols --image ./App --output App.symbols.json
//! machsym lookup --map App.symbols.json --slide 0x4000 0x100005f10
//! ```

pub mod cli;
pub mod domain;
pub mod images;
pub mod report;
pub mod symbol_map;
pub mod symbolization;
pub mod thread;

pub use symbolization::{ResolvedSymbol, Resolver, Symbol};
