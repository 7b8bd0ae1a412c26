//! # Address to Symbol Resolution
//!
//! This module turns a raw instruction address captured while unwinding a
//! stack into the loaded image that contains it and, when the image still has
//! one, the closest symbol table entry at or below it.
//!
//! ## Slides
//!
//! Mach-O images are linked at a preferred address (`vmaddr` of each segment)
//! and loaded somewhere else. The loader reports the difference as the image's
//! **slide**:
//!
//! ```text
//! runtime address = file (unslid) address + slide
//! ```
//!
//! Segment ranges and `nlist` values are unslid, so every comparison happens
//! after subtracting the slide from the query address, and every address that
//! leaves this module has the slide added back.
//!
//! ## Where the symbol table lives
//!
//! `LC_SYMTAB` gives file offsets (`symoff`, `stroff`). They are turned into
//! memory addresses through `__LINKEDIT`, the segment that maps them:
//!
//! ```text
//! linkedit_base  = __LINKEDIT.vmaddr - __LINKEDIT.fileoff
//! nlist array    = linkedit_base + slide + symoff
//! string table   = linkedit_base + slide + stroff
//! ```
//!
//! ## Lookup flow
//!
//! ```text
//! address ──► image_locator::locate      which image? (segment ranges)
//!         ──► segment_base::base_of      where is __LINKEDIT?
//!         ──► SymbolTable::nearest       linear scan of nlist entries
//!         ──► ResolvedSymbol             path, header address, symbol
//! ```
//!
//! Each step walks the image's load commands again through
//! [`LoadCommands`]; nothing is cached between lookups.
//!
//! ## Degradation
//!
//! Lookups never fail loudly:
//!
//! - no image contains the address: `None`
//! - unrecognized magic or unreadable load commands: image skipped
//! - no `__LINKEDIT` or no `LC_SYMTAB`: image identity without a symbol
//! - best match is `__mh_execute_header` of a stripped image: address
//!   without a name
//!
//! ## Module Structure
//!
//! - **`load_commands`**: bounds-checked walk over load commands
//! - **`image_locator`**: address to image ordinal
//! - **`segment_base`**: `__LINKEDIT` base
//! - **`symtab`**: `nlist` views and nearest-symbol scan
//! - **`resolver`**: the combined lookup and its result types

pub mod image_locator;
pub mod load_commands;
pub mod resolver;
pub mod segment_base;
pub mod symtab;

pub use image_locator::locate;
pub use load_commands::{LoadCommands, Record, SegmentRecord, SymtabRecord, Width};
pub use resolver::{ResolvedSymbol, Resolver, Symbol};
pub use segment_base::base_of;
pub use symtab::{strip_underscore, Entry, SymbolTable};
