//! Structured error types for machsym
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! The resolver itself never fails; these cover loading images from disk,
//! symbol map export and command-line parsing.

use super::types::ImageIndex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageLoadError {
    #[error("Image is too small to hold a Mach-O header ({0} bytes)")]
    Truncated(usize),

    #[error("Unsupported Mach-O magic 0x{0:08x}")]
    UnsupportedMagic(u32),

    #[error("Universal (fat) binaries are not supported, extract one slice with `lipo -thin`")]
    FatBinary,

    #[error("Malformed load commands in {0}")]
    MalformedLoadCommands(String),

    #[error("Segment {segment} of {path} extends past the end of the file")]
    SegmentOutOfBounds { path: String, segment: String },

    #[error("No segment of {0} maps the Mach-O header")]
    HeaderNotMapped(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SymbolMapError {
    #[error("{0} is not a loaded image")]
    ImageOutOfRange(ImageIndex),

    #[error("No symbol table found in {0}")]
    NoSymbolTable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("Empty address")]
    Empty,

    #[error("Invalid address: {0}")]
    Invalid(String),

    #[error("Invalid slide: {0}")]
    InvalidSlide(String),
}
