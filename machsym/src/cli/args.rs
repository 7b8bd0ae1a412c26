//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::AddressParseError;

#[derive(Debug, Parser)]
#[command(
    name = "machsym",
    version,
    about = "Resolve Mach-O runtime addresses to images and symbols",
    after_help = "\
EXAMPLES:
    machsym resolve --image ./App@0x4000 0x100005f10            Resolve against a slid file
    machsym symbols --image ./App --output App.symbols.json     Export a symbol map
    machsym lookup --map App.symbols.json --slide 0x4000 0x100005f10
    machsym self-test                                           Resolve this process (macOS)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve addresses against Mach-O files mapped at the given slides
    Resolve {
        /// Image to load, in loader order (PATH or PATH@SLIDE)
        #[arg(short, long = "image", value_name = "PATH[@SLIDE]", required = true)]
        images: Vec<ImageArg>,

        /// Runtime addresses (0x-prefixed hex or decimal)
        #[arg(value_name = "ADDRESS", required = true, value_parser = parse_address)]
        addresses: Vec<u64>,

        /// Print the frames as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the symbol table of a Mach-O file as a JSON symbol map
    Symbols {
        /// Mach-O file to read
        #[arg(short, long, value_name = "PATH")]
        image: PathBuf,

        /// Where to write the map
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Resolve addresses against a stored symbol map
    Lookup {
        /// Symbol map written by `symbols`
        #[arg(short, long, value_name = "FILE")]
        map: PathBuf,

        /// Slide of the run the addresses were captured in
        #[arg(
            short,
            long,
            default_value = "0",
            value_parser = parse_slide,
            allow_hyphen_values = true
        )]
        slide: i64,

        /// Runtime addresses (0x-prefixed hex or decimal)
        #[arg(value_name = "ADDRESS", required = true, value_parser = parse_address)]
        addresses: Vec<u64>,

        /// Print the frames as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve functions of this process through the live dyld image list
    SelfTest {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// `PATH` or `PATH@SLIDE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArg {
    pub path: PathBuf,
    pub slide: i64,
}

impl FromStr for ImageArg {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AddressParseError::Empty);
        }
        match s.rsplit_once('@') {
            Some((path, slide)) if !path.is_empty() => {
                Ok(Self { path: PathBuf::from(path), slide: parse_slide(slide)? })
            }
            _ => Ok(Self { path: PathBuf::from(s), slide: 0 }),
        }
    }
}

/// Parse an address: `0x`-prefixed hexadecimal or decimal.
///
/// # Errors
/// Returns an error for empty or malformed input
pub fn parse_address(s: &str) -> Result<u64, AddressParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AddressParseError::Empty);
    }
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|_| AddressParseError::Invalid(s.to_string()))
}

/// Parse a slide: like an address, with an optional leading `-`.
///
/// # Errors
/// Returns an error for malformed input or magnitudes beyond `i64`
pub fn parse_slide(s: &str) -> Result<i64, AddressParseError> {
    let s = s.trim();
    let (negative, magnitude) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let invalid = || AddressParseError::InvalidSlide(s.to_string());
    let magnitude = parse_address(magnitude).map_err(|_| invalid())?;
    if negative {
        0i64.checked_sub_unsigned(magnitude).ok_or_else(invalid)
    } else {
        i64::try_from(magnitude).map_err(|_| invalid())
    }
}
