//! Command-line interface

pub mod args;

pub use args::{parse_address, parse_slide, Args, Command, ImageArg};
