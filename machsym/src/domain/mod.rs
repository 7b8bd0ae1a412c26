//! Domain model for machsym
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Self-documenting function signatures
//! - Structured error handling for the layers around the resolver

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{ImageIndex, ThreadId};

pub use errors::{AddressParseError, ImageLoadError, SymbolMapError};
