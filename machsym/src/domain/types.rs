//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep loader ordinals and thread identifiers from
//! being mixed up with the raw `u64` addresses that flow through the resolver.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal of a loaded image in the host loader's image list
///
/// Only meaningful for the image source it was obtained from, and only until
/// that source's image list changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageIndex(pub u32);

impl fmt::Display for ImageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image#{}", self.0)
    }
}

impl From<u32> for ImageIndex {
    fn from(index: u32) -> Self {
        ImageIndex(index)
    }
}

/// OS-level thread identifier
///
/// The system-wide id from `pthread_threadid_np` on Apple platforms, the
/// kernel TID on Linux. Not a Mach thread port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_index_display() {
        assert_eq!(ImageIndex(3).to_string(), "image#3");
    }

    #[test]
    fn test_thread_id_display() {
        assert_eq!(ThreadId(259).to_string(), "TID:259");
    }
}
