//! Find the loaded image that owns an address
//!
//! Images are tried in loader order. For each one the address is unslid and
//! compared against every segment's `[vmaddr, vmaddr + vmsize)`; the first
//! image with a containing segment wins. Images whose header is missing or
//! unreadable are skipped.

use crate::domain::ImageIndex;
use crate::images::ImageSource;

use super::load_commands::LoadCommands;

/// Index of the first image with a segment containing `address`.
pub fn locate<S: ImageSource + ?Sized>(images: &S, address: u64) -> Option<ImageIndex> {
    images.indices().find(|&index| image_contains(images, index, address))
}

/// Check whether any segment of image `index` contains `address`.
pub fn image_contains<S: ImageSource + ?Sized>(
    images: &S,
    index: ImageIndex,
    address: u64,
) -> bool {
    let Some(header) = images.image_header(index) else {
        return false;
    };
    let Some(commands) = LoadCommands::parse(images, header) else {
        return false;
    };

    let unslid = unslide(address, images.image_slide(index));
    commands.segments().any(|segment| segment.contains(unslid))
}

/// Undo the load-time slide: the address as it appears in the file's layout.
#[must_use]
pub fn unslide(address: u64, slide: i64) -> u64 {
    address.wrapping_sub(slide as u64)
}
