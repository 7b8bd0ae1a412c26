//! The calling process's dyld image list
//!
//! dyld hands out raw header pointers and C strings that stay valid for as
//! long as the image stays loaded. [`ProcessImages::capture`] copies the
//! list and each image's segment ranges once, so reads can be checked
//! against memory that is known to be mapped instead of trusting whatever
//! address a load command happens to contain.
//!
//! Images unloaded (`dlclose`) after the capture leave dangling entries;
//! capture again after changing the set of loaded libraries.

#![allow(unsafe_code)]

use std::ffi::CStr;
use std::slice;

use crate::domain::ImageIndex;
use crate::symbolization::load_commands::{LoadCommands, Width};

use super::{AddressSpace, ImageSource};

#[derive(Debug)]
struct ProcessImage {
    header: u64,
    slide: i64,
    path: Option<String>,
    /// Slid `[start, end)` of every segment with file contents.
    ranges: Vec<(u64, u64)>,
}

/// Snapshot of the live dyld image list
#[derive(Debug, Default)]
pub struct ProcessImages {
    images: Vec<Option<ProcessImage>>,
}

/// The header plus load commands of one image, readable in place.
struct HeaderRegion {
    start: u64,
    bytes: &'static [u8],
}

impl AddressSpace for HeaderRegion {
    fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        self.bytes.read(address.checked_sub(self.start)?, len)
    }
}

impl ProcessImages {
    /// Copy the current image list.
    #[must_use]
    pub fn capture() -> Self {
        #[allow(deprecated)]
        let count = unsafe { libc::_dyld_image_count() };
        let images = (0..count).map(|i| unsafe { process_image(i) }).collect();
        Self { images }
    }

    fn get(&self, index: ImageIndex) -> Option<&ProcessImage> {
        self.images.get(index.0 as usize)?.as_ref()
    }
}

/// # Safety
/// `i` must be below `_dyld_image_count()`.
#[allow(deprecated)]
unsafe fn process_image(i: u32) -> Option<ProcessImage> {
    let header = libc::_dyld_get_image_header(i);
    if header.is_null() {
        return None;
    }
    let slide = libc::_dyld_get_image_vmaddr_slide(i) as i64;
    let name = libc::_dyld_get_image_name(i);
    let path = (!name.is_null()).then(|| CStr::from_ptr(name).to_string_lossy().into_owned());

    let width = match (*header).magic {
        libc::MH_MAGIC => Width::Bits32,
        libc::MH_MAGIC_64 => Width::Bits64,
        _ => return None,
    };
    let len = width.header_size().checked_add((*header).sizeofcmds as usize)?;
    let start = header as usize as u64;
    let region = HeaderRegion { start, bytes: slice::from_raw_parts(header.cast::<u8>(), len) };

    let ranges = LoadCommands::parse(&region, start)?
        .segments()
        .filter(|segment| segment.filesize > 0 && segment.vmsize > 0)
        .map(|segment| {
            let start = segment.vmaddr.wrapping_add_signed(slide);
            (start, start.saturating_add(segment.vmsize))
        })
        .collect();

    Some(ProcessImage { header: start, slide, path, ranges })
}

impl AddressSpace for ProcessImages {
    fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        let end = address.checked_add(len as u64)?;
        let mapped = self
            .images
            .iter()
            .flatten()
            .flat_map(|image| image.ranges.iter())
            .any(|&(start, stop)| start <= address && end <= stop);
        if !mapped {
            return None;
        }
        let ptr = usize::try_from(address).ok()? as *const u8;
        // SAFETY: the range lies inside a segment dyld mapped for a loaded image.
        Some(unsafe { slice::from_raw_parts(ptr, len) })
    }
}

impl ImageSource for ProcessImages {
    fn image_count(&self) -> u32 {
        u32::try_from(self.images.len()).unwrap_or(u32::MAX)
    }

    fn image_header(&self, index: ImageIndex) -> Option<u64> {
        self.get(index).map(|image| image.header)
    }

    fn image_slide(&self, index: ImageIndex) -> i64 {
        self.get(index).map_or(0, |image| image.slide)
    }

    fn image_path(&self, index: ImageIndex) -> Option<&str> {
        self.get(index)?.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolization::Resolver;

    #[inline(never)]
    fn marker_address() -> u64 {
        let this: fn() -> u64 = marker_address;
        this as usize as u64
    }

    #[test]
    fn test_capture_lists_this_executable() {
        let images = ProcessImages::capture();
        assert!(images.image_count() > 0);
        assert!(images.indices().any(|index| images.image_header(index).is_some()));
    }

    #[test]
    fn test_resolves_own_function() {
        let resolver = Resolver::new(ProcessImages::capture());
        let address = marker_address();

        let resolved = resolver.resolve(address).expect("test binary is loaded");
        let exe = std::env::current_exe().unwrap();
        let exe_name = exe.file_name().unwrap().to_string_lossy();
        assert!(resolved.path().unwrap().ends_with(exe_name.as_ref()));
        assert!(resolved.symbol_address().unwrap() <= address);
    }

    #[test]
    fn test_unmapped_read_is_refused() {
        let images = ProcessImages::capture();
        assert!(images.read(0, 8).is_none());
        assert!(images.read(u64::MAX - 4, 8).is_none());
    }
}
