//! # Loaded Images
//!
//! The resolver never talks to dyld directly. Everything it knows about the
//! process comes through two small read-only traits:
//!
//! - [`AddressSpace`]: bounds-checked reads of memory the caller did not
//!   allocate (Mach-O headers, load commands, `__LINKEDIT` contents).
//! - [`ImageSource`]: the host loader's ordinal image list (header address,
//!   slide and path per image).
//!
//! ## Implementations
//!
//! - [`FileImages`]: Mach-O files read from disk and mapped segment by
//!   segment at `vmaddr + slide`. Works on any host, which makes it the
//!   loader used by the CLI and the tests.
//! - `ProcessImages` (Apple targets only): the live dyld image list of the
//!   calling process.
//!
//! A plain byte slice is an [`AddressSpace`] whose addresses are file offsets,
//! which is how a Mach-O file is walked before it is mapped.

pub mod file;
#[cfg(target_vendor = "apple")]
pub mod process;

pub use file::FileImages;
#[cfg(target_vendor = "apple")]
pub use process::ProcessImages;

use crate::domain::ImageIndex;

/// Read-only view of an address space
pub trait AddressSpace {
    /// Borrow `len` bytes starting at `address`.
    ///
    /// Returns `None` when any part of the range is not backed by readable
    /// memory. Implementations must never panic on bad input.
    fn read(&self, address: u64, len: usize) -> Option<&[u8]>;
}

/// The host loader's list of loaded images, queried by ordinal
pub trait ImageSource: AddressSpace {
    /// Number of images currently loaded.
    fn image_count(&self) -> u32;

    /// Address of the image's Mach-O header, `None` if the slot is empty.
    fn image_header(&self, index: ImageIndex) -> Option<u64>;

    /// Difference between the image's load address and its preferred address.
    fn image_slide(&self, index: ImageIndex) -> i64;

    /// Path the image was loaded from.
    fn image_path(&self, index: ImageIndex) -> Option<&str>;

    /// All ordinals in loader order.
    fn indices(&self) -> impl Iterator<Item = ImageIndex> {
        (0..self.image_count()).map(ImageIndex)
    }
}

impl AddressSpace for [u8] {
    fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(address).ok()?;
        self.get(start..start.checked_add(len)?)
    }
}

impl<T: AddressSpace + ?Sized> AddressSpace for &T {
    fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        (**self).read(address, len)
    }
}

impl<T: ImageSource + ?Sized> ImageSource for &T {
    fn image_count(&self) -> u32 {
        (**self).image_count()
    }

    fn image_header(&self, index: ImageIndex) -> Option<u64> {
        (**self).image_header(index)
    }

    fn image_slide(&self, index: ImageIndex) -> i64 {
        (**self).image_slide(index)
    }

    fn image_path(&self, index: ImageIndex) -> Option<&str> {
        (**self).image_path(index)
    }
}

/// Synthetic image table for unit tests
///
/// Each image's bytes are mapped flat starting at its header address, which
/// matches the layout produced by `machsym-fixture`.
#[cfg(test)]
pub(crate) mod testing {
    use super::{AddressSpace, ImageSource};
    use crate::domain::ImageIndex;

    pub(crate) struct FlatImage {
        pub path: Option<String>,
        /// What the loader reports; `None` models an emptied slot.
        pub header: Option<u64>,
        /// Where `bytes` are mapped.
        pub base: u64,
        pub slide: i64,
        pub bytes: Vec<u8>,
    }

    #[derive(Default)]
    pub(crate) struct FlatImages {
        pub images: Vec<FlatImage>,
    }

    impl FlatImages {
        /// Map a fixture image at its preferred address plus `slide`.
        pub(crate) fn push(&mut self, path: &str, image: &machsym_fixture::MachOImage, slide: i64) {
            self.images.push(FlatImage {
                path: Some(path.to_string()),
                header: Some(image.header_address(slide)),
                base: image.header_address(slide),
                slide,
                bytes: image.bytes.clone(),
            });
        }

        pub(crate) fn with(
            mut self,
            path: &str,
            image: &machsym_fixture::MachOImage,
            slide: i64,
        ) -> Self {
            self.push(path, image, slide);
            self
        }
    }

    impl AddressSpace for FlatImages {
        fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
            self.images.iter().find_map(|image| {
                let offset = address.checked_sub(image.base)?;
                image.bytes.as_slice().read(offset, len)
            })
        }
    }

    impl ImageSource for FlatImages {
        fn image_count(&self) -> u32 {
            u32::try_from(self.images.len()).unwrap_or(u32::MAX)
        }

        fn image_header(&self, index: ImageIndex) -> Option<u64> {
            self.images.get(index.0 as usize)?.header
        }

        fn image_slide(&self, index: ImageIndex) -> i64 {
            self.images.get(index.0 as usize).map_or(0, |image| image.slide)
        }

        fn image_path(&self, index: ImageIndex) -> Option<&str> {
            self.images.get(index.0 as usize)?.path.as_deref()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_read_in_bounds() {
        let bytes = [1u8, 2, 3, 4, 5];
        assert_eq!(bytes[..].read(1, 3), Some(&[2u8, 3, 4][..]));
        assert_eq!(bytes[..].read(5, 0), Some(&[][..]));
    }

    #[test]
    fn test_slice_read_out_of_bounds() {
        let bytes = [1u8, 2, 3, 4, 5];
        assert_eq!(bytes[..].read(3, 3), None);
        assert_eq!(bytes[..].read(u64::MAX, 1), None);
        assert_eq!(bytes[..].read(1, usize::MAX), None);
    }
}
