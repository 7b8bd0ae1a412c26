//! Mach-O files mapped from disk
//!
//! Each file is "loaded" the way dyld would place it: every segment with file
//! contents is mapped at `vmaddr + slide`, and reads at those addresses are
//! translated back to file offsets. Only the bytes backed by the file are
//! readable; zero-fill tails and `__PAGEZERO` are not.

use log::{debug, info, warn};
use object::macho;
use std::fs;
use std::path::Path;

use crate::domain::{ImageIndex, ImageLoadError};
use crate::symbolization::load_commands::{read_magic, LoadCommands, Width};

use super::{AddressSpace, ImageSource};

/// A file range mapped at a runtime address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mapping {
    address: u64,
    len: u64,
    fileoff: u64,
}

impl Mapping {
    fn translate(&self, address: u64, len: usize) -> Option<usize> {
        let offset = address.checked_sub(self.address)?;
        if offset.checked_add(len as u64)? > self.len {
            return None;
        }
        usize::try_from(self.fileoff + offset).ok()
    }

    fn overlaps(&self, other: &Mapping) -> bool {
        self.address < other.address.saturating_add(other.len)
            && other.address < self.address.saturating_add(self.len)
    }
}

#[derive(Debug)]
struct FileImage {
    path: String,
    slide: i64,
    header: u64,
    mappings: Vec<Mapping>,
    data: Vec<u8>,
}

/// A set of Mach-O files acting as a process's loaded images
///
/// Images keep the order they were added in; that order is the loader order
/// the resolver searches.
#[derive(Debug, Default)]
pub struct FileImages {
    images: Vec<FileImage>,
}

impl FileImages {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path` and map it with `slide`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a thin Mach-O image
    pub fn open<P: AsRef<Path>>(
        &mut self,
        path: P,
        slide: i64,
    ) -> Result<ImageIndex, ImageLoadError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        self.push(path.display().to_string(), data, slide)
    }

    /// Map an in-memory Mach-O image with `slide`.
    ///
    /// # Errors
    /// Returns an error for fat binaries, unknown magic numbers, unreadable
    /// load commands and segments that extend past the end of `data`
    pub fn push(
        &mut self,
        path: impl Into<String>,
        data: Vec<u8>,
        slide: i64,
    ) -> Result<ImageIndex, ImageLoadError> {
        let path = path.into();
        let magic = read_magic(&data[..], 0).ok_or(ImageLoadError::Truncated(data.len()))?;
        if matches!(
            magic,
            macho::FAT_MAGIC | macho::FAT_CIGAM | macho::FAT_MAGIC_64 | macho::FAT_CIGAM_64
        ) {
            return Err(ImageLoadError::FatBinary);
        }
        let width = Width::from_magic(magic).ok_or(ImageLoadError::UnsupportedMagic(magic))?;
        if data.len() < width.header_size() {
            return Err(ImageLoadError::Truncated(data.len()));
        }

        let commands = LoadCommands::parse(&data[..], 0)
            .ok_or_else(|| ImageLoadError::MalformedLoadCommands(path.clone()))?;

        let mut mappings = Vec::new();
        let mut header = None;
        for segment in commands.segments() {
            let len = segment.filesize.min(segment.vmsize);
            if len == 0 {
                continue;
            }
            let in_bounds =
                segment.fileoff.checked_add(len).is_some_and(|end| end <= data.len() as u64);
            if !in_bounds {
                return Err(ImageLoadError::SegmentOutOfBounds {
                    path,
                    segment: String::from_utf8_lossy(segment.name).into_owned(),
                });
            }

            let address = segment.vmaddr.wrapping_add_signed(slide);
            if segment.fileoff == 0 {
                header = Some(address);
            }
            debug!(
                "{}: {} -> 0x{:x}..0x{:x}",
                path,
                String::from_utf8_lossy(segment.name),
                address,
                address.wrapping_add(len)
            );
            mappings.push(Mapping { address, len, fileoff: segment.fileoff });
        }
        let header = header.ok_or_else(|| ImageLoadError::HeaderNotMapped(path.clone()))?;

        if let Some(other) = self.images.iter().find(|image| {
            image.mappings.iter().any(|theirs| mappings.iter().any(|ours| ours.overlaps(theirs)))
        }) {
            warn!("{path} overlaps {} in memory; the earlier image wins lookups", other.path);
        }

        let index = ImageIndex(u32::try_from(self.images.len()).unwrap_or(u32::MAX));
        info!(
            "Loaded {path} as {index} at 0x{header:x} (slide {slide:#x}, {} segments)",
            mappings.len()
        );
        self.images.push(FileImage { path, slide, header, mappings, data });
        Ok(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// File offset backing a runtime address of image `index`.
    #[must_use]
    pub fn file_offset(&self, index: ImageIndex, address: u64) -> Option<u64> {
        let image = self.images.get(index.0 as usize)?;
        let offset = image.mappings.iter().find_map(|mapping| mapping.translate(address, 1))?;
        Some(offset as u64)
    }
}

impl AddressSpace for FileImages {
    fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        self.images.iter().find_map(|image| {
            let start = image.mappings.iter().find_map(|mapping| mapping.translate(address, len))?;
            image.data.get(start..start.checked_add(len)?)
        })
    }
}

impl ImageSource for FileImages {
    fn image_count(&self) -> u32 {
        u32::try_from(self.images.len()).unwrap_or(u32::MAX)
    }

    fn image_header(&self, index: ImageIndex) -> Option<u64> {
        self.images.get(index.0 as usize).map(|image| image.header)
    }

    fn image_slide(&self, index: ImageIndex) -> i64 {
        self.images.get(index.0 as usize).map_or(0, |image| image.slide)
    }

    fn image_path(&self, index: ImageIndex) -> Option<&str> {
        self.images.get(index.0 as usize).map(|image| image.path.as_str())
    }
}
