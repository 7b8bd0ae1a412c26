//! `__LINKEDIT` base address
//!
//! `LC_SYMTAB` stores file offsets. In memory, `__LINKEDIT` maps file offset
//! `fileoff` to unslid address `vmaddr`, so any `__LINKEDIT` file offset `off`
//! lives at:
//!
//! ```text
//! runtime address = off + (vmaddr - fileoff) + slide
//!                         └──── base_of ────┘
//! ```

use crate::domain::ImageIndex;
use crate::images::ImageSource;

use super::load_commands::LoadCommands;

/// `vmaddr - fileoff` of the image's `__LINKEDIT` segment (unslid).
///
/// `None` when the image has no readable header or no `__LINKEDIT`.
pub fn base_of<S: ImageSource + ?Sized>(images: &S, index: ImageIndex) -> Option<u64> {
    let header = images.image_header(index)?;
    LoadCommands::parse(images, header)?
        .segments()
        .find(|segment| segment.is_linkedit())
        .map(|segment| segment.file_base())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::testing::FlatImages;
    use machsym_fixture::{MachOBuilder, BOGUS_MAGIC};

    #[test]
    fn test_linkedit_base_is_vmaddr_minus_fileoff() {
        let image = MachOBuilder::new64().page_zero(0x1_0000_0000).build();
        let images = FlatImages::default().with("/app", &image, 0x4000);

        // __LINKEDIT: vmaddr = text + text_size, fileoff = text_size
        assert_eq!(base_of(&images, ImageIndex(0)), Some(image.linkedit_base()));
        assert_eq!(image.linkedit_base(), machsym_fixture::DEFAULT_TEXT_VMADDR);
    }

    #[test]
    fn test_32_bit_linkedit() {
        let image = MachOBuilder::new32().text(0x4000, 0x1000).build();
        let images = FlatImages::default().with("/app32", &image, 0);

        assert_eq!(base_of(&images, ImageIndex(0)), Some(0x4000));
    }

    #[test]
    fn test_zero_base_is_a_valid_base() {
        let image = MachOBuilder::new64().text(0, 0x1000).build();
        let images = FlatImages::default().with("/zero", &image, 0x10_0000);

        assert_eq!(base_of(&images, ImageIndex(0)), Some(0));
    }

    #[test]
    fn test_missing_linkedit() {
        let image = MachOBuilder::new64().without_linkedit().build();
        let images = FlatImages::default().with("/nolinkedit", &image, 0);

        assert_eq!(base_of(&images, ImageIndex(0)), None);
    }

    #[test]
    fn test_corrupt_header() {
        let image = MachOBuilder::new64().magic(BOGUS_MAGIC).build();
        let images = FlatImages::default().with("/corrupt", &image, 0);

        assert_eq!(base_of(&images, ImageIndex(0)), None);
        assert_eq!(base_of(&images, ImageIndex(1)), None);
    }
}
