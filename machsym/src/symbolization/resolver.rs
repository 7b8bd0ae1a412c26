use serde::Serialize;

use crate::domain::ImageIndex;
use crate::images::ImageSource;

use super::image_locator::{self, unslide};
use super::load_commands::LoadCommands;
use super::segment_base;
use super::symtab::SymbolTable;

/// Resolves runtime addresses against an [`ImageSource`]
///
/// Holds no state besides the source, so every call re-reads the loader's
/// image list and sees its current contents.
#[derive(Debug, Clone)]
pub struct Resolver<S> {
    images: S,
}

impl<S: ImageSource> Resolver<S> {
    pub fn new(images: S) -> Self {
        Self { images }
    }

    #[must_use]
    pub fn images(&self) -> &S {
        &self.images
    }

    /// Index of the image containing `address`.
    pub fn locate(&self, address: u64) -> Option<ImageIndex> {
        image_locator::locate(&self.images, address)
    }

    /// Unslid `__LINKEDIT` base of image `index`.
    pub fn base_of(&self, index: ImageIndex) -> Option<u64> {
        segment_base::base_of(&self.images, index)
    }

    /// Resolve `address` to its image and the closest symbol at or below it.
    ///
    /// `None` when no loaded image contains the address. An image without a
    /// `__LINKEDIT` segment or usable symbol table still resolves, with no
    /// symbol.
    pub fn resolve(&self, address: u64) -> Option<ResolvedSymbol<'_>> {
        let images = &self.images;
        let image = self.locate(address)?;
        let header = images.image_header(image)?;

        let symbol = self.base_of(image).and_then(|base| self.scan(image, header, base, address));

        Some(ResolvedSymbol { image, path: images.image_path(image), base: header, symbol })
    }

    fn scan(
        &self,
        image: ImageIndex,
        header: u64,
        linkedit_base: u64,
        address: u64,
    ) -> Option<Symbol<'_>> {
        let images = &self.images;
        let slide = images.image_slide(image);
        let target = unslide(address, slide);
        let base = linkedit_base.wrapping_add_signed(slide);

        let commands = LoadCommands::parse(images, header)?;
        let (width, endian) = (commands.width(), commands.endian());

        commands.symtabs().find_map(|record| {
            let table = SymbolTable::read(images, record, width, endian, base)?;
            let entry = table.nearest(target)?;
            let name = if entry.is_stripped_marker() { None } else { table.name(&entry) };
            Some(Symbol { address: entry.value.wrapping_add_signed(slide), name })
        })
    }
}

/// Where an address was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedSymbol<'a> {
    pub image: ImageIndex,
    pub path: Option<&'a str>,
    /// Runtime address of the image's Mach-O header.
    pub base: u64,
    pub symbol: Option<Symbol<'a>>,
}

/// The closest symbol at or below an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Symbol<'a> {
    /// Runtime (slid) address.
    pub address: u64,
    /// Name without its leading `_`; `None` for stripped images.
    pub name: Option<&'a str>,
}

impl<'a> ResolvedSymbol<'a> {
    #[must_use]
    pub fn path(&self) -> Option<&'a str> {
        self.path
    }

    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    #[must_use]
    pub fn symbol_address(&self) -> Option<u64> {
        self.symbol.map(|symbol| symbol.address)
    }

    #[must_use]
    pub fn symbol_name(&self) -> Option<&'a str> {
        self.symbol.and_then(|symbol| symbol.name)
    }
}
