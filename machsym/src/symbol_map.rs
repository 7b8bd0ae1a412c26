//! Stored symbol maps
//!
//! A symbol map is one image's defined symbols with the slide removed, sorted
//! by address and saved as JSON. Addresses captured in a later run of the
//! same binary can then be resolved offline with just that run's slide.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::domain::{ImageIndex, SymbolMapError};
use crate::images::ImageSource;
use crate::report::{image_name, StackSymbol, UNKNOWN_IMAGE};
use crate::symbolization::image_locator::unslide;
use crate::symbolization::{base_of, LoadCommands, SymbolTable};

/// Symbol column for addresses a map cannot attribute
pub const UNKNOWN_SYMBOL: &str = "<unknown>";

/// One symbol of a stored map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub name: String,
    /// Unslid address.
    pub address: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMap {
    /// Path of the image the map was taken from.
    pub image: Option<String>,
    /// Sorted by address.
    pub symbols: Vec<SymbolEntry>,
}

impl SymbolMap {
    /// Collect the defined, named symbols of image `index`.
    ///
    /// # Errors
    /// Returns an error if `index` is not loaded or the image has no readable
    /// symbol table
    pub fn from_image<S: ImageSource + ?Sized>(
        source: &S,
        index: ImageIndex,
    ) -> Result<Self, SymbolMapError> {
        let header = source.image_header(index).ok_or(SymbolMapError::ImageOutOfRange(index))?;
        let path = source.image_path(index).map(str::to_string);
        let no_symtab =
            || SymbolMapError::NoSymbolTable(path.clone().unwrap_or_else(|| index.to_string()));

        let base = base_of(source, index).ok_or_else(no_symtab)?;
        let base = base.wrapping_add_signed(source.image_slide(index));
        let commands = LoadCommands::parse(source, header).ok_or_else(no_symtab)?;
        let (width, endian) = (commands.width(), commands.endian());

        let mut found = false;
        let mut symbols = Vec::new();
        for record in commands.symtabs() {
            let Some(table) = SymbolTable::read(source, record, width, endian, base) else {
                continue;
            };
            found = true;
            symbols.extend(
                table
                    .iter()
                    .filter(|entry| entry.is_defined() && !entry.is_stab())
                    .filter_map(|entry| {
                        let name = table.name(&entry).filter(|name| !name.is_empty())?;
                        Some(SymbolEntry { name: name.to_string(), address: entry.value })
                    }),
            );
        }
        if !found {
            return Err(no_symtab());
        }

        symbols.sort_by_key(|symbol| symbol.address);
        debug!("{} symbols collected from {index}", symbols.len());
        Ok(Self { image: path, symbols })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The closest symbol at or below `address - slide`.
    ///
    /// Addresses outside `[first, last]` symbol addresses are not attributed:
    /// past the last symbol the map cannot tell where its image ends.
    #[must_use]
    pub fn lookup(&self, address: u64, slide: i64) -> Option<&SymbolEntry> {
        let target = unslide(address, slide);
        let (first, last) = (self.symbols.first()?, self.symbols.last()?);
        if target < first.address || target > last.address {
            return None;
        }
        let after = self.symbols.partition_point(|symbol| symbol.address <= target);
        self.symbols.get(after.checked_sub(1)?)
    }

    /// Symbolicate frame addresses captured in a run with `slide`.
    ///
    /// Zero addresses are skipped, as in [`crate::report::symbolicate`].
    #[must_use]
    pub fn symbolicate(&self, addresses: &[u64], slide: i64) -> Vec<StackSymbol> {
        let image = self.image.as_deref().map_or(UNKNOWN_IMAGE, image_name);
        addresses
            .iter()
            .enumerate()
            .filter(|&(_, &address)| address != 0)
            .map(|(index, &address)| match self.lookup(address, slide) {
                Some(symbol) => StackSymbol {
                    index,
                    address,
                    image: image.to_string(),
                    file: self.image.clone().unwrap_or_else(|| "-".to_string()),
                    symbol: symbol.name.clone(),
                    symbol_address: symbol.address,
                    offset: unslide(address, slide).wrapping_sub(symbol.address),
                },
                None => StackSymbol {
                    index,
                    address,
                    image: UNKNOWN_IMAGE.to_string(),
                    file: "-".to_string(),
                    symbol: UNKNOWN_SYMBOL.to_string(),
                    symbol_address: 0,
                    offset: 0,
                },
            })
            .collect()
    }

    /// Write the map as JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SymbolMapError> {
        let path = path.as_ref();
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        info!("Wrote {} symbols to {}", self.symbols.len(), path.display());
        Ok(())
    }

    /// Read a map written by [`SymbolMap::save`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a symbol map
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SymbolMapError> {
        let path = path.as_ref();
        let mut map: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        // Hand-edited maps may be out of order.
        map.symbols.sort_by_key(|symbol| symbol.address);
        info!("Loaded {} symbols from {}", map.symbols.len(), path.display());
        Ok(map)
    }
}
