// Frame lines are built with format! for readability
#![allow(clippy::format_push_string)]

use rustc_demangle::demangle;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::images::ImageSource;
use crate::symbolization::{ResolvedSymbol, Resolver};

/// Image column for frames outside every known image
pub const UNKNOWN_IMAGE: &str = "???";

/// One symbolicated stack frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSymbol {
    /// Position in the original frame list.
    pub index: usize,
    /// Runtime address of the frame.
    pub address: u64,
    /// Last path component of the image, or `???`.
    pub image: String,
    /// Full path of the image, `-` when unknown.
    pub file: String,
    /// Symbol name, falling back to the image name, then to the symbol
    /// address in hex.
    pub symbol: String,
    /// Runtime address of `symbol` (0 when there is none).
    pub symbol_address: u64,
    /// Distance from the symbol when one was named, otherwise from the
    /// image's header.
    pub offset: u64,
}

impl StackSymbol {
    /// Build a frame from a lookup result.
    #[must_use]
    pub fn new(index: usize, address: u64, resolved: Option<&ResolvedSymbol<'_>>) -> Self {
        let path = resolved.and_then(ResolvedSymbol::path);
        let name = resolved.and_then(ResolvedSymbol::symbol_name).filter(|name| !name.is_empty());
        let symbol_address = resolved.and_then(ResolvedSymbol::symbol_address).unwrap_or(0);
        let image = path.map_or(UNKNOWN_IMAGE, image_name);

        let (symbol, offset) = match (name, path, resolved) {
            (Some(name), _, _) => (name.to_string(), address.wrapping_sub(symbol_address)),
            (None, Some(_), Some(resolved)) => {
                (image.to_string(), address.wrapping_sub(resolved.base()))
            }
            _ => (format!("{symbol_address:#x}"), address.wrapping_sub(symbol_address)),
        };

        Self {
            index,
            address,
            image: image.to_string(),
            file: path.unwrap_or("-").to_string(),
            symbol,
            symbol_address,
            offset,
        }
    }

    /// `symbol` with Rust mangling undone.
    #[must_use]
    pub fn demangled(&self) -> String {
        format!("{:#}", demangle(&self.symbol))
    }

    /// One report line.
    #[must_use]
    pub fn info(&self) -> String {
        let mut line = format!("{:<4}{:<35} ", self.index, self.image);
        line.push_str(&format!("0x{:016x} {} + {}", self.address, self.demangled(), self.offset));
        line
    }
}

impl fmt::Display for StackSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.info())
    }
}

/// The image name shown in reports: the last path component.
///
/// Paths without a `/` are not trusted to name an image.
#[must_use]
pub fn image_name(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name,
        _ => UNKNOWN_IMAGE,
    }
}

/// Symbolicate a list of frame addresses.
///
/// Zero addresses (unused unwinder slots) are skipped; the remaining frames
/// keep their original index.
pub fn symbolicate<S: ImageSource>(resolver: &Resolver<S>, addresses: &[u64]) -> Vec<StackSymbol> {
    addresses
        .iter()
        .enumerate()
        .filter(|&(_, &address)| address != 0)
        .map(|(index, &address)| {
            StackSymbol::new(index, address, resolver.resolve(address).as_ref())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImageIndex;
    use crate::symbolization::Symbol;

    fn resolved<'a>(path: Option<&'a str>, symbol: Option<Symbol<'a>>) -> ResolvedSymbol<'a> {
        ResolvedSymbol { image: ImageIndex(0), path, base: 0x1_0000_0000, symbol }
    }

    #[test]
    fn test_named_symbol_offsets_from_symbol() {
        let r = resolved(
            Some("/usr/lib/libsystem_c.dylib"),
            Some(Symbol { address: 0x1_0000_1000, name: Some("abort") }),
        );
        let frame = StackSymbol::new(3, 0x1_0000_1024, Some(&r));

        assert_eq!(frame.image, "libsystem_c.dylib");
        assert_eq!(frame.file, "/usr/lib/libsystem_c.dylib");
        assert_eq!(frame.symbol, "abort");
        assert_eq!(frame.symbol_address, 0x1_0000_1000);
        assert_eq!(frame.offset, 0x24);
    }

    #[test]
    fn test_stripped_symbol_falls_back_to_image() {
        let r = resolved(
            Some("/Applications/App.app/App"),
            Some(Symbol { address: 0x1_0000_0000, name: None }),
        );
        let frame = StackSymbol::new(0, 0x1_0000_2000, Some(&r));

        assert_eq!(frame.symbol, "App");
        assert_eq!(frame.offset, 0x2000);
    }

    #[test]
    fn test_empty_symbol_name_falls_back_to_image() {
        let r = resolved(Some("/bin/app"), Some(Symbol { address: 0x1_0000_0010, name: Some("") }));
        let frame = StackSymbol::new(0, 0x1_0000_0030, Some(&r));

        assert_eq!(frame.symbol, "app");
        assert_eq!(frame.offset, 0x30);
    }

    #[test]
    fn test_unknown_address() {
        let frame = StackSymbol::new(7, 0xdead, None);

        assert_eq!(frame.image, UNKNOWN_IMAGE);
        assert_eq!(frame.file, "-");
        assert_eq!(frame.symbol, "0x0");
        assert_eq!(frame.symbol_address, 0);
        assert_eq!(frame.offset, 0xdead);
    }

    #[test]
    fn test_image_without_path() {
        let r = resolved(None, Some(Symbol { address: 0x1_0000_0040, name: None }));
        let frame = StackSymbol::new(1, 0x1_0000_0050, Some(&r));

        assert_eq!(frame.image, UNKNOWN_IMAGE);
        assert_eq!(frame.symbol, "0x100000040");
        assert_eq!(frame.offset, 0x10);
    }

    #[test]
    fn test_info_line_layout() {
        let r = resolved(Some("/bin/app"), Some(Symbol { address: 0x1000, name: Some("main") }));
        let frame = StackSymbol::new(2, 0x1010, Some(&r));

        assert_eq!(
            frame.info(),
            format!("2   {:<35} 0x0000000000001010 main + 16", "app")
        );
        assert_eq!(frame.to_string(), frame.info());
    }

    #[test]
    fn test_demangles_rust_symbols() {
        let r = resolved(
            Some("/bin/app"),
            Some(Symbol {
                address: 0x1000,
                name: Some("_ZN4core9panicking5panic17h0123456789abcdefE"),
            }),
        );
        let frame = StackSymbol::new(0, 0x1000, Some(&r));

        assert_eq!(frame.demangled(), "core::panicking::panic");
    }

    #[test]
    fn test_image_name() {
        assert_eq!(image_name("/usr/lib/dyld"), "dyld");
        assert_eq!(image_name("relative/lib.dylib"), "lib.dylib");
        assert_eq!(image_name("bare"), UNKNOWN_IMAGE);
        assert_eq!(image_name("/trailing/"), UNKNOWN_IMAGE);
    }
}
