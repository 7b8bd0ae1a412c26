//! # Synthetic Mach-O Images for Tests
//!
//! Builds small, well-formed (or deliberately broken) Mach-O images in memory
//! so the resolver can be exercised without a macOS toolchain or real dyld
//! state. All records are the `#[repr(C)]` layouts from [`object::macho`],
//! serialized with [`object::pod::bytes_of`].
//!
//! ## Layout
//!
//! Images are laid out the way `ld64` lays out a simple executable, with file
//! offsets mirroring virtual offsets so that the whole file can be mapped flat
//! at `text_vmaddr + slide`:
//!
//! ```text
//! file offset 0 ─┬─ mach_header(_64)
//!                ├─ load commands (__PAGEZERO?, __TEXT, __LINKEDIT?, LC_UUID, LC_SYMTAB*)
//!                └─ zero padding up to text_size              ── __TEXT
//! text_size ─────┬─ nlist(_64) array
//!                ├─ string table ("\0" + NUL-terminated names) ── __LINKEDIT
//!                └─ (nlist array, string table) per extra symtab
//! ```

#![no_std]

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use object::endian::{BigEndian, Endian, Endianness, U16, U32, U64, U64Bytes};
use object::macho;
use object::pod::bytes_of;

// ============================================================================
// Constants
// ============================================================================

/// `n_desc` value that marks the best match of a stripped image.
pub const STRIPPED_DESC: u16 = macho::REFERENCED_DYNAMICALLY;

/// Magic number that no Mach-O reader recognizes.
pub const BOGUS_MAGIC: u32 = 0xdead_beef;

/// Default `__TEXT` virtual address of a 64-bit executable.
pub const DEFAULT_TEXT_VMADDR: u64 = 0x1_0000_0000;

/// Default `__TEXT` size (one page).
pub const DEFAULT_TEXT_SIZE: u64 = 0x4000;

// ============================================================================
// Symbols
// ============================================================================

/// A symbol-table entry to emit.
#[derive(Debug, Clone)]
pub struct FixtureSymbol {
    pub name: String,
    pub value: u64,
    pub n_type: u8,
    pub n_desc: u16,
    /// Overrides the computed string-table index (for out-of-range tests).
    pub strx: Option<u32>,
}

impl FixtureSymbol {
    /// A defined external symbol in section 1.
    pub fn new(name: &str, value: u64) -> Self {
        Self {
            name: String::from(name),
            value,
            n_type: macho::N_SECT | macho::N_EXT,
            n_desc: 0,
            strx: None,
        }
    }

    /// An undefined symbol (value 0).
    pub fn undefined(name: &str) -> Self {
        Self { n_type: macho::N_UNDF | macho::N_EXT, ..Self::new(name, 0) }
    }

    #[must_use]
    pub fn with_desc(mut self, n_desc: u16) -> Self {
        self.n_desc = n_desc;
        self
    }

    #[must_use]
    pub fn with_strx(mut self, strx: u32) -> Self {
        self.strx = Some(strx);
        self
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for a synthetic Mach-O executable image.
#[derive(Debug, Clone)]
pub struct MachOBuilder {
    is_64: bool,
    endian: Endianness,
    magic: Option<u32>,
    text_vmaddr: u64,
    text_size: u64,
    page_zero: Option<u64>,
    linkedit: bool,
    symtab: bool,
    symbols: Vec<FixtureSymbol>,
    extra_symtabs: Vec<Vec<FixtureSymbol>>,
}

impl Default for MachOBuilder {
    fn default() -> Self {
        Self::new64()
    }
}

impl MachOBuilder {
    /// A 64-bit little-endian image.
    pub fn new64() -> Self {
        Self {
            is_64: true,
            endian: Endianness::Little,
            magic: None,
            text_vmaddr: DEFAULT_TEXT_VMADDR,
            text_size: DEFAULT_TEXT_SIZE,
            page_zero: None,
            linkedit: true,
            symtab: true,
            symbols: Vec::new(),
            extra_symtabs: Vec::new(),
        }
    }

    /// A 32-bit little-endian image.
    pub fn new32() -> Self {
        Self { is_64: false, text_vmaddr: 0x1000, ..Self::new64() }
    }

    #[must_use]
    pub fn endian(mut self, endian: Endianness) -> Self {
        self.endian = endian;
        self
    }

    /// Replace the header magic with an arbitrary value.
    #[must_use]
    pub fn magic(mut self, magic: u32) -> Self {
        self.magic = Some(magic);
        self
    }

    #[must_use]
    pub fn text(mut self, vmaddr: u64, size: u64) -> Self {
        self.text_vmaddr = vmaddr;
        self.text_size = size;
        self
    }

    /// Emit a `__PAGEZERO` segment of `size` bytes at address 0.
    #[must_use]
    pub fn page_zero(mut self, size: u64) -> Self {
        self.page_zero = Some(size);
        self
    }

    /// Omit the `__LINKEDIT` segment command (its bytes are still written).
    #[must_use]
    pub fn without_linkedit(mut self) -> Self {
        self.linkedit = false;
        self
    }

    /// Omit the `LC_SYMTAB` command.
    #[must_use]
    pub fn without_symtab(mut self) -> Self {
        self.symtab = false;
        self
    }

    #[must_use]
    pub fn symbol(mut self, symbol: FixtureSymbol) -> Self {
        self.symbols.push(symbol);
        self
    }

    #[must_use]
    pub fn symbols<I: IntoIterator<Item = FixtureSymbol>>(mut self, symbols: I) -> Self {
        self.symbols.extend(symbols);
        self
    }

    /// Emit another `LC_SYMTAB` after the primary one, with its own entries
    /// and string table.
    #[must_use]
    pub fn extra_symtab<I: IntoIterator<Item = FixtureSymbol>>(mut self, symbols: I) -> Self {
        self.extra_symtabs.push(symbols.into_iter().collect());
        self
    }

    /// Serialize the image.
    ///
    /// # Panics
    /// Panics if the load commands do not fit in `text_size`.
    pub fn build(&self) -> MachOImage {
        let e = self.endian;
        let linkedit_fileoff = self.text_size;

        let mut linkedit = Vec::new();
        let primary = self.append_symtab(&self.symbols, &mut linkedit);
        let mut extras = Vec::with_capacity(self.extra_symtabs.len());
        for symbols in &self.extra_symtabs {
            extras.push(self.append_symtab(symbols, &mut linkedit));
        }
        let linkedit_size = linkedit.len() as u64;

        let mut commands: Vec<Vec<u8>> = Vec::new();
        if let Some(size) = self.page_zero {
            commands.push(self.segment(b"__PAGEZERO", 0, size, 0, 0));
        }
        commands.push(self.segment(b"__TEXT", self.text_vmaddr, self.text_size, 0, self.text_size));
        if self.linkedit {
            commands.push(self.segment(
                b"__LINKEDIT",
                self.text_vmaddr + linkedit_fileoff,
                linkedit_size,
                linkedit_fileoff,
                linkedit_size,
            ));
        }
        commands.push(
            bytes_of(&macho::UuidCommand {
                cmd: U32::new(e, macho::LC_UUID),
                cmdsize: U32::new(e, 24),
                uuid: [0x42; 16],
            })
            .to_vec(),
        );
        if self.symtab {
            commands.push(bytes_of(&primary).to_vec());
        }
        commands.extend(extras.iter().map(|symtab| bytes_of(symtab).to_vec()));

        let sizeofcmds: usize = commands.iter().map(Vec::len).sum();
        let mut bytes = self.header(commands.len(), sizeofcmds);
        for command in &commands {
            bytes.extend_from_slice(command);
        }
        assert!(bytes.len() as u64 <= self.text_size, "load commands overflow __TEXT");
        bytes.resize(self.text_size as usize, 0);
        bytes.extend_from_slice(&linkedit);

        MachOImage { bytes, text_vmaddr: self.text_vmaddr, text_size: self.text_size }
    }

    /// Append the nlist array and string table of `symbols` to `linkedit`.
    fn append_symtab(
        &self,
        symbols: &[FixtureSymbol],
        linkedit: &mut Vec<u8>,
    ) -> macho::SymtabCommand<Endianness> {
        let e = self.endian;
        let (strings, strx) = string_table(symbols);
        let symoff = self.text_size + linkedit.len() as u64;

        for (symbol, strx) in symbols.iter().zip(strx) {
            let strx = U32::new(e, symbol.strx.unwrap_or(strx));
            let n_desc = U16::new(e, symbol.n_desc);
            if self.is_64 {
                linkedit.extend_from_slice(bytes_of(&macho::Nlist64 {
                    n_strx: strx,
                    n_type: symbol.n_type,
                    n_sect: 1,
                    n_desc,
                    n_value: U64Bytes::new(e, symbol.value),
                }));
            } else {
                linkedit.extend_from_slice(bytes_of(&macho::Nlist32 {
                    n_strx: strx,
                    n_type: symbol.n_type,
                    n_sect: 1,
                    n_desc,
                    n_value: U32::new(e, to_u32(symbol.value)),
                }));
            }
        }
        let stroff = self.text_size + linkedit.len() as u64;
        linkedit.extend_from_slice(&strings);

        macho::SymtabCommand {
            cmd: U32::new(e, macho::LC_SYMTAB),
            cmdsize: U32::new(e, 24),
            symoff: U32::new(e, to_u32(symoff)),
            nsyms: U32::new(e, to_u32(symbols.len() as u64)),
            stroff: U32::new(e, to_u32(stroff)),
            strsize: U32::new(e, to_u32(strings.len() as u64)),
        }
    }

    fn header(&self, ncmds: usize, sizeofcmds: usize) -> Vec<u8> {
        let e = self.endian;
        let (native, swapped, cputype) = if self.is_64 {
            (macho::MH_MAGIC_64, macho::MH_CIGAM_64, macho::CPU_TYPE_ARM64)
        } else {
            (macho::MH_MAGIC, macho::MH_CIGAM, macho::CPU_TYPE_X86)
        };
        let magic = self.magic.unwrap_or(if e.is_big_endian() { native } else { swapped });
        let magic = U32::new(BigEndian, magic);
        let ncmds = U32::new(e, to_u32(ncmds as u64));
        let sizeofcmds = U32::new(e, to_u32(sizeofcmds as u64));

        if self.is_64 {
            bytes_of(&macho::MachHeader64 {
                magic,
                cputype: U32::new(e, cputype),
                cpusubtype: U32::new(e, 0),
                filetype: U32::new(e, macho::MH_EXECUTE),
                ncmds,
                sizeofcmds,
                flags: U32::new(e, macho::MH_PIE),
                reserved: U32::new(e, 0),
            })
            .to_vec()
        } else {
            bytes_of(&macho::MachHeader32 {
                magic,
                cputype: U32::new(e, cputype),
                cpusubtype: U32::new(e, 0),
                filetype: U32::new(e, macho::MH_EXECUTE),
                ncmds,
                sizeofcmds,
                flags: U32::new(e, macho::MH_PIE),
            })
            .to_vec()
        }
    }

    fn segment(
        &self,
        name: &[u8],
        vmaddr: u64,
        vmsize: u64,
        fileoff: u64,
        filesize: u64,
    ) -> Vec<u8> {
        let e = self.endian;
        let segname = segname(name);
        let prot = macho::VM_PROT_READ | macho::VM_PROT_EXECUTE;
        if self.is_64 {
            bytes_of(&macho::SegmentCommand64 {
                cmd: U32::new(e, macho::LC_SEGMENT_64),
                cmdsize: U32::new(e, 72),
                segname,
                vmaddr: U64::new(e, vmaddr),
                vmsize: U64::new(e, vmsize),
                fileoff: U64::new(e, fileoff),
                filesize: U64::new(e, filesize),
                maxprot: U32::new(e, prot),
                initprot: U32::new(e, prot),
                nsects: U32::new(e, 0),
                flags: U32::new(e, 0),
            })
            .to_vec()
        } else {
            bytes_of(&macho::SegmentCommand32 {
                cmd: U32::new(e, macho::LC_SEGMENT),
                cmdsize: U32::new(e, 56),
                segname,
                vmaddr: U32::new(e, to_u32(vmaddr)),
                vmsize: U32::new(e, to_u32(vmsize)),
                fileoff: U32::new(e, to_u32(fileoff)),
                filesize: U32::new(e, to_u32(filesize)),
                maxprot: U32::new(e, prot),
                initprot: U32::new(e, prot),
                nsects: U32::new(e, 0),
                flags: U32::new(e, 0),
            })
            .to_vec()
        }
    }
}

/// String table bytes and the index of each symbol's name.
fn string_table(symbols: &[FixtureSymbol]) -> (Vec<u8>, Vec<u32>) {
    let mut strings = Vec::from(&b"\0"[..]);
    let mut strx = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        strx.push(to_u32(strings.len() as u64));
        strings.extend_from_slice(symbol.name.as_bytes());
        strings.push(0);
    }
    (strings, strx)
}

// ============================================================================
// Output
// ============================================================================

/// A serialized image together with where it expects to be mapped.
#[derive(Debug, Clone)]
pub struct MachOImage {
    pub bytes: Vec<u8>,
    pub text_vmaddr: u64,
    pub text_size: u64,
}

impl MachOImage {
    /// Address of the header once the image is mapped with `slide`.
    pub fn header_address(&self, slide: i64) -> u64 {
        self.text_vmaddr.wrapping_add_signed(slide)
    }

    /// `vmaddr - fileoff` of `__LINKEDIT`.
    pub fn linkedit_base(&self) -> u64 {
        self.text_vmaddr
    }
}

fn segname(name: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..name.len()].copy_from_slice(name);
    out
}

fn to_u32(value: u64) -> u32 {
    u32::try_from(value).expect("fixture value does not fit in 32 bits")
}
