//! Load command walking
//!
//! A Mach-O header is followed by `ncmds` load commands packed back to back
//! in a `sizeofcmds`-byte region. Each command records only its own tag and
//! size, so the only way to find a command is to walk every one before it.
//!
//! [`LoadCommands`] validates the header magic, borrows exactly the load
//! command region from the [`AddressSpace`], and yields typed views of the
//! records the resolver cares about. A command whose size is smaller than a
//! command header, or that runs past the region, ends the walk.

use object::endian::Endianness;
use object::macho::{self, MachHeader32, MachHeader64};
use object::read::macho::{LoadCommandIterator, MachHeader, Segment};
use std::mem;

use crate::images::AddressSpace;

/// Record width selected by the header magic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// `MH_MAGIC`/`MH_CIGAM`: 28-byte header, 12-byte `nlist`.
    Bits32,
    /// `MH_MAGIC_64`/`MH_CIGAM_64`: 32-byte header, 16-byte `nlist_64`.
    Bits64,
}

impl Width {
    /// Classify a magic number read as big-endian bytes.
    #[must_use]
    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            macho::MH_MAGIC | macho::MH_CIGAM => Some(Width::Bits32),
            macho::MH_MAGIC_64 | macho::MH_CIGAM_64 => Some(Width::Bits64),
            _ => None,
        }
    }

    /// Offset of the first load command from the header.
    #[must_use]
    pub fn header_size(self) -> usize {
        match self {
            Width::Bits32 => mem::size_of::<MachHeader32<Endianness>>(),
            Width::Bits64 => mem::size_of::<MachHeader64<Endianness>>(),
        }
    }
}

/// Read the magic at `header` (as big-endian bytes, the way it is defined).
pub fn read_magic<A: AddressSpace + ?Sized>(memory: &A, header: u64) -> Option<u32> {
    let bytes = memory.read(header, 4)?;
    Some(u32::from_be_bytes(bytes.try_into().ok()?))
}

/// A `LC_SEGMENT` or `LC_SEGMENT_64` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRecord<'data> {
    /// Segment name with the NUL padding removed.
    pub name: &'data [u8],
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
}

impl SegmentRecord<'_> {
    fn from_segment<S: Segment<Endian = Endianness>>(
        segment: &S,
        endian: Endianness,
    ) -> SegmentRecord<'_> {
        SegmentRecord {
            name: segment.name(),
            vmaddr: segment.vmaddr(endian).into(),
            vmsize: segment.vmsize(endian).into(),
            fileoff: segment.fileoff(endian).into(),
            filesize: segment.filesize(endian).into(),
        }
    }

    /// Check whether an unslid address falls in `[vmaddr, vmaddr + vmsize)`.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address >= self.vmaddr && address - self.vmaddr < self.vmsize
    }

    /// `vmaddr - fileoff`: adds to a file offset inside this segment to give
    /// its unslid virtual address.
    #[must_use]
    pub fn file_base(&self) -> u64 {
        self.vmaddr.wrapping_sub(self.fileoff)
    }

    #[must_use]
    pub fn is_linkedit(&self) -> bool {
        self.name == macho::SEG_LINKEDIT.as_bytes()
    }
}

/// A `LC_SYMTAB` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymtabRecord {
    pub symoff: u32,
    pub nsyms: u32,
    pub stroff: u32,
    pub strsize: u32,
}

/// One load command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'data> {
    Segment(SegmentRecord<'data>),
    Symtab(SymtabRecord),
    /// Any other command, by tag.
    Other(u32),
}

/// Cursor over an image's load commands
#[derive(Debug)]
pub struct LoadCommands<'data> {
    commands: LoadCommandIterator<'data, Endianness>,
    endian: Endianness,
    width: Width,
}

impl<'data> LoadCommands<'data> {
    /// Start a walk at the Mach-O header located at `header`.
    ///
    /// Returns `None` for an unrecognized magic or when the header or the
    /// load command region cannot be read.
    pub fn parse<A: AddressSpace + ?Sized>(memory: &'data A, header: u64) -> Option<Self> {
        match Width::from_magic(read_magic(memory, header)?)? {
            Width::Bits32 => {
                Self::parse_as::<MachHeader32<Endianness>, A>(memory, header, Width::Bits32)
            }
            Width::Bits64 => {
                Self::parse_as::<MachHeader64<Endianness>, A>(memory, header, Width::Bits64)
            }
        }
    }

    fn parse_as<Mach, A>(memory: &'data A, header: u64, width: Width) -> Option<Self>
    where
        Mach: MachHeader<Endian = Endianness>,
        A: AddressSpace + ?Sized,
    {
        let fixed = memory.read(header, mem::size_of::<Mach>())?;
        let mach = Mach::parse(fixed, 0).ok()?;
        let endian = mach.endian().ok()?;

        let sizeofcmds = usize::try_from(mach.sizeofcmds(endian)).ok()?;
        let data = memory.read(header, mem::size_of::<Mach>().checked_add(sizeofcmds)?)?;
        let mach = Mach::parse(data, 0).ok()?;
        let commands = mach.load_commands(endian, data, 0).ok()?;

        Some(Self { commands, endian, width })
    }

    #[must_use]
    pub fn endian(&self) -> Endianness {
        self.endian
    }

    #[must_use]
    pub fn width(&self) -> Width {
        self.width
    }

    /// Only the segment records, 32 and 64-bit alike.
    pub fn segments(self) -> impl Iterator<Item = SegmentRecord<'data>> {
        self.filter_map(|record| match record {
            Record::Segment(segment) => Some(segment),
            _ => None,
        })
    }

    /// Only the symbol table records.
    pub fn symtabs(self) -> impl Iterator<Item = SymtabRecord> + 'data {
        self.filter_map(|record| match record {
            Record::Symtab(symtab) => Some(symtab),
            _ => None,
        })
    }
}

impl<'data> Iterator for LoadCommands<'data> {
    type Item = Record<'data>;

    fn next(&mut self) -> Option<Record<'data>> {
        let endian = self.endian;
        // A malformed command ends the walk the same way the last one does.
        let command = self.commands.next().ok()??;

        if let Ok(Some((segment, _))) = command.segment_64() {
            return Some(Record::Segment(SegmentRecord::from_segment(segment, endian)));
        }
        if let Ok(Some((segment, _))) = command.segment_32() {
            return Some(Record::Segment(SegmentRecord::from_segment(segment, endian)));
        }
        if let Ok(Some(symtab)) = command.symtab() {
            return Some(Record::Symtab(SymtabRecord {
                symoff: symtab.symoff.get(endian),
                nsyms: symtab.nsyms.get(endian),
                stroff: symtab.stroff.get(endian),
                strsize: symtab.strsize.get(endian),
            }));
        }
        Some(Record::Other(command.cmd()))
    }
}
