//! Symbol table scanning
//!
//! `LC_SYMTAB` points (by `__LINKEDIT` file offset) at an array of `nlist` or
//! `nlist_64` entries and at a string table. The array is not sorted, so the
//! nearest symbol below an address is found with a linear scan.

use object::endian::Endianness;
use object::macho::{self, Nlist32, Nlist64};
use object::pod;
use object::read::macho::Nlist;
use std::mem;

use crate::images::AddressSpace;

use super::load_commands::{SymtabRecord, Width};

/// `n_desc` of the best match in a stripped image.
///
/// Once local symbols are stripped the closest survivor below most code is
/// `__mh_execute_header`, which carries `REFERENCED_DYNAMICALLY`. Its name
/// says nothing about the address.
pub const STRIPPED_DESC: u16 = macho::REFERENCED_DYNAMICALLY;

/// A decoded symbol table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub value: u64,
    pub n_type: u8,
    pub n_desc: u16,
    pub strx: u32,
}

impl Entry {
    /// Undefined/external entries carry a zero value.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.value != 0
    }

    /// Debugger (stab) entries.
    #[must_use]
    pub fn is_stab(&self) -> bool {
        self.n_type & macho::N_STAB != 0
    }

    #[must_use]
    pub fn is_stripped_marker(&self) -> bool {
        self.n_desc == STRIPPED_DESC
    }
}

#[derive(Debug, Clone, Copy)]
enum Entries<'data> {
    Nlist32(&'data [Nlist32<Endianness>]),
    Nlist64(&'data [Nlist64<Endianness>]),
}

/// An image's symbol table as mapped in memory
#[derive(Debug, Clone, Copy)]
pub struct SymbolTable<'data> {
    entries: Entries<'data>,
    strings: Option<&'data [u8]>,
    endian: Endianness,
}

impl<'data> SymbolTable<'data> {
    /// Borrow the tables described by `record` from `memory`.
    ///
    /// `base` is the slid `__LINKEDIT` base. Returns `None` when the entry
    /// array is unreadable; an unreadable string table only loses names.
    pub fn read<A: AddressSpace + ?Sized>(
        memory: &'data A,
        record: SymtabRecord,
        width: Width,
        endian: Endianness,
        base: u64,
    ) -> Option<Self> {
        let count = usize::try_from(record.nsyms).ok()?;
        let address = base.wrapping_add(u64::from(record.symoff));
        let entries = match width {
            Width::Bits32 => Entries::Nlist32(read_slice(memory, address, count)?),
            Width::Bits64 => Entries::Nlist64(read_slice(memory, address, count)?),
        };

        let strings = usize::try_from(record.strsize)
            .ok()
            .and_then(|len| memory.read(base.wrapping_add(u64::from(record.stroff)), len));

        Some(Self { entries, strings, endian })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self.entries {
            Entries::Nlist32(entries) => entries.len(),
            Entries::Nlist64(entries) => entries.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Entry> {
        match self.entries {
            Entries::Nlist32(entries) => entries.get(index).map(|n| decode(n, self.endian)),
            Entries::Nlist64(entries) => entries.get(index).map(|n| decode(n, self.endian)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Entry> + '_ {
        (0..self.len()).filter_map(|index| self.get(index))
    }

    /// The defined entry closest to `target` without exceeding it.
    ///
    /// `target` is unslid. Among entries at the same distance the one seen
    /// last wins.
    #[must_use]
    pub fn nearest(&self, target: u64) -> Option<Entry> {
        let mut best: Option<(Entry, u64)> = None;
        for entry in self.iter() {
            if !entry.is_defined() || entry.value > target {
                continue;
            }
            let distance = target - entry.value;
            if best.map_or(true, |(_, best_distance)| distance <= best_distance) {
                best = Some((entry, distance));
            }
        }
        best.map(|(entry, _)| entry)
    }

    /// Raw NUL-terminated name of `entry`, without the terminator.
    #[must_use]
    pub fn raw_name(&self, entry: &Entry) -> Option<&'data [u8]> {
        let strings = self.strings?;
        let start = usize::try_from(entry.strx).ok()?;
        let tail = strings.get(start..)?;
        let end = tail.iter().position(|&b| b == 0)?;
        Some(&tail[..end])
    }

    /// Display name of `entry` with one leading `_` removed. `None` when the
    /// string index is out of range or the name is not UTF-8; a name that is
    /// empty once stripped stays `Some("")`.
    #[must_use]
    pub fn name(&self, entry: &Entry) -> Option<&'data str> {
        let name = std::str::from_utf8(self.raw_name(entry)?).ok()?;
        Some(strip_underscore(name))
    }
}

/// Remove the C-level `_` prefix the linker adds to every symbol.
#[must_use]
pub fn strip_underscore(name: &str) -> &str {
    name.strip_prefix('_').unwrap_or(name)
}

fn decode<N: Nlist<Endian = Endianness>>(nlist: &N, endian: Endianness) -> Entry {
    Entry {
        value: nlist.n_value(endian).into(),
        n_type: nlist.n_type(),
        n_desc: nlist.n_desc(endian),
        strx: nlist.n_strx(endian),
    }
}

fn read_slice<'data, T: pod::Pod, A: AddressSpace + ?Sized>(
    memory: &'data A,
    address: u64,
    count: usize,
) -> Option<&'data [T]> {
    let len = count.checked_mul(mem::size_of::<T>())?;
    let bytes = memory.read(address, len)?;
    pod::slice_from_bytes(bytes, count).ok().map(|(slice, _)| slice)
}
