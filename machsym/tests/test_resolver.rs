use machsym::domain::ImageIndex;
use machsym::images::{FileImages, ImageSource};
use machsym::Resolver;
use machsym_fixture::{FixtureSymbol, MachOBuilder, BOGUS_MAGIC, STRIPPED_DESC};
use object::endian::Endianness;
use std::path::{Path, PathBuf};

const APP_TEXT: u64 = 0x1_0000_0000;
const LIB_TEXT: u64 = 0x7_0000_0000;

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("Failed to write fixture");
    path
}

fn app() -> Vec<u8> {
    MachOBuilder::new64()
        .page_zero(APP_TEXT)
        .text(APP_TEXT, 0x8000)
        .symbols([
            FixtureSymbol::new("__mh_execute_header", APP_TEXT).with_desc(STRIPPED_DESC),
            FixtureSymbol::new("_main", APP_TEXT + 0x1000),
            FixtureSymbol::new("__ZN3app3run17h0123456789abcdefE", APP_TEXT + 0x1400),
            FixtureSymbol::undefined("_write"),
        ])
        .build()
        .bytes
}

fn lib() -> Vec<u8> {
    MachOBuilder::new64()
        .text(LIB_TEXT, 0x4000)
        .symbols([
            FixtureSymbol::new("_lib_open", LIB_TEXT + 0x200),
            FixtureSymbol::new("_lib_close", LIB_TEXT + 0x600),
        ])
        .build()
        .bytes
}

#[test]
fn test_resolves_across_images_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut images = FileImages::new();
    images.open(write(dir.path(), "App", &app()), 0x3000).unwrap();
    images.open(write(dir.path(), "libfoo.dylib", &lib()), -0x1000).unwrap();
    let resolver = Resolver::new(images);

    let in_app = resolver.resolve(APP_TEXT + 0x3000 + 0x1410).expect("address inside App");
    assert_eq!(in_app.image, ImageIndex(0));
    assert!(in_app.path().unwrap().ends_with("App"));
    assert_eq!(in_app.base(), APP_TEXT + 0x3000);
    assert_eq!(in_app.symbol_address(), Some(APP_TEXT + 0x3000 + 0x1400));
    assert_eq!(in_app.symbol_name(), Some("_ZN3app3run17h0123456789abcdefE"));

    let in_lib = resolver.resolve(LIB_TEXT - 0x1000 + 0x610).expect("address inside libfoo");
    assert_eq!(in_lib.image, ImageIndex(1));
    assert_eq!(in_lib.symbol_name(), Some("lib_close"));
    assert_eq!(in_lib.symbol_address(), Some(LIB_TEXT - 0x1000 + 0x600));
}

#[test]
fn test_page_zero_claims_low_addresses_for_the_executable() {
    let dir = tempfile::tempdir().unwrap();
    let mut images = FileImages::new();
    images.open(write(dir.path(), "App", &app()), 0).unwrap();
    let resolver = Resolver::new(images);

    // __PAGEZERO belongs to the executable even though nothing is mapped there.
    let low = resolver.resolve(0x10).expect("inside __PAGEZERO");
    assert_eq!(low.base(), APP_TEXT);
    assert_eq!(low.symbol, None);
}

#[test]
fn test_stripped_executable_reports_address_without_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut images = FileImages::new();
    images.open(write(dir.path(), "App", &app()), 0).unwrap();
    let resolver = Resolver::new(images);

    let resolved = resolver.resolve(APP_TEXT + 0x200).unwrap();
    assert_eq!(resolved.symbol_address(), Some(APP_TEXT));
    assert_eq!(resolved.symbol_name(), None);
}

#[test]
fn test_corrupt_file_is_rejected_at_load_time() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = MachOBuilder::new64().magic(BOGUS_MAGIC).build().bytes;
    let mut images = FileImages::new();

    assert!(images.open(write(dir.path(), "bogus", &bogus), 0).is_err());
    assert!(images.is_empty());
}

#[test]
fn test_big_endian_32_bit_image() {
    let image = MachOBuilder::new32()
        .endian(Endianness::Big)
        .text(0x2000, 0x2000)
        .symbols([FixtureSymbol::new("_start", 0x2100), FixtureSymbol::new("_dispatch", 0x2300)])
        .build();
    let mut images = FileImages::new();
    images.push("/Library/ppc/tool", image.bytes, 0x1000).unwrap();
    let resolver = Resolver::new(images);

    let resolved = resolver.resolve(0x3304).unwrap();
    assert_eq!(resolved.symbol_name(), Some("dispatch"));
    assert_eq!(resolved.symbol_address(), Some(0x3300));
}

#[test]
fn test_lookups_are_repeatable() {
    let mut images = FileImages::new();
    images.push("/bin/app", app(), 0x5000).unwrap();
    let resolver = Resolver::new(images);
    let addresses = [APP_TEXT + 0x5000 + 0x1004, APP_TEXT + 0x5000 + 0x1404, 0x6_0000_0000];

    let first: Vec<_> = addresses.iter().map(|&address| resolver.resolve(address)).collect();
    let second: Vec<_> = addresses.iter().map(|&address| resolver.resolve(address)).collect();
    assert_eq!(first, second);
    assert!(first[2].is_none());
}

#[test]
fn test_resolver_is_shareable_between_threads() {
    let mut images = FileImages::new();
    images.push("/bin/app", app(), 0).unwrap();
    let resolver = Resolver::new(images);
    assert_eq!(resolver.images().image_count(), 1);

    std::thread::scope(|scope| {
        for offset in [0x1000u64, 0x1400, 0x1800] {
            let resolver = &resolver;
            scope.spawn(move || {
                let resolved = resolver.resolve(APP_TEXT + offset).unwrap();
                assert!(resolved.symbol_address().unwrap() <= APP_TEXT + offset);
            });
        }
    });
}
