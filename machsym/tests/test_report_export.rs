use machsym::domain::ImageIndex;
use machsym::images::FileImages;
use machsym::report::{symbolicate, Backtrace};
use machsym::symbol_map::{SymbolMap, UNKNOWN_SYMBOL};
use machsym::thread::MainThread;
use machsym::Resolver;
use machsym_fixture::{FixtureSymbol, MachOBuilder};

const TEXT: u64 = 0x1_0000_0000;

fn images(slide: i64) -> FileImages {
    let image = MachOBuilder::new64()
        .symbols([
            FixtureSymbol::new("_main", TEXT + 0x100),
            FixtureSymbol::new("__ZN4tool6render17h0011223344556677E", TEXT + 0x800),
        ])
        .build();
    let mut images = FileImages::new();
    images.push("/usr/local/bin/tool", image.bytes, slide).expect("valid fixture");
    images
}

#[test]
fn test_backtrace_export_creates_valid_json() {
    let resolver = Resolver::new(images(0x2000));
    let main = MainThread::capture();
    let addresses = [TEXT + 0x2000 + 0x810, TEXT + 0x2000 + 0x120];
    let trace = Backtrace::new(&resolver, &main, main.id(), &addresses);

    let mut buffer = Vec::new();
    trace.export(&mut buffer).expect("Failed to export backtrace");

    let json_str = String::from_utf8(buffer).expect("Invalid UTF-8");
    let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("Invalid JSON");

    assert_eq!(parsed["is_main_thread"], true);
    assert_eq!(parsed["thread"], main.id().0);
    let frames = parsed["frames"].as_array().expect("frames array");
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["image"], "tool");
    assert_eq!(frames[0]["offset"], 0x10);
    assert_eq!(frames[1]["symbol"], "main");
}

#[test]
fn test_frame_lines_are_demangled() {
    let resolver = Resolver::new(images(0));
    let frames = symbolicate(&resolver, &[TEXT + 0x804]);

    assert_eq!(frames.len(), 1);
    let line = frames[0].to_string();
    assert!(line.starts_with("0   tool"), "unexpected line: {line}");
    assert!(line.contains("0x0000000100000804 tool::render + 4"), "unexpected line: {line}");
}

#[test]
fn test_symbol_map_survives_a_save_and_resolves_a_later_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tool.symbols.json");

    // Build-time run: no slide.
    let map = SymbolMap::from_image(&images(0), ImageIndex(0)).expect("symbol table");
    map.save(&path).expect("Failed to save map");

    // Crash-time run: the same binary slid by 0x7000.
    let slide: i64 = 0x7000;
    let slid_text = TEXT.wrapping_add_signed(slide);
    let loaded = SymbolMap::load(&path).expect("Failed to load map");
    let frames = loaded.symbolicate(&[slid_text + 0x108, slid_text + 0x1_0000], slide);

    assert_eq!(frames[0].symbol, "main");
    assert_eq!(frames[0].offset, 8);
    assert_eq!(frames[1].symbol, UNKNOWN_SYMBOL);

    // The live resolver and the stored map agree on the same address.
    let resolver = Resolver::new(images(slide));
    let live = resolver.resolve(slid_text + 0x108).unwrap();
    assert_eq!(live.symbol_name(), Some(frames[0].symbol.as_str()));
    assert_eq!(live.symbol_address(), Some(frames[0].symbol_address.wrapping_add_signed(slide)));
}
