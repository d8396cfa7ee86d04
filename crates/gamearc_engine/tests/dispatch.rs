mod common;

use std::io::Cursor;

use common::{demo_archive, Blob, Demo, Greedy};
use gamearc_engine::{
    error::{Capability, Error, Result},
    CodecId, Codecs, DispatchOptions, Entry, Registry, Source,
};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

fn registry() -> Registry {
    Registry::new().with(Demo).with(Blob)
}

#[traced_test]
#[test]
fn stored_names_and_lengths_in_file_order() -> Result<()> {
    let source = Source::from_bytes(
        "three.demo",
        demo_archive(&[("c.txt", &b"cc"[..]), ("a.txt", &b"aaaa"[..]), ("b.txt", &b"b"[..])]),
    );

    let registry = registry();
    let plugin = registry.identify(&source).expect("demo should be identified");
    assert_eq!(plugin.descriptor().tag, "demo");

    let archive = registry.open(&source)?;
    assert_eq!(archive.format(), "demo");
    assert_eq!(
        archive
            .iter()
            .map(|e| (e.name(), e.length()))
            .collect::<Vec<_>>(),
        vec![("c.txt", 2), ("a.txt", 4), ("b.txt", 1)]
    );
    assert_eq!(archive.by_name("a.txt")?.read(&Codecs::empty())?, b"aaaa");
    for entry in &archive {
        assert!(entry.offset() + entry.length() <= source.size());
    }

    Ok(())
}

#[test]
fn unmatched_file_is_not_identified() {
    let source = Source::from_bytes("notes.txt", b"just some text".to_vec());
    let registry = registry();

    assert!(registry.identify(&source).is_none());
    assert!(matches!(
        registry.open(&source),
        Err(Error::UnrecognizedFormat)
    ));
}

#[test]
fn empty_file_is_not_identified() {
    let source = Source::from_bytes("empty.demo", Vec::<u8>::new());
    let registry = registry();

    // the extension alone matches, but the failed signature read zeroes the score
    let candidates = registry.rank(&source);
    assert_eq!(candidates[0].tag(), "demo");
    assert!(candidates.iter().all(|c| c.score.value() == 0));
    assert!(registry.identify(&source).is_none());
}

#[test]
fn missing_codec_fails_reads_only() -> Result<()> {
    let mut bytes = demo_archive(&[("packed.bin", &[0u8; 19][..])]);
    // expanded length of the only record
    bytes[8 + 16 + 8..8 + 16 + 12].copy_from_slice(&11u32.to_le_bytes());
    let source = Source::from_bytes("packed.demo", bytes);

    let archive = registry().extract(&source, "DEMO")?;
    let entry = archive.by_index(0)?;
    assert_eq!(entry.decompressor(), Some(CodecId::Zlib));
    assert_eq!(entry.size(), 11);
    assert!(matches!(
        entry.read(&Codecs::empty()),
        Err(Error::MissingCapability(Capability::Decompress(CodecId::Zlib)))
    ));

    Ok(())
}

#[test]
fn truncated_directory_yields_no_entries() {
    let bytes = demo_archive(&[("a.txt", &b"aaaa"[..]), ("b.txt", &b"bbbb"[..])]);
    let source = Source::from_bytes("cut.demo", bytes[..8 + 28 + 10].to_vec());

    assert!(matches!(
        registry().extract(&source, "demo"),
        Err(Error::TruncatedRead { .. }) | Err(Error::InvalidOffset { .. })
    ));
}

#[test]
fn synthesized_names_get_guessed_extensions() -> Result<()> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&12u32.to_le_bytes());
    bytes.extend_from_slice(&20u32.to_le_bytes());
    bytes.extend_from_slice(b"\x89PNG\r\n\x1a\n");
    bytes.extend_from_slice(b"no magic here");
    let source = Source::from_bytes("pair.blob", bytes);

    let archive = registry().open(&source)?;
    assert_eq!(archive.format(), "blob");
    assert_eq!(
        archive.file_names().collect::<Vec<_>>(),
        vec!["entry_00000.png", "entry_00001"]
    );
    assert_eq!(
        archive.iter().map(Entry::length).collect::<Vec<_>>(),
        vec![8, 13]
    );
    assert!(!archive.by_index(0)?.has_stored_name());

    Ok(())
}

#[traced_test]
#[test]
fn open_falls_through_to_the_next_candidate() -> Result<()> {
    let source = Source::from_bytes("one.demo", demo_archive(&[("a.txt", &b"a"[..])]));

    let registry = Registry::new().with(Greedy).with(Demo);
    let ranked = registry.rank(&source);
    assert_eq!(
        ranked.iter().map(|c| c.tag()).collect::<Vec<_>>(),
        vec!["greedy", "demo"]
    );

    let archive = registry.open(&source)?;
    assert_eq!(archive.format(), "demo");
    assert!(logs_contain("falling through"));

    Ok(())
}

#[test]
fn open_reports_the_best_candidates_error() {
    let source = Source::from_bytes("bogus.demo", b"DEMO\x05\0\0\0".to_vec());
    let registry = Registry::new().with(Greedy).with(Demo);

    assert!(matches!(
        registry.open(&source),
        Err(Error::InconsistentDirectory(_))
    ));
}

#[test]
fn ties_keep_registration_order() {
    let source = Source::from_bytes("x.bin", vec![0u8; 8]);

    let first = Registry::new().with(Blob).with(Demo);
    let second = Registry::new().with(Demo).with(Blob);
    let scores = |registry: &Registry| {
        registry
            .rank(&source)
            .into_iter()
            .map(|c| (c.tag(), c.score.value()))
            .collect::<Vec<_>>()
    };

    assert_eq!(scores(&first), vec![("blob", 0), ("demo", 0)]);
    assert_eq!(scores(&second), vec![("demo", 0), ("blob", 0)]);
}

#[test]
fn floor_is_configurable() {
    let source = Source::from_bytes("pair.blob", vec![1u8, 0, 0, 0, 8, 0, 0, 0, 0xAA]);

    assert!(registry().identify(&source).is_some());

    let strict = Registry::with_options(DispatchOptions::builder().min_confidence(31).build())
        .with(Demo)
        .with(Blob);
    assert!(strict.identify(&source).is_none());
}

#[test]
fn registry_lookups() {
    let mut registry = registry();
    registry.register(Demo);

    assert_eq!(registry.plugins().len(), 2);
    assert!(registry.by_tag("BLOB").is_some());
    assert!(registry.by_tag("zip").is_none());
    assert_eq!(
        registry
            .by_extension(".Demo")
            .map(|p| p.descriptor().tag)
            .collect::<Vec<_>>(),
        vec!["demo"]
    );
    assert!(matches!(
        registry.extract(&Source::from_bytes("a", Vec::<u8>::new()), "zip"),
        Err(Error::UnknownFormat(_))
    ));
}

#[test]
fn packing_requires_a_writer() -> Result<()> {
    let source = Source::from_bytes("one.demo", demo_archive(&[("a.txt", &b"a"[..])]));
    let archive = registry().open(&source)?;

    let mut out = Cursor::new(Vec::<u8>::new());
    assert!(matches!(
        registry().pack("demo", archive.entries(), &Codecs::empty(), &mut out),
        Err(Error::MissingCapability(Capability::Pack("demo")))
    ));

    let greedy = Registry::new().with(Greedy);
    assert!(matches!(
        greedy.pack("greedy", archive.entries(), &Codecs::empty(), &mut out),
        Err(Error::MissingCapability(Capability::Pack("greedy")))
    ));
    assert!(out.get_ref().is_empty());

    Ok(())
}
