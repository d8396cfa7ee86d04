//! Magic sequences used to label entries of formats that store no names.
//!
//! The guesses only decorate output names; they never feed back into parsing.

/// A signature that identifies a payload type
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    /// Bytes expected at `offset`
    pub magic: &'static [u8],
    /// Where the magic bytes start in the payload
    pub offset: usize,
    /// Extension to label matching payloads with
    pub extension: &'static str,
}

const fn sig(magic: &'static [u8], offset: usize, extension: &'static str) -> Signature {
    Signature {
        magic,
        offset,
        extension,
    }
}

/// Known payload signatures, most specific first
pub const SIGNATURES: &[Signature] = &[
    sig(b"\x89PNG\r\n\x1a\n", 0, "png"),
    sig(&[0xFF, 0xD8, 0xFF], 0, "jpg"),
    sig(b"GIF87a", 0, "gif"),
    sig(b"GIF89a", 0, "gif"),
    sig(b"DDS ", 0, "dds"),
    sig(b"TIM2", 0, "tm2"),
    sig(b"WAVE", 8, "wav"),
    sig(b"AVI ", 8, "avi"),
    sig(b"OggS", 0, "ogg"),
    sig(b"fLaC", 0, "flac"),
    sig(b"ID3", 0, "mp3"),
    sig(b"MThd", 0, "mid"),
    sig(b"PK\x03\x04", 0, "zip"),
    sig(b"EERT", 0, "tre"),
    sig(b"PACK", 0, "pak"),
    sig(b"VER2", 0, "img"),
    sig(b"AFS\0", 0, "afs"),
    sig(&[0x55, 0xAA, 0x38, 0x2D], 0, "arc"),
    sig(b"Yaz0", 0, "szs"),
    sig(b"FORM", 0, "iff"),
    sig(b"\x7fELF", 0, "elf"),
    sig(b"<?xml", 0, "xml"),
    sig(b"BM", 0, "bmp"),
    sig(b"MZ", 0, "exe"),
];

/// Guess an extension for a payload from its first bytes.
///
/// ```
/// use gamearc_engine::sniff::guess_extension;
///
/// assert_eq!(guess_extension(b"\x89PNG\r\n\x1a\n...."), Some("png"));
/// assert_eq!(guess_extension(b"RIFF\x10\0\0\0WAVEfmt "), Some("wav"));
/// assert_eq!(guess_extension(b"plain text"), None);
/// ```
pub fn guess_extension(header_probe: &[u8]) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|signature| {
            header_probe
                .get(signature.offset..)
                .is_some_and(|rest| rest.starts_with(signature.magic))
        })
        .map(|signature| signature.extension)
}
