//! Reference container formats for [`gamearc_engine`].
//!
//! Each module describes one layout and exposes a unit-like plugin implementing
//! [`FormatPlugin`](gamearc_engine::FormatPlugin) together with its `DESCRIPTOR`.
//!
//! | Module        | Games                              | Named entries | Writable |
//! |---------------|------------------------------------|---------------|----------|
//! | [`tre`]       | Star Wars Galaxies                 | yes           | yes      |
//! | [`pak`]       | Quake, Half-Life                   | yes           | yes      |
//! | [`img`]       | GTA San Andreas                    | yes           | no       |
//! | [`afs`]       | Sega titles on Dreamcast and PS2   | optional      | no       |
//! | [`u8arc`]     | Nintendo Wii titles                | yes           | no       |
//! | [`offsets`]   | Headerless offset tables           | no            | no       |
//!
//! [`registry`] hands out a [`Registry`] with every format registered, in the order above.
//!
//! ```no_run
//! use gamearc_engine::{Codecs, Source};
//!
//! # fn main() -> gamearc_engine::error::Result<()> {
//! let source = Source::open("data_music_00.tre")?;
//! let archive = gamearc_formats::registry().open(&source)?;
//! let codecs = Codecs::with_defaults();
//!
//! for (index, entry) in archive.iter().enumerate() {
//!     let bytes = archive.read(index, &codecs)?;
//!     println!("{}: {} bytes", entry.name(), bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::OnceLock;

use gamearc_engine::{error::Error, Registry};

pub mod afs;
pub mod img;
pub mod offsets;
pub mod pak;
pub mod tre;
pub mod u8arc;

pub use afs::Afs;
pub use img::Img;
pub use offsets::OffsetTable;
pub use pak::Pak;
pub use tre::Tre;
pub use u8arc::U8;

/// A registry holding every format of this crate with the default dispatch options.
///
/// Built on first use and shared afterwards.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Registry::new()
            .with(Tre::default())
            .with(Pak)
            .with(Img)
            .with(Afs)
            .with(U8)
            .with(OffsetTable)
    })
}

/// Map a binrw failure onto the engine's error type.
pub(crate) fn binrw_error(format: &'static str, error: binrw::Error) -> Error {
    match error {
        binrw::Error::BadMagic { pos, .. } => Error::BadMagic {
            format,
            offset: pos,
        },
        binrw::Error::Io(error) => Error::IOError(error),
        error => Error::CustomError(error.to_string()),
    }
}

/// Narrow a size or offset to the 32 bit fields every supported format stores.
pub(crate) fn to_u32(value: u64) -> gamearc_engine::error::Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidLength {
        value: value.into(),
        limit: Some(u32::MAX.into()),
    })
}
