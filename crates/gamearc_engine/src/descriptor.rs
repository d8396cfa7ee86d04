//! Static identity of a container format

use crate::validate::check_extension;

/// Platform a format is known to ship on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Windows, Linux and macOS releases
    Pc,
    /// Sega Dreamcast
    Dreamcast,
    /// Sony PlayStation 2
    PlayStation2,
    /// Sony PlayStation Portable
    PlayStationPortable,
    /// Microsoft Xbox
    Xbox,
    /// Nintendo GameCube
    GameCube,
    /// Nintendo Wii
    Wii,
}

/// Operations a format supports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Entries can be listed and read
    pub read: bool,
    /// Containers can be written from a list of entries
    pub write: bool,
    /// Single entries can be replaced in place
    pub replace: bool,
    /// Entries can be renamed
    pub rename: bool,
}

impl Capabilities {
    /// Listing and reading only
    pub const READ_ONLY: Capabilities = Capabilities {
        read: true,
        write: false,
        replace: false,
        rename: false,
    };

    /// Reading and writing whole containers
    pub const READ_WRITE: Capabilities = Capabilities {
        read: true,
        write: true,
        replace: false,
        rename: false,
    };
}

/// Identity of a format, defined once per plugin as a `static`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    /// Canonical short tag, unique in a registry
    pub tag: &'static str,
    /// Human readable label
    pub label: &'static str,
    /// File extensions without the leading dot, matched case-insensitively
    pub extensions: &'static [&'static str],
    /// Platforms the format is known from
    pub platforms: &'static [Platform],
    /// Supported operations
    pub capabilities: Capabilities,
}

impl FormatDescriptor {
    /// Whether `name` carries one of the format's extensions
    pub fn matches_extension(&self, name: &str) -> bool {
        check_extension(Some(name), self.extensions)
    }
}
