use std::{fs::File, path::Path};

use gamearc_engine::{Archive, Source};
use miette::{Context, IntoDiagnostic, Result};

pub mod diff;
pub mod extract;
pub mod identify;
pub mod list;
pub mod pack;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Rank the formats matching each file
    Identify(identify::IdentifyArgs),
    /// List the entries of an archive
    List(list::ListArgs),
    /// Extract an archive into a directory
    Extract(extract::ExtractArgs),
    /// Build an archive from a directory
    Pack(pack::PackArgs),
    /// Compare the entries of two archives
    Diff(diff::DiffArgs),
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Identify(identify) => identify.handle(),
            Commands::List(list) => list.handle(),
            Commands::Extract(extract) => extract.handle(),
            Commands::Pack(pack) => pack.handle(),
            Commands::Diff(diff) => diff.handle(),
        }
    }
}

/// Open `path` as the format named `format`, or as whichever format it looks like.
pub(crate) fn open_archive(path: &Path, format: Option<&str>) -> Result<Archive> {
    let source = Source::open(path).context(format!("path: {}", path.display()))?;
    let registry = gamearc_formats::registry();

    let archive = match format {
        Some(tag) => registry.extract(&source, tag),
        None => registry.open(&source),
    };
    archive.context(format!("reading {}", path.display()))
}

/// Create `path`, refusing to replace an existing file unless `overwrite` is set.
pub(crate) fn create_file(path: &Path, overwrite: bool) -> Result<File> {
    if overwrite {
        File::create(path)
    } else {
        File::create_new(path)
    }
    .into_diagnostic()
    .context(format!("creating {}", path.display()))
}
