use std::{
    io::Write,
    path::{Component, Path, PathBuf},
};

use clap::Args;
use gamearc_engine::{Codecs, Entry};
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::{error, info, warn};

use crate::commands::{create_file, open_archive};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Read the archive as this format instead of identifying it
    #[arg(long, value_name = "TAG")]
    format: Option<String>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

/// Turn an entry name into a path relative to the target directory.
///
/// Names are attacker controlled. Absolute paths, drive prefixes and `..` are refused.
fn relative_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

impl ExtractArgs {
    fn write_entry(&self, entry: &Entry, codecs: &Codecs) -> Result<()> {
        let relative = relative_path(entry.name())
            .ok_or_else(|| miette!("refusing unsafe entry name {:?}", entry.name()))?;
        let path = self.directory.join(relative);
        info!("writing {}", path.display());

        let data = entry.read(codecs)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .into_diagnostic()
                .context(format!("creating {}", parent.display()))?;
        }
        let mut out = create_file(&path, self.overwrite)?;
        out.write_all(&data)
            .into_diagnostic()
            .context(format!("writing {}", path.display()))
    }

    pub fn handle(&self) -> Result<()> {
        let archive = open_archive(&self.file, self.format.as_deref())?;
        let codecs = Codecs::with_defaults();

        let mut failures = 0;
        for entry in &archive {
            if let Err(e) = self.write_entry(entry, &codecs) {
                error!("{}: {e:?}", entry.name());
                failures += 1;
            }
        }

        match failures {
            0 => Ok(()),
            n => {
                warn!("{n} of {} entries were not extracted", archive.len());
                Err(miette!("extraction of {} was incomplete", self.file.display()))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use crate::commands::extract::relative_path;

    #[test]
    fn unsafe_names_are_refused() {
        assert_eq!(
            relative_path("texture/./sky.dds"),
            Some(PathBuf::from("texture/sky.dds"))
        );
        assert_eq!(relative_path("../../etc/passwd"), None);
        assert_eq!(relative_path("data/../../escape"), None);
        assert_eq!(relative_path("/etc/shadow"), None);
        assert_eq!(relative_path(""), None);
    }
}
