use std::{
    io::{BufWriter, Write},
    path::PathBuf,
};

use clap::Args;
use gamearc_engine::{Codecs, Entry, Source};
use itertools::Itertools;
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::info;
use walkdir::WalkDir;

use crate::commands::create_file;

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Format of the archive to build
    #[arg(long, value_name = "TAG")]
    format: String,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    fn collect_entries(&self) -> Result<Vec<Entry>> {
        let files = WalkDir::new(&self.directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .collect::<Vec<_>>();

        if files.is_empty() {
            return Err(miette!("directory is empty"));
        }

        files
            .iter()
            .map(|file| -> Result<Entry> {
                let relative = file
                    .path()
                    .strip_prefix(&self.directory)
                    .into_diagnostic()?;
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_str())
                    .collect::<Option<Vec<_>>>()
                    .ok_or(miette!("unable to convert {} to a string", relative.display()))?
                    .into_iter()
                    .join("/");

                let data = std::fs::read(file.path())
                    .into_diagnostic()
                    .context(format!("reading {}", file.path().display()))?;
                let length = data.len() as u64;
                info!("adding {name}");

                Ok(Entry::new(name.clone(), Source::from_bytes(name, data), 0, length))
            })
            .collect()
    }

    pub fn handle(&self) -> Result<()> {
        let registry = gamearc_formats::registry();
        let plugin = registry
            .by_tag(&self.format)
            .ok_or(miette!("unknown format {:?}", self.format))?;
        if !plugin.descriptor().capabilities.write {
            return Err(miette!("{} archives cannot be written", plugin.descriptor().tag));
        }

        let entries = self.collect_entries()?;
        info!("creating {}", self.file.display());

        let mut out = BufWriter::new(create_file(&self.file, self.overwrite)?);
        registry
            .pack(&self.format, &entries, &Codecs::with_defaults(), &mut out)
            .context(format!("packing {}", self.file.display()))?;
        out.flush().into_diagnostic()?;

        info!("packed {} entries", entries.len());
        Ok(())
    }
}
