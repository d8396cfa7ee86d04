use std::path::PathBuf;

use clap::Args;
use miette::Result;
use owo_colors::OwoColorize;

use crate::commands::open_archive;

#[derive(Args)]
pub struct ListArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Read the archive as this format instead of identifying it
    #[arg(long, value_name = "TAG")]
    format: Option<String>,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = open_archive(&self.file, self.format.as_deref())?;

        println!(
            "{} ({}, {} entries)",
            self.file.display(),
            archive.descriptor().label,
            archive.len()
        );
        println!(
            "{}",
            format!(
                "{:>12} {:>12} {:>12} {:<7} name",
                "offset", "stored", "size", "codec"
            )
            .bold()
        );

        for entry in &archive {
            let codec = entry
                .decompressor()
                .map(|c| c.name())
                .unwrap_or("-");
            println!(
                "{:>12} {:>12} {:>12} {:<7} {}",
                entry.offset(),
                entry.length(),
                entry.size(),
                codec,
                entry.name()
            );
        }

        if let Some(total) = archive.decompressed_size() {
            println!("{total} bytes in total");
        }
        Ok(())
    }
}
