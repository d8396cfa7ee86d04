use std::path::PathBuf;

use clap::Args;
use gamearc_engine::Source;
use miette::{miette, Result};
use owo_colors::OwoColorize;
use tracing::error;

#[derive(Args)]
pub struct IdentifyArgs {
    /// Files to identify
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// Also print formats that scored zero
    #[arg(short, long, default_value_t = false)]
    all: bool,
}

impl IdentifyArgs {
    pub fn handle(&self) -> Result<()> {
        let registry = gamearc_formats::registry();
        let floor = registry.options().min_confidence;
        let mut failures = 0;

        for path in &self.files {
            let source = match Source::open(path) {
                Ok(source) => source,
                Err(e) => {
                    error!("{}: {e}", path.display());
                    failures += 1;
                    continue;
                }
            };

            let candidates = registry.rank(&source);
            match candidates.first() {
                Some(best) if best.score.value() >= floor => {
                    println!("{}: {}", path.display(), best.tag().green().bold());
                }
                _ => println!("{}: {}", path.display(), "unrecognized format".red()),
            }

            for candidate in candidates
                .iter()
                .filter(|c| self.all || c.score.value() > 0)
            {
                let line = format!(
                    "  {:<8} {:>3}  {}",
                    candidate.tag(),
                    candidate.score.value(),
                    candidate.plugin.descriptor().label
                );
                if candidate.score.value() >= floor {
                    println!("{line}");
                } else {
                    println!("{}", line.dimmed());
                }
            }
        }

        match failures {
            0 => Ok(()),
            n => Err(miette!("{n} of {} files could not be read", self.files.len())),
        }
    }
}
