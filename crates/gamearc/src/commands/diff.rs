use std::{collections::HashSet, path::PathBuf};

use clap::{Args, ValueEnum};
use gamearc_engine::{Archive, Codecs};
use itertools::Itertools;
use miette::Result;
use owo_colors::OwoColorize;
use similar::{ChangeTag, TextDiff};

use crate::commands::open_archive;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Mode {
    /// Compare entry names
    Names,
    /// Compare entry names and sizes
    #[default]
    Sizes,
    /// Compare sizes and the contents of entries present on both sides
    Content,
}

#[derive(Args)]
pub struct DiffArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    left: PathBuf,

    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    right: PathBuf,

    /// Comparison mode
    #[arg(short, long, value_enum, default_value_t = Mode::Sizes)]
    mode: Mode,
}

fn listing(archive: &Archive, mode: Mode) -> String {
    archive
        .iter()
        .map(|e| match mode {
            Mode::Names => format!("{}\n", e.name()),
            Mode::Sizes | Mode::Content => format!("{} ({} bytes)\n", e.name(), e.size()),
        })
        .sorted()
        .join("")
}

/// Lines only present on one side, in sorted listing order
fn changes(left: &Archive, right: &Archive, mode: Mode) -> Vec<(ChangeTag, String)> {
    let left = listing(left, mode);
    let right = listing(right, mode);

    TextDiff::from_lines(&left, &right)
        .iter_all_changes()
        .filter(|c| c.tag() != ChangeTag::Equal)
        .map(|c| (c.tag(), c.value().trim_end().to_owned()))
        .collect()
}

/// Names present on both sides whose decompressed contents differ
fn modified(left: &Archive, right: &Archive) -> Result<Vec<String>> {
    let codecs = Codecs::with_defaults();
    let right_names = right.file_names().collect::<HashSet<_>>();

    let mut result = Vec::new();
    for name in left.file_names().filter(|n| right_names.contains(n)).sorted() {
        let old = left.by_name(name)?.read(&codecs)?;
        let new = right.by_name(name)?.read(&codecs)?;
        if old != new {
            result.push(name.to_owned());
        }
    }
    Ok(result)
}

impl DiffArgs {
    pub fn handle(&self) -> Result<()> {
        let left = open_archive(&self.left, None)?;
        let right = open_archive(&self.right, None)?;

        println!(
            "{} {} ({}, {} entries)",
            "---".red(),
            self.left.display(),
            left.format(),
            left.len()
        );
        println!(
            "{} {} ({}, {} entries)",
            "+++".green(),
            self.right.display(),
            right.format(),
            right.len()
        );

        for (tag, line) in changes(&left, &right, self.mode) {
            match tag {
                ChangeTag::Delete => println!("{}", format!("- {line}").red()),
                ChangeTag::Insert => println!("{}", format!("+ {line}").green()),
                ChangeTag::Equal => {}
            }
        }

        if self.mode == Mode::Content {
            for name in modified(&left, &right)? {
                println!("{}", format!("~ {name}").blue());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use gamearc_engine::{Archive, Codecs, Entry, Source};
    use pretty_assertions::assert_eq;
    use similar::ChangeTag;

    use crate::commands::diff::{changes, modified, Mode};

    fn pak(files: &[(&str, &[u8])]) -> Archive {
        let entries = files
            .iter()
            .map(|(name, data)| {
                let source = Source::from_bytes(*name, data.to_vec());
                Entry::new(*name, source, 0, data.len() as u64)
            })
            .collect::<Vec<_>>();

        let mut packed = Vec::new();
        let registry = gamearc_formats::registry();
        registry
            .pack("pak", &entries, &Codecs::empty(), &mut packed)
            .unwrap();
        registry
            .open(&Source::from_bytes("test.pak", packed))
            .unwrap()
    }

    #[test]
    fn listing_changes() {
        let left = pak(&[("a.txt", b"one"), ("b.txt", b"two"), ("c.txt", b"three")]);
        let right = pak(&[("a.txt", b"one"), ("b.txt", b"two!"), ("d.txt", b"four")]);

        assert_eq!(
            changes(&left, &right, Mode::Names),
            vec![
                (ChangeTag::Delete, "c.txt".to_owned()),
                (ChangeTag::Insert, "d.txt".to_owned()),
            ]
        );
        assert_eq!(
            changes(&left, &right, Mode::Sizes),
            vec![
                (ChangeTag::Delete, "b.txt (3 bytes)".to_owned()),
                (ChangeTag::Delete, "c.txt (5 bytes)".to_owned()),
                (ChangeTag::Insert, "b.txt (4 bytes)".to_owned()),
                (ChangeTag::Insert, "d.txt (4 bytes)".to_owned()),
            ]
        );
    }

    #[test]
    fn content_changes() {
        let left = pak(&[("a.txt", b"one"), ("b.txt", b"two")]);
        let right = pak(&[("a.txt", b"uno"), ("b.txt", b"two")]);

        assert_eq!(modified(&left, &right).unwrap(), vec!["a.txt".to_owned()]);
    }
}
