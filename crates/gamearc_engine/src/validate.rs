//! Guards that turn implausible directory values into typed errors.
//!
//! Every check runs before the value is used to seek or allocate, which keeps a corrupt or
//! mismatched archive from turning a garbage integer into a huge allocation or an
//! out-of-bounds read further down.

use bon::Builder;
use std::path::Path;

use crate::error::{Error, Result};

/// Default ceiling for directory entry counts
pub const DEFAULT_MAX_FILE_COUNT: u64 = 4_000_000;

/// Default ceiling for the byte length of an entry name
pub const DEFAULT_MAX_NAME_LENGTH: usize = 1024;

/// Default ceiling for nested directory depth
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Sanity ceilings applied while parsing directories
///
/// ```
/// use gamearc_engine::validate::Limits;
///
/// let limits = Limits::builder().max_file_count(10_000).build();
/// assert_eq!(limits.max_depth, gamearc_engine::validate::DEFAULT_MAX_DEPTH);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct Limits {
    /// Largest entry count a directory may declare
    #[builder(default = DEFAULT_MAX_FILE_COUNT)]
    pub max_file_count: u64,

    /// Longest entry name accepted, in bytes
    #[builder(default = DEFAULT_MAX_NAME_LENGTH)]
    pub max_name_length: usize,

    /// Deepest directory nesting followed by recursive walks
    #[builder(default = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits::builder().build()
    }
}

/// Accept `value` as an absolute offset into an archive of `archive_size` bytes.
pub fn check_offset(value: impl Into<i128>, archive_size: u64) -> Result<u64> {
    let value = value.into();
    if value < 0 || value > archive_size as i128 {
        return Err(Error::InvalidOffset {
            value,
            archive_size,
        });
    }
    Ok(value as u64)
}

/// Accept `value` as a byte length, optionally no larger than the archive.
pub fn check_length(value: impl Into<i128>, archive_size: Option<u64>) -> Result<u64> {
    let value = value.into();
    let too_large = match archive_size {
        Some(size) => value > size as i128,
        None => value > u64::MAX as i128,
    };
    if value < 0 || too_large {
        return Err(Error::InvalidLength {
            value,
            limit: archive_size,
        });
    }
    Ok(value as u64)
}

/// Accept a payload span only if it ends inside the archive.
pub fn check_span(offset: u64, length: u64, archive_size: u64) -> Result<()> {
    check_offset(offset, archive_size)?;
    check_length(length, Some(archive_size - offset))?;
    Ok(())
}

/// Accept `value` as a number of directory entries.
pub fn check_file_count(value: impl Into<i128>, limits: &Limits) -> Result<usize> {
    let value = value.into();
    let implausible = || Error::ImplausibleCount {
        value,
        ceiling: limits.max_file_count,
    };

    if value < 0 || value > limits.max_file_count as i128 {
        return Err(implausible());
    }
    usize::try_from(value).map_err(|_| implausible())
}

/// Accept `value` as the stored length of an entry name.
pub fn check_filename_length(value: impl Into<i128>, limits: &Limits) -> Result<usize> {
    let value = value.into();
    if value <= 0 || value > limits.max_name_length as i128 {
        return Err(Error::InvalidName {
            name: String::new(),
            reason: "name length out of range",
        });
    }
    Ok(value as usize)
}

/// Accept `name` as an entry name: not empty, not too long, no control characters.
pub fn check_filename(name: &str, limits: &Limits) -> Result<()> {
    let reason = if name.is_empty() {
        "empty name"
    } else if name.len() > limits.max_name_length {
        "name too long"
    } else if name.chars().any(char::is_control) {
        "control character in name"
    } else {
        return Ok(());
    };

    Err(Error::InvalidName {
        name: name.to_owned(),
        reason,
    })
}

/// Whether `name` ends in one of `allowed`, compared case-insensitively.
///
/// This is a scoring signal only, never a reason to reject a file.
pub fn check_extension(name: Option<&str>, allowed: &[&str]) -> bool {
    let Some(extension) = name.and_then(|n| Path::new(n).extension()) else {
        return false;
    };
    let extension = extension.to_string_lossy();

    allowed
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(&extension))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::Error;
    use crate::validate::*;

    #[test]
    fn offsets_must_be_inside_the_archive() {
        assert_eq!(check_offset(0u32, 10).unwrap(), 0);
        assert_eq!(check_offset(10u32, 10).unwrap(), 10);
        assert!(matches!(
            check_offset(11u32, 10),
            Err(Error::InvalidOffset { value: 11, archive_size: 10 })
        ));
        assert!(matches!(
            check_offset(-1i32, 10),
            Err(Error::InvalidOffset { value: -1, .. })
        ));
    }

    #[test]
    fn lengths_and_spans() {
        assert_eq!(check_length(5u32, Some(5)).unwrap(), 5);
        assert_eq!(check_length(u64::MAX, None).unwrap(), u64::MAX);
        assert!(matches!(
            check_length(-4i64, None),
            Err(Error::InvalidLength { value: -4, limit: None })
        ));
        assert!(check_length(6u32, Some(5)).is_err());

        assert!(check_span(4, 6, 10).is_ok());
        assert!(check_span(4, 7, 10).is_err());
        assert!(check_span(11, 0, 10).is_err());
    }

    #[test]
    fn file_counts_respect_the_ceiling() {
        let limits = Limits::builder().max_file_count(100).build();

        assert_eq!(check_file_count(100u32, &limits).unwrap(), 100);
        assert!(matches!(
            check_file_count(101u32, &limits),
            Err(Error::ImplausibleCount { value: 101, ceiling: 100 })
        ));
        assert!(check_file_count(-1i32, &limits).is_err());
        assert!(check_file_count(u32::MAX, &Limits::default()).is_err());
    }

    #[test]
    fn filenames() {
        let limits = Limits::builder().max_name_length(8).build();

        assert!(check_filename("data.bin", &limits).is_ok());
        assert!(check_filename("", &limits).is_err());
        assert!(check_filename("long_name.bin", &limits).is_err());
        assert!(check_filename("a\nb", &limits).is_err());

        assert_eq!(check_filename_length(8u8, &limits).unwrap(), 8);
        assert!(check_filename_length(0u8, &limits).is_err());
        assert!(check_filename_length(9u8, &limits).is_err());
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert!(check_extension(Some("PATCH_00.TRE"), &["tre"]));
        assert!(check_extension(Some("dir/file.Arc"), &["u8", "arc"]));
        assert!(!check_extension(Some("file.tre.bak"), &["tre"]));
        assert!(!check_extension(Some("README"), &["tre"]));
        assert!(!check_extension(None, &["tre"]));
    }
}
