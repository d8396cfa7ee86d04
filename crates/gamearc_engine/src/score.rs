//! Match confidence accumulated by format probes

use std::fmt;

/// How well a byte stream matches a format, between 0 and 100.
///
/// A score is built by adding the weight of every independent check that passed. The sum
/// saturates at [`ConfidenceScore::MAX`].
///
/// ```
/// use gamearc_engine::ConfidenceScore;
///
/// let mut score = ConfidenceScore::default();
/// score
///     .add(ConfidenceScore::MAGIC)
///     .add(ConfidenceScore::EXTENSION)
///     .add(ConfidenceScore::MAGIC);
/// assert_eq!(score.value(), 100);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfidenceScore(u8);

impl ConfidenceScore {
    /// Highest possible score
    pub const MAX: u8 = 100;

    /// Weight of a matching signature
    pub const MAGIC: u8 = 50;

    /// Weight of a matching file extension
    pub const EXTENSION: u8 = 20;

    /// Weight of each plausible secondary field
    pub const FIELD: u8 = 10;

    /// No evidence at all
    pub const ZERO: ConfidenceScore = ConfidenceScore(0);

    /// Create a score, capping it at [`ConfidenceScore::MAX`].
    pub fn new(value: u8) -> ConfidenceScore {
        ConfidenceScore(value.min(Self::MAX))
    }

    /// Add the weight of a passed check.
    pub fn add(&mut self, weight: u8) -> &mut ConfidenceScore {
        self.0 = self.0.saturating_add(weight).min(Self::MAX);
        self
    }

    /// Add `weight` when `passed` holds, handing `passed` back for chaining decisions.
    pub fn add_if(&mut self, passed: bool, weight: u8) -> bool {
        if passed {
            self.add(weight);
        }
        passed
    }

    /// The accumulated value
    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ConfidenceScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
