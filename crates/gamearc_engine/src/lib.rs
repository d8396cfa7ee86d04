//! This library is the engine behind reading proprietary **game archive** containers.
//!
//! # Overview
//!
//! Games usually bundle their assets into a handful of container files. Every engine has its
//! own layout, but nearly all of them boil down to the same three parts: a header with a
//! signature, a directory describing each logical file, and the payload bytes. This crate
//! provides the pieces shared by every layout so a format only has to describe its own
//! directory.
//!
//! | Piece                        | Role                                                          |
//! |------------------------------|---------------------------------------------------------------|
//! | [`ByteCursor`]               | Bounds-checked binary reads with an explicit byte order       |
//! | [`validate`]                 | Guards turning implausible directory values into typed errors |
//! | [`EntryTable`]               | Entries collected during one extraction                       |
//! | [`FormatPlugin`]             | The contract a container format implements                    |
//! | [`ConfidenceScore`]          | How well a stream matches a format                            |
//! | [`Registry`]                 | Picks the best format for an unlabeled file                   |
//! | [`Codecs`]                   | Pluggable decompression routines keyed by [`CodecId`]         |
//! | [`Archive`]                  | The frozen result of an extraction                            |
//!
//! ## Identification
//!
//! Each format scores a file by adding the weight of every check that passed:
//!
//! | Check                        | Weight |
//! |------------------------------|--------|
//! | Signature bytes              | 50     |
//! | File extension               | 20     |
//! | Each plausible header field  | 10     |
//!
//! Scores saturate at 100. The registry picks the highest score, the format registered first
//! winning ties, and refuses to pick anything scoring below
//! [`registry::DEFAULT_MIN_CONFIDENCE`].
//!
//! ## Extraction
//!
//! A format walks its directory through a [`ByteCursor`], validating every count, offset
//! and length before using it, and appends entries to an [`EntryTable`]. Entries never hold
//! payload bytes. They point into a shared [`Source`] and are read on demand, decompressed
//! through whichever [`Codecs`] the caller supplies.
//!
//! An extraction either yields every entry or fails; partial tables are never returned.
//!

pub mod archive;
pub mod codec;
pub mod cursor;
pub mod descriptor;
pub mod entry;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod score;
pub mod sniff;
pub mod source;
pub mod validate;

pub use archive::Archive;
pub use codec::{Codec, CodecId, Codecs};
pub use cursor::{ByteCursor, LengthPrefix};
pub use descriptor::{Capabilities, FormatDescriptor, Platform};
pub use entry::{Entry, EntryTable};
pub use plugin::FormatPlugin;
pub use registry::{Candidate, DispatchOptions, Registry};
pub use score::ConfidenceScore;
pub use source::Source;
pub use validate::Limits;
