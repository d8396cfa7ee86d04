//! Command line front end for identifying, listing, extracting and building game archives.

pub mod commands;
