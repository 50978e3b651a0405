//! Build ROFS archive images from directory trees.
//!
//! A ROFS image holds a whole directory hierarchy in a fixed, index-addressable layout: a
//! header, a directory table with one 8-byte slot per directory, a name table listing the
//! children of every directory, a file-info table with the extent of every file, and the file
//! data.  See [`format`] for the on-disk structures.
//!
//! Building is split in two passes.  [`layout::Layout::build`] walks a [`tree::Source`] and
//! resolves all directory and name table values in memory, then [`writer::write_archive`]
//! serializes them and streams the file content.

pub mod error;
pub mod format;
pub mod fs;
pub mod layout;
pub mod tree;
pub mod writer;

#[cfg(any(test, feature = "test"))]
pub mod test;

pub use error::{Error, ErrorKind, Result};
