//! The interface between the layout builder and whatever holds the source tree.

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use crate::error::Result;

/// The immediate entries of one directory.
///
/// Both lists are sorted by the bytes of the entry name, which is what makes two builds of the
/// same tree produce identical images.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Children {
    pub directories: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

impl Children {
    pub fn sort(&mut self) {
        self.directories.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        self.files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    }
}

/// A readable source tree.
///
/// Paths handed out by [`Source::list_children`] are the paths the builder passes back in, and
/// the last component of each is the entry name that gets stored in the image.
pub trait Source {
    type File<'a>: Read
    where
        Self: 'a;

    /// Lists the subdirectories and regular files directly inside `path`.
    fn list_children(&self, path: &Path) -> Result<Children>;

    /// Opens a regular file previously returned by [`Source::list_children`], returning a reader
    /// for its content along with its current size.
    fn open_file(&self, path: &Path) -> Result<(Self::File<'_>, u64)>;

    /// Counts the directories below `path`, not including `path` itself.
    fn recursive_directory_count(&self, path: &Path) -> Result<usize> {
        let children = self.list_children(path)?;
        let mut count = children.directories.len();
        for dir in &children.directories {
            count += self.recursive_directory_count(dir)?;
        }
        Ok(count)
    }
}
