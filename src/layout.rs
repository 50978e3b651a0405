//! The layout pass: walks the source tree once and resolves everything the directory table and
//! name table need.
//!
//! Directories are numbered in pre-order starting at 1 (0 is the virtual parent of the root).
//! Before a directory's children are visited, each child subtree gets a contiguous identifier
//! range of `1 + recursive_directory_count(child)` so that the name block of a directory can
//! refer to its children before they've been seen.  Name blocks are appended in the same
//! pre-order, so the name offset of directory `n` doubles as the end of the block of directory
//! `n - 1`.

use std::{
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use log::{debug, trace};

use crate::{
    error::{Error, Result},
    format::{
        directory_index_tag, DIRECTORY_NAME_FLAG, MAX_DIRECTORIES, MAX_FILES, MAX_NAME_LEN,
    },
    tree::Source,
};

/// The resolved state of one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Pre-order identifier, starting at 1.
    pub id: u16,
    /// Identifier of the parent directory, or 0 for the root.
    pub parent: u16,
    /// Offset of this directory's name block within the name table.
    pub name_offset: u32,
    /// Number of files in all directories that precede this one.
    pub first_file: u16,
}

impl DirectoryRecord {
    /// The 0-based index stored on disk for references to this directory.
    pub fn index(&self) -> u16 {
        self.id - 1
    }
}

#[derive(Debug, Default)]
pub struct Layout {
    /// One record per directory, in identifier order.
    pub directories: Vec<DirectoryRecord>,
    /// The complete name table.
    pub names: Vec<u8>,
    /// Every archived file, in the order their data is written.
    pub files: Vec<PathBuf>,
}

struct Traversal<'a, S: Source> {
    source: &'a S,
    layout: Layout,
}

fn entry_name(path: &Path, too_long: fn(PathBuf) -> Error) -> Result<&[u8]> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::InvalidName(path.into()))?
        .as_bytes();

    if name.is_empty() {
        return Err(Error::InvalidName(path.into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(too_long(path.into()));
    }
    Ok(name)
}

impl<S: Source> Traversal<'_, S> {
    fn visit(&mut self, path: &Path, id: u16, parent: u16) -> Result<()> {
        // The identifier was reserved by our parent; if the tree changed since it was counted
        // then the reservation no longer matches the pre-order position.
        if self.layout.directories.len() + 1 != id as usize {
            return Err(Error::TreeChanged(path.into()));
        }

        let children = self.source.list_children(path)?;
        let names = &mut self.layout.names;

        let record = DirectoryRecord {
            id,
            parent,
            name_offset: names.len() as u32,
            first_file: self.layout.files.len() as u16,
        };
        debug!(
            "directory {id} parent {parent} names @{} first file {} {path:?}",
            record.name_offset, record.first_file
        );
        self.layout.directories.push(record);

        // Reserve the identifier range of each child subtree
        let mut next = id as usize + 1;
        let mut subdirs = Vec::with_capacity(children.directories.len());
        for dir in &children.directories {
            let name = entry_name(dir, Error::DirectoryNameTooLong)?;
            let span = self.source.recursive_directory_count(dir)? + 1;
            if next + span - 1 > MAX_DIRECTORIES {
                return Err(Error::SubtreeTooLarge(dir.clone()));
            }

            let child = next as u16;
            trace!("  dir {:?} -> {child} (+{})", dir.file_name(), span - 1);
            names.push(name.len() as u8 | DIRECTORY_NAME_FLAG);
            names.extend_from_slice(name);
            names.extend_from_slice(&directory_index_tag(child - 1).to_le_bytes());

            subdirs.push((dir, child));
            next += span;
        }

        if self.layout.files.len() + children.files.len() > MAX_FILES {
            return Err(Error::TooManyFiles);
        }

        for file in children.files {
            let name = entry_name(&file, Error::FileNameTooLong)?;
            trace!("  file {:?} -> #{}", file.file_name(), self.layout.files.len());
            names.push(name.len() as u8);
            names.extend_from_slice(name);
            self.layout.files.push(file);
        }
        names.push(0);

        for (dir, child) in subdirs {
            self.visit(dir, child, id)?;
        }

        Ok(())
    }
}

impl Layout {
    /// Walks the tree at `root` and resolves the directory records, name table and file list.
    pub fn build(source: &impl Source, root: &Path) -> Result<Self> {
        let count = source.recursive_directory_count(root)? + 1;
        if count > MAX_DIRECTORIES {
            return Err(Error::TooManyDirectories(count));
        }
        debug!("{count} directories under {root:?}");

        let mut traversal = Traversal {
            source,
            layout: Layout::default(),
        };
        traversal.visit(root, 1, 0)?;

        let layout = traversal.layout;
        if layout.directories.len() != count {
            return Err(Error::TreeChanged(root.into()));
        }

        debug!(
            "{} files, {} bytes of names",
            layout.files.len(),
            layout.names.len()
        );
        Ok(layout)
    }
}
