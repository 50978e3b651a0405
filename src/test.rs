//! Helpers for tests: an in-memory source tree.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    tree::{Children, Source},
};

#[derive(Debug, Clone, Default)]
struct Entries {
    directories: BTreeSet<PathBuf>,
    files: BTreeSet<PathBuf>,
}

/// A source tree held entirely in memory, rooted at `/`.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    root: PathBuf,
    directories: BTreeMap<PathBuf, Entries>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        let root = PathBuf::from("/");
        Self {
            directories: BTreeMap::from([(root.clone(), Entries::default())]),
            files: BTreeMap::new(),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Adds a directory (and any missing parents) given a path relative to the root.
    pub fn add_dir(&mut self, path: &str) -> PathBuf {
        let mut current = self.root.clone();
        for component in Path::new(path).components() {
            let child = current.join(component);
            if !self.directories.contains_key(&child) {
                self.directories.insert(child.clone(), Entries::default());
                let parent = self.directories.get_mut(&current).unwrap();
                parent.directories.insert(child.clone());
            }
            current = child;
        }
        current
    }

    /// Adds a file (and any missing parent directories) given a path relative to the root.
    pub fn add_file(&mut self, path: &str, data: &[u8]) -> PathBuf {
        let path = Path::new(path);
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                self.add_dir(parent.to_str().unwrap())
            }
            _ => self.root.clone(),
        };
        let file = parent.join(path.file_name().unwrap());
        self.files.insert(file.clone(), data.to_vec());
        let entries = self.directories.get_mut(&parent).unwrap();
        entries.files.insert(file.clone());
        file
    }
}

impl Source for MemoryTree {
    type File<'a> = &'a [u8];

    fn list_children(&self, path: &Path) -> Result<Children> {
        let entries = self
            .directories
            .get(path)
            .ok_or_else(|| Error::read(path)(io::Error::from(ErrorKind::NotFound)))?;
        Ok(Children {
            directories: entries.directories.iter().cloned().collect(),
            files: entries.files.iter().cloned().collect(),
        })
    }

    fn open_file(&self, path: &Path) -> Result<(&[u8], u64)> {
        match self.files.get(path) {
            Some(data) => Ok((data.as_slice(), data.len() as u64)),
            None => Err(Error::read(path)(io::Error::from(ErrorKind::NotFound))),
        }
    }
}
