use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::format::{MAX_DIRECTORIES, MAX_FILES, MAX_NAME_LEN};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Path not found: {0:?}")]
    InputNotFound(PathBuf),
    #[error("Path is not a directory: {0:?}")]
    InputNotADirectory(PathBuf),
    #[error("File already exists: {0:?}")]
    OutputExists(PathBuf),

    #[error(
        "Directory limit exceeded: {0} directories, at most {max} supported",
        max = MAX_DIRECTORIES
    )]
    TooManyDirectories(usize),
    #[error("Too many directories in: {0:?}")]
    SubtreeTooLarge(PathBuf),
    #[error("File limit exceeded: at most {max} files supported", max = MAX_FILES)]
    TooManyFiles,
    #[error("Directory name too long (more than {max} bytes): {0:?}", max = MAX_NAME_LEN)]
    DirectoryNameTooLong(PathBuf),
    #[error("File name too long (more than {max} bytes): {0:?}", max = MAX_NAME_LEN)]
    FileNameTooLong(PathBuf),
    #[error("Invalid entry name: {0:?}")]
    InvalidName(PathBuf),
    #[error("File too big: {0:?}")]
    FileTooLarge(PathBuf),
    #[error("Archive would exceed 4 GiB at {0:?}")]
    ArchiveTooLarge(PathBuf),
    #[error("Source tree changed while the archive was being built: {0:?}")]
    TreeChanged(PathBuf),

    #[error("Failed to read {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write archive")]
    Write(#[from] io::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The command line asked for something impossible.
    Usage,
    /// The source tree doesn't fit in the format.
    Capacity,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InputNotFound(..) | Error::InputNotADirectory(..) | Error::OutputExists(..) => {
                ErrorKind::Usage
            }
            Error::TooManyDirectories(..)
            | Error::SubtreeTooLarge(..)
            | Error::TooManyFiles
            | Error::DirectoryNameTooLong(..)
            | Error::FileNameTooLong(..)
            | Error::InvalidName(..)
            | Error::FileTooLarge(..)
            | Error::ArchiveTooLarge(..)
            | Error::TreeChanged(..) => ErrorKind::Capacity,
            Error::Read { .. } | Error::Write(..) => ErrorKind::Io,
        }
    }

    pub(crate) fn read<E: Into<io::Error>>(path: &Path) -> impl FnOnce(E) -> Self + '_ {
        move |source| Error::Read {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
