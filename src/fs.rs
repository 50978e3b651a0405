use std::{
    ffi::OsStr,
    fs::{File, OpenOptions},
    io::{BufWriter, ErrorKind, Write},
    os::unix::ffi::OsStrExt,
    path::Path,
};

use indicatif::ProgressBar;
use log::{debug, warn};
use rustix::{
    fd::OwnedFd,
    fs::{fstat, openat, statat, AtFlags, Dir, FileType, Mode, OFlags, CWD},
};

use crate::{
    error::{Error, Result},
    layout::Layout,
    tree::{Children, Source},
    writer::{write_archive, Summary},
};

/// Reads the source tree from the filesystem.
///
/// Only directories and regular files are archived; symlinks are never followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSource;

impl FsSource {
    fn entry_type(
        dirfd: &OwnedFd,
        dir: &Path,
        name: &OsStr,
        ifmt: FileType,
    ) -> Result<FileType> {
        match ifmt {
            // Some filesystems don't fill in d_type
            FileType::Unknown => {
                let buf = statat(dirfd, name, AtFlags::SYMLINK_NOFOLLOW)
                    .map_err(Error::read(&dir.join(name)))?;
                Ok(FileType::from_raw_mode(buf.st_mode))
            }
            other => Ok(other),
        }
    }
}

impl Source for FsSource {
    type File<'a> = File;

    fn list_children(&self, path: &Path) -> Result<Children> {
        let fd = openat(
            CWD,
            path,
            OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .map_err(Error::read(path))?;

        let mut children = Children::default();
        for item in Dir::read_from(&fd).map_err(Error::read(path))? {
            let entry = item.map_err(Error::read(path))?;
            let name = OsStr::from_bytes(entry.file_name().to_bytes());

            if name == "." || name == ".." {
                continue;
            }

            match Self::entry_type(&fd, path, name, entry.file_type())? {
                FileType::Directory => children.directories.push(path.join(name)),
                FileType::RegularFile => children.files.push(path.join(name)),
                other => warn!("Skipping unsupported {other:?} {:?}", path.join(name)),
            }
        }

        children.sort();
        Ok(children)
    }

    fn open_file(&self, path: &Path) -> Result<(File, u64)> {
        let fd = openat(
            CWD,
            path,
            OFlags::RDONLY | OFlags::NOFOLLOW | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .map_err(Error::read(path))?;
        let buf = fstat(&fd).map_err(Error::read(path))?;
        Ok((File::from(fd), buf.st_size as u64))
    }
}

/// Checks the command-line preconditions: `input` must be an existing directory and `output`
/// must not exist yet.
pub fn check_paths(input: &Path, output: &Path) -> Result<()> {
    match std::fs::metadata(input) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => return Err(Error::InputNotADirectory(input.into())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::InputNotFound(input.into()))
        }
        Err(e) => return Err(Error::read(input)(e)),
    }

    // symlink_metadata so that a dangling symlink also counts as existing
    if std::fs::symlink_metadata(output).is_ok() {
        return Err(Error::OutputExists(output.into()));
    }

    Ok(())
}

/// Builds the archive for the directory tree at `input` and writes it to a new file at
/// `output`.
///
/// On failure the partially written output is left in place.
pub fn create_archive(input: &Path, output: &Path, progress: &ProgressBar) -> Result<Summary> {
    check_paths(input, output)?;

    let layout = Layout::build(&FsSource, input)?;
    progress.set_length(layout.files.len() as u64);

    let file = match OpenOptions::new().write(true).create_new(true).open(output) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(Error::OutputExists(output.into()))
        }
        Err(e) => Err(e)?,
    };
    debug!("Writing {output:?}");

    let mut writer = BufWriter::new(file);
    let summary = write_archive(&FsSource, &layout, &mut writer, progress)?;
    writer.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::fs::{create_dir, write};

    use similar_asserts::assert_eq;

    use super::*;
    use crate::error::ErrorKind as Kind;

    #[test]
    fn test_list_children_sorted() {
        let td = tempfile::tempdir().unwrap();
        let root = td.path();
        create_dir(root.join("zeta")).unwrap();
        create_dir(root.join("alpha")).unwrap();
        write(root.join("b.txt"), b"b").unwrap();
        write(root.join("a.txt"), b"a").unwrap();
        std::os::unix::fs::symlink("a.txt", root.join("link")).unwrap();

        let children = FsSource.list_children(root).unwrap();
        assert_eq!(
            children.directories,
            vec![root.join("alpha"), root.join("zeta")]
        );
        assert_eq!(children.files, vec![root.join("a.txt"), root.join("b.txt")]);
    }

    #[test]
    fn test_recursive_directory_count() {
        let td = tempfile::tempdir().unwrap();
        let root = td.path();
        create_dir(root.join("a")).unwrap();
        create_dir(root.join("a/b")).unwrap();
        create_dir(root.join("a/b/c")).unwrap();
        create_dir(root.join("d")).unwrap();
        write(root.join("a/file"), b"").unwrap();

        assert_eq!(FsSource.recursive_directory_count(root).unwrap(), 4);
        assert_eq!(FsSource.recursive_directory_count(&root.join("a")).unwrap(), 2);
        assert_eq!(FsSource.recursive_directory_count(&root.join("d")).unwrap(), 0);
    }

    #[test]
    fn test_missing_directory_is_read_error() {
        let td = tempfile::tempdir().unwrap();
        let err = FsSource.list_children(&td.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), Kind::Io);
    }

    #[test]
    fn test_open_file_size() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("data");
        write(&path, b"twelve bytes").unwrap();
        let (_, size) = FsSource.open_file(&path).unwrap();
        assert_eq!(size, 12);
    }

    #[test]
    fn test_check_paths() {
        let td = tempfile::tempdir().unwrap();
        let root = td.path();
        write(root.join("file"), b"").unwrap();

        assert!(check_paths(root, &root.join("out.rofs")).is_ok());
        assert!(matches!(
            check_paths(&root.join("missing"), &root.join("out.rofs")),
            Err(Error::InputNotFound(..))
        ));
        assert!(matches!(
            check_paths(&root.join("file"), &root.join("out.rofs")),
            Err(Error::InputNotADirectory(..))
        ));
        let err = check_paths(root, &root.join("file")).unwrap_err();
        assert!(matches!(err, Error::OutputExists(..)));
        assert_eq!(err.kind(), Kind::Usage);
    }
}
