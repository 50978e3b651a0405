use std::{
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

use indicatif::ProgressBar;
use log::{debug, info, trace};
use zerocopy::IntoBytes;

use crate::{
    error::{Error, Result},
    format::{self, directory_index_tag, round_up, DirectoryEntry, FileInfo, Header, FILL},
    layout::Layout,
    tree::Source,
};

/// What ended up in a finished archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub directories: usize,
    pub files: usize,
    /// Total size of the image in bytes.
    pub size: u64,
}

/// Absolute offsets of the sections that follow the name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sections {
    file_info: usize,
    file_info_size: usize,
    file_data: usize,
}

impl Sections {
    fn new(layout: &Layout) -> Self {
        let file_info = round_up(
            format::NAME_TABLE_OFFSET + layout.names.len(),
            format::FILE_INFO_ALIGNMENT,
        );
        let file_info_size = layout.files.len() * size_of::<FileInfo>();
        Self {
            file_info,
            file_info_size,
            file_data: round_up(file_info + file_info_size, format::FILE_DATA_ALIGNMENT),
        }
    }
}

fn offset32(offset: usize, path: &Path) -> Result<u32> {
    offset
        .try_into()
        .map_err(|_| Error::ArchiveTooLarge(path.into()))
}

fn build_header(sections: &Sections) -> Header {
    // The name table is bounded by the directory and file limits, so these always fit
    Header {
        magic: format::MAGIC,
        reserved: format::RESERVED.into(),
        directory_table_offset: (format::DIRECTORY_TABLE_OFFSET as u32).into(),
        file_info_relative_offset: ((sections.file_info - format::DIRECTORY_TABLE_OFFSET) as u32)
            .into(),
        file_info_offset: (sections.file_info as u32).into(),
        file_info_size: (sections.file_info_size as u32).into(),
        reserved_tail: [format::RESERVED.into(); 2],
    }
}

/// Serializes the directory records into the full fixed-size directory table.
fn directory_table(layout: &Layout) -> Vec<u8> {
    let mut table = vec![FILL; format::DIRECTORY_TABLE_SIZE];

    let name_table_base = (format::NAME_TABLE_OFFSET - format::DIRECTORY_TABLE_OFFSET) as u32;
    let count = layout.directories.len() as u16;

    for (slot, dir) in table
        .chunks_exact_mut(size_of::<DirectoryEntry>())
        .zip(&layout.directories)
    {
        let entry = DirectoryEntry {
            name_offset: (name_table_base + dir.name_offset).into(),
            first_file: dir.first_file.into(),
            parent: match dir.parent {
                0 => count,
                parent => directory_index_tag(parent - 1),
            }
            .into(),
        };
        trace!("slot {} {entry:?}", dir.index());
        slot.copy_from_slice(entry.as_bytes());
    }

    table
}

fn fill(output: &mut impl Write, byte: u8, count: usize) -> io::Result<()> {
    output.write_all(&vec![byte; count])
}

/// Copies `file` into `output`, keeping failures on either side apart.
fn copy_file(path: &Path, file: &mut impl Read, output: &mut impl Write) -> Result<u64> {
    let mut buf = vec![0; 64 * 1024];
    let mut copied = 0;
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => return Ok(copied),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::read(path)(err)),
        };
        output.write_all(&buf[..n])?;
        copied += n as u64;
    }
}

/// Streams the content of every file into the data section, starting at the current position
/// of `output`, which must be `sections.file_data`.
fn write_file_data<S: Source>(
    source: &S,
    layout: &Layout,
    sections: &Sections,
    output: &mut impl Write,
    progress: &ProgressBar,
) -> Result<Vec<FileInfo>> {
    let mut infos = Vec::with_capacity(layout.files.len());
    let mut cursor = sections.file_data;

    for path in &layout.files {
        let (mut file, size) = source.open_file(path)?;
        if size >= format::MAX_FILE_SIZE {
            return Err(Error::FileTooLarge(path.clone()));
        }

        let start = cursor;
        let copied = copy_file(path, &mut file, output)?;
        if copied >= format::MAX_FILE_SIZE {
            return Err(Error::FileTooLarge(path.clone()));
        }

        let end = start + copied as usize;
        let next = round_up(end + 1, format::FILE_ALIGNMENT);
        fill(output, FILL, next - end)?;

        debug!("file #{} {start:#x}..{end:#x} {path:?}", infos.len());
        infos.push(FileInfo {
            start: offset32(start, path)?.into(),
            end: offset32(end, path)?.into(),
        });
        // the next file must also start in range
        offset32(next, path)?;

        cursor = next;
        progress.inc(1);
    }

    Ok(infos)
}

/// Writes the complete archive described by `layout` to `output`, reading file content from
/// `source`.
///
/// `output` should be empty and positioned at its start.  Everything up to the file-info table
/// is written in its final form; the file-info table is written once all file data has been
/// streamed and the extents are known.
pub fn write_archive<S: Source, W: Write + Seek>(
    source: &S,
    layout: &Layout,
    output: &mut W,
    progress: &ProgressBar,
) -> Result<Summary> {
    let sections = Sections::new(layout);
    debug!("{sections:?}");

    let header = build_header(&sections);
    debug!("header {}", hex::encode(header.as_bytes()));
    output.write_all(header.as_bytes())?;
    output.write_all(&directory_table(layout))?;
    output.write_all(&layout.names)?;

    let names_end = format::NAME_TABLE_OFFSET + layout.names.len();
    fill(output, 0, sections.file_info - names_end)?;

    // Placeholder for the file-info table, then the gap up to the data section
    fill(output, FILL, sections.file_data - sections.file_info)?;

    let infos = write_file_data(source, layout, &sections, output, progress)?;
    let size = output.stream_position()?;

    output.seek(SeekFrom::Start(sections.file_info as u64))?;
    output.write_all(infos.as_bytes())?;
    output.seek(SeekFrom::Start(size))?;
    progress.finish();

    let summary = Summary {
        directories: layout.directories.len(),
        files: layout.files.len(),
        size,
    };
    info!("{summary:?}");
    Ok(summary)
}
