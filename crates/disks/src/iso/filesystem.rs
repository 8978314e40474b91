//! The filesystem table (FST) of a disc.
use std::io::{Read, Seek, SeekFrom};

use binrw::{BinRead, BinResult, Endian, NullString};

/// A raw entry of the filesystem table.
#[derive(Debug, Clone, Copy, BinRead)]
#[br(big)]
struct RawEntry {
    kind_and_name: u32,
    offset_or_parent: u32,
    length_or_next: u32,
}

impl RawEntry {
    const SIZE: u64 = 12;

    fn is_dir(&self) -> bool {
        (self.kind_and_name >> 24) != 0
    }

    fn name_offset(&self) -> u64 {
        (self.kind_and_name & 0x00FF_FFFF) as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File {
        /// Offset of the file data in the disc (or partition).
        offset: u64,
        /// Length of the file in bytes.
        length: u32,
    },
    Directory {
        /// Index of the entry after the last entry of this directory.
        next: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Full path of the entry, starting with `/`.
    pub path: String,
    pub kind: EntryKind,
}

impl Entry {
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File { .. })
    }
}

/// Arguments for reading a [`FileSystem`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemArgs {
    /// How much file offsets are shifted to the left. Wii filesystems store offsets divided by
    /// four.
    pub offset_shift: u32,
}

/// A parsed filesystem table.
#[derive(Debug, Clone, Default)]
pub struct FileSystem {
    entries: Vec<Entry>,
}

impl BinRead for FileSystem {
    type Args<'a> = FileSystemArgs;

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let start = reader.stream_position()?;
        let root = RawEntry::read_options(reader, endian, ())?;
        if !root.is_dir() {
            return Err(binrw::Error::AssertFail {
                pos: start,
                message: "root of the filesystem table is not a directory".into(),
            });
        }

        let count = root.length_or_next as u64;
        let entries_start = reader.stream_position()?;
        let stream_end = reader.seek(SeekFrom::End(0))?;
        if count * RawEntry::SIZE > stream_end.saturating_sub(start) {
            return Err(binrw::Error::AssertFail {
                pos: start,
                message: format!("filesystem table has {count} entries, more than the disc holds"),
            });
        }

        reader.seek(SeekFrom::Start(entries_start))?;
        let mut raw = Vec::with_capacity(count as usize);
        raw.push(root);
        for _ in 1..count {
            raw.push(RawEntry::read_options(reader, endian, ())?);
        }

        let names = start + count * RawEntry::SIZE;
        let mut entries = Vec::with_capacity(raw.len());
        entries.push(Entry {
            path: String::new(),
            kind: EntryKind::Directory {
                next: root.length_or_next,
            },
        });

        // stack of (directory index, end index)
        let mut dirs: Vec<(usize, u32)> = vec![(0, root.length_or_next)];
        for (index, entry) in raw.iter().enumerate().skip(1) {
            while dirs.last().is_some_and(|(_, end)| *end as usize <= index) {
                dirs.pop();
            }

            reader.seek(SeekFrom::Start(names + entry.name_offset()))?;
            let name = NullString::read_options(reader, endian, ())?.to_string();

            let parent = dirs.last().map_or(0, |(dir, _)| *dir);
            let path = format!("{}/{}", entries[parent].path, name);

            let kind = if entry.is_dir() {
                dirs.push((index, entry.length_or_next));
                EntryKind::Directory {
                    next: entry.length_or_next,
                }
            } else {
                EntryKind::File {
                    offset: (entry.offset_or_parent as u64) << args.offset_shift,
                    length: entry.length_or_next,
                }
            };

            entries.push(Entry { path, kind });
        }

        Ok(Self { entries })
    }
}

impl FileSystem {
    /// All entries of the table, root excluded.
    pub fn entries(&self) -> &[Entry] {
        self.entries.get(1..).unwrap_or_default()
    }

    /// All files of the table.
    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.entries().iter().filter(|e| e.is_file())
    }

    /// Finds an entry by its path. The comparison is ASCII case insensitive and the leading `/`
    /// is optional.
    pub fn find(&self, path: &str) -> Option<&Entry> {
        let path = path.trim_start_matches('/');
        self.entries()
            .iter()
            .find(|e| e.path[1..].eq_ignore_ascii_case(path))
    }

    /// Returns the size of the file with the given path.
    pub fn file_size(&self, path: &str) -> Option<u32> {
        match self.find(path)?.kind {
            EntryKind::File { length, .. } => Some(length),
            EntryKind::Directory { .. } => None,
        }
    }

    /// Returns the file which contains the given offset.
    pub fn file_at(&self, offset: u64) -> Option<&Entry> {
        self.files().find(|e| match e.kind {
            EntryKind::File {
                offset: start,
                length,
            } => (start..start + length as u64).contains(&offset),
            EntryKind::Directory { .. } => false,
        })
    }
}
