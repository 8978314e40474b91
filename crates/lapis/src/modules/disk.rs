//! Disk module.
use std::io::{Read, Seek, SeekFrom};

use disks::Console;
use disks::iso::filesystem::FileSystem;
use disks::iso::{Iso, Meta};
use disks::wii::{PartitionHeader, TmdLocation};
use easyerr::{Error, ResultExt};

/// How data should be read from the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Read the bytes stored in the disk as they are.
    Raw,
    /// Read through the decrypted view of the current partition. For GameCube disks, this is the
    /// same as [`ReadMode::Raw`].
    Decrypted,
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("no disk inserted")]
    NoDisk,
    #[error("reading encrypted partitions is not supported by this disk module")]
    Encrypted,
    #[error("read of 0x{length:X} bytes at 0x{offset:08X} is out of bounds")]
    OutOfBounds { offset: u64, length: usize },
    #[error("no partition at 0x{offset:09X}")]
    NoPartition { offset: u64 },
    #[error(transparent)]
    Io { source: std::io::Error },
}

/// Trait for disk modules.
pub trait DiskModule: Send {
    /// Whether a disk is currently inserted.
    fn has_disk(&self) -> bool;

    /// Metadata of the inserted disk.
    fn meta(&self) -> Option<&Meta>;

    /// Filesystem table of the inserted disk, if available.
    fn filesystem(&self) -> Option<&FileSystem>;

    /// Reads `buf.len()` bytes at `offset`.
    fn read(&mut self, offset: u64, buf: &mut [u8], mode: ReadMode) -> Result<(), ReadError>;

    /// Finds the title metadata of the partition at the given disk offset.
    fn tmd(&mut self, partition: u64) -> Result<TmdLocation, ReadError>;

    /// Ejects the disk.
    fn eject(&mut self);

    /// The console of the inserted disk.
    fn console(&self) -> Option<Console> {
        self.meta().and_then(Meta::console)
    }

    /// Reads a big endian word at `offset`.
    fn read_u32(&mut self, offset: u64, mode: ReadMode) -> Result<u32, ReadError> {
        let mut buf = [0; 4];
        self.read(offset, &mut buf, mode)?;
        Ok(u32::from_be_bytes(buf))
    }
}

/// An implementation of [`DiskModule`] with no disk inserted.
#[derive(Debug, Clone, Copy)]
pub struct NopDiskModule;

impl DiskModule for NopDiskModule {
    fn has_disk(&self) -> bool {
        false
    }

    fn meta(&self) -> Option<&Meta> {
        None
    }

    fn filesystem(&self) -> Option<&FileSystem> {
        None
    }

    fn read(&mut self, _: u64, _: &mut [u8], _: ReadMode) -> Result<(), ReadError> {
        Err(ReadError::NoDisk)
    }

    fn tmd(&mut self, _: u64) -> Result<TmdLocation, ReadError> {
        Err(ReadError::NoDisk)
    }

    fn eject(&mut self) {}
}

/// A [`DiskModule`] backed by an `.iso` image.
///
/// Encrypted Wii partitions are not decrypted: decrypted reads of Wii disks fail with
/// [`ReadError::Encrypted`].
pub struct IsoModule<R> {
    iso: Option<Iso<R>>,
    filesystem: Option<FileSystem>,
}

impl<R> IsoModule<R>
where
    R: Read + Seek,
{
    pub fn new(reader: R) -> Result<Self, disks::binrw::Error> {
        let mut iso = Iso::new(reader)?;
        let filesystem = match iso.console() {
            Some(Console::GameCube) => match iso.filesystem() {
                Ok(fs) => Some(fs),
                Err(e) => {
                    tracing::warn!("unable to read disk filesystem: {e}");
                    None
                }
            },
            _ => None,
        };

        Ok(Self {
            iso: Some(iso),
            filesystem,
        })
    }

    fn iso(&mut self) -> Result<&mut Iso<R>, ReadError> {
        self.iso.as_mut().ok_or(ReadError::NoDisk)
    }
}

impl<R> DiskModule for IsoModule<R>
where
    R: Read + Seek + Send,
{
    fn has_disk(&self) -> bool {
        self.iso.is_some()
    }

    fn meta(&self) -> Option<&Meta> {
        self.iso.as_ref().map(|iso| &iso.header().meta)
    }

    fn filesystem(&self) -> Option<&FileSystem> {
        self.iso.as_ref().and(self.filesystem.as_ref())
    }

    fn read(&mut self, offset: u64, buf: &mut [u8], mode: ReadMode) -> Result<(), ReadError> {
        let iso = self.iso()?;
        if mode == ReadMode::Decrypted && iso.console() == Some(Console::Wii) {
            return Err(ReadError::Encrypted);
        }

        let reader = iso.reader();
        reader
            .seek(SeekFrom::Start(offset))
            .context(ReadCtx::Io)?;

        reader.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ReadError::OutOfBounds {
                offset,
                length: buf.len(),
            },
            _ => ReadError::Io { source: e },
        })
    }

    fn tmd(&mut self, partition: u64) -> Result<TmdLocation, ReadError> {
        let iso = self.iso()?;
        if iso.console() != Some(Console::Wii) {
            return Err(ReadError::NoPartition { offset: partition });
        }

        let header = PartitionHeader::read_at(iso.reader(), partition)
            .map_err(|_| ReadError::NoPartition { offset: partition })?;

        Ok(header.tmd(partition))
    }

    fn eject(&mut self) {
        tracing::info!("ejecting disk");
        self.iso = None;
    }
}
