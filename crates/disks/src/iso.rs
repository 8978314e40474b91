//! A GameCube/Wii `.iso` file contains the entire image of a disk.

pub mod filesystem;

use std::io::{Read, Seek, SeekFrom};

use binrw::{BinRead, BinWrite, NullString};
use filesystem::{FileSystem, FileSystemArgs};

use crate::{Console, apploader};

/// Magic word identifying GameCube discs, at offset `0x1C`.
pub const GAMECUBE_MAGIC: u32 = 0xC233_9F3D;
/// Magic word identifying Wii discs, at offset `0x18`.
pub const WII_MAGIC: u32 = 0x5D1C_9EA3;
/// Offset of the apploader in the disc (or, for Wii discs, in the data partition).
pub const APPLOADER_OFFSET: u64 = 0x2440;

#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct Meta {
    pub console_id: u8,
    pub game_id: u16,
    pub country_code: u8,
    pub maker_code: u16,
    pub disk_id: u8,
    pub version: u8,
    pub audio_streaming: u8,
    pub stream_buffer_size: u8,
    #[brw(pad_before = 0x0E)]
    pub wii_magic: u32,
    pub gamecube_magic: u32,
    #[brw(assert(game_name.len() <= 0x3E0))]
    pub game_name: NullString,
}

impl Meta {
    pub fn game_code(&self) -> u32 {
        let game = self.game_id.to_be_bytes();
        u32::from_be_bytes([self.console_id, game[0], game[1], self.country_code])
    }

    pub fn game_code_str(&self) -> Option<String> {
        String::from_utf8(self.game_code().to_be_bytes().into()).ok()
    }

    /// The six character identifier of the game, i.e. the game code followed by the maker code.
    pub fn unique_id(&self) -> Option<String> {
        let mut id = self.game_code().to_be_bytes().to_vec();
        id.extend_from_slice(&self.maker_code.to_be_bytes());
        String::from_utf8(id).ok()
    }

    /// The console this disc is meant for, decided by the magic words and falling back to the
    /// console identifier.
    pub fn console(&self) -> Option<Console> {
        if self.wii_magic == WII_MAGIC {
            return Some(Console::Wii);
        }

        if self.gamecube_magic == GAMECUBE_MAGIC {
            return Some(Console::GameCube);
        }

        Some(match self.console_id {
            b'G' | b'D' => Console::GameCube,
            b'R' | b'S' => Console::Wii,
            _ => return None,
        })
    }

    pub fn region(&self) -> Option<Region> {
        Some(match self.country_code {
            b'J' => Region::Japan,
            b'E' => Region::Usa,
            b'P' | b'D' | b'F' | b'I' | b'S' | b'X' | b'Y' => Region::Pal,
            b'K' => Region::Korea,
            _ => return None,
        })
    }

    pub fn audio_streaming(&self) -> Option<bool> {
        Some(match self.audio_streaming {
            0 => false,
            1 => true,
            _ => return None,
        })
    }
}

/// The header of a GameCube .iso file.
#[derive(Debug, Clone, BinRead, BinWrite)]
#[brw(big)]
pub struct Header {
    #[brw(pad_size_to = 0x400)]
    pub meta: Meta,
    pub debug_monitor_offset: u32,
    pub debug_monitor_target: u32,
    #[brw(pad_before = 0x18)]
    pub bootfile_offset: u32,
    pub filesystem_offset: u32,
    pub filesystem_size: u32,
    pub max_filesystem_size: u32,
    pub user_position: u32,
    pub user_length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Japan,
    Usa,
    Pal,
    Korea,
}

impl Region {
    /// Whether software of this region expects an NTSC display.
    pub fn is_ntsc(self) -> bool {
        !matches!(self, Self::Pal)
    }
}

/// A GameCube .iso file.
#[derive(Debug)]
pub struct Iso<R> {
    /// Header of the ISO.
    header: Header,
    /// Reader of the contents.
    reader: R,
}

impl<R> Iso<R>
where
    R: Read + Seek,
{
    pub fn new(mut reader: R) -> Result<Self, binrw::Error> {
        reader.seek(SeekFrom::Start(0))?;
        let header = Header::read(&mut reader)?;
        Ok(Self { header, reader })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn console(&self) -> Option<Console> {
        self.header.meta.console()
    }

    pub fn reader(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Reads the apploader of a GameCube disc. Wii apploaders live inside the encrypted data
    /// partition and cannot be read through this method.
    pub fn apploader(&mut self) -> Result<apploader::Apploader, binrw::Error> {
        self.reader.seek(SeekFrom::Start(APPLOADER_OFFSET))?;
        apploader::Apploader::read(&mut self.reader)
    }

    pub fn apploader_header(&mut self) -> Result<apploader::Header, binrw::Error> {
        self.reader.seek(SeekFrom::Start(APPLOADER_OFFSET))?;
        apploader::Header::read(&mut self.reader)
    }

    pub fn filesystem(&mut self) -> Result<FileSystem, binrw::Error> {
        self.reader
            .seek(SeekFrom::Start(self.header.filesystem_offset as u64))?;

        FileSystem::read_be_args(&mut self.reader, FileSystemArgs::default())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    fn header(console: &[u8; 4], wii_magic: u32, gamecube_magic: u32) -> Vec<u8> {
        let mut data = vec![0; 0x440];
        data[0..4].copy_from_slice(console);
        data[4..6].copy_from_slice(b"01");
        data[0x18..0x1C].copy_from_slice(&wii_magic.to_be_bytes());
        data[0x1C..0x20].copy_from_slice(&gamecube_magic.to_be_bytes());
        data[0x20..0x26].copy_from_slice(b"Lapis\0");
        data
    }

    #[test]
    fn gamecube_header() {
        let iso = Iso::new(Cursor::new(header(b"GLPE", 0, GAMECUBE_MAGIC))).unwrap();
        let meta = &iso.header().meta;

        assert_eq!(meta.unique_id().as_deref(), Some("GLPE01"));
        assert_eq!(meta.game_code_str().as_deref(), Some("GLPE"));
        assert_eq!(meta.console(), Some(Console::GameCube));
        assert_eq!(meta.region(), Some(Region::Usa));
        assert_eq!(meta.game_name.to_string(), "Lapis");
    }

    #[test]
    fn wii_magic_wins() {
        let iso = Iso::new(Cursor::new(header(b"GLPP", WII_MAGIC, 0))).unwrap();
        let meta = &iso.header().meta;

        assert_eq!(meta.console(), Some(Console::Wii));
        assert_eq!(meta.region(), Some(Region::Pal));
        assert!(!Region::Pal.is_ntsc());
    }

    #[test]
    fn unknown_console() {
        let iso = Iso::new(Cursor::new(header(b"ZLPK", 0, 0))).unwrap();
        let meta = &iso.header().meta;

        assert_eq!(meta.console(), None);
        assert_eq!(meta.region(), Some(Region::Korea));
    }
}
