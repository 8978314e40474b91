//! The apploader is a small program stored in the disc which is responsible for loading the game's
//! executable and filesystem table into memory.

use binrw::{BinRead, BinWrite};

/// Value of the entrypoint and size fields of a missing or corrupt apploader.
pub const INVALID: u32 = 0xFFFF_FFFF;

/// Address the apploader body is loaded to.
pub const LOAD_ADDRESS: u32 = 0x8120_0000;

/// The header of an apploader.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct Header {
    /// Build date, in the `YYYY/MM/DD` format.
    pub date: [u8; 0x10],
    pub entrypoint: u32,
    pub size: u32,
    #[brw(pad_after = 0x04)]
    pub trailer_size: u32,
}

impl Header {
    /// Size of the header in bytes.
    pub const SIZE: usize = 0x20;

    pub fn date_str(&self) -> Option<&str> {
        let end = self
            .date
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.date.len());

        std::str::from_utf8(&self.date[..end]).ok()
    }

    /// Whether the entrypoint or size are the invalid sentinel.
    pub fn is_valid(&self) -> bool {
        self.entrypoint != INVALID && self.size != INVALID
    }
}

/// An apploader.
#[derive(Debug, Clone, BinRead)]
#[br(big)]
pub struct Apploader {
    pub header: Header,
    #[br(count = header.size)]
    pub body: Vec<u8>,
}
