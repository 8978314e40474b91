//! High level emulation of the second boot stage (BS2) of the IPL.
//!
//! Instead of running the console's firmware, the effects it has on the system are synthesized:
//! low memory globals are written, the disk's apploader is loaded and executed, and the CPU is
//! left at the entrypoint of the game.

mod apploader;
mod gamecube;
mod wii;

use std::time::{SystemTime, UNIX_EPOCH};

use disks::Console;
use disks::iso::Region;
use easyerr::Error;
use gekko::Address;

use crate::cores::CpuCore;
use crate::modules::disk::ReadError;
use crate::system::System;
use crate::system::mem::{Memory, MemoryError};

#[rustfmt::skip]
pub use apploader::{
    FUNCTION_TABLE_GAMECUBE, FUNCTION_TABLE_WII, MAIN_ARGS, REPORT_CALLBACK, STACK_POINTER,
};

/// Seconds between the Unix epoch and 2000-01-01, the epoch of the console's clock.
pub const CONSOLE_EPOCH: u64 = 946_684_800;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("no disk inserted")]
    NoDisk,
    #[error("inserted disk is not a GameCube or Wii disk")]
    UnknownConsole,
    #[error("invalid apploader header (entrypoint 0x{entry:08X}, size 0x{size:08X})")]
    InvalidApploader { entry: u32, size: u32 },
    #[error("missing system settings file for region {region:?}")]
    MissingSettings { region: Region },
    #[error("system settings file is too short ({length} bytes)")]
    InvalidSettings { length: usize },
    #[error(transparent)]
    Apploader { source: disks::binrw::Error },
    #[error(transparent)]
    Disk { source: ReadError },
    #[error(transparent)]
    Memory { source: MemoryError },
}

/// A value written to a fixed address during boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Global {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

/// Writes a table of globals to memory.
fn write_globals(mem: &mut Memory, table: &[(u32, Global)]) -> Result<(), MemoryError> {
    for &(addr, value) in table {
        let addr = Address(addr);
        match value {
            Global::U8(value) => mem.write(addr, value)?,
            Global::U16(value) => mem.write(addr, value)?,
            Global::U32(value) => mem.write(addr, value)?,
            Global::U64(value) => mem.write(addr, value)?,
        }
    }

    Ok(())
}

/// Value of the real time clock, in seconds since 2000-01-01.
fn rtc(sys: &System) -> u32 {
    if let Some(rtc) = sys.config.rtc {
        return rtc;
    }

    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());

    u32::try_from(unix.saturating_sub(CONSOLE_EPOCH)).unwrap_or(u32::MAX)
}

/// Boots the inserted disk, leaving the CPU at the entrypoint of the game.
///
/// On failure, the state of the CPU and memory is unspecified.
pub fn boot(sys: &mut System, core: &mut dyn CpuCore) -> Result<(), BootError> {
    if !sys.modules.disk.has_disk() {
        return Err(BootError::NoDisk);
    }

    let Some(meta) = sys.modules.disk.meta() else {
        return Err(BootError::NoDisk);
    };

    tracing::info!(
        game_code = meta.game_code(),
        maker_code = meta.maker_code,
        disk_id = meta.disk_id,
        version = meta.version,
        "booting '{}' ({}) using BS2 HLE",
        meta.game_name,
        meta.unique_id().as_deref().unwrap_or("<unknown>")
    );

    match meta.console() {
        Some(Console::GameCube) => gamecube::boot(sys, core),
        Some(Console::Wii) => wii::boot(sys, core),
        None => Err(BootError::UnknownConsole),
    }
}
