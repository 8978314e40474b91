//! GameCube boot.
use easyerr::ResultExt;
use gekko::{Address, INS_BLR};

use super::apploader::{self, FUNCTION_TABLE_GAMECUBE, Layout, REPORT_CALLBACK};
use super::{BootCtx, BootError, Global, rtc, write_globals};
use crate::cores::CpuCore;
use crate::modules::disk::ReadMode;
use crate::system::System;

/// Length of the disk header copied to the start of RAM.
const DISK_INFO_LEN: u32 = 10;

/// Address of the real time clock value.
pub const RTC_ADDR: u32 = 0x8000_30D8;

/// Globals written before the apploader runs.
#[rustfmt::skip]
pub const GLOBALS: &[(u32, Global)] = &[
    (0x8000_001C, Global::U32(0xC233_9F3D)), // DVD magic word
    (0x8000_0020, Global::U32(0x0D15_EA5E)), // boot kind
    (0x8000_0028, Global::U32(0x0180_0000)), // physical memory size
    (0x8000_002C, Global::U32(0x1000_0006)), // console type
];

/// Globals written once the game has control.
#[rustfmt::skip]
pub const LATE_GLOBALS: &[(u32, Global)] = &[
    (0x8000_00F8, Global::U32(0x09A7_EC80)), // bus clock
    (0x8000_00FC, Global::U32(0x1CF7_C580)), // CPU clock
];

/// Address of the video mode flag (0 for NTSC, 1 for PAL).
pub const VIDEO_MODE_ADDR: u32 = 0x8000_00CC;

const LAYOUT: Layout = Layout {
    function_table: FUNCTION_TABLE_GAMECUBE,
    offset_shift: 0,
    mode: ReadMode::Raw,
};

pub fn boot(sys: &mut System, core: &mut dyn CpuCore) -> Result<(), BootError> {
    tracing::info!("faking GameCube BS2");

    // environment
    sys.mem.clear();
    apploader::prime(sys).context(BootCtx::Memory)?;

    let info = sys
        .mem
        .slice_mut(Address(0x8000_0000), DISK_INFO_LEN)
        .context(BootCtx::Memory)?;

    sys.modules
        .disk
        .read(0, info, ReadMode::Raw)
        .context(BootCtx::Disk)?;

    write_globals(&mut sys.mem, GLOBALS).context(BootCtx::Memory)?;

    // there's no OSReport to call back into, so just return
    sys.write(Address(REPORT_CALLBACK), INS_BLR)
        .context(BootCtx::Memory)?;

    let rtc = rtc(sys);
    sys.write(Address(RTC_ADDR), rtc).context(BootCtx::Memory)?;

    // apploader
    let entry = apploader::stage(sys, LAYOUT)?;
    let functions = apploader::locate(sys, core, entry, LAYOUT)?;
    apploader::run(sys, core, functions, LAYOUT)?;
    apploader::handoff(sys)?;

    // the IPL writes these after the game has started
    let ntsc = sys
        .modules
        .disk
        .meta()
        .and_then(|meta| meta.region())
        .is_none_or(|region| region.is_ntsc());

    write_globals(&mut sys.mem, LATE_GLOBALS).context(BootCtx::Memory)?;
    sys.write(Address(VIDEO_MODE_ADDR), u32::from(!ntsc))
        .context(BootCtx::Memory)?;
    sys.write(Address(RTC_ADDR), rtc).context(BootCtx::Memory)?;

    Ok(())
}
