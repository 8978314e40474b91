//! Wii boot.
use disks::iso::Region;
use easyerr::ResultExt;
use gekko::{Address, INS_BLR};

use super::apploader::{self, FUNCTION_TABLE_WII, Layout, REPORT_CALLBACK};
use super::{BootCtx, BootError, Global, rtc, write_globals};
use crate::cores::CpuCore;
use crate::modules::disk::ReadMode;
use crate::modules::files::{MEMORY_DUMP_LEN, SETTINGS_LEN};
use crate::system::System;

/// Length of the game code copied to the start of RAM.
const GAME_CODE_LEN: u32 = 6;

/// Where the system settings are copied to.
pub const SETTINGS_ADDR: u32 = 0x0000_3800;
/// Address of the real time clock value.
pub const RTC_ADDR: u32 = 0x0000_30D8;
/// Address of the video mode flag (0 for NTSC, 1 for PAL).
pub const VIDEO_MODE_ADDR: u32 = 0x0000_00CC;
/// Where the game code is mirrored for consistency checks.
pub const GAME_CODE_MIRROR_ADDR: u32 = 0x0000_3180;

/// Globals of the Wii OS.
#[rustfmt::skip]
pub const GLOBALS: &[(u32, Global)] = &[
    (0x0000_0018, Global::U32(0x5D1C_9EA3)), // Wii disk magic word
    (0x0000_0020, Global::U32(0x0D15_EA5E)), // boot kind
    (0x0000_0024, Global::U32(0x0000_0001)), // version
    (0x0000_0028, Global::U32(0x0180_0000)), // MEM1 size
    (0x0000_002C, Global::U32(0x0000_0023)), // board model
    (0x0000_0030, Global::U32(0x0000_0000)), // arena low
    (0x0000_0034, Global::U32(0x817F_EC60)), // arena high
    (0x0000_0060, Global::U32(0x38A0_0040)), // exception init
    (0x0000_00E4, Global::U32(0x8008_F7B8)), // thread init
    (0x0000_00F0, Global::U32(0x0180_0000)), // simulated memory size
    (0x0000_00F4, Global::U32(0x8179_B500)), // __start
    (0x0000_00F8, Global::U32(0x0E7B_E2C0)), // bus clock
    (0x0000_00FC, Global::U32(0x2B73_A840)), // CPU clock
    (0x0000_30E6, Global::U16(0x0000)),      // console type
    (0x0000_30C0, Global::U32(0x0000_0000)), // EXI
    (0x0000_30C4, Global::U32(0x0000_0000)), // EXI
    (0x0000_30DC, Global::U32(0x0000_0000)), // time
    (0x0000_30D8, Global::U32(0x0000_0000)), // time
    (0x0000_30F0, Global::U32(0x0000_0000)), // apploader
    (0x0000_3100, Global::U32(0x0180_0000)), // BAT
    (0x0000_3104, Global::U32(0x0180_0000)), // BAT
    (0x0000_310C, Global::U32(0x0000_0000)), // arena
    (0x0000_3110, Global::U32(0x8179_D500)), // arena
    (0x0000_3118, Global::U32(0x0400_0000)), // MEM2 size
    (0x0000_311C, Global::U32(0x0400_0000)), // BAT
    (0x0000_3120, Global::U32(0x9340_0000)), // BAT
    (0x0000_3124, Global::U32(0x9000_0800)), // MEM2 low
    (0x0000_3128, Global::U32(0x93AE_0000)), // MEM2 high
    (0x0000_3130, Global::U32(0x93AE_0000)), // IOS MEM2 low
    (0x0000_3134, Global::U32(0x93B0_0000)), // IOS MEM2 high
    (0x0000_3138, Global::U32(0x0000_0011)), // console type
    (0x0000_3140, Global::U64(0x0009_0204_0006_2507)), // IOS version
    (0x0000_315E, Global::U16(0x0113)),      // apploader
    (0x0000_3158, Global::U32(0x0000_FF16)), // DDR vendor code
    (0x0000_315C, Global::U8(0x80)),         // OS init
    (0x0000_0006, Global::U8(0x00)),         // DVD init
    (0x0000_0007, Global::U8(0x00)),         // DVD init
    (0x0000_30E0, Global::U16(0x0000)),      // PAD init
];

const LAYOUT: Layout = Layout {
    function_table: FUNCTION_TABLE_WII,
    offset_shift: 2,
    mode: ReadMode::Decrypted,
};

/// Sets up low memory, either from a dump or by synthesizing the globals of the OS.
fn setup_memory(sys: &mut System) -> Result<(), BootError> {
    if let Some(dump) = sys.modules.files.memory_dump() {
        if dump.len() != MEMORY_DUMP_LEN {
            tracing::warn!(
                "low memory dump has 0x{:X} bytes instead of 0x{MEMORY_DUMP_LEN:X}",
                dump.len()
            );
        }

        let len = dump.len().min(MEMORY_DUMP_LEN);
        sys.mem
            .write_bytes(Address(0), &dump[..len])
            .context(BootCtx::Memory)?;

        tracing::info!("low memory loaded from dump");
        return Ok(());
    }

    let region = sys
        .modules
        .disk
        .meta()
        .and_then(|meta| meta.region())
        .unwrap_or_else(|| {
            tracing::warn!("unknown disk region, using european settings");
            Region::Pal
        });

    let Some(settings) = sys.modules.files.settings(region) else {
        return Err(BootError::MissingSettings { region });
    };

    if settings.len() < SETTINGS_LEN {
        return Err(BootError::InvalidSettings {
            length: settings.len(),
        });
    }

    sys.mem
        .write_bytes(Address(SETTINGS_ADDR), &settings[..SETTINGS_LEN])
        .context(BootCtx::Memory)?;

    let code = sys
        .mem
        .slice_mut(Address(0), GAME_CODE_LEN)
        .context(BootCtx::Memory)?;

    sys.modules
        .disk
        .read(0, code, ReadMode::Raw)
        .context(BootCtx::Disk)?;

    write_globals(&mut sys.mem, GLOBALS).context(BootCtx::Memory)?;
    sys.write(Address(VIDEO_MODE_ADDR), u32::from(!region.is_ntsc()))
        .context(BootCtx::Memory)?;

    // exception handler area
    sys.mem
        .fill(Address(0x8000_3000), 0x3C, 0)
        .context(BootCtx::Memory)?;

    let code = sys.read::<u32>(Address(0)).context(BootCtx::Memory)?;
    sys.write(Address(GAME_CODE_MIRROR_ADDR), code)
        .context(BootCtx::Memory)?;

    let rtc = rtc(sys);
    sys.write(Address(RTC_ADDR), rtc).context(BootCtx::Memory)?;

    Ok(())
}

pub fn boot(sys: &mut System, core: &mut dyn CpuCore) -> Result<(), BootError> {
    tracing::info!("faking Wii BS2");

    // environment
    sys.mem.clear();
    setup_memory(sys)?;
    apploader::prime(sys).context(BootCtx::Memory)?;
    sys.write(Address(REPORT_CALLBACK), INS_BLR)
        .context(BootCtx::Memory)?;

    // apploader
    let entry = apploader::stage(sys, LAYOUT)?;
    let functions = apploader::locate(sys, core, entry, LAYOUT)?;
    apploader::run(sys, core, functions, LAYOUT)?;
    apploader::handoff(sys)?;

    Ok(())
}
