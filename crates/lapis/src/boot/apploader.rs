//! Apploader staging and execution, shared by both consoles.
use std::io::Cursor;

use disks::apploader;
use disks::binrw::BinRead;
use disks::iso::APPLOADER_OFFSET;
use easyerr::ResultExt;
use gekko::{Address, Cycles, Exception, GPR, INS_RFI};

use super::{BootCtx, BootError};
use crate::cores::CpuCore;
use crate::modules::disk::ReadMode;
use crate::system::System;
use crate::system::mem::MemoryError;

/// Initial stack pointer.
pub const STACK_POINTER: u32 = 0x816F_FFF0;
/// Where the apploader entrypoint writes the addresses of its functions on the GameCube.
pub const FUNCTION_TABLE_GAMECUBE: u32 = 0x8000_3100;
/// Where the apploader entrypoint writes the addresses of its functions on the Wii.
pub const FUNCTION_TABLE_WII: u32 = 0x8000_4000;

/// Argument of the init function: the address of the report callback.
pub const REPORT_CALLBACK: u32 = 0x8130_0000;
/// Arguments of the main function: pointers to the RAM address, length and disk offset of the
/// next section to load.
pub const MAIN_ARGS: [u32; 3] = [0x8130_0004, 0x8130_0008, 0x8130_000C];

/// How many cycles to run at once when not stepping.
const RUN_SLICE: Cycles = Cycles(1 << 20);

/// Differences between consoles in how the apploader is handled.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Address of the function table.
    pub function_table: u32,
    /// How disk offsets given by the main function are shifted.
    pub offset_shift: u32,
    /// How the disk is read.
    pub mode: ReadMode,
}

/// The functions exported by an apploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Functions {
    pub init: Address,
    pub main: Address,
    pub close: Address,
}

/// Prepares the CPU state and exception vectors shared by both consoles.
pub fn prime(sys: &mut System) -> Result<(), MemoryError> {
    sys.cpu.supervisor.config.msr.set_float_available(true);
    sys.cpu.supervisor.config.msr.set_exception_prefix(false);

    for exception in [
        Exception::DSI,
        Exception::FloatUnavailable,
        Exception::Syscall,
    ] {
        sys.mem.write(exception.vector(), INS_RFI)?;
    }

    Ok(())
}

/// Copies the apploader body to its load address, returning the entrypoint.
pub fn stage(sys: &mut System, layout: Layout) -> Result<Address, BootError> {
    let mut raw = [0; apploader::Header::SIZE];
    sys.modules
        .disk
        .read(APPLOADER_OFFSET, &mut raw, layout.mode)
        .context(BootCtx::Disk)?;

    let header = apploader::Header::read(&mut Cursor::new(raw)).context(BootCtx::Apploader)?;
    if !header.is_valid() {
        return Err(BootError::InvalidApploader {
            entry: header.entrypoint,
            size: header.size,
        });
    }

    tracing::info!(
        date = header.date_str().unwrap_or("<unknown>"),
        entrypoint = %Address(header.entrypoint),
        "loading apploader (0x{:X} bytes)",
        header.size
    );

    let target = sys
        .mem
        .slice_mut(Address(apploader::LOAD_ADDRESS), header.size)
        .context(BootCtx::Memory)?;

    sys.modules
        .disk
        .read(
            APPLOADER_OFFSET + apploader::Header::SIZE as u64,
            target,
            layout.mode,
        )
        .context(BootCtx::Disk)?;

    Ok(Address(header.entrypoint))
}

/// Calls the function at `target` and runs it until it returns to address zero.
pub fn run_function(sys: &mut System, core: &mut dyn CpuCore, target: Address) {
    sys.cpu.prepare_call(target);

    let mut instructions = 0;
    while !sys.cpu.pc.is_null() {
        let executed = if sys.config.debug_boot {
            let executed = core.step(sys);
            tracing::trace!(pc = %sys.cpu.pc, "stepped apploader");
            executed
        } else {
            core.exec(sys, RUN_SLICE, &[Address(0)])
        };

        instructions += executed.instructions;
    }

    tracing::debug!(instructions, "function at {target} returned");
}

/// Calls the apploader entrypoint and reads back the addresses of its functions.
pub fn locate(
    sys: &mut System,
    core: &mut dyn CpuCore,
    entry: Address,
    layout: Layout,
) -> Result<Functions, BootError> {
    let table = Address(layout.function_table);
    sys.cpu.set_gpr(GPR::SP, STACK_POINTER);
    sys.cpu.set_args(&[table.value(), (table + 4).value(), (table + 8).value()]);
    run_function(sys, core, entry);

    let functions = Functions {
        init: sys.read::<u32>(table).map(Address).context(BootCtx::Memory)?,
        main: sys.read::<u32>(table + 4).map(Address).context(BootCtx::Memory)?,
        close: sys.read::<u32>(table + 8).map(Address).context(BootCtx::Memory)?,
    };

    tracing::debug!(
        init = %functions.init,
        main = %functions.main,
        close = %functions.close,
        "located apploader functions"
    );

    Ok(functions)
}

/// Runs the init, main and close functions of the apploader. Main is called until it returns
/// zero, and after every other call the section it describes is copied from the disk.
pub fn run(
    sys: &mut System,
    core: &mut dyn CpuCore,
    functions: Functions,
    layout: Layout,
) -> Result<(), BootError> {
    sys.cpu.set_args(&[REPORT_CALLBACK]);
    run_function(sys, core, functions.init);

    let [ram_ptr, length_ptr, offset_ptr] = MAIN_ARGS.map(Address);
    loop {
        sys.cpu.set_args(&MAIN_ARGS);
        run_function(sys, core, functions.main);
        if sys.cpu.gpr(GPR::R3) == 0 {
            break;
        }

        let ram = Address(sys.read::<u32>(ram_ptr).context(BootCtx::Memory)?);
        let length = sys.read::<u32>(length_ptr).context(BootCtx::Memory)?;
        let offset = (sys.read::<u32>(offset_ptr).context(BootCtx::Memory)? as u64)
            << layout.offset_shift;

        tracing::debug!("loading 0x{length:08X} bytes from disk at 0x{offset:09X} into {ram}");

        let target = sys.mem.slice_mut(ram, length).context(BootCtx::Memory)?;
        sys.modules
            .disk
            .read(offset, target, layout.mode)
            .context(BootCtx::Disk)?;
    }

    run_function(sys, core, functions.close);
    Ok(())
}

/// Applies startup patches and hands control to the game, whose entrypoint was returned by the
/// close function.
pub fn handoff(sys: &mut System) -> Result<(), BootError> {
    let game_id = sys
        .modules
        .disk
        .meta()
        .and_then(|meta| meta.unique_id())
        .unwrap_or_default();

    sys.modules.patches.load(&game_id);
    for patch in sys.modules.patches.startup() {
        if !patch.enabled {
            continue;
        }

        tracing::info!("applying patch '{}'", patch.name);
        patch.apply(&mut sys.mem).context(BootCtx::Memory)?;
    }

    sys.steps = 0;
    sys.cpu.pc = Address(sys.cpu.gpr(GPR::R3));
    tracing::info!("handing control to game at {}", sys.cpu.pc);

    Ok(())
}
