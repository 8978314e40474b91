pub mod primitive;

pub mod cores;
pub mod modules;

pub mod boot;
pub mod ios;
pub mod system;


pub use disks;
pub use gekko::{self, Address, Cycles};
pub use primitive::Primitive;

use crate::boot::BootError;
use crate::cores::Cores;
use crate::ios::IpcError;
use crate::system::{Modules, System};

/// The Lapis boot environment.
pub struct Lapis {
    /// System state.
    pub sys: System,
    /// Cores of the emulator.
    cores: Cores,
}

impl Lapis {
    pub fn new(cores: Cores, modules: Modules, config: system::Config) -> Self {
        Self {
            sys: System::new(modules, config),
            cores,
        }
    }

    /// Boots the inserted disk through the high level BS2, leaving the CPU at the entrypoint of
    /// the game.
    pub fn boot(&mut self) -> Result<(), BootError> {
        boot::boot(&mut self.sys, self.cores.cpu.as_mut())
    }

    /// Handles an IPC request whose command block is at `cmd`.
    pub fn ipc(&mut self, cmd: Address) -> Result<(), IpcError> {
        self.sys.ipc(cmd)
    }

    /// Advances emulation by the specified number of CPU cycles.
    pub fn exec(&mut self, cycles: Cycles, breakpoints: &[Address]) -> cores::Executed {
        let executed = self.cores.cpu.exec(&mut self.sys, cycles, breakpoints);
        self.sys.steps += executed.instructions;

        executed
    }

    pub fn step(&mut self) -> cores::Executed {
        let executed = self.cores.cpu.step(&mut self.sys);
        self.sys.steps += executed.instructions;

        executed
    }
}
