//! State of the system (i.e. GameCube/Wii and emulator).

pub mod mem;

use disks::Console;
use gekko::{Address, Cpu};

use crate::Primitive;
use crate::ios::{self, Ios, IpcError};
use crate::modules::disk::DiskModule;
use crate::modules::files::FilesModule;
use crate::modules::patch::PatchModule;
use crate::system::mem::{Memory, MemoryError};

/// System configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Whether apploader functions should be executed one instruction at a time.
    pub debug_boot: bool,
    /// Value of the real time clock at boot, in seconds since 2000-01-01. Uses the host clock if
    /// not set.
    pub rtc: Option<u32>,
}

/// System modules.
pub struct Modules {
    pub disk: Box<dyn DiskModule>,
    pub files: Box<dyn FilesModule>,
    pub patches: Box<dyn PatchModule>,
}

/// System state.
pub struct System {
    /// System configuration.
    pub config: Config,
    /// System modules.
    pub modules: Modules,
    /// The CPU state.
    pub cpu: Cpu,
    /// System memory.
    pub mem: Memory,
    /// The IOS device table. Only used by the Wii.
    pub ios: Ios,
    /// How many instructions have been executed since the game was handed control.
    pub steps: u64,
}

impl System {
    pub fn new(modules: Modules, config: Config) -> Self {
        let console = modules.disk.console().unwrap_or(Console::GameCube);

        System {
            cpu: Cpu::default(),
            mem: Memory::new(console),
            ios: Ios::new(),
            steps: 0,

            config,
            modules,
        }
    }

    /// The console being emulated, decided by the inserted disk.
    pub fn console(&self) -> Console {
        if self.mem.has_mem2() {
            Console::Wii
        } else {
            Console::GameCube
        }
    }

    /// Reads a primitive from the given address.
    #[inline(always)]
    pub fn read<P: Primitive>(&self, addr: Address) -> Result<P, MemoryError> {
        self.mem.read(addr)
    }

    /// Writes a primitive to the given address.
    #[inline(always)]
    pub fn write<P: Primitive>(&mut self, addr: Address, value: P) -> Result<(), MemoryError> {
        self.mem.write(addr, value)
    }

    /// Handles an IPC request whose command block is at `cmd`.
    pub fn ipc(&mut self, cmd: Address) -> Result<(), IpcError> {
        let mut ctx = ios::Context {
            mem: &mut self.mem,
            disk: self.modules.disk.as_mut(),
        };

        self.ios.execute(&mut ctx, cmd)
    }
}
