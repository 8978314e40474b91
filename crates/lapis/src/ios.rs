//! High level emulation of IOS devices, reached by the Wii OS through IPC command blocks.
//!
//! A command block has the following layout:
//!
//! | Offset | Field                                   |
//! |--------|-----------------------------------------|
//! | 0x00   | Command kind                            |
//! | 0x04   | Return value, written by the device     |
//! | 0x08   | File descriptor                         |
//! | 0x0C.. | Arguments, depending on the command     |

pub mod di;

use easyerr::{Error, ResultExt};
use gekko::Address;
use strum::FromRepr;

use crate::modules::disk::DiskModule;
use crate::system::mem::{Memory, MemoryError};

/// Generic failure return value.
pub const IPC_EINVAL: i32 = -4;
/// Return value for paths with no device behind them.
pub const IPC_ENOENT: i32 = -6;

/// Maximum length of a device path.
const MAX_PATH_LEN: u32 = 0x40;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("unimplemented disk command 0x{opcode:02X}")]
    Unimplemented { opcode: u8 },
    #[error("unknown disk command 0x{opcode:02X}")]
    Unknown { opcode: u8 },
    #[error("no open device with file descriptor {fd}")]
    UnknownFd { fd: i32 },
    #[error("unsupported IPC command kind {kind}")]
    UnknownCommand { kind: u32 },
    #[error(transparent)]
    Memory { source: MemoryError },
}

/// What a device handler needs from the system.
pub struct Context<'a> {
    pub mem: &'a mut Memory,
    pub disk: &'a mut dyn DiskModule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u32)]
pub enum CommandKind {
    Open   = 1,
    Close  = 2,
    Read   = 3,
    Write  = 4,
    Seek   = 5,
    Ioctl  = 6,
    Ioctlv = 7,
}

/// A region of guest memory described by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffer {
    pub addr: Address,
    pub len: u32,
}

impl Buffer {
    /// Reads a `(address, length)` pair at `addr`.
    fn read(mem: &Memory, addr: Address) -> Result<Self, MemoryError> {
        Ok(Self {
            addr: Address(mem.read(addr)?),
            len: mem.read(addr + 4)?,
        })
    }

    /// Zeroes the buffer.
    pub fn clear(&self, mem: &mut Memory) -> Result<(), MemoryError> {
        mem.fill(self.addr, self.len, 0)
    }
}

/// Arguments of an ioctl command.
#[derive(Debug, Clone, Copy)]
pub struct Ioctl {
    pub param: u32,
    pub input: Buffer,
    pub output: Buffer,
}

impl Ioctl {
    fn read(mem: &Memory, cmd: Address) -> Result<Self, MemoryError> {
        Ok(Self {
            param: mem.read(cmd + 0x0C)?,
            input: Buffer::read(mem, cmd + 0x10)?,
            output: Buffer::read(mem, cmd + 0x18)?,
        })
    }
}

/// Arguments of a vectored ioctl command.
#[derive(Debug, Clone)]
pub struct Ioctlv {
    pub param: u32,
    pub inputs: Vec<Buffer>,
    pub payloads: Vec<Buffer>,
}

impl Ioctlv {
    fn read(mem: &Memory, cmd: Address) -> Result<Self, MemoryError> {
        let param = mem.read(cmd + 0x0C)?;
        let input_count: u32 = mem.read(cmd + 0x10)?;
        let payload_count: u32 = mem.read(cmd + 0x14)?;
        let table = Address(mem.read(cmd + 0x18)?);

        let mut vectors = (0..input_count.saturating_add(payload_count))
            .map(|i| Buffer::read(mem, table + i * 8))
            .collect::<Result<Vec<_>, _>>()?;

        let payloads = vectors.split_off(input_count as usize);
        Ok(Self {
            param,
            inputs: vectors,
            payloads,
        })
    }
}

/// An emulated IOS device.
pub enum Device {
    Di(di::Di),
}

impl Device {
    /// Path through which the device is opened.
    pub fn path(&self) -> &'static str {
        match self {
            Device::Di(_) => di::PATH,
        }
    }

    fn ioctl(&mut self, ctx: &mut Context, ioctl: &Ioctl) -> Result<i32, IpcError> {
        match self {
            Device::Di(di) => di.ioctl(ctx, ioctl),
        }
    }

    fn ioctlv(&mut self, ctx: &mut Context, ioctlv: &Ioctlv) -> Result<i32, IpcError> {
        match self {
            Device::Di(di) => di.ioctlv(ctx, ioctlv),
        }
    }
}

/// The IOS device table. File descriptors are indices into it.
pub struct Ios {
    devices: Vec<Device>,
}

impl Ios {
    pub fn new() -> Self {
        Self {
            devices: vec![Device::Di(di::Di::default())],
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// The disk interface device.
    pub fn di(&self) -> Option<&di::Di> {
        self.devices.iter().find_map(|device| match device {
            Device::Di(di) => Some(di),
        })
    }

    fn device(&mut self, fd: i32) -> Result<&mut Device, IpcError> {
        usize::try_from(fd)
            .ok()
            .and_then(|index| self.devices.get_mut(index))
            .ok_or(IpcError::UnknownFd { fd })
    }

    fn open(&mut self, mem: &mut Memory, cmd: Address) -> Result<i32, IpcError> {
        let path_ptr = Address(mem.read(cmd + 0x0C).context(IpcCtx::Memory)?);
        let mode: u32 = mem.read(cmd + 0x10).context(IpcCtx::Memory)?;
        let path = mem
            .read_cstr(path_ptr, MAX_PATH_LEN)
            .context(IpcCtx::Memory)?;

        let Some(fd) = self.devices.iter().position(|d| d.path() == path) else {
            tracing::warn!("tried to open unknown device '{path}'");
            return Ok(IPC_ENOENT);
        };

        tracing::debug!(mode, "opened '{path}' as fd {fd}");
        Ok(fd as i32)
    }

    fn dispatch(&mut self, ctx: &mut Context, cmd: Address) -> Result<i32, IpcError> {
        let kind: u32 = ctx.mem.read(cmd).context(IpcCtx::Memory)?;
        let Some(kind) = CommandKind::from_repr(kind) else {
            return Err(IpcError::UnknownCommand { kind });
        };

        if kind == CommandKind::Open {
            return self.open(ctx.mem, cmd);
        }

        let fd: i32 = ctx.mem.read(cmd + 0x08).context(IpcCtx::Memory)?;
        let device = self.device(fd)?;

        match kind {
            CommandKind::Close => {
                tracing::debug!("closed '{}' (fd {fd})", device.path());
                Ok(0)
            }
            CommandKind::Ioctl => {
                let ioctl = Ioctl::read(ctx.mem, cmd).context(IpcCtx::Memory)?;
                device.ioctl(ctx, &ioctl)
            }
            CommandKind::Ioctlv => {
                let ioctlv = Ioctlv::read(ctx.mem, cmd).context(IpcCtx::Memory)?;
                device.ioctlv(ctx, &ioctlv)
            }
            _ => Err(IpcError::UnknownCommand { kind: kind as u32 }),
        }
    }

    /// Executes the command block at `cmd`, writing its return value back into the block.
    ///
    /// Errors are reported after [`IPC_EINVAL`] has been written as the return value, so the
    /// guest never sees a failed command as successful.
    pub fn execute(&mut self, ctx: &mut Context, cmd: Address) -> Result<(), IpcError> {
        let result = self.dispatch(ctx, cmd);
        let value = match &result {
            Ok(value) => *value,
            Err(e) => {
                tracing::error!("IPC command at {cmd} failed: {e}");
                IPC_EINVAL
            }
        };

        ctx.mem
            .write(cmd + 0x04, value)
            .context(IpcCtx::Memory)?;

        result.map(|_| ())
    }
}
