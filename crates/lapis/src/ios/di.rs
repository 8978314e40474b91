//! Disk interface device (`/dev/di`).
//!
//! Commands are identified by the top byte of the first word of the input buffer, or by the
//! parameter of the command block for vectored commands.
use easyerr::ResultExt;
use gekko::Address;
use strum::FromRepr;

use super::{Context, IpcCtx, IpcError, Ioctl, Ioctlv};
use crate::modules::disk::{ReadError, ReadMode};

/// Path of the device.
pub const PATH: &str = "/dev/di";

/// The cover has been opened or closed.
pub const ERROR_COVER: u32 = 0x0200_0000;
/// Medium not present.
pub const ERROR_NO_DISK: u32 = 0x0003_A000;
/// Unrecovered read error.
pub const ERROR_UNRECOVERED_READ: u32 = 0x0003_1100;
/// Invalid command operation code.
pub const ERROR_INVALID_COMMAND: u32 = 0x0005_2000;
/// Logical block address out of range.
pub const ERROR_BLOCK_OUT_OF_RANGE: u32 = 0x0005_2100;

/// Firmware identification returned by [`Opcode::Inquiry`]: revision, device code, firmware date
/// and version.
const INQUIRY: [u32; 3] = [0x0000_0002, 0x2006_0526, 0x4100_0000];

/// Ranges which may be read without decryption. The start of a read is in words and its length is
/// in bytes, and both are checked against the same range.
const UNENCRYPTED_WINDOWS: [(u64, u64); 3] = [
    (0x0000_0000, 0x0001_4000),
    (0x460A_0000, 0x460A_0008),
    (0x7ED4_0000, 0x7ED4_0008),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Opcode {
    Inquiry             = 0x12,
    ReadDiskId          = 0x70,
    Read                = 0x71,
    WaitForCoverClose   = 0x79,
    GetCoverRegister    = 0x7A,
    NotifyReset         = 0x7E,
    ReadDvdPhysical     = 0x80,
    ReadDvdCopyright    = 0x81,
    ReadDvdDiscKey      = 0x82,
    ClearCoverInterrupt = 0x86,
    GetCoverStatus      = 0x88,
    Reset               = 0x8A,
    OpenPartition       = 0x8B,
    ClosePartition      = 0x8C,
    UnencryptedRead     = 0x8D,
    ReportKey           = 0xA4,
    RequestError        = 0xE0,
    StopMotor           = 0xE3,
}

/// Error status to report for a failed disk read.
fn read_error_status(error: &ReadError) -> u32 {
    match error {
        ReadError::NoDisk => ERROR_COVER | ERROR_NO_DISK,
        ReadError::OutOfBounds { .. } | ReadError::NoPartition { .. } => ERROR_BLOCK_OUT_OF_RANGE,
        ReadError::Encrypted | ReadError::Io { .. } => ERROR_UNRECOVERED_READ,
    }
}

/// The disk interface device.
#[derive(Debug, Default)]
pub struct Di {
    /// Status of the last failed command, reported by [`Opcode::RequestError`]. Persists until
    /// another command fails.
    error_status: u32,
}

impl Di {
    pub fn error_status(&self) -> u32 {
        self.error_status
    }

    /// Reads `length` bytes at `offset` into guest memory. Returns 1 on success, or latches the
    /// error status and returns 2.
    fn read(
        &mut self,
        ctx: &mut Context,
        offset: u64,
        target: Address,
        length: u32,
        mode: ReadMode,
    ) -> Result<i32, IpcError> {
        let target = ctx
            .mem
            .slice_mut(target, length)
            .context(IpcCtx::Memory)?;

        match ctx.disk.read(offset, target, mode) {
            Ok(()) => Ok(1),
            Err(e) => {
                tracing::error!("disk read of 0x{length:X} bytes at 0x{offset:09X} failed: {e}");
                self.error_status = read_error_status(&e);
                Ok(2)
            }
        }
    }

    fn unsupported(&mut self, opcode: u8, error: IpcError) -> Result<i32, IpcError> {
        tracing::error!("disk command 0x{opcode:02X} is not supported");
        self.error_status = ERROR_INVALID_COMMAND;
        Err(error)
    }

    /// Latches an error status for commands which failed to access guest memory.
    fn latch_memory_error(&mut self, result: Result<i32, IpcError>) -> Result<i32, IpcError> {
        if let Err(IpcError::Memory { source }) = &result {
            tracing::error!("disk command failed to access guest memory: {source}");
            self.error_status = ERROR_BLOCK_OUT_OF_RANGE;
        }

        result
    }

    pub fn ioctl(&mut self, ctx: &mut Context, ioctl: &Ioctl) -> Result<i32, IpcError> {
        let result = self.command(ctx, ioctl);
        self.latch_memory_error(result)
    }

    pub fn ioctlv(&mut self, ctx: &mut Context, ioctlv: &Ioctlv) -> Result<i32, IpcError> {
        let result = self.open_partition(ctx, ioctlv);
        self.latch_memory_error(result)
    }

    fn command(&mut self, ctx: &mut Context, ioctl: &Ioctl) -> Result<i32, IpcError> {
        let input = ioctl.input.addr;
        let output = ioctl.output;
        let command: u32 = ctx.mem.read(input).context(IpcCtx::Memory)?;
        let opcode = command.to_be_bytes()[0];

        output.clear(ctx.mem).context(IpcCtx::Memory)?;

        let Some(op) = Opcode::from_repr(opcode) else {
            return self.unsupported(opcode, IpcError::Unknown { opcode });
        };

        tracing::trace!(?op, "disk command 0x{command:08X}");
        match op {
            Opcode::Inquiry => {
                let mut bytes = [0; 12];
                for (chunk, word) in bytes.chunks_exact_mut(4).zip(INQUIRY) {
                    chunk.copy_from_slice(&word.to_be_bytes());
                }

                let length = output.len.min(bytes.len() as u32) as usize;
                ctx.mem
                    .write_bytes(output.addr, &bytes[..length])
                    .context(IpcCtx::Memory)?;

                Ok(1)
            }
            Opcode::ReadDiskId => self.read(ctx, 0, output.addr, output.len, ReadMode::Raw),
            Opcode::Read => {
                let requested: u32 = ctx.mem.read(input + 4).context(IpcCtx::Memory)?;
                let position: u32 = ctx.mem.read(input + 8).context(IpcCtx::Memory)?;
                let offset = u64::from(position) << 2;

                let length = requested.min(output.len);
                if length < requested {
                    tracing::warn!(
                        "disk read of 0x{requested:X} bytes clamped to output buffer of 0x{:X} bytes",
                        output.len
                    );
                }

                if let Some(file) = ctx.disk.filesystem().and_then(|fs| fs.file_at(offset)) {
                    tracing::debug!(
                        file = %file.path,
                        "reading 0x{length:X} bytes at 0x{offset:09X} into {}",
                        output.addr
                    );
                }

                self.read(ctx, offset, output.addr, length, ReadMode::Decrypted)
            }
            Opcode::WaitForCoverClose => Ok(4),
            Opcode::GetCoverRegister => {
                if ctx.disk.filesystem().is_some() && output.len >= 4 {
                    ctx.mem
                        .write(output.addr, 0xFEFE_FEFE_u32)
                        .context(IpcCtx::Memory)?;
                }

                Ok(1)
            }
            Opcode::ClearCoverInterrupt
            | Opcode::GetCoverStatus
            | Opcode::Reset
            | Opcode::ClosePartition => {
                tracing::debug!("acknowledged disk command {op:?}");
                Ok(1)
            }
            Opcode::UnencryptedRead => {
                let requested: u32 = ctx.mem.read(input + 4).context(IpcCtx::Memory)?;
                let position: u32 = ctx.mem.read(input + 8).context(IpcCtx::Memory)?;

                let start = u64::from(position);
                let end = start + u64::from(requested);
                let allowed = UNENCRYPTED_WINDOWS
                    .iter()
                    .any(|&(low, high)| start >= low && end <= high);

                if !allowed {
                    tracing::warn!(
                        "unencrypted read of 0x{requested:X} bytes at 0x{:09X} is outside of the allowed ranges",
                        start << 2
                    );
                    self.error_status = ERROR_BLOCK_OUT_OF_RANGE;
                    return Ok(2);
                }

                let length = requested.min(output.len);
                self.read(ctx, start << 2, output.addr, length, ReadMode::Raw)
            }
            Opcode::ReportKey => {
                tracing::warn!("key reports are not supported");
                self.error_status = ERROR_INVALID_COMMAND;
                Ok(2)
            }
            Opcode::RequestError => {
                if output.len >= 4 {
                    ctx.mem
                        .write(output.addr, self.error_status)
                        .context(IpcCtx::Memory)?;
                }

                Ok(1)
            }
            Opcode::StopMotor => {
                let eject: u32 = ctx.mem.read(input + 4).context(IpcCtx::Memory)?;
                if eject != 0 {
                    ctx.disk.eject();
                }

                Ok(1)
            }
            Opcode::NotifyReset
            | Opcode::ReadDvdPhysical
            | Opcode::ReadDvdCopyright
            | Opcode::ReadDvdDiscKey
            | Opcode::OpenPartition => self.unsupported(opcode, IpcError::Unimplemented { opcode }),
        }
    }

    fn open_partition(&mut self, ctx: &mut Context, ioctlv: &Ioctlv) -> Result<i32, IpcError> {
        for payload in &ioctlv.payloads {
            payload.clear(ctx.mem).context(IpcCtx::Memory)?;
        }

        let opcode = ioctlv.param as u8;
        if ioctlv.param != Opcode::OpenPartition as u32 {
            return self.unsupported(opcode, IpcError::Unknown { opcode });
        }

        let (Some(input), Some(tmd_buffer)) = (ioctlv.inputs.first(), ioctlv.payloads.first())
        else {
            tracing::error!("open partition is missing its input or TMD buffer");
            self.error_status = ERROR_INVALID_COMMAND;
            return Ok(0);
        };

        let position: u32 = ctx.mem.read(input.addr + 4).context(IpcCtx::Memory)?;
        let partition = u64::from(position) << 2;

        let tmd = match ctx.disk.tmd(partition) {
            Ok(tmd) => tmd,
            Err(e) => {
                tracing::error!("unable to open partition at 0x{partition:09X}: {e}");
                self.error_status = read_error_status(&e);
                return Ok(0);
            }
        };

        tracing::info!(
            tmd_offset = tmd.offset,
            tmd_size = tmd.size,
            "opened partition at 0x{partition:09X}"
        );

        let length = tmd.size.min(tmd_buffer.len);
        match self.read(ctx, tmd.offset, tmd_buffer.addr, length, ReadMode::Raw)? {
            1 => Ok(1),
            _ => Ok(0),
        }
    }
}

#[cfg(test)]
mod test {
    use disks::Console;

    use super::*;
    use crate::ios::Buffer;
    use crate::modules::disk::{DiskModule, NopDiskModule};
    use crate::system::mem::Memory;
    use crate::test::{DiscBuilder, hex};

    const INPUT: Address = Address(0x8000_5000);
    const OUTPUT: Address = Address(0x8000_6000);

    fn ioctl(output_len: u32) -> Ioctl {
        Ioctl {
            param: 0,
            input: Buffer {
                addr: INPUT,
                len: 0x20,
            },
            output: Buffer {
                addr: OUTPUT,
                len: output_len,
            },
        }
    }

    fn command(mem: &mut Memory, words: &[u32]) {
        for (i, &word) in words.iter().enumerate() {
            mem.write(INPUT + 4 * i as u32, word).unwrap();
        }
    }

    #[test]
    fn inquiry() {
        let mut mem = Memory::new(Console::Wii);
        let mut disk = DiscBuilder::wii().build();
        let mut ctx = Context {
            mem: &mut mem,
            disk: &mut disk,
        };

        let mut di = Di::default();
        ctx.mem.fill(OUTPUT, 0x20, 0xAA).unwrap();
        command(ctx.mem, &[0x1200_0000]);

        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 1);
        insta::assert_snapshot!(
            hex(ctx.mem.slice(OUTPUT, 0x20).unwrap()),
            @"00000002 20060526 41000000 00000000 00000000 00000000 00000000 00000000"
        );
    }

    #[test]
    fn read_disk_id() {
        let mut mem = Memory::new(Console::Wii);
        let mut disk = DiscBuilder::wii().build();
        let mut expected = [0; 64];
        disk.read(0, &mut expected, ReadMode::Raw).unwrap();

        let mut ctx = Context {
            mem: &mut mem,
            disk: &mut disk,
        };

        let mut di = Di::default();
        command(ctx.mem, &[0x7000_0000]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(64)).unwrap(), 1);
        assert_eq!(ctx.mem.slice(OUTPUT, 64).unwrap(), &expected);
    }

    #[test]
    fn read_is_clamped() {
        let mut mem = Memory::new(Console::GameCube);
        let mut disk = DiscBuilder::gamecube().build();
        let mut expected = [0; 0x20];
        disk.read(0x2440, &mut expected, ReadMode::Raw).unwrap();

        let mut ctx = Context {
            mem: &mut mem,
            disk: &mut disk,
        };

        let mut di = Di::default();
        ctx.mem.fill(OUTPUT + 0x20, 0x20, 0xAA).unwrap();
        command(ctx.mem, &[0x7100_0000, 0x40, 0x2440 >> 2]);

        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 1);
        assert_eq!(ctx.mem.slice(OUTPUT, 0x20).unwrap(), &expected);
        assert!(
            ctx.mem
                .slice(OUTPUT + 0x20, 0x20)
                .unwrap()
                .iter()
                .all(|&b| b == 0xAA)
        );
    }

    #[test]
    fn unencrypted_read_windows() {
        let mut mem = Memory::new(Console::Wii);
        let mut disk = DiscBuilder::wii().build();
        let mut expected = [0; 0x40];
        disk.read(0x100, &mut expected, ReadMode::Raw).unwrap();

        let mut ctx = Context {
            mem: &mut mem,
            disk: &mut disk,
        };

        let mut di = Di::default();
        assert_eq!(di.error_status(), 0);

        command(ctx.mem, &[0x8D00_0000, 0x40, 0x100 >> 2]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x40)).unwrap(), 1);
        assert_eq!(ctx.mem.slice(OUTPUT, 0x40).unwrap(), &expected);
        assert_eq!(di.error_status(), 0);

        ctx.mem.fill(OUTPUT, 0x40, 0xAA).unwrap();
        command(ctx.mem, &[0x8D00_0000, 0x1000, 0x0100_0000]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x40)).unwrap(), 2);
        assert_eq!(di.error_status(), ERROR_BLOCK_OUT_OF_RANGE);
        assert!(ctx.mem.slice(OUTPUT, 0x40).unwrap().iter().all(|&b| b == 0));

        command(ctx.mem, &[0xE000_0000]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 1);
        assert_eq!(ctx.mem.read::<u32>(OUTPUT).unwrap(), 0x52100);

        // the status is not cleared by reading it
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 1);
        assert_eq!(ctx.mem.read::<u32>(OUTPUT).unwrap(), 0x52100);
    }

    #[test]
    fn unencrypted_read_lengths_are_bytes() {
        let mut mem = Memory::new(Console::Wii);
        let mut disk = NopDiskModule;
        let mut ctx = Context {
            mem: &mut mem,
            disk: &mut disk,
        };

        // reads inside a window reach the disk, which has nothing inserted
        let inside = ERROR_COVER | ERROR_NO_DISK;
        let cases = [
            (0x0000_0000, 0x0001_4000, inside),
            (0x0000_0000, 0x0001_4004, ERROR_BLOCK_OUT_OF_RANGE),
            (0x460A_0000, 0x08, inside),
            (0x460A_0000, 0x20, ERROR_BLOCK_OUT_OF_RANGE),
            (0x7ED4_0000, 0x08, inside),
            (0x7ED4_0004, 0x08, ERROR_BLOCK_OUT_OF_RANGE),
        ];

        for (position, length, status) in cases {
            let mut di = Di::default();
            command(ctx.mem, &[0x8D00_0000, length, position]);
            assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 2);
            assert_eq!(
                di.error_status(),
                status,
                "read of 0x{length:X} bytes at word 0x{position:08X}"
            );
        }
    }

    #[test]
    fn memory_errors_are_latched() {
        let mut mem = Memory::new(Console::GameCube);
        let mut disk = DiscBuilder::gamecube().build();
        let mut ctx = Context {
            mem: &mut mem,
            disk: &mut disk,
        };

        let mut di = Di::default();
        let unmapped = Ioctl {
            param: 0,
            input: Buffer {
                addr: INPUT,
                len: 0x20,
            },
            output: Buffer {
                addr: Address(0x9000_0000),
                len: 0x20,
            },
        };

        command(ctx.mem, &[0x7100_0000, 0x20, 0x2440 >> 2]);
        assert!(matches!(
            di.ioctl(&mut ctx, &unmapped),
            Err(IpcError::Memory { .. })
        ));
        assert_eq!(di.error_status(), ERROR_BLOCK_OUT_OF_RANGE);

        command(ctx.mem, &[0xE000_0000]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 1);
        assert_eq!(ctx.mem.read::<u32>(OUTPUT).unwrap(), 0x52100);
    }

    #[test]
    fn short_output_buffers() {
        let mut mem = Memory::new(Console::GameCube);
        let mut disk = DiscBuilder::gamecube().build();
        let mut ctx = Context {
            mem: &mut mem,
            disk: &mut disk,
        };

        let mut di = Di::default();
        for opcode in [0x7A00_0000, 0xE000_0000] {
            ctx.mem.fill(OUTPUT, 4, 0xAA).unwrap();
            command(ctx.mem, &[opcode]);
            assert_eq!(di.ioctl(&mut ctx, &ioctl(2)).unwrap(), 1);
            assert_eq!(hex(ctx.mem.slice(OUTPUT, 4).unwrap()), "0000AAAA");
        }
    }

    #[test]
    fn report_key() {
        let mut mem = Memory::new(Console::Wii);
        let mut disk = DiscBuilder::wii().build();
        let mut ctx = Context {
            mem: &mut mem,
            disk: &mut disk,
        };

        let mut di = Di::default();
        command(ctx.mem, &[0xA400_0000]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 2);
        assert_eq!(di.error_status(), ERROR_INVALID_COMMAND);
    }

    #[test]
    fn unsupported_opcodes() {
        let mut mem = Memory::new(Console::Wii);
        let mut disk = DiscBuilder::wii().build();
        let mut ctx = Context {
            mem: &mut mem,
            disk: &mut disk,
        };

        let mut di = Di::default();
        for opcode in [0x7E_u8, 0x80, 0x81, 0x82] {
            command(ctx.mem, &[u32::from(opcode) << 24]);
            assert!(matches!(
                di.ioctl(&mut ctx, &ioctl(0x20)),
                Err(IpcError::Unimplemented { opcode: o }) if o == opcode
            ));
        }

        command(ctx.mem, &[0x5500_0000]);
        assert!(matches!(
            di.ioctl(&mut ctx, &ioctl(0x20)),
            Err(IpcError::Unknown { opcode: 0x55 })
        ));
    }

    #[test]
    fn cover_and_eject() {
        let mut mem = Memory::new(Console::GameCube);
        let mut disk = DiscBuilder::gamecube().build();
        let mut ctx = Context {
            mem: &mut mem,
            disk: &mut disk,
        };

        let mut di = Di::default();
        command(ctx.mem, &[0x7A00_0000]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 1);
        assert_eq!(ctx.mem.read::<u32>(OUTPUT).unwrap(), 0xFEFE_FEFE);

        command(ctx.mem, &[0x7900_0000]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 4);

        command(ctx.mem, &[0xE300_0000, 0]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 1);
        assert!(ctx.disk.has_disk());

        command(ctx.mem, &[0xE300_0000, 1]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 1);
        assert!(!ctx.disk.has_disk());

        command(ctx.mem, &[0x7A00_0000]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 1);
        assert_eq!(ctx.mem.read::<u32>(OUTPUT).unwrap(), 0);

        command(ctx.mem, &[0x7000_0000]);
        assert_eq!(di.ioctl(&mut ctx, &ioctl(0x20)).unwrap(), 2);
        assert_eq!(di.error_status(), ERROR_COVER | ERROR_NO_DISK);
    }
}
