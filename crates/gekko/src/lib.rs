//! Register file of the Gekko (GameCube) and Broadway (Wii) CPUs, as seen by high level
//! emulation code.

use bitos::bitos;
use strum::{FromRepr, VariantArray};
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// An address in the CPU's memory address space. This is a thin wrapper around an [`u32`].
#[repr(transparent)]
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, IntoBytes, FromBytes, Immutable,
)]
pub struct Address(pub u32);

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "0x{:04X}_{:04X}",
            (self.0 & 0xFFFF_0000) >> 16,
            self.0 & 0xFFFF
        )
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Address {
    /// Returns the value of this address. Equivalent to `self.0`.
    #[inline(always)]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether this address is null.
    #[inline(always)]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the physical address this address maps to when address translation uses the
    /// default BAT setup (i.e. `0x8000_0000` cached and `0xC000_0000` uncached mirrors).
    #[inline(always)]
    pub const fn physical(self) -> Self {
        Self(self.0 & 0x3FFF_FFFF)
    }
}

impl std::ops::Add<u32> for Address {
    type Output = Self;

    #[inline(always)]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0.wrapping_add(rhs))
    }
}

impl PartialEq<u32> for Address {
    #[inline(always)]
    fn eq(&self, other: &u32) -> bool {
        self.0 == *other
    }
}

/// A budget of CPU cycles handed to a core.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, IntoBytes, FromBytes)]
pub struct Cycles(pub u64);

impl std::fmt::Display for Cycles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An exception which can be generated by the CPU. The variants have the lower 16 bits of the
/// exception vector as their values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Exception {
    Reset              = 0x0100,
    MachineCheck       = 0x0200,
    DSI                = 0x0300,
    ISI                = 0x0400,
    Interrupt          = 0x0500,
    Alignment          = 0x0600,
    Program            = 0x0700,
    FloatUnavailable   = 0x0800,
    Decrementer        = 0x0900,
    Syscall            = 0x0C00,
    Trace              = 0x0D00,
    PerformanceMonitor = 0x0F00,
    Breakpoint         = 0x1300,
}

impl Exception {
    /// The physical address of this exception's vector when MSR[IP] is clear.
    #[inline(always)]
    pub const fn vector(self) -> Address {
        Address(self as u32)
    }
}

/// Encoding of `rfi`.
pub const INS_RFI: u32 = 0x4C00_0064;

/// Encoding of `blr`.
pub const INS_BLR: u32 = 0x4E80_0020;

/// The Machine State register.
#[bitos(32)]
#[derive(Debug, Clone, PartialEq)]
pub struct MachineState {
    /// Whether little endian mode is turned on. Not supported.
    #[bits(0)]
    pub little_endian: bool,
    /// Whether the last exception is recoverable.
    #[bits(1)]
    pub recoverable_exception: bool,
    /// Whether data address translation is enabled.
    #[bits(4)]
    pub data_addr_translation: bool,
    /// Whether instruction address translation is enabled.
    #[bits(5)]
    pub instr_addr_translation: bool,
    /// Whether exception vectors are at 0x0000_nnnn (off) or 0xFFF0_nnnn (on).
    #[bits(6)]
    pub exception_prefix: bool,
    /// Whether machine check exceptions are enabled.
    #[bits(12)]
    pub machine_check: bool,
    /// Whether floating point instructions can be used.
    #[bits(13)]
    pub float_available: bool,
    /// Whether the processor is running in user mode.
    #[bits(14)]
    pub user_mode: bool,
    /// Whether external exceptions are enabled.
    #[bits(15)]
    pub interrupts: bool,
}

impl Default for MachineState {
    fn default() -> Self {
        Self(0).with_exception_prefix(true)
    }
}

/// User level registers.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct User {
    /// General Purpose Registers
    pub gpr: [u32; 32],
    /// Link Register
    pub lr: u32,
}

/// Configuration registers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Configuration {
    /// Machine State Register
    pub msr: MachineState,
}

/// Supervisor level registers.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Supervisor {
    /// Configuration registers
    pub config: Configuration,
}

/// Structure of the registers of the CPU that high level emulation cares about.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cpu {
    /// Program Counter
    pub pc: Address,
    /// User level registers
    pub user: User,
    /// Supervisor level registers
    pub supervisor: Supervisor,
}

impl Cpu {
    /// Reads a general purpose register.
    #[inline(always)]
    pub fn gpr(&self, reg: GPR) -> u32 {
        self.user.gpr[reg as usize]
    }

    /// Writes a general purpose register.
    #[inline(always)]
    pub fn set_gpr(&mut self, reg: GPR, value: u32) {
        self.user.gpr[reg as usize] = value;
    }

    /// Sets up arguments for a call following the EABI, starting at R3.
    pub fn set_args(&mut self, args: &[u32]) {
        assert!(args.len() <= 8, "at most 8 arguments are passed in registers");
        for (arg, value) in GPR::VARIANTS[3..].iter().zip(args) {
            self.set_gpr(*arg, *value);
        }
    }

    /// Prepares a call to `target` which returns to address zero.
    pub fn prepare_call(&mut self, target: Address) {
        self.pc = target;
        self.user.lr = 0;
    }
}

/// A General Purpose Register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, VariantArray)]
#[repr(u8)]
pub enum GPR {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    R16,
    R17,
    R18,
    R19,
    R20,
    R21,
    R22,
    R23,
    R24,
    R25,
    R26,
    R27,
    R28,
    R29,
    R30,
    R31,
}

impl GPR {
    /// The stack pointer.
    pub const SP: Self = Self::R1;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn physical_mirrors() {
        assert_eq!(Address(0x8000_3100).physical(), Address(0x3100));
        assert_eq!(Address(0xC120_0000).physical(), Address(0x0120_0000));
        assert_eq!(Address(0x9000_0800).physical(), Address(0x1000_0800));
    }

    #[test]
    fn call_arguments() {
        let mut cpu = Cpu::default();
        cpu.user.lr = 0x8000_1234;
        cpu.set_args(&[0x8130_0004, 0x8130_0008, 0x8130_000C]);
        cpu.prepare_call(Address(0x8120_0000));

        assert_eq!(cpu.gpr(GPR::R3), 0x8130_0004);
        assert_eq!(cpu.gpr(GPR::R4), 0x8130_0008);
        assert_eq!(cpu.gpr(GPR::R5), 0x8130_000C);
        assert_eq!(cpu.pc, 0x8120_0000);
        assert_eq!(cpu.user.lr, 0);
    }

    #[test]
    fn float_available() {
        let mut msr = MachineState::default();
        assert!(!msr.float_available());
        msr.set_float_available(true);
        assert!(msr.float_available());
        assert!(msr.exception_prefix());
    }

    #[test]
    fn vectors() {
        assert_eq!(Exception::DSI.vector(), Address(0x300));
        assert_eq!(Exception::FloatUnavailable.vector(), Address(0x800));
        assert_eq!(Exception::Syscall.vector(), Address(0xC00));
    }
}
