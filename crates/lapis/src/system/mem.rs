//! Guest memory.
//!
//! Addresses are translated using the default BAT setup used by the IPL and the OS: the upper two
//! bits select between the physical, cached (`0x8000_0000`) and uncached (`0xC000_0000`) views of
//! the same physical memory.
use disks::Console;
use easyerr::Error;
use gekko::Address;

use crate::Primitive;

/// Length of MEM1, the internal RAM of both consoles.
pub const RAM_LEN: u32 = 0x0180_0000;
/// Physical base address of MEM2.
pub const MEM2_BASE: u32 = 0x1000_0000;
/// Length of MEM2, the external RAM of the Wii.
pub const MEM2_LEN: u32 = 0x0400_0000;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("access of 0x{length:X} bytes at {address} is outside of mapped memory")]
    Unmapped { address: Address, length: u32 },
}

/// System memory.
pub struct Memory {
    ram: Box<[u8]>,
    mem2: Option<Box<[u8]>>,
}

impl Memory {
    /// Creates zeroed memory for the given console. MEM2 only exists on the Wii.
    pub fn new(console: Console) -> Self {
        Self {
            ram: vec![0; RAM_LEN as usize].into_boxed_slice(),
            mem2: (console == Console::Wii).then(|| vec![0; MEM2_LEN as usize].into_boxed_slice()),
        }
    }

    #[inline(always)]
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    #[inline(always)]
    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }

    #[inline(always)]
    pub fn mem2(&self) -> Option<&[u8]> {
        self.mem2.as_deref()
    }

    /// Whether MEM2 is present.
    pub fn has_mem2(&self) -> bool {
        self.mem2.is_some()
    }

    /// Zeroes all of memory.
    pub fn clear(&mut self) {
        self.ram.fill(0);
        if let Some(mem2) = &mut self.mem2 {
            mem2.fill(0);
        }
    }

    /// Finds the backing region and offset of `length` bytes at `addr`.
    fn locate(&self, addr: Address, length: u32) -> Option<(bool, usize)> {
        let phys = addr.physical().value();
        let end = phys.checked_add(length)?;

        if end <= RAM_LEN {
            return Some((false, phys as usize));
        }

        if self.mem2.is_some() && phys >= MEM2_BASE && end <= MEM2_BASE + MEM2_LEN {
            return Some((true, (phys - MEM2_BASE) as usize));
        }

        None
    }

    /// Returns the `length` bytes at `addr`.
    pub fn slice(&self, addr: Address, length: u32) -> Result<&[u8], MemoryError> {
        let (is_mem2, offset) = self.locate(addr, length).ok_or(MemoryError::Unmapped {
            address: addr,
            length,
        })?;

        let region = match (is_mem2, &self.mem2) {
            (true, Some(mem2)) => mem2,
            _ => &self.ram,
        };

        Ok(&region[offset..][..length as usize])
    }

    /// Returns the `length` bytes at `addr`, mutably.
    pub fn slice_mut(&mut self, addr: Address, length: u32) -> Result<&mut [u8], MemoryError> {
        let (is_mem2, offset) = self.locate(addr, length).ok_or(MemoryError::Unmapped {
            address: addr,
            length,
        })?;

        let region = match (is_mem2, &mut self.mem2) {
            (true, Some(mem2)) => mem2,
            _ => &mut self.ram,
        };

        Ok(&mut region[offset..][..length as usize])
    }

    /// Reads a primitive from the given address.
    pub fn read<P: Primitive>(&self, addr: Address) -> Result<P, MemoryError> {
        self.slice(addr, P::SIZE as u32).map(P::read_be_bytes)
    }

    /// Writes a primitive to the given address.
    pub fn write<P: Primitive>(&mut self, addr: Address, value: P) -> Result<(), MemoryError> {
        value.write_be_bytes(self.slice_mut(addr, P::SIZE as u32)?);
        Ok(())
    }

    /// Fills `length` bytes at `addr` with `value`.
    pub fn fill(&mut self, addr: Address, length: u32, value: u8) -> Result<(), MemoryError> {
        self.slice_mut(addr, length)?.fill(value);
        Ok(())
    }

    /// Copies `data` to `addr`.
    pub fn write_bytes(&mut self, addr: Address, data: &[u8]) -> Result<(), MemoryError> {
        self.slice_mut(addr, data.len() as u32)?
            .copy_from_slice(data);
        Ok(())
    }

    /// Reads a null terminated string of at most `max` bytes at `addr`.
    pub fn read_cstr(&self, addr: Address, max: u32) -> Result<String, MemoryError> {
        let mut bytes = Vec::new();
        for i in 0..max {
            let byte: u8 = self.read(addr + i)?;
            if byte == 0 {
                break;
            }

            bytes.push(byte);
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
