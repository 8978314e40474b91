//! Interfaces to the execution cores of the emulator.
use gekko::{Address, Cycles};

use crate::system::System;

/// Information about an execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct Executed {
    /// How many instructions were executed.
    pub instructions: u64,
    /// How many cycles were executed.
    pub cycles: Cycles,
    /// Whether execution stopped because a breakpoint was hit.
    pub hit_breakpoint: bool,
}

/// Trait for CPU cores.
pub trait CpuCore: Send {
    /// Executes instructions until the given amount of cycles has passed or one of the
    /// breakpoints is reached.
    fn exec(&mut self, sys: &mut System, cycles: Cycles, breakpoints: &[Address]) -> Executed;

    /// Executes a single instruction.
    fn step(&mut self, sys: &mut System) -> Executed;
}

/// The cores of the emulator.
pub struct Cores {
    pub cpu: Box<dyn CpuCore>,
}
