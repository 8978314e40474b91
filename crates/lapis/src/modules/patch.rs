//! Patch module.
//!
//! Patches are small memory writes applied to a game right before it starts executing, keyed by
//! the game's unique identifier.
use std::path::PathBuf;

use gekko::Address;
use serde::{Deserialize, Serialize};

use crate::system::mem::{Memory, MemoryError};

/// A value written by a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchValue {
    U8(u8),
    U16(u16),
    U32(u32),
}

/// A single write of a patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub address: u32,
    pub value: PatchValue,
}

/// A named group of writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub name: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    pub entries: Vec<PatchEntry>,
}

fn enabled_default() -> bool {
    true
}

impl Patch {
    /// Applies the writes of this patch to memory.
    pub fn apply(&self, mem: &mut Memory) -> Result<(), MemoryError> {
        for entry in &self.entries {
            let addr = Address(entry.address);
            match entry.value {
                PatchValue::U8(value) => mem.write(addr, value)?,
                PatchValue::U16(value) => mem.write(addr, value)?,
                PatchValue::U32(value) => mem.write(addr, value)?,
            }
        }

        Ok(())
    }
}

/// Trait for patch modules.
pub trait PatchModule: Send {
    /// Loads the patches of the game with the given unique identifier, replacing any previously
    /// loaded ones.
    fn load(&mut self, game_id: &str);

    /// Patches which must be applied on startup.
    fn startup(&self) -> &[Patch];
}

/// An implementation of [`PatchModule`] which never has patches.
#[derive(Debug, Clone, Copy)]
pub struct NopPatchModule;

impl PatchModule for NopPatchModule {
    fn load(&mut self, _: &str) {}

    fn startup(&self) -> &[Patch] {
        &[]
    }
}

/// A [`PatchModule`] which loads patches from `<dir>/<game id>.ron` files.
#[derive(Debug, Clone)]
pub struct RonPatchModule {
    dir: PathBuf,
    patches: Vec<Patch>,
}

impl RonPatchModule {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            patches: Vec::new(),
        }
    }

    /// All loaded patches, enabled or not.
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }
}

impl PatchModule for RonPatchModule {
    fn load(&mut self, game_id: &str) {
        self.patches.clear();

        let path = self.dir.join(format!("{game_id}.ron"));
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("no patches loaded from {}: {e}", path.display());
                return;
            }
        };

        match ron::from_str::<Vec<Patch>>(&content) {
            Ok(patches) => {
                tracing::info!("loaded {} patches for {game_id}", patches.len());
                self.patches = patches;
            }
            Err(e) => tracing::error!("failed to parse {}: {e}", path.display()),
        }
    }

    fn startup(&self) -> &[Patch] {
        &self.patches
    }
}
