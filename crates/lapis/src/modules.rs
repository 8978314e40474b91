//! Modules are the interfaces between the emulated system and the outside world.

pub mod disk;
pub mod files;
pub mod patch;
