//! Structures found in GameCube and Wii disc images.

pub mod apploader;
pub mod iso;
pub mod wii;

#[rustfmt::skip]
pub use binrw;

/// The console a disc is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    GameCube,
    Wii,
}
