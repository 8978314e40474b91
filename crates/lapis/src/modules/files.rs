//! System files module.
//!
//! Provides the files the Wii boot process needs which are not part of the disk: the per-region
//! `setting.txt` of the system menu and an optional dump of low memory.
use std::path::PathBuf;

use disks::iso::Region;

/// Size of the low memory dump.
pub const MEMORY_DUMP_LEN: usize = 0x4000;
/// Size of the settings blob.
pub const SETTINGS_LEN: usize = 0x100;

/// Name of the settings file for the given region.
pub fn settings_name(region: Region) -> &'static str {
    match region {
        Region::Japan => "setting-jpn.txt",
        Region::Usa => "setting-usa.txt",
        Region::Pal => "setting-eur.txt",
        Region::Korea => "setting-kor.txt",
    }
}

/// Trait for system files modules.
pub trait FilesModule: Send {
    /// Returns the contents of the settings file for the given region, if it exists.
    fn settings(&mut self, region: Region) -> Option<Vec<u8>>;

    /// Returns the contents of the low memory dump (`dump_0x0000_0x4000.bin`), if it exists.
    fn memory_dump(&mut self) -> Option<Vec<u8>>;
}

/// An implementation of [`FilesModule`] which has no files.
#[derive(Debug, Clone, Copy)]
pub struct NopFilesModule;

impl FilesModule for NopFilesModule {
    fn settings(&mut self, _: Region) -> Option<Vec<u8>> {
        None
    }

    fn memory_dump(&mut self) -> Option<Vec<u8>> {
        None
    }
}

/// A [`FilesModule`] which reads files from the `Wii` subdirectory of a user directory.
#[derive(Debug, Clone)]
pub struct DirFilesModule {
    root: PathBuf,
}

impl DirFilesModule {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn load(&self, name: &str) -> Option<Vec<u8>> {
        let path = self.root.join("Wii").join(name);
        match std::fs::read(&path) {
            Ok(data) => {
                tracing::debug!("loaded {}", path.display());
                Some(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::error!("failed to read {}: {e}", path.display());
                None
            }
        }
    }
}

impl FilesModule for DirFilesModule {
    fn settings(&mut self, region: Region) -> Option<Vec<u8>> {
        self.load(settings_name(region))
    }

    fn memory_dump(&mut self) -> Option<Vec<u8>> {
        self.load("dump_0x0000_0x4000.bin")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn directory() {
        let root = std::env::temp_dir().join(format!("lapis-files-{}", std::process::id()));
        std::fs::create_dir_all(root.join("Wii")).unwrap();
        std::fs::write(root.join("Wii/setting-usa.txt"), [0xAA; SETTINGS_LEN]).unwrap();

        let mut files = DirFilesModule::new(&root);
        assert_eq!(files.settings(Region::Usa), Some(vec![0xAA; SETTINGS_LEN]));
        assert_eq!(files.settings(Region::Japan), None);
        assert_eq!(files.memory_dump(), None);

        std::fs::remove_dir_all(root).unwrap();
    }
}
