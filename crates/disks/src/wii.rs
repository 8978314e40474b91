//! Wii disc partitions.
//!
//! Wii discs are split into partitions, each one carrying its own ticket, title metadata (TMD)
//! and encrypted data area. Offsets stored in these structures are divided by four.
use std::io::{Read, Seek, SeekFrom};

use binrw::{BinRead, BinResult};

/// Offset of the partition table info in the disc.
pub const PARTITION_INFO_OFFSET: u64 = 0x0004_0000;
/// Maximum amount of partitions accepted in a single group.
pub const MAX_GROUP_PARTITIONS: u32 = 0x40;

fn shifted(value: u32) -> u64 {
    (value as u64) << 2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Data,
    Update,
    Channel,
    Other(u32),
}

impl From<u32> for PartitionKind {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Data,
            1 => Self::Update,
            2 => Self::Channel,
            _ => Self::Other(value),
        }
    }
}

#[derive(Debug, Clone, Copy, BinRead)]
#[br(big)]
struct Group {
    count: u32,
    #[br(map = shifted)]
    offset: u64,
}

/// An entry of the partition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(big)]
pub struct Partition {
    /// Offset of the partition in the disc.
    #[br(map = shifted)]
    pub offset: u64,
    #[br(map = |kind: u32| PartitionKind::from(kind))]
    pub kind: PartitionKind,
}

/// Reads the partition table of a Wii disc, all four groups flattened.
pub fn partitions<R: Read + Seek>(reader: &mut R) -> BinResult<Vec<Partition>> {
    reader.seek(SeekFrom::Start(PARTITION_INFO_OFFSET))?;
    let groups = <[Group; 4]>::read_be(reader)?;

    let mut partitions = Vec::new();
    for group in groups {
        if group.count == 0 {
            continue;
        }

        if group.count > MAX_GROUP_PARTITIONS {
            return Err(binrw::Error::AssertFail {
                pos: PARTITION_INFO_OFFSET,
                message: format!("partition group has too many entries ({})", group.count),
            });
        }

        reader.seek(SeekFrom::Start(group.offset))?;
        for _ in 0..group.count {
            partitions.push(Partition::read(reader)?);
        }
    }

    Ok(partitions)
}

/// The header of a partition. The ticket is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(big)]
pub struct PartitionHeader {
    #[br(pad_before = 0x2A4)]
    pub tmd_size: u32,
    #[br(map = shifted)]
    pub tmd_offset: u64,
    pub cert_chain_size: u32,
    #[br(map = shifted)]
    pub cert_chain_offset: u64,
    #[br(map = shifted)]
    pub h3_offset: u64,
    #[br(map = shifted)]
    pub data_offset: u64,
    #[br(map = shifted)]
    pub data_size: u64,
}

/// Location of the title metadata of a partition, in absolute disc offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmdLocation {
    pub offset: u64,
    pub size: u32,
}

impl PartitionHeader {
    /// Reads the header of the partition at the given disc offset.
    pub fn read_at<R: Read + Seek>(reader: &mut R, partition: u64) -> BinResult<Self> {
        reader.seek(SeekFrom::Start(partition))?;
        Self::read(reader)
    }

    /// Where the TMD of the partition starting at `partition` is located.
    pub fn tmd(&self, partition: u64) -> TmdLocation {
        TmdLocation {
            offset: partition + self.tmd_offset,
            size: self.tmd_size,
        }
    }
}
