/// Size of the MBR sector
pub const SECTOR_SIZE: usize = 512;
/// Offset of the first partition table entry
pub const PARTITION_TABLE_OFFSET: usize = 0x1BE;
/// Size of one partition table entry
pub const PARTITION_ENTRY_SIZE: usize = 0x10;
/// Number of primary entries in the table
pub const MAX_PRIMARY_PARTITIONS: usize = 4;
/// Offset of the two signature bytes
pub const SIGNATURE_OFFSET: usize = 0x1FE;
/// Expected signature bytes
pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Entry field offsets
const ENTRY_STATUS: usize = 0x00;
const ENTRY_TYPE: usize = 0x04;
const ENTRY_START_BLOCK: usize = 0x08;
const ENTRY_BLOCK_COUNT: usize = 0x0C;

/// MBR partition table entry
///
/// CHS fields are ignored, only the LBA fields are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    /// Slot in the table (0-3)
    pub index: usize,
    /// Boot indicator, carried as-is
    pub status: u8,
    /// Partition type code (0 = unused)
    pub partition_type: u8,
    /// First block of the partition on the parent device
    pub start_block: u32,
    /// Number of blocks in the partition
    pub block_count: u32,
}

impl PartitionEntry {
    fn parse(index: usize, raw: &[u8]) -> Self {
        Self {
            index,
            status: raw[ENTRY_STATUS],
            partition_type: raw[ENTRY_TYPE],
            start_block: read_u32_le(raw, ENTRY_START_BLOCK),
            block_count: read_u32_le(raw, ENTRY_BLOCK_COUNT),
        }
    }

    /// An entry with type code 0 is an empty slot
    pub fn is_used(&self) -> bool {
        self.partition_type != 0
    }
}

/// View over sector 0 of a device
#[derive(Clone)]
pub struct MbrSector {
    bytes: [u8; SECTOR_SIZE],
}

impl MbrSector {
    pub fn new(bytes: [u8; SECTOR_SIZE]) -> Self {
        Self { bytes }
    }

    /// Copy the first sector out of a larger buffer
    ///
    /// Returns `None` when `data` is shorter than a sector.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let mut bytes = [0u8; SECTOR_SIZE];
        bytes.copy_from_slice(data.get(..SECTOR_SIZE)?);
        Some(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; SECTOR_SIZE] {
        &self.bytes
    }

    /// The two bytes at 0x1FE/0x1FF
    pub fn signature(&self) -> [u8; 2] {
        [self.bytes[SIGNATURE_OFFSET], self.bytes[SIGNATURE_OFFSET + 1]]
    }

    pub fn has_valid_signature(&self) -> bool {
        self.signature() == BOOT_SIGNATURE
    }

    /// Decode the table entry in slot `index`, `None` past the fourth slot
    pub fn entry(&self, index: usize) -> Option<PartitionEntry> {
        if index >= MAX_PRIMARY_PARTITIONS {
            return None;
        }
        let offset = PARTITION_TABLE_OFFSET + index * PARTITION_ENTRY_SIZE;
        let raw = &self.bytes[offset..offset + PARTITION_ENTRY_SIZE];
        Some(PartitionEntry::parse(index, raw))
    }

    /// All four slots in table order, empty ones included
    pub fn entries(&self) -> impl Iterator<Item = PartitionEntry> + '_ {
        (0..MAX_PRIMARY_PARTITIONS).filter_map(move |index| self.entry(index))
    }

    /// Used slots in table order
    pub fn partitions(&self) -> impl Iterator<Item = PartitionEntry> + '_ {
        self.entries().filter(PartitionEntry::is_used)
    }
}

impl core::fmt::Debug for MbrSector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MbrSector")
            .field("signature", &self.signature())
            .field("entries", &[self.entry(0), self.entry(1), self.entry(2), self.entry(3)])
            .finish()
    }
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
