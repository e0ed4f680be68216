// Standard floppy geometries

/// BIOS parameter block values for one standard floppy format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloppyGeometry {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entries: u16,
    pub total_sectors: u16,
    pub media_descriptor: u8,
    pub sectors_per_fat: u16,
    pub sectors_per_track: u16,
    pub num_heads: u16,
}

const fn geometry(
    sectors_per_cluster: u8,
    root_entries: u16,
    total_sectors: u16,
    media_descriptor: u8,
    sectors_per_fat: u16,
    sectors_per_track: u16,
) -> FloppyGeometry {
    FloppyGeometry {
        bytes_per_sector: 512,
        sectors_per_cluster,
        reserved_sectors: 1,
        num_fats: 2,
        root_entries,
        total_sectors,
        media_descriptor,
        sectors_per_fat,
        sectors_per_track,
        num_heads: 2,
    }
}

/// 360K, 720K, 1.2M, 1.44M and 2.88M
pub const STANDARD_GEOMETRIES: [FloppyGeometry; 5] = [
    geometry(2, 112, 720, 0xFD, 2, 9),
    geometry(2, 112, 1440, 0xF9, 3, 9),
    geometry(1, 224, 2400, 0xF9, 7, 15),
    geometry(1, 224, 2880, 0xF0, 9, 18),
    geometry(2, 240, 5760, 0xF0, 9, 36),
];

impl FloppyGeometry {
    /// Look up the standard geometry for an image of `size` bytes
    pub fn for_size(size: u64) -> Option<FloppyGeometry> {
        STANDARD_GEOMETRIES
            .iter()
            .copied()
            .find(|g| g.size_bytes() == size)
    }
    
    pub fn size_bytes(&self) -> u64 {
        self.total_sectors as u64 * self.bytes_per_sector as u64
    }
    
    pub fn root_dir_sectors(&self) -> u32 {
        (self.root_entries as u32 * 32).div_ceil(self.bytes_per_sector as u32)
    }
    
    pub fn first_data_sector(&self) -> u32 {
        self.reserved_sectors as u32
            + self.num_fats as u32 * self.sectors_per_fat as u32
            + self.root_dir_sectors()
    }
    
    pub fn cluster_count(&self) -> u32 {
        (self.total_sectors as u32 - self.first_data_sector()) / self.sectors_per_cluster as u32
    }
}
