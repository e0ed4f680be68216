// FAT table initialization for FAT12

use std::io::{Result, Seek, SeekFrom, Write};

/// Initialize a FAT12 table with its reserved entries
/// 
/// The first two FAT12 entries are reserved and pack into three bytes:
/// - FAT[0] = 0xF00 | media_descriptor
/// - FAT[1] = 0xFFF (end of chain marker)
pub fn init_fat12_table(fat_data: &mut [u8], media_descriptor: u8) {
    assert!(fat_data.len() >= 3, "FAT12 table must be at least 3 bytes");
    
    fat_data.fill(0);
    fat_data[0] = media_descriptor;
    fat_data[1] = 0xFF;
    fat_data[2] = 0xFF;
}

/// Write every FAT copy, padding `fat_data` with zeros up to the FAT size
pub fn write_fat_tables<W: Write + Seek>(
    device: &mut W,
    fat_data: &[u8],
    fat_start_sector: u64,
    sectors_per_fat: u32,
    num_fats: u8,
    bytes_per_sector: u32,
) -> Result<()> {
    let fat_size_bytes = (sectors_per_fat * bytes_per_sector) as usize;
    
    for i in 0..num_fats {
        let fat_offset = fat_start_sector * bytes_per_sector as u64 + 
                        i as u64 * fat_size_bytes as u64;
        device.seek(SeekFrom::Start(fat_offset))?;
        
        if fat_data.len() >= fat_size_bytes {
            device.write_all(&fat_data[..fat_size_bytes])?;
        } else {
            device.write_all(fat_data)?;
            device.write_all(&vec![0u8; fat_size_bytes - fat_data.len()])?;
        }
    }
    
    Ok(())
}
