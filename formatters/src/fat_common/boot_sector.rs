// Boot sector builder for FAT12 floppies

use super::constants::*;
use crate::fat12::FloppyGeometry;

/// Boot sector fields that are not part of the floppy geometry
#[derive(Debug, Clone)]
pub struct FatBootSectorParams {
    pub oem_name: [u8; 8],
    pub drive_number: u8,
    pub volume_serial: u32,
    pub volume_label: [u8; 11],
}

impl Default for FatBootSectorParams {
    fn default() -> Self {
        Self {
            oem_name: *b"MSWIN4.1",
            drive_number: 0x00,  // First floppy drive
            volume_serial: 0,
            volume_label: *b"NO NAME    ",
        }
    }
}

impl FatBootSectorParams {
    /// Space-pad and uppercase a label into the 11-byte field
    pub fn with_label(mut self, label: &str) -> Self {
        let mut bytes = [b' '; 11];
        for (dst, src) in bytes.iter_mut().zip(label.to_uppercase().bytes()) {
            *dst = src;
        }
        self.volume_label = bytes;
        self
    }
}

/// Build a FAT12 boot sector carrying `geometry` in its BPB
pub fn build_fat12_boot_sector(params: &FatBootSectorParams, geometry: &FloppyGeometry) -> [u8; 512] {
    let mut boot_sector = [0u8; 512];
    
    // Jump over the BPB, then NOP
    boot_sector[BS_JMP_BOOT] = 0xEB;
    boot_sector[BS_JMP_BOOT + 1] = 0x3C;
    boot_sector[BS_JMP_BOOT + 2] = 0x90;
    
    boot_sector[BS_OEM_NAME..BS_OEM_NAME + 8].copy_from_slice(&params.oem_name);
    
    boot_sector[BPB_BYTES_PER_SEC..BPB_BYTES_PER_SEC + 2]
        .copy_from_slice(&geometry.bytes_per_sector.to_le_bytes());
    boot_sector[BPB_SEC_PER_CLUS] = geometry.sectors_per_cluster;
    boot_sector[BPB_RSVD_SEC_CNT..BPB_RSVD_SEC_CNT + 2]
        .copy_from_slice(&geometry.reserved_sectors.to_le_bytes());
    boot_sector[BPB_NUM_FATS] = geometry.num_fats;
    boot_sector[BPB_ROOT_ENT_CNT..BPB_ROOT_ENT_CNT + 2]
        .copy_from_slice(&geometry.root_entries.to_le_bytes());
    boot_sector[BPB_TOT_SEC16..BPB_TOT_SEC16 + 2]
        .copy_from_slice(&geometry.total_sectors.to_le_bytes());
    boot_sector[BPB_MEDIA] = geometry.media_descriptor;
    boot_sector[BPB_FAT_SZ16..BPB_FAT_SZ16 + 2]
        .copy_from_slice(&geometry.sectors_per_fat.to_le_bytes());
    boot_sector[BPB_SEC_PER_TRK..BPB_SEC_PER_TRK + 2]
        .copy_from_slice(&geometry.sectors_per_track.to_le_bytes());
    boot_sector[BPB_NUM_HEADS..BPB_NUM_HEADS + 2]
        .copy_from_slice(&geometry.num_heads.to_le_bytes());
    // Hidden sectors and 32-bit total stay zero on a floppy
    
    boot_sector[BS_DRV_NUM] = params.drive_number;
    boot_sector[BS_RESERVED1] = 0;
    boot_sector[BS_BOOT_SIG] = 0x29;  // Extended boot signature
    boot_sector[BS_VOL_ID..BS_VOL_ID + 4]
        .copy_from_slice(&params.volume_serial.to_le_bytes());
    boot_sector[BS_VOL_LAB..BS_VOL_LAB + 11]
        .copy_from_slice(&params.volume_label);
    boot_sector[BS_FIL_SYS_TYPE..BS_FIL_SYS_TYPE + 8]
        .copy_from_slice(b"FAT12   ");
    
    boot_sector[BOOT_SIGNATURE_OFFSET..BOOT_SIGNATURE_OFFSET + 2]
        .copy_from_slice(&BOOT_SIGNATURE);
    
    boot_sector
}
