// FAT12 filesystem constants

// Boot sector offsets
pub const BS_JMP_BOOT: usize = 0x00;
pub const BS_OEM_NAME: usize = 0x03;
pub const BPB_BYTES_PER_SEC: usize = 0x0B;
pub const BPB_SEC_PER_CLUS: usize = 0x0D;
pub const BPB_RSVD_SEC_CNT: usize = 0x0E;
pub const BPB_NUM_FATS: usize = 0x10;
pub const BPB_ROOT_ENT_CNT: usize = 0x11;
pub const BPB_TOT_SEC16: usize = 0x13;
pub const BPB_MEDIA: usize = 0x15;
pub const BPB_FAT_SZ16: usize = 0x16;
pub const BPB_SEC_PER_TRK: usize = 0x18;
pub const BPB_NUM_HEADS: usize = 0x1A;
pub const BPB_HIDD_SEC: usize = 0x1C;
pub const BPB_TOT_SEC32: usize = 0x20;

// Extended BPB, same offsets as FAT16
pub const BS_DRV_NUM: usize = 0x24;
pub const BS_RESERVED1: usize = 0x25;
pub const BS_BOOT_SIG: usize = 0x26;
pub const BS_VOL_ID: usize = 0x27;
pub const BS_VOL_LAB: usize = 0x2B;
pub const BS_FIL_SYS_TYPE: usize = 0x36;

// Boot sector signature
pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];
pub const BOOT_SIGNATURE_OFFSET: usize = 0x1FE;
pub const SECTOR_SIZE: usize = 512;

// FAT12 entry values
pub const FAT12_FREE: u16 = 0x000;
pub const FAT12_BAD: u16 = 0xFF7;
pub const FAT12_EOC: u16 = 0xFFF;  // Written as end of chain
pub const FAT12_EOC_MIN: u16 = 0xFF8;  // Anything at or above ends a chain

// Cluster count threshold
pub const FAT12_MAX_CLUSTERS: u32 = 4084;

// Directory entries
pub const DIR_ENTRY_SIZE: usize = 32;
pub const DIR_ENTRY_FREE: u8 = 0x00;
pub const DIR_ENTRY_DELETED: u8 = 0xE5;
