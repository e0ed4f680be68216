// Shared FAT12 on-disk layout: offsets, boot sector builder, FAT initialisation

pub mod boot_sector;
pub mod constants;
pub mod fat_init;

pub use boot_sector::{build_fat12_boot_sector, FatBootSectorParams};
pub use constants::*;
pub use fat_init::{init_fat12_table, write_fat_tables};
