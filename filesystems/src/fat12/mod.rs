// FAT12 module - allocation table and root-directory populator

pub mod fat_table;
pub mod volume;

pub use fat_table::Fat12Table;
pub use volume::{Fat12Volume, FileHandle};
