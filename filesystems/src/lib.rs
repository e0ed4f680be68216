// FAT12 volume population: open a formatted image, append files to its root directory

pub mod fat_common;
pub mod fat12;

pub use fat_common::{DirEntry, EntryTimestamps, FatAttributes};
pub use fat12::{Fat12Volume, FileHandle};
