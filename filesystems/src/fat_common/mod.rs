// Directory entry and timestamp handling shared by the FAT12 populator

pub mod directory;
pub mod timestamps;

pub use directory::{format_83_name, parse_83_name, DirEntry, FatAttributes};
pub use timestamps::EntryTimestamps;
