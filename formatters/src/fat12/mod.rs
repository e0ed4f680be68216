// FAT12 floppy module - geometry table and formatter

pub mod formatter;
pub mod geometry;

pub use formatter::Fat12Formatter;
pub use geometry::FloppyGeometry;
