pub mod boot_patch;
pub mod fat_common;
pub mod fat12;

pub use boot_patch::{patch, patch_image};
pub use fat12::{Fat12Formatter, FloppyGeometry};
