// Short (8.3) directory entries

use bootfloppy_core::{BuildError, BuildResult};
use bootfloppy_formatters::fat_common::{DIR_ENTRY_DELETED, DIR_ENTRY_FREE, DIR_ENTRY_SIZE};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::ops::BitOr;

/// DOS attribute byte of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FatAttributes(pub u8);

impl FatAttributes {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const VOLUME_ID: u8 = 0x08;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;
    pub const LFN: u8 = 0x0F;
    
    /// Kernel and application binaries
    pub const BUILT: FatAttributes = FatAttributes(Self::HIDDEN | Self::SYSTEM | Self::READ_ONLY);
    /// What a new entry gets before anything is stamped on it
    pub const DEFAULT: FatAttributes = FatAttributes(Self::ARCHIVE);
    
    pub fn is_read_only(&self) -> bool { self.0 & Self::READ_ONLY != 0 }
    pub fn is_hidden(&self) -> bool { self.0 & Self::HIDDEN != 0 }
    pub fn is_system(&self) -> bool { self.0 & Self::SYSTEM != 0 }
    pub fn is_volume_id(&self) -> bool { self.0 & Self::VOLUME_ID != 0 }
    pub fn is_directory(&self) -> bool { self.0 & Self::DIRECTORY != 0 }
    pub fn is_archive(&self) -> bool { self.0 & Self::ARCHIVE != 0 }
    pub fn is_lfn(&self) -> bool { self.0 & Self::LFN == Self::LFN }
}

impl BitOr for FatAttributes {
    type Output = FatAttributes;
    
    fn bitor(self, rhs: Self) -> Self::Output {
        FatAttributes(self.0 | rhs.0)
    }
}

impl fmt::Display for FatAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.is_read_only(), 'R'),
            (self.is_hidden(), 'H'),
            (self.is_system(), 'S'),
            (self.is_archive(), 'A'),
        ];
        for (set, c) in flags {
            write!(f, "{}", if set { c } else { '-' })?;
        }
        Ok(())
    }
}

/// FAT directory entry (32 bytes on disk)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; 11],
    pub attributes: FatAttributes,
    pub nt_reserved: u8,
    pub creation_time_tenth: u8,
    pub creation_time: u16,
    pub creation_date: u16,
    pub last_access_date: u16,
    pub first_cluster_high: u16,  // Always 0 on FAT12
    pub write_time: u16,
    pub write_date: u16,
    pub first_cluster: u16,
    pub file_size: u32,
}

impl DirEntry {
    pub fn new(name: [u8; 11], attributes: FatAttributes) -> Self {
        Self {
            name,
            attributes,
            nt_reserved: 0,
            creation_time_tenth: 0,
            creation_time: 0,
            creation_date: 0,
            last_access_date: 0,
            first_cluster_high: 0,
            write_time: 0,
            write_date: 0,
            first_cluster: 0,
            file_size: 0,
        }
    }
    
    pub fn decode(raw: &[u8]) -> Self {
        let mut name = [0u8; 11];
        name.copy_from_slice(&raw[0..11]);
        Self {
            name,
            attributes: FatAttributes(raw[11]),
            nt_reserved: raw[12],
            creation_time_tenth: raw[13],
            creation_time: LittleEndian::read_u16(&raw[14..16]),
            creation_date: LittleEndian::read_u16(&raw[16..18]),
            last_access_date: LittleEndian::read_u16(&raw[18..20]),
            first_cluster_high: LittleEndian::read_u16(&raw[20..22]),
            write_time: LittleEndian::read_u16(&raw[22..24]),
            write_date: LittleEndian::read_u16(&raw[24..26]),
            first_cluster: LittleEndian::read_u16(&raw[26..28]),
            file_size: LittleEndian::read_u32(&raw[28..32]),
        }
    }
    
    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw[0..11].copy_from_slice(&self.name);
        raw[11] = self.attributes.0;
        raw[12] = self.nt_reserved;
        raw[13] = self.creation_time_tenth;
        LittleEndian::write_u16(&mut raw[14..16], self.creation_time);
        LittleEndian::write_u16(&mut raw[16..18], self.creation_date);
        LittleEndian::write_u16(&mut raw[18..20], self.last_access_date);
        LittleEndian::write_u16(&mut raw[20..22], self.first_cluster_high);
        LittleEndian::write_u16(&mut raw[22..24], self.write_time);
        LittleEndian::write_u16(&mut raw[24..26], self.write_date);
        LittleEndian::write_u16(&mut raw[26..28], self.first_cluster);
        LittleEndian::write_u32(&mut raw[28..32], self.file_size);
        raw
    }
    
    /// Readable name, e.g. `KERNEL.MNT`
    pub fn display_name(&self) -> String {
        parse_83_name(&self.name)
    }
    
    /// Slot has never been used; nothing follows it
    pub fn is_end(&self) -> bool {
        self.name[0] == DIR_ENTRY_FREE
    }
    
    pub fn is_deleted(&self) -> bool {
        self.name[0] == DIR_ENTRY_DELETED
    }
    
    /// An in-use entry naming a file or directory
    pub fn is_file_entry(&self) -> bool {
        !self.is_end() && !self.is_deleted() && !self.attributes.is_lfn() && !self.attributes.is_volume_id()
    }
}

/// Parse 8.3 filename format
pub fn parse_83_name(name: &[u8; 11]) -> String {
    let mut result = String::new();
    
    for &byte in &name[0..8] {
        if byte == 0x20 || byte == 0x00 {
            break;
        }
        // 0x05 stands for a leading 0xE5
        result.push(if byte == 0x05 { 0xE5 as char } else { byte as char });
    }
    
    let ext: String = name[8..11]
        .iter()
        .take_while(|&&b| b != 0x20 && b != 0x00)
        .map(|&b| b as char)
        .collect();
    if !ext.is_empty() {
        result.push('.');
        result.push_str(&ext);
    }
    
    result
}

/// Format a filename to 8.3 format. A trailing dot means "no extension".
pub fn format_83_name(filename: &str) -> BuildResult<[u8; 11]> {
    let mut result = [0x20u8; 11];
    
    let upper = filename.to_uppercase();
    let (base, ext) = match upper.split_once('.') {
        Some((base, ext)) => (base, ext),
        None => (upper.as_str(), ""),
    };
    
    if base.is_empty() || base.len() > 8 {
        return Err(BuildError::InvalidName(filename.to_string()));
    }
    if ext.len() > 3 {
        return Err(BuildError::InvalidName(format!("{} (extension too long)", filename)));
    }
    
    for (i, byte) in base.bytes().enumerate() {
        if !is_valid_83_char(byte) {
            return Err(BuildError::InvalidName(filename.to_string()));
        }
        result[i] = byte;
    }
    for (i, byte) in ext.bytes().enumerate() {
        if !is_valid_83_char(byte) {
            return Err(BuildError::InvalidName(filename.to_string()));
        }
        result[8 + i] = byte;
    }
    
    Ok(result)
}

/// Check if a character is valid for 8.3 filenames
fn is_valid_83_char(c: u8) -> bool {
    matches!(c,
        b'A'..=b'Z' | b'0'..=b'9' | b'!' | b'#' | b'$' | b'%' | b'&' |
        b'\'' | b'(' | b')' | b'-' | b'@' | b'^' | b'_' | b'`' |
        b'{' | b'}' | b'~')
}
