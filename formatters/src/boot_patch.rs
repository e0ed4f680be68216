// Boot sector patcher
// Puts freshly assembled boot code into sector 0 of a formatted image

use bootfloppy_core::{BuildError, BuildResult};
use crate::fat_common::{BOOT_SIGNATURE, BOOT_SIGNATURE_OFFSET, SECTOR_SIZE};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use log::info;

/// Build the sector that replaces `existing`.
///
/// Bytes `[0, 510)` come verbatim from `bootcode` (jump, OEM label, the
/// bootloader's own BPB and body); `[510, 512)` is always `55 AA`.
/// `existing` only seeds the buffer so a future policy can keep some of the
/// formatter's bytes; today every one of them is overwritten.
pub fn patch(existing: &[u8; SECTOR_SIZE], bootcode: &[u8]) -> BuildResult<[u8; SECTOR_SIZE]> {
    if bootcode.len() < BOOT_SIGNATURE_OFFSET {
        return Err(BuildError::TruncatedBootcode { len: bootcode.len() });
    }
    
    let mut sector = *existing;
    sector[..BOOT_SIGNATURE_OFFSET].copy_from_slice(&bootcode[..BOOT_SIGNATURE_OFFSET]);
    sector[BOOT_SIGNATURE_OFFSET..].copy_from_slice(&BOOT_SIGNATURE);
    Ok(sector)
}

/// Patch sector 0 of any seekable device in place
pub fn patch_device<D: Read + Write + Seek>(device: &mut D, bootcode: &[u8]) -> BuildResult<[u8; SECTOR_SIZE]> {
    let mut existing = [0u8; SECTOR_SIZE];
    device.seek(SeekFrom::Start(0))?;
    device.read_exact(&mut existing)?;
    
    let sector = patch(&existing, bootcode)?;
    
    device.seek(SeekFrom::Start(0))?;
    device.write_all(&sector)?;
    device.flush()?;
    Ok(sector)
}

/// Patch the boot sector of the image at `image`.
/// On error the image is left as it was.
pub fn patch_image(image: &Path, bootcode: &[u8]) -> BuildResult<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(image).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BuildError::NotFound(image.to_path_buf())
        } else {
            BuildError::Io(e)
        }
    })?;
    
    let sector = patch_device(&mut file, bootcode)?;
    file.sync_all()?;
    
    info!("Boot sector patched: jump {:02X?}, OEM {:?}",
          &sector[0..3], String::from_utf8_lossy(&sector[3..11]));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    
    fn bootcode(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }
    
    #[test]
    fn test_signature_forced_for_any_tail() {
        for len in [510, 511, 512, 1024] {
            for tail in [[0x00, 0x00], [0xAA, 0x55], [0x55, 0xAA], [0x12, 0x34]] {
                let mut code = bootcode(len);
                if len >= 512 {
                    code[510] = tail[0];
                    code[511] = tail[1];
                }
                let existing = [tail[1]; SECTOR_SIZE];
                let sector = patch(&existing, &code).unwrap();
                assert_eq!(&sector[510..], &[0x55, 0xAA]);
                assert_eq!(&sector[..510], &code[..510]);
            }
        }
    }
    
    #[test]
    fn test_zeroed_signature_bootloader() {
        let mut code = bootcode(512);
        code[510] = 0x00;
        code[511] = 0x00;
        
        let sector = patch(&[0u8; SECTOR_SIZE], &code).unwrap();
        assert_eq!(&sector[510..512], &[0x55, 0xAA]);
        assert_eq!(&sector[0..3], &code[0..3]);
        assert_eq!(&sector[3..11], &code[3..11]);
        assert_eq!(&sector[11..510], &code[11..510]);
    }
    
    #[test]
    fn test_existing_sector_contributes_nothing() {
        let code = bootcode(510);
        let a = patch(&[0x00; SECTOR_SIZE], &code).unwrap();
        let b = patch(&[0xFF; SECTOR_SIZE], &code).unwrap();
        assert_eq!(a, b);
    }
    
    #[test]
    fn test_truncated_bootcode_leaves_device_untouched() {
        let original: Vec<u8> = (0..2048).map(|i| i as u8).collect();
        let mut device = Cursor::new(original.clone());
        
        let err = patch_device(&mut device, &bootcode(509)).unwrap_err();
        assert!(matches!(err, BuildError::TruncatedBootcode { len: 509 }));
        assert_eq!(device.into_inner(), original);
    }
    
    #[test]
    fn test_patch_device_writes_sector_zero_only() {
        let mut device = Cursor::new(vec![0xEEu8; 1024]);
        let code = bootcode(512);
        patch_device(&mut device, &code).unwrap();
        
        let disk = device.into_inner();
        assert_eq!(&disk[..510], &code[..510]);
        assert_eq!(&disk[510..512], &[0x55, 0xAA]);
        assert!(disk[512..].iter().all(|&b| b == 0xEE));
    }
}
