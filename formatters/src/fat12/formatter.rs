// FAT12 floppy image formatter
// Creates a zero-filled image of a standard floppy size and lays down an empty FAT12 volume

use bootfloppy_core::{BuildError, BuildResult};
use crate::fat_common::{build_fat12_boot_sector, init_fat12_table, write_fat_tables, FatBootSectorParams};
use super::FloppyGeometry;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use log::{debug, info};

pub struct Fat12Formatter {
    params: FatBootSectorParams,
}

impl Fat12Formatter {
    /// Formatter writing `volume_label` and a zero serial
    pub fn new(volume_label: &str) -> Self {
        Self::with_params(FatBootSectorParams::default().with_label(volume_label))
    }
    
    pub fn with_serial(mut self, volume_serial: u32) -> Self {
        self.params.volume_serial = volume_serial;
        self
    }
    
    pub fn with_params(params: FatBootSectorParams) -> Self {
        Self { params }
    }
    
    /// Create (or truncate) `path` to `size` bytes and format it as FAT12
    pub fn format_image(&self, path: &Path, size: u64) -> BuildResult<FloppyGeometry> {
        let geometry = FloppyGeometry::for_size(size).ok_or_else(|| {
            BuildError::Configuration(format!("no standard floppy geometry for {} bytes", size))
        })?;
        
        info!("Creating a {} KiB FAT12 floppy image at {}", size / 1024, path.display());
        
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;
        
        let boot_sector = build_fat12_boot_sector(&self.params, &geometry);
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&boot_sector)?;
        
        let fat_bytes = geometry.sectors_per_fat as usize * geometry.bytes_per_sector as usize;
        let mut fat = vec![0u8; fat_bytes];
        init_fat12_table(&mut fat, geometry.media_descriptor);
        write_fat_tables(
            &mut file,
            &fat,
            geometry.reserved_sectors as u64,
            geometry.sectors_per_fat as u32,
            geometry.num_fats,
            geometry.bytes_per_sector as u32,
        )?;
        
        // Root directory and data area are already zero from set_len
        file.sync_all()?;
        
        debug!("FAT12 parameters: {} sectors, {} sectors/cluster, {} sectors/FAT, {} root entries",
               geometry.total_sectors, geometry.sectors_per_cluster,
               geometry.sectors_per_fat, geometry.root_entries);
        
        Ok(geometry)
    }
}
