// FAT12 Volume populator
// Opens a formatted image and appends files to its root directory

use bootfloppy_core::{BuildError, BuildResult};
use bootfloppy_formatters::fat_common::*;
use bootfloppy_formatters::FloppyGeometry;
use crate::fat_common::{format_83_name, DirEntry, EntryTimestamps, FatAttributes};
use super::Fat12Table;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use log::{debug, info, warn};

/// An open FAT12 image. Owns the file exclusively until `close`.
pub struct Fat12Volume {
    path: PathBuf,
    file: File,
    geometry: FloppyGeometry,
    fat: Fat12Table,
    bytes_per_cluster: u32,
    fat_start_byte: u64,
    root_dir_start_byte: u64,
    data_start_byte: u64,
}

impl Fat12Volume {
    /// Open an already formatted image for read-write
    pub fn open(path: &Path) -> BuildResult<Self> {
        info!("Opening FAT12 volume {}", path.display());

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BuildError::NotFound(path.to_path_buf())
                } else {
                    BuildError::Io(e)
                }
            })?;

        let mut boot_sector = [0u8; SECTOR_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut boot_sector)?;

        let geometry = parse_bpb(&boot_sector)?;
        let image_len = file.metadata()?.len();
        if geometry.size_bytes() > image_len {
            return Err(BuildError::InvalidVolume(format!(
                "BPB describes {} bytes but the image has {}", geometry.size_bytes(), image_len
            )));
        }

        let bytes_per_sector = geometry.bytes_per_sector as u64;
        let fat_start_byte = geometry.reserved_sectors as u64 * bytes_per_sector;
        let fat_size_bytes = geometry.sectors_per_fat as u64 * bytes_per_sector;
        let root_dir_start_byte = fat_start_byte + geometry.num_fats as u64 * fat_size_bytes;
        let data_start_byte = geometry.first_data_sector() as u64 * bytes_per_sector;

        let mut fat_bytes = vec![0u8; fat_size_bytes as usize];
        file.seek(SeekFrom::Start(fat_start_byte))?;
        file.read_exact(&mut fat_bytes)?;
        let fat = Fat12Table::new(fat_bytes, geometry.cluster_count())?;

        debug!("FAT12 volume: {} clusters, {} free, {} root entries",
               geometry.cluster_count(), fat.free_count(), geometry.root_entries);

        Ok(Self {
            path: path.to_path_buf(),
            file,
            bytes_per_cluster: geometry.bytes_per_sector as u32 * geometry.sectors_per_cluster as u32,
            geometry,
            fat,
            fat_start_byte,
            root_dir_start_byte,
            data_start_byte,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn geometry(&self) -> &FloppyGeometry {
        &self.geometry
    }

    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_cluster
    }

    pub fn free_bytes(&self) -> u64 {
        self.fat.free_count() as u64 * self.bytes_per_cluster as u64
    }

    /// Start a new root directory entry named `short_name` (8.3).
    ///
    /// The handle borrows the volume, so one entry is finished before the next starts.
    pub fn create_file(&mut self, short_name: &str) -> BuildResult<FileHandle<'_>> {
        let name = format_83_name(short_name)?;

        let mut free_slot = None;
        for (slot, entry) in self.read_root_dir()?.into_iter().enumerate() {
            if entry.is_end() {
                free_slot.get_or_insert(slot);
                break;
            }
            if entry.is_deleted() {
                free_slot.get_or_insert(slot);
                continue;
            }
            if entry.is_file_entry() && entry.name == name {
                return Err(BuildError::NameCollision(short_name.to_string()));
            }
        }

        let slot = free_slot.ok_or_else(|| BuildError::NoSpace(format!(
            "root directory is full ({} entries)", self.geometry.root_entries
        )))?;

        let mut entry = DirEntry::new(name, FatAttributes::DEFAULT);
        EntryTimestamps::now().apply_to(&mut entry);

        debug!("Creating {} in root slot {}", entry.display_name(), slot);
        Ok(FileHandle {
            volume: self,
            slot,
            entry,
            last_cluster: None,
            closed: false,
        })
    }

    /// Copy host files into the root directory under their own names,
    /// keeping the default attributes and timestamps
    pub fn copy_in<P: AsRef<Path>>(&mut self, host_paths: &[P]) -> BuildResult<Vec<String>> {
        let mut names = Vec::with_capacity(host_paths.len());

        for path in host_paths {
            let path = path.as_ref();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_uppercase())
                .ok_or_else(|| BuildError::InvalidName(path.display().to_string()))?;
            let data = std::fs::read(path)?;

            let mut handle = self.create_file(&name)?;
            handle.write(&data)?;
            handle.close()?;

            info!("Copied {} as {} ({} bytes)", path.display(), name, data.len());
            names.push(name);
        }

        Ok(names)
    }

    /// In-use root directory entries, in slot order
    pub fn entries(&mut self) -> BuildResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in self.read_root_dir()? {
            if entry.is_end() {
                break;
            }
            if entry.is_file_entry() {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    pub fn find_entry(&mut self, short_name: &str) -> BuildResult<Option<DirEntry>> {
        let name = format_83_name(short_name)?;
        Ok(self.entries()?.into_iter().find(|e| e.name == name))
    }

    /// Read back a root file's content
    pub fn read_file(&mut self, short_name: &str) -> BuildResult<Vec<u8>> {
        let entry = self
            .find_entry(short_name)?
            .ok_or_else(|| BuildError::NotFound(PathBuf::from(short_name)))?;

        let mut data = Vec::with_capacity(entry.file_size as usize);
        if entry.file_size > 0 {
            for cluster in self.fat.chain(entry.first_cluster as u32)? {
                let offset = self.cluster_offset(cluster);
                let mut buffer = vec![0u8; self.bytes_per_cluster as usize];
                self.read_at(offset, &mut buffer)?;
                data.extend_from_slice(&buffer);
            }
        }

        if data.len() < entry.file_size as usize {
            return Err(BuildError::InvalidVolume(format!(
                "{} is {} bytes but its chain holds {}", short_name, entry.file_size, data.len()
            )));
        }
        data.truncate(entry.file_size as usize);
        Ok(data)
    }

    /// Write the FAT to every copy and sync. Consumes the volume.
    pub fn close(mut self) -> BuildResult<()> {
        self.flush()?;
        info!("Closed FAT12 volume {} ({} bytes free)", self.path.display(), self.free_bytes());
        Ok(())
    }

    fn flush(&mut self) -> BuildResult<()> {
        if self.fat.is_dirty() {
            write_fat_tables(
                &mut self.file,
                self.fat.as_bytes(),
                self.geometry.reserved_sectors as u64,
                self.geometry.sectors_per_fat as u32,
                self.geometry.num_fats,
                self.geometry.bytes_per_sector as u32,
            )?;
            self.fat.mark_clean();
        }
        self.file.sync_all()?;
        Ok(())
    }

    fn read_root_dir(&mut self) -> BuildResult<Vec<DirEntry>> {
        let mut raw = vec![0u8; self.geometry.root_entries as usize * DIR_ENTRY_SIZE];
        self.read_at(self.root_dir_start_byte, &mut raw)?;
        Ok(raw.chunks_exact(DIR_ENTRY_SIZE).map(DirEntry::decode).collect())
    }

    fn write_root_entry(&mut self, slot: usize, entry: &DirEntry) -> BuildResult<()> {
        let offset = self.root_dir_start_byte + (slot * DIR_ENTRY_SIZE) as u64;
        self.write_at(offset, &entry.encode())
    }

    fn cluster_offset(&self, cluster: u32) -> u64 {
        self.data_start_byte + (cluster - 2) as u64 * self.bytes_per_cluster as u64
    }

    fn read_at(&mut self, offset: u64, buffer: &mut [u8]) -> BuildResult<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buffer)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> BuildResult<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Byte offset of the first FAT copy
    pub fn fat_start_byte(&self) -> u64 {
        self.fat_start_byte
    }
}

impl Drop for Fat12Volume {
    fn drop(&mut self) {
        // Best effort to flush on drop
        if self.fat.is_dirty() {
            if let Err(e) = self.flush() {
                warn!("Failed to flush FAT of {}: {}", self.path.display(), e);
            }
        }
    }
}

/// One root entry being written. Consumed by `close`.
pub struct FileHandle<'v> {
    volume: &'v mut Fat12Volume,
    slot: usize,
    entry: DirEntry,
    last_cluster: Option<u32>,
    closed: bool,
}

impl FileHandle<'_> {
    pub fn entry(&self) -> &DirEntry {
        &self.entry
    }

    pub fn size(&self) -> u32 {
        self.entry.file_size
    }

    /// Append `data` to the file
    pub fn write(&mut self, data: &[u8]) -> BuildResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let new_size = self.entry.file_size as u64 + data.len() as u64;
        if new_size > u32::MAX as u64 {
            return Err(BuildError::NoSpace(format!("{} would exceed 4 GiB", self.entry.display_name())));
        }

        let bpc = self.volume.bytes_per_cluster as usize;
        let used_in_tail = self.entry.file_size as usize % bpc;
        let mut written = 0;

        // Fill the unused part of the last cluster first
        if let Some(tail) = self.last_cluster {
            if used_in_tail != 0 {
                let n = (bpc - used_in_tail).min(data.len());
                let offset = self.volume.cluster_offset(tail) + used_in_tail as u64;
                self.volume.write_at(offset, &data[..n])?;
                written = n;
            }
        }

        let remaining = &data[written..];
        if !remaining.is_empty() {
            let count = remaining.len().div_ceil(bpc) as u32;
            let clusters = self.volume.fat.allocate_chain(count, self.last_cluster)?;

            for (cluster, chunk) in clusters.iter().zip(remaining.chunks(bpc)) {
                let offset = self.volume.cluster_offset(*cluster);
                let mut buffer = vec![0u8; bpc];
                buffer[..chunk.len()].copy_from_slice(chunk);
                self.volume.write_at(offset, &buffer)?;
            }

            if self.entry.first_cluster == 0 {
                self.entry.first_cluster = clusters[0] as u16;
            }
            self.last_cluster = clusters.last().copied();
        }

        self.entry.file_size = new_size as u32;
        Ok(())
    }

    pub fn set_attributes(&mut self, attributes: FatAttributes) {
        self.entry.attributes = attributes;
    }

    pub fn set_timestamps(&mut self, timestamps: EntryTimestamps) {
        timestamps.apply_to(&mut self.entry);
    }

    /// Write the entry into its root directory slot
    pub fn close(mut self) -> BuildResult<()> {
        self.volume.write_root_entry(self.slot, &self.entry)?;
        self.closed = true;
        debug!("Closed {} ({} bytes, cluster {})",
               self.entry.display_name(), self.entry.file_size, self.entry.first_cluster);
        Ok(())
    }
}

impl Drop for FileHandle<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.volume.write_root_entry(self.slot, &self.entry) {
                warn!("Failed to write entry {}: {}", self.entry.display_name(), e);
            }
        }
    }
}

/// Read the geometry a FAT12 boot sector describes
fn parse_bpb(bs: &[u8; SECTOR_SIZE]) -> BuildResult<FloppyGeometry> {
    if bs[BOOT_SIGNATURE_OFFSET..] != BOOT_SIGNATURE {
        return Err(BuildError::InvalidVolume("missing 55 AA boot signature".into()));
    }

    let read_u16 = |offset: usize| u16::from_le_bytes([bs[offset], bs[offset + 1]]);

    let total_16 = read_u16(BPB_TOT_SEC16);
    let total_sectors = if total_16 != 0 {
        total_16
    } else {
        let total_32 = u32::from_le_bytes([
            bs[BPB_TOT_SEC32], bs[BPB_TOT_SEC32 + 1], bs[BPB_TOT_SEC32 + 2], bs[BPB_TOT_SEC32 + 3],
        ]);
        u16::try_from(total_32)
            .map_err(|_| BuildError::InvalidVolume(format!("{} sectors is too large for FAT12", total_32)))?
    };

    let geometry = FloppyGeometry {
        bytes_per_sector: read_u16(BPB_BYTES_PER_SEC),
        sectors_per_cluster: bs[BPB_SEC_PER_CLUS],
        reserved_sectors: read_u16(BPB_RSVD_SEC_CNT),
        num_fats: bs[BPB_NUM_FATS],
        root_entries: read_u16(BPB_ROOT_ENT_CNT),
        total_sectors,
        media_descriptor: bs[BPB_MEDIA],
        sectors_per_fat: read_u16(BPB_FAT_SZ16),
        sectors_per_track: read_u16(BPB_SEC_PER_TRK),
        num_heads: read_u16(BPB_NUM_HEADS),
    };

    if ![512, 1024, 2048, 4096].contains(&geometry.bytes_per_sector)
        || geometry.sectors_per_cluster == 0
        || geometry.reserved_sectors == 0
        || geometry.num_fats == 0
        || geometry.root_entries == 0
        || geometry.sectors_per_fat == 0
    {
        return Err(BuildError::InvalidVolume(format!("implausible BPB: {:?}", geometry)));
    }
    if geometry.first_data_sector() >= total_sectors as u32 {
        return Err(BuildError::InvalidVolume("BPB leaves no data area".into()));
    }
    if geometry.cluster_count() > FAT12_MAX_CLUSTERS {
        return Err(BuildError::InvalidVolume(format!(
            "Not a FAT12 filesystem (clusters: {})", geometry.cluster_count()
        )));
    }

    Ok(geometry)
}
