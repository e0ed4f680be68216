// Build configuration
// One immutable value describing where sources live and where the image goes

use crate::{BuildError, BuildResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use log::debug;

/// Size of a 1.44 MiB floppy image in bytes
pub const DEFAULT_FLOPPY_SIZE: u64 = 1_474_560;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    /// Root of the source tree
    pub source_root: PathBuf,
    /// Directory receiving assembler outputs
    pub build_dir: PathBuf,
    /// Kernel directory name, under both `source_root` and `build_dir`
    pub kernel_dir: String,
    /// Application directory name, under both `source_root` and `build_dir`
    pub app_dir: String,
    /// Bootloader source, relative to `source_root`
    pub boot_source: PathBuf,
    /// Kernel source, relative to `source_root/kernel_dir`
    pub kernel_source: PathBuf,
    /// Name of the kernel file inside the image
    pub kernel_image_name: String,
    pub image_path: PathBuf,
    pub hash_file: PathBuf,
    pub floppy_size: u64,
    pub volume_label: String,
    /// Extension of sources handed to the assembler
    pub source_extension: String,
    /// Extensions of application-directory files copied into the image as-is
    pub copy_extensions: Vec<String>,
    /// Sources skipped during discovery, relative to `source_root`
    pub excluded: Vec<PathBuf>,
    /// Assembler program, invoked as `<assembler> <source> <output>`
    pub assembler: String,
    pub compile_timeout_secs: u64,
    /// Serial number written into the formatted boot sector
    pub volume_serial: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("src"),
            build_dir: PathBuf::from("build"),
            kernel_dir: "kernel".to_string(),
            app_dir: "apps".to_string(),
            boot_source: PathBuf::from("boot.asm"),
            kernel_source: PathBuf::from("kernel.asm"),
            kernel_image_name: "KERNEL.MNT".to_string(),
            image_path: PathBuf::from("floppy.img"),
            hash_file: PathBuf::from(".build_hash.json"),
            floppy_size: DEFAULT_FLOPPY_SIZE,
            volume_label: "NO NAME".to_string(),
            source_extension: "asm".to_string(),
            copy_extensions: ["bmp", "htm", "dat", "dtp", "jpg", "txt", "mp3", "mt", "pcx", "raw", "lst"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            excluded: vec![],
            assembler: "fasm".to_string(),
            compile_timeout_secs: 120,
            volume_serial: 0,
        }
    }
}

impl BuildConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> BuildResult<Self> {
        debug!("Loading build configuration from {}", path.display());
        let text = std::fs::read_to_string(path)
            .map_err(|e| BuildError::Configuration(format!("{}: {}", path.display(), e)))?;
        let config: BuildConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use the defaults
    pub fn load_or_default(path: Option<&Path>) -> BuildResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> BuildResult<()> {
        if self.floppy_size == 0 || self.floppy_size % 512 != 0 {
            return Err(BuildError::Configuration(format!(
                "floppy_size {} is not a whole number of 512-byte sectors",
                self.floppy_size
            )));
        }
        if self.kernel_image_name.trim().is_empty() {
            return Err(BuildError::Configuration("kernel_image_name is empty".into()));
        }
        if self.assembler.trim().is_empty() {
            return Err(BuildError::Configuration("assembler is empty".into()));
        }
        if self.compile_timeout_secs == 0 {
            return Err(BuildError::Configuration("compile_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn boot_source_path(&self) -> PathBuf {
        self.source_root.join(&self.boot_source)
    }

    pub fn kernel_source_path(&self) -> PathBuf {
        self.source_root.join(&self.kernel_dir).join(&self.kernel_source)
    }

    pub fn app_source_dir(&self) -> PathBuf {
        self.source_root.join(&self.app_dir)
    }

    pub fn excluded_paths(&self) -> Vec<PathBuf> {
        self.excluded.iter().map(|p| self.source_root.join(p)).collect()
    }

    /// Directories the assembler writes into
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.build_dir.clone(),
            self.build_dir.join(&self.kernel_dir),
            self.build_dir.join(&self.app_dir),
        ]
    }

    pub fn boot_output(&self) -> PathBuf {
        self.build_dir.join(format!("{}.BIN", file_stem(&self.boot_source)))
    }

    pub fn kernel_output(&self) -> PathBuf {
        self.build_dir.join(&self.kernel_dir).join(&self.kernel_image_name)
    }

    pub fn app_output(&self, source: &Path) -> PathBuf {
        self.build_dir.join(&self.app_dir).join(format!("{}.BIN", file_stem(source)))
    }

    /// Name of an application inside the image: its source stem without extension
    pub fn app_image_name(&self, source: &Path) -> String {
        file_stem(source).to_uppercase()
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
