// Build orchestration
// Compiles every source, patches the boot sector and fills a fresh FAT12 image

use crate::assembler::{Assembler, CompileOutcome};
use bootfloppy_core::discovery::find_files;
use bootfloppy_core::{
    changed, changed_paths, fingerprint_all, BuildConfig, BuildResult, FingerprintMap, HashCache,
};
use bootfloppy_filesystems::{EntryTimestamps, Fat12Volume, FatAttributes};
use bootfloppy_formatters::{patch_image, Fat12Formatter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};

/// Lifecycle of one source within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Unbuilt,
    Compiling,
    CompileFailed,
    CompileOk,
    Injected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Bootloader,
    Kernel,
    Application,
}

/// One assembler input and where its output lands
#[derive(Debug, Clone)]
pub struct Source {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub output: PathBuf,
    /// Root directory name; the bootloader has none
    pub image_name: Option<String>,
}

impl Source {
    fn key(&self) -> String {
        path_key(&self.path)
    }
}

#[derive(Debug, Default)]
pub struct BuildReport {
    /// Final state of every source, keyed like the hash cache
    pub states: BTreeMap<String, SourceState>,
    /// Image names of the built entries, in injection order
    pub injected: Vec<String>,
    /// Copy files added to the image
    pub copied: Vec<String>,
    /// Sources whose compile failed
    pub failed: Vec<String>,
    /// The map that was persisted
    pub fingerprints: FingerprintMap,
}

impl BuildReport {
    fn set_state(&mut self, key: &str, state: SourceState) {
        debug!("{} -> {:?}", key, state);
        self.states.insert(key.to_string(), state);
    }
}

pub struct Orchestrator<A: Assembler> {
    config: BuildConfig,
    assembler: A,
    cache: HashCache,
}

impl<A: Assembler> Orchestrator<A> {
    pub fn new(config: BuildConfig, assembler: A) -> Self {
        let cache = HashCache::new(config.hash_file.clone());
        Self { config, assembler, cache }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Bootloader, kernel, then applications in path order
    pub fn sources(&self) -> BuildResult<Vec<Source>> {
        let config = &self.config;
        let mut sources = vec![
            Source {
                path: config.boot_source_path(),
                kind: SourceKind::Bootloader,
                output: config.boot_output(),
                image_name: None,
            },
            Source {
                path: config.kernel_source_path(),
                kind: SourceKind::Kernel,
                output: config.kernel_output(),
                image_name: Some(config.kernel_image_name.clone()),
            },
        ];

        let apps = find_files(&config.app_source_dir(), &config.source_extension, &config.excluded_paths())?;
        for path in apps {
            sources.push(Source {
                output: config.app_output(&path),
                image_name: Some(config.app_image_name(&path)),
                kind: SourceKind::Application,
                path,
            });
        }
        Ok(sources)
    }

    /// Data files from the application directory that go into the image unchanged
    pub fn copy_files(&self) -> BuildResult<Vec<PathBuf>> {
        let excluded = self.config.excluded_paths();
        let mut files = Vec::new();
        for ext in &self.config.copy_extensions {
            files.extend(find_files(&self.config.app_source_dir(), ext, &excluded)?);
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Paths that differ from the hash cache, without building anything
    pub fn pending(&self) -> BuildResult<Vec<String>> {
        let mut paths: Vec<PathBuf> = self.sources()?.into_iter().map(|s| s.path).collect();
        paths.extend(self.copy_files()?);
        let current = fingerprint_all(&paths)?;
        let previous = self.cache.load();
        Ok(changed_paths(&current, &previous).into_iter().map(String::from).collect())
    }

    /// Run a full build. Compile failures are logged and skipped;
    /// any other error aborts and leaves the hash cache untouched.
    pub async fn run(&self) -> BuildResult<BuildReport> {
        for dir in self.config.output_dirs() {
            std::fs::create_dir_all(&dir)?;
        }

        let sources = self.sources()?;
        let source_paths: Vec<&Path> = sources.iter().map(|s| s.path.as_path()).collect();
        let current = fingerprint_all(&source_paths)?;
        let previous = self.cache.load();

        if changed(&current, &previous) {
            info!("Changed since last build: {}", changed_paths(&current, &previous).join(", "));
        } else {
            info!("No source changes since last build");
        }

        let image = &self.config.image_path;
        let geometry = Fat12Formatter::new(&self.config.volume_label)
            .with_serial(self.config.volume_serial)
            .format_image(image, self.config.floppy_size)?;
        info!("Formatted {} ({} clusters)", image.display(), geometry.cluster_count());

        let mut report = BuildReport::default();
        let mut persisted = FingerprintMap::new();
        let mut volume: Option<Fat12Volume> = None;

        for source in &sources {
            let key = source.key();
            report.set_state(&key, SourceState::Unbuilt);

            let binary = match self.compile(source, &mut report).await {
                Some(binary) => binary,
                None => continue,
            };

            match &source.image_name {
                None => {
                    let bootcode = std::fs::read(&binary)?;
                    patch_image(image, &bootcode)?;
                }
                Some(name) => {
                    if volume.is_none() {
                        volume = Some(Fat12Volume::open(image)?);
                    }
                    if let Some(vol) = volume.as_mut() {
                        inject(vol, name, &binary)?;
                    }
                    report.injected.push(name.clone());
                }
            }

            report.set_state(&key, SourceState::Injected);
            if let Some(digest) = current.get(&key) {
                persisted.insert(key, *digest);
            }
        }

        let copy_files = self.copy_files()?;
        let copy_hashes = fingerprint_all(&copy_files)?;
        if !copy_files.is_empty() {
            if volume.is_none() {
                volume = Some(Fat12Volume::open(image)?);
            }
            if let Some(vol) = volume.as_mut() {
                report.copied = vol.copy_in(&copy_files)?;
            }
        }

        if let Some(vol) = volume.take() {
            vol.close()?;
        }

        persisted.extend(copy_hashes);
        self.cache.save(&persisted)?;

        if !report.failed.is_empty() {
            warn!("{} source(s) failed to compile: {}", report.failed.len(), report.failed.join(", "));
        }
        info!(
            "Built {}: {} entries, {} copied",
            image.display(),
            report.injected.len(),
            report.copied.len()
        );

        report.fingerprints = persisted;
        Ok(report)
    }

    /// Produce the binary for `source`, or `None` if it failed to compile.
    /// Sources are always assembled: included files are not fingerprinted.
    async fn compile(&self, source: &Source, report: &mut BuildReport) -> Option<PathBuf> {
        let key = source.key();

        report.set_state(&key, SourceState::Compiling);
        info!("Compiling {} with {}", source.path.display(), self.assembler.name());

        match self.assembler.assemble(&source.path, &source.output).await {
            CompileOutcome::Ok(binary) => {
                report.set_state(&key, SourceState::CompileOk);
                Some(binary)
            }
            CompileOutcome::Failed(reason) => {
                warn!("Compile error in {}: {}", source.path.display(), reason);
                report.set_state(&key, SourceState::CompileFailed);
                report.failed.push(key);
                None
            }
        }
    }
}

/// Add one compiled binary as a hidden, system, read-only entry with zeroed timestamps
fn inject(volume: &mut Fat12Volume, name: &str, binary: &Path) -> BuildResult<()> {
    let data = std::fs::read(binary)?;
    let mut handle = volume.create_file(name)?;
    handle.write(&data)?;
    handle.set_attributes(FatAttributes::BUILT);
    handle.set_timestamps(EntryTimestamps::ZERO);
    handle.close()?;
    info!("Added {} ({} bytes)", name, data.len());
    Ok(())
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
