// End-to-end builds with a fake assembler

use async_trait::async_trait;
use bootfloppy::{Assembler, CompileOutcome, Orchestrator, SourceState};
use bootfloppy_core::{BuildConfig, BuildError, HashCache};
use bootfloppy_filesystems::{EntryTimestamps, Fat12Volume, FatAttributes};
use bootfloppy_formatters::fat_common::{build_fat12_boot_sector, FatBootSectorParams};
use bootfloppy_formatters::FloppyGeometry;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// "Assembles" by copying, expanding `include NAME` lines from the source's directory.
/// Sources starting with FAIL do not compile.
#[derive(Clone, Default)]
struct CopyAssembler {
    calls: Arc<AtomicUsize>,
}

impl CopyAssembler {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Assembler for CopyAssembler {
    fn name(&self) -> &str {
        "copy"
    }

    async fn assemble(&self, source: &Path, output: &Path) -> CompileOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let data = match std::fs::read(source) {
            Ok(data) => data,
            Err(e) => return CompileOutcome::Failed(e.to_string()),
        };
        if data.starts_with(b"FAIL") {
            return CompileOutcome::Failed("error: illegal instruction".to_string());
        }
        let data = match String::from_utf8(data) {
            Ok(text) if text.contains("include ") => match expand_includes(source, &text) {
                Ok(text) => text.into_bytes(),
                Err(e) => return CompileOutcome::Failed(e.to_string()),
            },
            Ok(text) => text.into_bytes(),
            Err(binary) => binary.into_bytes(),
        };
        match std::fs::write(output, &data) {
            Ok(()) => CompileOutcome::Ok(output.to_path_buf()),
            Err(e) => CompileOutcome::Failed(e.to_string()),
        }
    }
}

fn expand_includes(source: &Path, text: &str) -> std::io::Result<String> {
    let dir = source.parent().unwrap_or(Path::new("."));
    let mut out = String::new();
    for line in text.lines() {
        match line.strip_prefix("include ") {
            Some(name) => out.push_str(&std::fs::read_to_string(dir.join(name.trim()))?),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    Ok(out)
}

struct Project {
    _dir: TempDir,
    config: BuildConfig,
}

impl Project {
    /// Bootloader, kernel and the given application sources
    fn new(apps: &[(&str, &[u8])]) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let config = BuildConfig {
            source_root: root.join("src"),
            build_dir: root.join("build"),
            image_path: root.join("floppy.img"),
            hash_file: root.join(".build_hash.json"),
            ..Default::default()
        };

        std::fs::create_dir_all(config.app_source_dir()).unwrap();
        std::fs::create_dir_all(config.kernel_source_path().parent().unwrap()).unwrap();
        std::fs::write(config.boot_source_path(), bootloader()).unwrap();
        std::fs::write(config.kernel_source_path(), kernel()).unwrap();

        let project = Self { _dir: dir, config };
        for (name, content) in apps {
            project.write_app(name, content);
        }
        project
    }

    fn write_app(&self, name: &str, content: &[u8]) {
        std::fs::write(self.config.app_source_dir().join(name), content).unwrap();
    }

    fn app_key(&self, name: &str) -> String {
        self.config.app_source_dir().join(name).to_string_lossy().into_owned()
    }

    fn orchestrator(&self, assembler: &CopyAssembler) -> Orchestrator<CopyAssembler> {
        Orchestrator::new(self.config.clone(), assembler.clone())
    }

    fn image(&self) -> Vec<u8> {
        std::fs::read(&self.config.image_path).unwrap()
    }

    fn entry_names(&self) -> Vec<String> {
        let mut volume = Fat12Volume::open(&self.config.image_path).unwrap();
        volume.entries().unwrap().iter().map(|e| e.display_name()).collect()
    }
}

/// 512 bytes: a valid 1.44M BPB, filler code and no signature
fn bootloader() -> Vec<u8> {
    let geometry = FloppyGeometry::for_size(1_474_560).unwrap();
    let mut sector = build_fat12_boot_sector(&FatBootSectorParams::default(), &geometry);
    for byte in &mut sector[0x3E..0x1FE] {
        *byte = 0x90;
    }
    sector[510] = 0;
    sector[511] = 0;
    sector.to_vec()
}

fn kernel() -> Vec<u8> {
    (0..3000u32).map(|i| (i % 253) as u8).collect()
}

#[tokio::test]
async fn failed_source_is_skipped_and_not_cached() {
    let project = Project::new(&[("draw.asm", b"draw program"), ("fail.asm", b"FAIL mov")]);
    let assembler = CopyAssembler::default();

    let report = project.orchestrator(&assembler).run().await.unwrap();

    assert_eq!(project.entry_names(), vec!["KERNEL.MNT", "DRAW"]);
    assert_eq!(report.failed, vec![project.app_key("fail.asm")]);
    assert_eq!(report.states[&project.app_key("fail.asm")], SourceState::CompileFailed);
    assert_eq!(report.states[&project.app_key("draw.asm")], SourceState::Injected);

    let cached = HashCache::new(&project.config.hash_file).load();
    assert_eq!(cached.len(), 3);
    assert!(!cached.contains_key(&project.app_key("fail.asm")));
    assert!(cached.contains_key(&project.app_key("draw.asm")));
    assert_eq!(cached, report.fingerprints);
}

#[tokio::test]
async fn bootloader_is_patched_into_sector_zero() {
    let project = Project::new(&[]);
    let assembler = CopyAssembler::default();

    project.orchestrator(&assembler).run().await.unwrap();

    let image = project.image();
    let boot = bootloader();
    assert_eq!(&image[..510], &boot[..510]);
    assert_eq!(&image[510..512], &[0x55, 0xAA]);
    assert_eq!(project.config.boot_output(), project.config.build_dir.join("boot.BIN"));
}

#[tokio::test]
async fn built_entries_carry_built_attributes_and_content() {
    let project = Project::new(&[("calc.asm", b"calculator")]);
    let assembler = CopyAssembler::default();

    project.orchestrator(&assembler).run().await.unwrap();

    let mut volume = Fat12Volume::open(&project.config.image_path).unwrap();
    for entry in volume.entries().unwrap() {
        assert_eq!(entry.attributes, FatAttributes::BUILT);
        assert!(EntryTimestamps::of_entry(&entry).is_zero());
        assert_eq!((entry.write_time, entry.write_date), (0, 0));
    }
    assert_eq!(volume.read_file("KERNEL.MNT").unwrap(), kernel());
    assert_eq!(volume.read_file("CALC").unwrap(), b"calculator");
}

#[tokio::test]
async fn unchanged_rebuild_is_reproducible() {
    let project = Project::new(&[("draw.asm", b"draw program"), ("fail.asm", b"FAIL mov")]);
    let assembler = CopyAssembler::default();

    let first = project.orchestrator(&assembler).run().await.unwrap();
    let first_cache = std::fs::read_to_string(&project.config.hash_file).unwrap();
    let first_image = project.image();
    assert_eq!(assembler.calls(), 4);

    let second = project.orchestrator(&assembler).run().await.unwrap();

    assert_eq!(assembler.calls(), 8);
    assert_eq!(second.states[&project.app_key("draw.asm")], SourceState::Injected);
    assert_eq!(second.fingerprints, first.fingerprints);
    assert_eq!(std::fs::read_to_string(&project.config.hash_file).unwrap(), first_cache);
    assert_eq!(project.image(), first_image);
    assert_eq!(project.entry_names(), vec!["KERNEL.MNT", "DRAW"]);
}

#[tokio::test]
async fn edited_source_is_recompiled() {
    let project = Project::new(&[("draw.asm", b"draw v1"), ("edit.asm", b"edit v1")]);
    let assembler = CopyAssembler::default();
    project.orchestrator(&assembler).run().await.unwrap();
    assert_eq!(assembler.calls(), 4);

    project.write_app("draw.asm", b"draw v2");
    let report = project.orchestrator(&assembler).run().await.unwrap();

    assert_eq!(assembler.calls(), 8);
    let mut volume = Fat12Volume::open(&project.config.image_path).unwrap();
    assert_eq!(volume.read_file("DRAW").unwrap(), b"draw v2");
    assert_eq!(volume.read_file("EDIT").unwrap(), b"edit v1");
    assert_eq!(report.injected, vec!["KERNEL.MNT", "DRAW", "EDIT"]);
}

#[tokio::test]
async fn edited_excluded_library_reaches_dependent_app() {
    let mut project = Project::new(&[("draw.asm", b"include memlib.asm\ndraw"), ("memlib.asm", b"LIBv1")]);
    project.config.excluded = vec![PathBuf::from("apps/memlib.asm")];
    let assembler = CopyAssembler::default();
    project.orchestrator(&assembler).run().await.unwrap();

    let mut volume = Fat12Volume::open(&project.config.image_path).unwrap();
    assert_eq!(volume.read_file("DRAW").unwrap(), b"LIBv1\ndraw\n");
    volume.close().unwrap();

    project.write_app("memlib.asm", b"LIBv2");
    let report = project.orchestrator(&assembler).run().await.unwrap();

    assert_eq!(report.states[&project.app_key("draw.asm")], SourceState::Injected);
    assert!(!report.fingerprints.contains_key(&project.app_key("memlib.asm")));
    let mut volume = Fat12Volume::open(&project.config.image_path).unwrap();
    assert_eq!(volume.read_file("DRAW").unwrap(), b"LIBv2\ndraw\n");
}

#[tokio::test]
async fn stale_output_is_never_reused() {
    let project = Project::new(&[("draw.asm", b"draw")]);
    let assembler = CopyAssembler::default();
    project.orchestrator(&assembler).run().await.unwrap();

    std::fs::write(project.config.app_output(Path::new("draw.asm")), b"stale").unwrap();
    project.orchestrator(&assembler).run().await.unwrap();

    assert_eq!(assembler.calls(), 6);
    let mut volume = Fat12Volume::open(&project.config.image_path).unwrap();
    assert_eq!(volume.read_file("DRAW").unwrap(), b"draw");
}

#[tokio::test]
async fn corrupt_cache_is_replaced() {
    let project = Project::new(&[("draw.asm", b"draw")]);
    let assembler = CopyAssembler::default();
    project.orchestrator(&assembler).run().await.unwrap();

    std::fs::write(&project.config.hash_file, "{ not json").unwrap();
    project.orchestrator(&assembler).run().await.unwrap();

    assert_eq!(assembler.calls(), 6);
    assert_eq!(HashCache::new(&project.config.hash_file).load().len(), 3);
}

#[tokio::test]
async fn copy_files_are_added_and_cached() {
    let project = Project::new(&[("draw.asm", b"draw"), ("readme.txt", b"hello"), ("logo.bmp", b"BM..")]);
    let assembler = CopyAssembler::default();

    let report = project.orchestrator(&assembler).run().await.unwrap();

    assert_eq!(report.copied, vec!["LOGO.BMP", "README.TXT"]);
    assert_eq!(project.entry_names(), vec!["KERNEL.MNT", "DRAW", "LOGO.BMP", "README.TXT"]);

    let mut volume = Fat12Volume::open(&project.config.image_path).unwrap();
    let readme = volume.find_entry("README.TXT").unwrap().unwrap();
    assert_eq!(readme.attributes, FatAttributes::DEFAULT);
    assert_eq!(volume.read_file("README.TXT").unwrap(), b"hello");

    let cached = HashCache::new(&project.config.hash_file).load();
    assert!(cached.contains_key(&project.app_key("readme.txt")));
    assert!(cached.contains_key(&project.app_key("logo.bmp")));
}

#[tokio::test]
async fn excluded_sources_are_not_built() {
    let mut project = Project::new(&[("draw.asm", b"draw"), ("lib.asm", b"shared macros")]);
    project.config.excluded = vec![PathBuf::from("apps/lib.asm")];
    let assembler = CopyAssembler::default();

    let report = project.orchestrator(&assembler).run().await.unwrap();

    assert!(!report.states.contains_key(&project.app_key("lib.asm")));
    assert_eq!(project.entry_names(), vec!["KERNEL.MNT", "DRAW"]);
}

#[tokio::test]
async fn failed_bootloader_keeps_formatted_boot_sector() {
    let project = Project::new(&[("draw.asm", b"draw")]);
    std::fs::write(project.config.boot_source_path(), b"FAIL org 0x7c00").unwrap();
    let assembler = CopyAssembler::default();

    let report = project.orchestrator(&assembler).run().await.unwrap();

    let image = project.image();
    assert_eq!(&image[0x36..0x3E], b"FAT12   ");
    assert_eq!(&image[510..512], &[0x55, 0xAA]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(project.entry_names(), vec!["KERNEL.MNT", "DRAW"]);

    project.orchestrator(&assembler).run().await.unwrap();
    assert_eq!(project.image(), image);
}

#[tokio::test]
async fn truncated_bootloader_aborts_without_saving_cache() {
    let project = Project::new(&[("draw.asm", b"draw")]);
    std::fs::write(project.config.boot_source_path(), vec![0x90u8; 100]).unwrap();
    let assembler = CopyAssembler::default();

    let err = project.orchestrator(&assembler).run().await.unwrap_err();

    assert!(matches!(err, BuildError::TruncatedBootcode { len: 100 }));
    assert!(!project.config.hash_file.exists());
}

#[tokio::test]
async fn missing_kernel_source_is_fatal() {
    let project = Project::new(&[]);
    std::fs::remove_file(project.config.kernel_source_path()).unwrap();
    let assembler = CopyAssembler::default();

    let err = project.orchestrator(&assembler).run().await.unwrap_err();

    assert!(matches!(err, BuildError::Io(_)));
    assert_eq!(assembler.calls(), 0);
}
