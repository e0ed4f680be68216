// External assembler seam
// Compiling one source is a subprocess call that either produces an output file or fails

use async_trait::async_trait;
use bootfloppy_core::{BuildError, BuildResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// Path of the produced binary
    Ok(PathBuf),
    Failed(String),
}

#[async_trait]
pub trait Assembler: Send + Sync {
    fn name(&self) -> &str;
    
    /// Assemble `source` into `output`. Never errors; failures are outcomes.
    async fn assemble(&self, source: &Path, output: &Path) -> CompileOutcome;
}

/// The flat assembler, or anything called as `<program> <source> <output>`
pub struct Fasm {
    program: PathBuf,
    timeout: Duration,
}

impl Fasm {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { program: program.into(), timeout }
    }
    
    /// Resolve `program` on PATH
    pub fn locate(program: &str, timeout: Duration) -> BuildResult<Self> {
        let program = which::which(program)
            .map_err(|_| BuildError::ToolNotFound(program.to_string()))?;
        debug!("Using assembler {}", program.display());
        Ok(Self::new(program, timeout))
    }
}

#[async_trait]
impl Assembler for Fasm {
    fn name(&self) -> &str {
        self.program.file_name().and_then(|n| n.to_str()).unwrap_or("assembler")
    }
    
    async fn assemble(&self, source: &Path, output: &Path) -> CompileOutcome {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg(source).arg(output).kill_on_drop(true);
        
        let result = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result,
            Err(_) => return CompileOutcome::Failed(format!("timed out after {:?}", self.timeout)),
        };
        
        match result {
            Err(e) => CompileOutcome::Failed(format!("failed to start {}: {}", self.program.display(), e)),
            Ok(out) if out.status.success() => {
                if output.is_file() {
                    CompileOutcome::Ok(output.to_path_buf())
                } else {
                    CompileOutcome::Failed(format!("{} produced no output", self.name()))
                }
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let stdout = String::from_utf8_lossy(&out.stdout);
                let detail = if stderr.trim().is_empty() { stdout } else { stderr };
                CompileOutcome::Failed(format!("{}: {}", out.status, detail.trim()))
            }
        }
    }
}
