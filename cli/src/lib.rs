pub mod assembler;
pub mod build;

pub use assembler::{Assembler, CompileOutcome, Fasm};
pub use build::{BuildReport, Orchestrator, Source, SourceKind, SourceState};
