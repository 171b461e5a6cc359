//! Compiled Programs
//!
//! Device compilation is not done here. Finished per-stage text is handed to
//! a [`ProgramCompiler`] implemented by the host, which reports a handle per
//! stage and a program id, or the diagnostic text of the failure.

pub mod cache;

use std::fmt;

use crate::codegen::GeneratedSources;
use crate::errors::{CodegenError, Result};
use crate::shader::ShaderStage;

pub use cache::{CacheLookup, CacheStats, ProgramCache};

/// One compiled stage as reported by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub handle: u32,
    /// Compiler output for a successful compile (warnings), possibly empty.
    pub log: String,
}

/// External shader compiler.
pub trait ProgramCompiler: Send + Sync {
    /// Compiles one stage. `Err` carries the compiler diagnostics.
    fn compile_stage(
        &self,
        stage: ShaderStage,
        source: &str,
    ) -> std::result::Result<CompiledStage, String>;

    /// Links the compiled stages into a program id. `Err` carries the linker
    /// diagnostics.
    fn link(&self, stages: &[CompiledStage]) -> std::result::Result<u32, String>;
}

/// A linked program and everything it was built from.
pub struct Program {
    hash: u64,
    program_id: u32,
    stages: Vec<CompiledStage>,
    sources: GeneratedSources,
    diagnostics: String,
    source_digest: u128,
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("hash", &format_args!("{:016x}", self.hash))
            .field("program_id", &self.program_id)
            .field("stages", &self.stages.len())
            .finish_non_exhaustive()
    }
}

impl Program {
    /// Compiles every stage of `sources` and links them.
    ///
    /// Stops at the first failing stage. Failures are logged at warn level
    /// with the compiler output and returned as errors.
    pub fn compile(
        hash: u64,
        sources: GeneratedSources,
        compiler: &dyn ProgramCompiler,
    ) -> Result<Self> {
        let mut stages = Vec::new();
        let mut diagnostics = String::new();

        for (stage, text) in sources.iter() {
            match compiler.compile_stage(stage, text) {
                Ok(compiled) => {
                    if !compiled.log.is_empty() {
                        diagnostics.push_str(&format!("[{stage}] {}\n", compiled.log));
                    }
                    stages.push(compiled);
                }
                Err(log) => {
                    log::warn!("Failed to compile {stage} stage of program {hash:016x}:\n{log}");
                    return Err(CodegenError::StageCompile { stage, log });
                }
            }
        }

        let program_id = match compiler.link(&stages) {
            Ok(id) => id,
            Err(log) => {
                log::warn!("Failed to link program {hash:016x}:\n{log}");
                return Err(CodegenError::Link { log });
            }
        };
        log::debug!("Linked program {hash:016x} as {program_id} ({} stages)", stages.len());

        let source_digest = sources.digest();
        Ok(Self {
            hash,
            program_id,
            stages,
            sources,
            diagnostics,
            source_digest,
        })
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    #[must_use]
    pub fn program_id(&self) -> u32 {
        self.program_id
    }

    #[inline]
    #[must_use]
    pub fn stages(&self) -> &[CompiledStage] {
        &self.stages
    }

    #[inline]
    #[must_use]
    pub fn sources(&self) -> &GeneratedSources {
        &self.sources
    }

    #[must_use]
    pub fn source(&self, stage: ShaderStage) -> Option<&str> {
        self.sources.stage(stage)
    }

    /// Compiler warnings collected over all stages.
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &str {
        &self.diagnostics
    }

    #[inline]
    #[must_use]
    pub fn source_digest(&self) -> u128 {
        self.source_digest
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.program_id != 0
    }
}
