//! Error Types
//!
//! This module defines the error types used throughout the code generator.
//!
//! # Overview
//!
//! The main error type [`CodegenError`] covers the failures that come from
//! outside this crate's control:
//! - Template rendering of the embedded GLSL chunks
//! - Settings and capability snapshots loaded from JSON
//! - Stage compilation and program linking reported by the external compiler
//!
//! Internal invariant violations (unknown storage class, missing data type,
//! duplicate channel) are *not* errors in this sense. They are reported as
//! coding errors through [`CodingErrors`](crate::utils::diagnostics::CodingErrors)
//! and the affected unit of work is skipped.
//!
//! # Usage
//!
//! ```rust,ignore
//! use shadergen::errors::{CodegenError, Result};
//!
//! fn load() -> Result<CodegenSettings> {
//!     CodegenSettings::from_json(text)
//! }
//! ```

use thiserror::Error;

use crate::shader::ShaderStage;

/// The main error type for shader generation.
#[derive(Error, Debug)]
pub enum CodegenError {
    // ========================================================================
    // Template Errors
    // ========================================================================
    /// Failed to load or render an embedded GLSL chunk.
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings or capability JSON could not be parsed.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),

    // ========================================================================
    // Compiler Errors
    // ========================================================================
    /// A single stage failed to compile.
    #[error("Failed to compile {stage} stage:\n{log}")]
    StageCompile {
        /// The stage that failed
        stage: ShaderStage,
        /// Diagnostic text from the compiler
        log: String,
    },

    /// The program failed to link.
    #[error("Failed to link program:\n{log}")]
    Link {
        /// Diagnostic text from the linker
        log: String,
    },

    /// The geometric shader did not supply a vertex stage.
    #[error("Geometric shader has no vertex stage source")]
    MissingVertexStage,

    /// The thread compiling a program panicked before publishing a result.
    #[error("Program compile was abandoned by a panicking thread")]
    CompilerPanicked,

    /// Another caller compiled the same program concurrently and failed.
    /// The diagnostics were returned to that caller.
    #[error("Program {hash:016x} failed to build in a concurrent compile")]
    SharedCompileFailed {
        /// Cache key of the program
        hash: u64,
    },
}

/// Alias for `Result<T, CodegenError>`.
pub type Result<T> = std::result::Result<T, CodegenError>;
