//! Draw Programs
//!
//! Runs the whole pipeline for one draw item: resolve bindings, hash, look
//! the program up in the cache (generating and compiling on a miss) and
//! patch the binder from the linked program.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::binder::{ProgramIntrospection, ResourceBinder};
use crate::binding::DrawMode;
use crate::caps::RenderCaps;
use crate::codegen::CodeGen;
use crate::draw_item::{BindingRequest, DrawItem};
use crate::errors::{CodegenError, Result};
use crate::program::{Program, ProgramCache, ProgramCompiler};
use crate::settings::{CodegenSettings, CollisionPolicy};
use crate::shader::{GeometricShader, ShaderCode};
use crate::utils::diagnostics::CodingErrors;
use crate::utils::interner;

/// A linked program together with the binder that knows its slots.
#[derive(Debug)]
pub struct DrawProgram {
    program: Arc<Program>,
    binder: ResourceBinder,
    first_instance: bool,
}

impl DrawProgram {
    #[inline]
    #[must_use]
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    #[inline]
    #[must_use]
    pub fn binder(&self) -> &ResourceBinder {
        &self.binder
    }

    /// Whether this build compiled the program rather than reusing a cached
    /// one.
    #[inline]
    #[must_use]
    pub fn is_first_instance(&self) -> bool {
        self.first_instance
    }

    /// Coding errors of the binder and of the generated sources.
    #[must_use]
    pub fn coding_errors(&self) -> CodingErrors {
        let mut errors = self.binder.coding_errors();
        errors.append(&mut self.program.sources().coding_errors().clone());
        errors
    }
}

pub struct DrawProgramBuilder<'a> {
    caps: &'a RenderCaps,
    settings: &'a CodegenSettings,
    cache: &'a ProgramCache,
    compiler: &'a dyn ProgramCompiler,
    introspection: Option<&'a dyn ProgramIntrospection>,
}

impl<'a> DrawProgramBuilder<'a> {
    #[must_use]
    pub fn new(
        caps: &'a RenderCaps,
        settings: &'a CodegenSettings,
        cache: &'a ProgramCache,
        compiler: &'a dyn ProgramCompiler,
    ) -> Self {
        interner::preload_builtin_names();
        Self {
            caps,
            settings,
            cache,
            compiler,
            introspection: None,
        }
    }

    /// Post-link queries used to patch bindings the compiler placed itself.
    #[must_use]
    pub fn with_introspection(mut self, introspection: &'a dyn ProgramIntrospection) -> Self {
        self.introspection = Some(introspection);
        self
    }

    /// Builds the program for one draw item.
    ///
    /// A failed generation, compile or link returns the error with the
    /// compiler diagnostics. Callers that waited on someone else's failed
    /// compile of the same program get [`CodegenError::SharedCompileFailed`].
    pub fn build(
        &self,
        geometric: Arc<GeometricShader>,
        shaders: Vec<Arc<dyn ShaderCode>>,
        draw_item: &DrawItem,
        custom: &[BindingRequest],
        mode: DrawMode,
    ) -> Result<DrawProgram> {
        let mut binder = ResourceBinder::new(self.settings.reserved_texture_units);

        let metadata = binder.resolve_bindings(self.caps, draw_item, &shaders, custom, mode);

        let codegen = CodeGen::new(
            geometric,
            shaders,
            metadata,
            *self.caps,
            self.settings.clone(),
        );
        let hash = codegen.compute_hash();

        let mut failure = None;
        let compile = || match panic::catch_unwind(AssertUnwindSafe(|| codegen.compile(self.compiler))) {
            Ok(Ok(program)) => Some(program),
            Ok(Err(err)) => {
                log::warn!("Program {hash:016x} not built: {err}");
                failure = Some(err);
                None
            }
            Err(_) => {
                log::error!("Program {hash:016x} not built: {}", CodegenError::CompilerPanicked);
                failure = Some(CodegenError::CompilerPanicked);
                None
            }
        };

        let lookup = match self.settings.collision_policy {
            CollisionPolicy::TrustHash => self.cache.get_or_compile(hash, compile),
            CollisionPolicy::VerifySource => self.cache.get_or_compile_verified(
                hash,
                || codegen.generate().ok().map(|sources| sources.digest()),
                compile,
            ),
        };
        let Some(program) = lookup.program else {
            return Err(failure.unwrap_or(CodegenError::SharedCompileFailed { hash }));
        };

        if let Some(introspection) = self.introspection {
            binder.introspect_bindings(self.caps, program.program_id(), introspection);
        }

        Ok(DrawProgram {
            program,
            binder,
            first_instance: lookup.first_instance,
        })
    }
}
