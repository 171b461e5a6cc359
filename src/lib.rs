#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! GLSL source synthesis and GPU binding resolution.
//!
//! A draw item's buffers, the shaders of its material stack and the
//! capabilities of the device go in; a per-stage GLSL program, a cached
//! compiled [`Program`] and a [`ResourceBinder`] that binds everything to
//! the right slot come out.

pub mod binder;
pub mod binding;
pub mod caps;
pub mod codegen;
pub mod draw_item;
pub mod draw_program;
pub mod errors;
pub mod program;
pub mod settings;
pub mod shader;
pub mod utils;

pub use binder::{GraphicsDevice, ProgramIntrospection, ResourceBinder};
pub use binding::{Binding, BindingAllocator, DrawMode, Metadata, StorageClass};
pub use caps::{CapabilityFlags, RenderCaps};
pub use codegen::{CodeGen, GeneratedSources};
pub use draw_item::{BindingRequest, BufferArrayRange, BufferResource, ComponentType, DrawItem};
pub use draw_program::{DrawProgram, DrawProgramBuilder};
pub use errors::{CodegenError, Result};
pub use program::{CacheLookup, Program, ProgramCache, ProgramCompiler};
pub use settings::{CodegenSettings, CollisionPolicy};
pub use shader::{
    GeometricShader, MixinShader, PrimitiveType, ShaderCode, ShaderParam, ShaderStage,
    SurfaceShader, TextureDescriptor, TextureKind,
};
pub use utils::diagnostics::CodingErrors;
pub use utils::interner;
