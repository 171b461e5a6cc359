//! Post-link binding introspection.
//!
//! Without `layout (binding = N)` on blocks or `layout (location = N)` on
//! uniforms the compiler picks the slots itself. After linking, the binder
//! asks the program where things ended up and patches its map; channels the
//! compiler removed become [`Binding::NOT_EXIST`].

use super::{NameAndLevel, ResourceBinder, SURFACE_SHADER_PARAMS};
use crate::binding::{Binding, StorageClass};
use crate::caps::{CapabilityFlags, RenderCaps};
use crate::utils::interner;

/// Block declarations are emitted as `block_<name>`.
const BLOCK_PREFIX: &str = "block_";

/// Variable name of the interleaved shader parameter block.
const SHADER_DATA_VAR: &str = "shaderData";

/// Queries on a linked program, implemented by the host.
pub trait ProgramIntrospection {
    /// Names of the active uniform blocks, indexed by block index.
    fn active_uniform_blocks(&self, program: u32) -> Vec<String>;

    /// Location of an active uniform, `None` when it was optimized away.
    fn uniform_location(&self, program: u32, name: &str) -> Option<u32>;

    fn set_uniform_block_binding(&self, program: u32, block_index: u32, binding: u32);
}

impl ResourceBinder {
    /// Patches the binding map with the locations `program` actually uses.
    pub fn introspect_bindings(
        &mut self,
        caps: &RenderCaps,
        program: u32,
        introspection: &dyn ProgramIntrospection,
    ) {
        if !caps.has(CapabilityFlags::SHADING_LANGUAGE_420PACK) {
            for (index, block_name) in introspection.active_uniform_blocks(program).iter().enumerate() {
                let Some(name) = block_name.strip_prefix(BLOCK_PREFIX) else {
                    continue;
                };
                let name = if name == SHADER_DATA_VAR { SURFACE_SHADER_PARAMS } else { name };
                let binding = self.get_binding(name, None);
                if binding.is_valid() {
                    introspection.set_uniform_block_binding(program, index as u32, binding.location());
                } else {
                    log::trace!("uniform block {block_name} has no channel");
                }
            }
        }

        if !caps.has(CapabilityFlags::EXPLICIT_UNIFORM_LOCATION) {
            for (key, binding) in &mut self.binding_map {
                let NameAndLevel { name, level } = *key;
                let name = interner::resolve(name);
                let uniform_name = match binding.class() {
                    StorageClass::Uniform | StorageClass::UniformArray | StorageClass::TextureBuffer => {
                        match level {
                            Some(level) => format!("{name}_{level}"),
                            None => name.to_string(),
                        }
                    }
                    StorageClass::Texture2D => format!("sampler2d_{name}"),
                    StorageClass::TexturePtexTexel => format!("sampler2darray_{name}"),
                    StorageClass::TexturePtexLayout => format!("isamplerbuffer_{name}"),
                    _ => continue,
                };
                let location = introspection
                    .uniform_location(program, &uniform_name)
                    .unwrap_or(Binding::NOT_EXIST);
                *binding = binding.with_location(location);
            }
        }
    }
}
