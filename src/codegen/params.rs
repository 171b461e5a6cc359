//! Shader parameter accessors for the fragment and geometry stages.

use super::glsl::{Declarer, layout_qualifier, swizzle};
use super::{CodeGen, StageBuffers};
use crate::binding::{ShaderParameterAccessor, StorageClass};
use crate::utils::diagnostics::CodingErrors;
use crate::utils::interner::resolve;

/// `Get_<coord>().xy` when the coordinate primvar exists, `vec2(0.0, 0.0)`
/// otherwise.
fn sampler_coord(param: &ShaderParameterAccessor) -> String {
    match param.in_primvars.first() {
        Some(coord) => {
            let coord = resolve(*coord);
            format!("\n#if defined(HAS_{coord})\n  Get_{coord}().xy\n#else\n  vec2(0.0, 0.0)\n#endif\n")
        }
        None => "vec2(0.0, 0.0)".to_string(),
    }
}

/// The three ptex accessor overloads. `texel` and `layout` are the sampler
/// expressions.
fn emit_ptex_accessors(out: &mut String, name: &str, ty: &str, texel: &str, layout: &str, prelude: &str) {
    let sw = swizzle(ty);
    out.push_str(&format!(
        "{ty} Get_{name}(int localIndex) {{\n{prelude}  return {ty}(PtexTextureLookup({texel}, {layout}, GetPatchCoord(localIndex)){sw});\n}}\n"
    ));
    out.push_str(&format!("{ty} Get_{name}() {{ return Get_{name}(0); }}\n"));
    out.push_str(&format!(
        "{ty} Get_{name}(vec4 patchCoord) {{\n{prelude}  return {ty}(PtexTextureLookup({texel}, {layout}, patchCoord){sw});\n}}\n"
    ));
}

const SHADER_COORD: &str = "  int shaderCoord = GetDrawingCoord().shaderCoord;\n";

impl CodeGen {
    pub(super) fn gen_shader_parameters(&self, out: &mut StageBuffers, errors: &mut CodingErrors) {
        let mut declarer = Declarer::new(&self.caps, errors);
        let mut declarations = String::new();
        let mut accessors = String::new();

        // the shader data block is interleaved, there is only ever one
        if let Some((binding, block)) = self.metadata.shader_data.iter().next() {
            declarations.push_str("struct ShaderData {\n");
            for entry in &block.entries {
                declarations.push_str(&format!(
                    "  {} {};\n",
                    resolve(entry.data_type),
                    resolve(entry.name)
                ));
            }
            declarations.push_str("};\n");
            let array_size = u32::from(binding.class() == StorageClass::UniformBlock);
            declarer.declare(&mut declarations, "shaderData", "ShaderData", *binding, array_size);
        }

        for (binding, param) in &self.metadata.shader_parameters {
            let name = resolve(param.name);
            let ty = resolve(param.data_type);
            let sw = swizzle(ty);

            match binding.class() {
                StorageClass::Fallback => {
                    accessors.push_str(&format!(
                        "{ty} Get_{name}(int localIndex) {{\n{SHADER_COORD}  return shaderData[shaderCoord].{name}{sw};\n}}\n"
                    ));
                    accessors.push_str(&format!("{ty} Get_{name}() {{ return Get_{name}(0); }}\n"));
                }
                StorageClass::BindlessTexture2D => {
                    if self.caps.supports_sampler_return() {
                        accessors.push_str(&format!(
                            "sampler2D GetSampler_{name}() {{\n{SHADER_COORD}  return sampler2D(shaderData[shaderCoord].{name});\n}}\n"
                        ));
                    }
                    accessors.push_str(&format!(
                        "{ty} Get_{name}() {{\n{SHADER_COORD}  return texture(sampler2D(shaderData[shaderCoord].{name}), {}){sw};\n}}\n",
                        sampler_coord(param)
                    ));
                }
                StorageClass::Texture2D => {
                    declarations.push_str(&format!(
                        "{}uniform sampler2D sampler2d_{name};\n",
                        layout_qualifier(*binding, &self.caps)
                    ));
                    if self.caps.supports_sampler_return() {
                        accessors.push_str(&format!(
                            "sampler2D GetSampler_{name}() {{ return sampler2d_{name}; }}\n"
                        ));
                    }
                    accessors.push_str(&format!(
                        "{ty} Get_{name}(vec2 coord) {{ return texture(sampler2d_{name}, coord){sw}; }}\n"
                    ));
                    accessors.push_str(&format!(
                        "{ty} Get_{name}() {{ return Get_{name}({}); }}\n",
                        sampler_coord(param)
                    ));
                }
                StorageClass::BindlessTexturePtexTexel => {
                    emit_ptex_accessors(
                        &mut accessors,
                        name,
                        ty,
                        &format!("sampler2DArray(shaderData[shaderCoord].{name})"),
                        &format!("isamplerBuffer(shaderData[shaderCoord].{name}_layout)"),
                        SHADER_COORD,
                    );
                }
                StorageClass::TexturePtexTexel => {
                    if declarer.declare(&mut declarations, name, ty, *binding, 0) {
                        emit_ptex_accessors(
                            &mut accessors,
                            name,
                            ty,
                            &format!("sampler2darray_{name}"),
                            &format!("isamplerbuffer_{name}_layout"),
                            "",
                        );
                    }
                }
                StorageClass::TexturePtexLayout => {
                    declarer.declare(&mut declarations, name, ty, *binding, 0);
                }
                StorageClass::BindlessTexturePtexLayout => {}
                StorageClass::PrimvarRedirect => {
                    let Some(source) = param.in_primvars.first().map(|s| resolve(*s)) else {
                        declarer.report(format!("Primvar redirect {name} has no source primvar"));
                        continue;
                    };
                    // same name: the primvar accessor already serves the parameter
                    if source != name {
                        accessors.push_str(&format!(
                            "{ty} Get_{name}() {{\n#if defined(HAS_{source})\n  return Get_{source}();\n#else\n  return {ty}(0);\n#endif\n}}\n"
                        ));
                    }
                }
                class => {
                    declarer.report(format!("Unknown binding type {class}, for shader parameter {name}"));
                }
            }
        }

        for text in [&declarations, &accessors] {
            out.fs.push_str(text);
            out.gs.push_str(text);
        }
    }
}
