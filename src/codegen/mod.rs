//! Code Generator
//!
//! Turns a binding plan ([`Metadata`]) plus a shader stack into complete
//! GLSL for every active stage.
//!
//! # Layout of a generated stage
//!
//! ```text
//! #version / #extension / shims / packed helpers     preamble.glsl
//! custom bindings, HAS_ / NUM_ macros               common
//! Common text of the geometric shader and the stack  common
//! DrawingCoord, constant and instance accessors      common
//! per-stage declarations and accessors               stage
//! void ProcessPrimVars(...)                          stage (plumbing)
//! stage text of the stack, then of the geometric shader
//! ```
//!
//! The geometric shader owns `main()` and is emitted last. Stages other than
//! the vertex stage exist only when the geometric shader supplies text for
//! them.

mod drawing_coord;
pub mod glsl;
mod params;
mod primvars;
pub mod templates;

use std::sync::Arc;

use xxhash_rust::xxh3::Xxh3;

use crate::binding::{Metadata, StorageClass};
use crate::caps::RenderCaps;
use crate::errors::{CodegenError, Result};
use crate::program::{Program, ProgramCompiler};
use crate::settings::CodegenSettings;
use crate::shader::{
    GeometricShader, PrimitiveType, ShaderCode, ShaderStage, SourceKey, compute_stack_hash,
};
use crate::utils::diagnostics::CodingErrors;
use crate::utils::hash::{fx_hash_key, hash_combine};
use crate::utils::interner::resolve;

use glsl::{Declarer, emit_accessor, emit_struct_accessor};

// ─── Generated Sources ────────────────────────────────────────────────────────

/// Final per-stage source text of one program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedSources {
    stages: [Option<String>; 5],
    coding_errors: CodingErrors,
}

impl GeneratedSources {
    #[must_use]
    pub fn stage(&self, stage: ShaderStage) -> Option<&str> {
        self.stages[stage.index()].as_deref()
    }

    #[must_use]
    pub fn has_stage(&self, stage: ShaderStage) -> bool {
        self.stages[stage.index()].is_some()
    }

    /// Active stages in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (ShaderStage, &str)> {
        ShaderStage::ALL
            .into_iter()
            .filter_map(|stage| self.stage(stage).map(|text| (stage, text)))
    }

    /// Coding errors raised while generating.
    #[must_use]
    pub fn coding_errors(&self) -> &CodingErrors {
        &self.coding_errors
    }

    /// 128-bit digest of every active stage.
    #[must_use]
    pub fn digest(&self) -> u128 {
        let mut state = Xxh3::new();
        for (stage, text) in self.iter() {
            state.update(&(stage.index() as u32).to_le_bytes());
            state.update(&(text.len() as u64).to_le_bytes());
            state.update(text.as_bytes());
        }
        state.digest128()
    }
}

/// Accumulators filled by the generation passes.
#[derive(Debug, Default)]
struct StageBuffers {
    common: String,
    vs: String,
    tcs: String,
    tes: String,
    gs: String,
    fs: String,
    proc_vs: String,
    proc_tcs: String,
    proc_tes: String,
    proc_gs: String,
}

impl StageBuffers {
    fn stage_mut(&mut self, stage: ShaderStage) -> &mut String {
        match stage {
            ShaderStage::Vertex => &mut self.vs,
            ShaderStage::TessControl => &mut self.tcs,
            ShaderStage::TessEval => &mut self.tes,
            ShaderStage::Geometry => &mut self.gs,
            ShaderStage::Fragment => &mut self.fs,
        }
    }

    /// Appends `text` to each of `stages`.
    fn push_stages(&mut self, stages: &[ShaderStage], text: &str) {
        for &stage in stages {
            self.stage_mut(stage).push_str(text);
        }
    }
}

// ─── CodeGen ──────────────────────────────────────────────────────────────────

/// Generates and compiles one program.
pub struct CodeGen {
    geometric: Arc<GeometricShader>,
    shaders: Vec<Arc<dyn ShaderCode>>,
    metadata: Metadata,
    caps: RenderCaps,
    settings: CodegenSettings,
}

impl CodeGen {
    #[must_use]
    pub fn new(
        geometric: Arc<GeometricShader>,
        shaders: Vec<Arc<dyn ShaderCode>>,
        metadata: Metadata,
        caps: RenderCaps,
        settings: CodegenSettings,
    ) -> Self {
        Self {
            geometric,
            shaders,
            metadata,
            caps,
            settings,
        }
    }

    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Cache key of the program: geometric shader, binding plan and shader
    /// stack, plus the capability and settings inputs of the preamble.
    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        let mut hash = self.geometric.compute_hash();
        hash = hash_combine(hash, self.metadata.compute_hash());
        hash = hash_combine(hash, compute_stack_hash(&self.shaders));
        hash_combine(
            hash,
            fx_hash_key(&(
                self.caps.glsl_version,
                self.caps.flags.bits(),
                self.settings.shader_api_version,
                self.settings.double_matrices,
            )),
        )
    }

    /// Generates and compiles every active stage, then links them.
    pub fn compile(&self, compiler: &dyn ProgramCompiler) -> Result<Program> {
        let hash = self.compute_hash();
        if !self.geometric.has_stage(ShaderStage::Vertex) {
            return Err(CodegenError::MissingVertexStage);
        }
        let sources = self.generate()?;
        Program::compile(hash, sources, compiler)
    }

    /// Generates the source of every active stage.
    pub fn generate(&self) -> Result<GeneratedSources> {
        let mut errors = CodingErrors::new();
        let mut out = StageBuffers::default();
        let primitive_type = self.geometric.primitive_type();

        out.common = templates::render_preamble(&self.caps, &self.settings)?;

        self.gen_custom_bindings(&mut out.common, &mut errors);
        self.gen_primitive_macros(&mut out.common);

        if self.metadata.shader_parameters.keys().any(|b| {
            matches!(
                b.class(),
                StorageClass::TexturePtexTexel | StorageClass::BindlessTexturePtexTexel
            )
        }) {
            out.common.push_str(&templates::render_ptex_helpers()?);
        }

        self.gen_existence_macros(&mut out.common);

        out.common
            .push_str(&self.geometric.source(SourceKey::Common));
        for shader in &self.shaders {
            out.common.push_str(&shader.source(SourceKey::Common));
        }

        out.proc_vs.push_str("void ProcessPrimVars() {\n");
        out.proc_tcs.push_str("void ProcessPrimVars() {\n");
        out.proc_tes
            .push_str("void ProcessPrimVars(float u, float v, int i0, int i1, int i2, int i3) {\n");
        out.proc_gs.push_str(match primitive_type {
            PrimitiveType::RefinedQuads | PrimitiveType::Patches => {
                "vec4 GetPatchCoord(int index);\nvoid ProcessPrimVars(int index) {\n  vec2 localST = GetPatchCoord(index).xy;\n"
            }
            PrimitiveType::CoarseQuads => {
                "void ProcessPrimVars(int index) {\n  vec2 localST = vec2[](vec2(0,0), vec2(1,0), vec2(1,1), vec2(0,1))[index];\n"
            }
            _ => {
                "void ProcessPrimVars(int index) {\n  vec2 localST = vec2[](vec2(1,0), vec2(0,1), vec2(0,0))[index];\n"
            }
        });

        self.gen_drawing_coord(&mut out, &mut errors)?;
        self.gen_constant_primvars(&mut out, &mut errors);
        self.gen_instance_primvars(&mut out, &mut errors);
        self.gen_element_primvars(&mut out, &mut errors);
        self.gen_vertex_primvars(&mut out, &mut errors);
        self.gen_shader_parameters(&mut out, &mut errors);

        for proc in [
            &mut out.proc_vs,
            &mut out.proc_tcs,
            &mut out.proc_tes,
            &mut out.proc_gs,
        ] {
            proc.push_str("}\n");
        }
        let StageBuffers {
            vs,
            tcs,
            tes,
            gs,
            proc_vs,
            proc_tcs,
            proc_tes,
            proc_gs,
            ..
        } = &mut out;
        vs.push_str(proc_vs);
        tcs.push_str(proc_tcs);
        tes.push_str(proc_tes);
        gs.push_str(proc_gs);

        let mut active = ShaderStage::ALL.map(|stage| {
            stage == ShaderStage::Vertex || self.geometric.has_stage(stage)
        });
        let tcs_index = ShaderStage::TessControl.index();
        let tes_index = ShaderStage::TessEval.index();
        if active[tcs_index] != active[tes_index] {
            errors.report(
                "tess control and tess evaluation sources must be provided together",
            );
            active[tcs_index] = false;
            active[tes_index] = false;
        }

        for shader in &self.shaders {
            for stage in ShaderStage::ALL {
                if active[stage.index()] {
                    out.stage_mut(stage)
                        .push_str(&shader.source(SourceKey::Stage(stage)));
                }
            }
        }
        for stage in ShaderStage::ALL {
            if active[stage.index()] {
                out.stage_mut(stage)
                    .push_str(&self.geometric.source(SourceKey::Stage(stage)));
            }
        }

        let mut stages: [Option<String>; 5] = Default::default();
        for stage in ShaderStage::ALL {
            if active[stage.index()] {
                let body = std::mem::take(out.stage_mut(stage));
                let text = format!("{}{}", out.common, body);
                if self.settings.dump_generated_source {
                    log::debug!("Generated {stage} source:\n{text}");
                }
                stages[stage.index()] = Some(text);
            }
        }

        Ok(GeneratedSources {
            stages,
            coding_errors: errors,
        })
    }

    // ─── Common Sections ─────────────────────────────────────────────────────

    fn gen_custom_bindings(&self, common: &mut String, errors: &mut CodingErrors) {
        let mut declarer = Declarer::new(&self.caps, errors);
        let mut declarations = String::new();
        let mut accessors = String::new();

        for decl in &self.metadata.custom_bindings {
            let name = decl.name_str();
            common.push_str(&format!(
                "#define {name}_Binding {}\n#define HAS_{name} 1\n",
                decl.binding.location()
            ));

            // typeless bindings only get the macros
            if decl.is_typeless() {
                continue;
            }

            if declarer.declare(&mut declarations, name, decl.type_str(), decl.binding, 0) {
                let index = if decl.binding.class() == StorageClass::Uniform {
                    None
                } else {
                    Some("localIndex")
                };
                emit_accessor(&mut accessors, name, decl.type_str(), decl.binding, index);
            }
        }

        for (binding, block) in &self.metadata.custom_interleaved {
            let type_name = format!("CustomBlockData{}", binding.value());
            let var_name = resolve(block.block_name);

            declarations.push_str(&format!("struct {type_name} {{\n"));
            for entry in &block.entries {
                let name = resolve(entry.name);
                let ty = resolve(entry.data_type);
                if ty.is_empty() {
                    declarer.report(format!("Unknown dataType for {name}"));
                    continue;
                }
                common.push_str(&format!("#define HAS_{name} 1\n"));
                declarations.push_str(&format!("  {ty} {name}"));
                if entry.array_size > 1 {
                    common.push_str(&format!("#define NUM_{name} {}\n", entry.array_size));
                    declarations.push_str(&format!("[{}]", entry.array_size));
                }
                declarations.push_str(";\n");

                emit_struct_accessor(&mut accessors, var_name, name, ty, entry.array_size, None);
            }
            declarations.push_str("};\n");
            declarer.declare(&mut declarations, var_name, &type_name, *binding, 0);
        }

        common.push_str(&declarations);
        common.push_str(&accessors);
    }

    fn gen_primitive_macros(&self, common: &mut String) {
        let primitive_type = self.geometric.primitive_type();
        let tessellated = self.geometric.has_stage(ShaderStage::TessControl)
            || self.geometric.has_stage(ShaderStage::TessEval);

        if primitive_type == PrimitiveType::Patches || tessellated {
            common.push_str(&format!(
                "#define NUM_PATCH_VERTS {}\n",
                self.geometric.patch_vertices()
            ));
        }
        // tessellated patches reach the geometry stage as triangles
        let primitive_verts = if primitive_type == PrimitiveType::Patches {
            3
        } else {
            self.geometric.primitive_index_size()
        };
        common.push_str(&format!("#define NUM_PRIMITIVE_VERTS {primitive_verts}\n"));
        common.push_str(&format!("#define {} 1\n", primitive_type.define_name()));
    }

    fn gen_existence_macros(&self, common: &mut String) {
        let md = &self.metadata;
        for block in md.constant_data.values() {
            for entry in &block.entries {
                common.push_str(&format!("#define HAS_{} 1\n", resolve(entry.name)));
            }
        }
        for primvar in md.instance_data.values() {
            let name = resolve(primvar.name);
            common.push_str(&format!(
                "#define HAS_INSTANCE_{name} 1\n#define HAS_{name}_{} 1\n",
                primvar.level
            ));
        }
        common.push_str(&format!(
            "#define INSTANCER_NUM_LEVELS {}\n#define INSTANCE_INDEX_WIDTH {}\n",
            md.instancer_num_levels,
            md.instance_index_width()
        ));
        for primvar in md
            .element_data
            .values()
            .chain(md.fvar_data.values())
            .chain(md.vertex_data.values())
        {
            common.push_str(&format!("#define HAS_{} 1\n", resolve(primvar.name)));
        }
        for param in md.shader_parameters.values() {
            common.push_str(&format!("#define HAS_{} 1\n", resolve(param.name)));
        }
    }
}
