//! Drawing-coordinate plumbing.
//!
//! The per-draw coordinate vectors are declared in the vertex stage, folded
//! into a `DrawingCoord` struct there and forwarded as flat varyings to every
//! later stage. Instance indices are declared in common text.

use super::glsl::{Declarer, emit_accessor};
use super::templates::{self, DrawingCoordContext};
use super::{CodeGen, StageBuffers};
use crate::errors::Result;
use crate::shader::ShaderStage;
use crate::utils::diagnostics::CodingErrors;

fn template_stage(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::TessControl => "tess_control",
        ShaderStage::TessEval => "tess_eval",
        ShaderStage::Geometry => "geometry",
        ShaderStage::Fragment => "fragment",
    }
}

impl CodeGen {
    pub(super) fn gen_drawing_coord(
        &self,
        out: &mut StageBuffers,
        errors: &mut CodingErrors,
    ) -> Result<()> {
        let md = &self.metadata;
        let culling_pass = self.geometric.is_culling_pass();
        let mut declarer = Declarer::new(&self.caps, errors);

        out.common.push_str(&templates::render_drawing_coord(&DrawingCoordContext {
            stage: "common",
            ..DrawingCoordContext::default()
        })?);

        let mut declarations = String::new();
        for decl in [&md.drawing_coord0, &md.drawing_coord1].into_iter().flatten() {
            declarer.declare(&mut declarations, decl.name_str(), decl.type_str(), decl.binding, 0);
        }
        let has_drawing_coord_i = match &md.drawing_coord_i {
            Some(decl) => declarer.declare(
                &mut declarations,
                decl.name_str(),
                decl.type_str(),
                decl.binding,
                md.instancer_num_levels.max(1),
            ),
            None => false,
        };

        let mut instance_declared = false;
        if let Some(decl) = &md.instance_index_array {
            instance_declared =
                declarer.declare(&mut out.common, decl.name_str(), decl.type_str(), decl.binding, 0);
        }
        let mut culled_accessor = String::new();
        let mut culled_declared = false;
        if let Some(decl) = &md.culled_instance_index_array {
            culled_declared =
                declarer.declare(&mut out.common, decl.name_str(), decl.type_str(), decl.binding, 0);
            if culled_declared && !culling_pass {
                emit_accessor(
                    &mut culled_accessor,
                    decl.name_str(),
                    decl.type_str(),
                    decl.binding,
                    Some("GetInstanceIndexCoord()+localIndex"),
                );
            }
        }
        // the culling pass reads the unculled indices directly
        let has_instance_indices = instance_declared && (culling_pass || culled_declared);

        for stage in ShaderStage::ALL {
            let ctx = DrawingCoordContext {
                stage: template_stage(stage),
                declarations: &declarations,
                culled_accessor: &culled_accessor,
                has_instance_indices,
                has_drawing_coord_i,
                culling_pass,
            };
            out.stage_mut(stage)
                .push_str(&templates::render_drawing_coord(&ctx)?);
        }

        out.proc_vs.push_str(
            "  vsDrawingCoord = GetDrawingCoord();\n  gsDrawingCoord = GetDrawingCoord();\n",
        );
        out.proc_tcs
            .push_str("  tcsDrawingCoord[gl_InvocationID] = vsDrawingCoord[gl_InvocationID];\n");
        out.proc_tes.push_str(
            "  vsDrawingCoord = tcsDrawingCoord[0];\n  gsDrawingCoord = tcsDrawingCoord[0];\n",
        );
        out.proc_gs.push_str("  gsDrawingCoord = vsDrawingCoord[0];\n");

        Ok(())
    }
}
