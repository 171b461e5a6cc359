//! Primvar passes: constant, instance, element, vertex and face-varying.
//!
//! Constant and instance primvars are readable from every stage and go to
//! common text. Element primvars are indexed by the primitive and are not
//! available to the vertex stage. Vertex primvars travel through the
//! `PrimVars` interface block, copied or interpolated by `ProcessPrimVars`.
//! Face-varying primvars join that block when a geometry stage interpolates
//! them; otherwise the fragment stage reads them directly.

use std::collections::BTreeMap;

use super::glsl::{
    Declarer, emit_accessor, emit_struct_accessor, packed_accessor, swizzle,
};
use super::{CodeGen, StageBuffers};
use crate::binding::{Binding, StorageClass};
use crate::shader::{PrimitiveType, ShaderStage};
use crate::utils::diagnostics::CodingErrors;
use crate::utils::interner::resolve;

const ELEMENT_STAGES: [ShaderStage; 4] = [
    ShaderStage::TessControl,
    ShaderStage::TessEval,
    ShaderStage::Geometry,
    ShaderStage::Fragment,
];

impl CodeGen {
    // ─── Constant ────────────────────────────────────────────────────────────

    pub(super) fn gen_constant_primvars(&self, out: &mut StageBuffers, errors: &mut CodingErrors) {
        let mut declarer = Declarer::new(&self.caps, errors);
        let mut declarations = String::new();
        let mut accessors = String::new();

        for (binding, block) in &self.metadata.constant_data {
            let type_name = format!("ConstantData{}", binding.value());
            let var_name = resolve(block.block_name);

            declarations.push_str(&format!("struct {type_name} {{\n"));
            for entry in &block.entries {
                let name = resolve(entry.name);
                let ty = resolve(entry.data_type);
                if ty.is_empty() {
                    declarer.report(format!("Unknown dataType for {name}"));
                    continue;
                }
                declarations.push_str(&format!("  {ty} {name}"));
                if entry.array_size > 1 {
                    out.common
                        .push_str(&format!("#define NUM_{name} {}\n", entry.array_size));
                    declarations.push_str(&format!("[{}]", entry.array_size));
                }
                declarations.push_str(";\n");

                emit_struct_accessor(
                    &mut accessors,
                    var_name,
                    name,
                    ty,
                    entry.array_size,
                    Some("GetDrawingCoord().constantCoord"),
                );
            }
            declarations.push_str("};\n");

            // UBO members need an explicit size
            declarer.declare(&mut declarations, var_name, &type_name, *binding, 1);
        }

        out.common.push_str(&declarations);
        out.common.push_str(&accessors);
    }

    // ─── Instance ────────────────────────────────────────────────────────────

    pub(super) fn gen_instance_primvars(&self, out: &mut StageBuffers, errors: &mut CodingErrors) {
        let mut declarer = Declarer::new(&self.caps, errors);
        let mut declarations = String::new();
        let mut accessors = String::new();
        let mut levels_by_name: BTreeMap<&str, (&str, Vec<u32>)> = BTreeMap::new();

        for (binding, primvar) in &self.metadata.instance_data {
            let name = resolve(primvar.name);
            let ty = resolve(primvar.data_type);
            let level = primvar.level;
            let level_name = format!("{name}_{level}");

            if !declarer.declare(&mut declarations, &level_name, ty, *binding, 0) {
                continue;
            }
            emit_accessor(
                &mut accessors,
                &level_name,
                ty,
                *binding,
                Some(&format!("GetDrawingCoord().instanceCoords[{level}]")),
            );
            levels_by_name
                .entry(name)
                .or_insert_with(|| (ty, Vec::new()))
                .1
                .push(level);
        }

        // T GetInstance_name(int level, T defaultValue)
        for (name, (ty, levels)) in &levels_by_name {
            accessors.push_str(&format!(
                "{ty} GetInstance_{name}(int level, {ty} defaultValue) {{\n"
            ));
            for level in levels {
                accessors.push_str(&format!(
                    "  if (level == {level}) return Get_{name}_{level}();\n"
                ));
            }
            accessors.push_str("  return defaultValue;\n}\n");
        }

        out.common.push_str(&declarations);
        out.common.push_str(&accessors);
    }

    // ─── Element ─────────────────────────────────────────────────────────────

    pub(super) fn gen_element_primvars(&self, out: &mut StageBuffers, errors: &mut CodingErrors) {
        let mut declarer = Declarer::new(&self.caps, errors);
        let mut declarations = String::new();
        let mut accessors = String::new();
        let primitive_type = self.geometric.primitive_type();

        out.common.push_str("int GetElementID();\n");

        let has_primitive_param = match &self.metadata.primitive_param {
            Some(decl) => {
                let declared = declarer.declare(
                    &mut declarations,
                    decl.name_str(),
                    decl.type_str(),
                    decl.binding,
                    0,
                );
                if declared {
                    emit_accessor(
                        &mut accessors,
                        decl.name_str(),
                        decl.type_str(),
                        decl.binding,
                        Some("GetDrawingCoord().primitiveCoord"),
                    );
                }
                declared
            }
            None => false,
        };

        if has_primitive_param {
            let (patch_param, edge_flag) = match primitive_type {
                PrimitiveType::CoarseQuads => ("ivec3(Get_primitiveParam().y, 0, 0)", "localIndex"),
                PrimitiveType::RefinedQuads => (
                    "ivec3(Get_primitiveParam().y, Get_primitiveParam().z, 0)",
                    "Get_primitiveParam().x & 3",
                ),
                PrimitiveType::Patches => (
                    "ivec3(Get_primitiveParam().y, Get_primitiveParam().z, Get_primitiveParam().w)",
                    "localIndex",
                ),
                _ => ("ivec3(gl_PrimitiveID, 0, 0)", "Get_primitiveParam() & 3"),
            };
            accessors.push_str(&format!(
                "ivec3 GetPatchParam() {{\n  return {patch_param};\n}}\n"
            ));
            accessors.push_str(&format!(
                "int GetEdgeFlag(int localIndex) {{\n  return {edge_flag};\n}}\n"
            ));
            accessors.push_str(
                "int GetElementID() {\n  return (int_get(Get_primitiveParam()) >> 2) + GetDrawingCoord().elementCoord;\n}\n",
            );
            accessors.push_str(&format!(
                "int GetFVarIndex(int localIndex) {{\n  int fvarCoord = GetDrawingCoord().fvarCoord;\n  int ptexIndex = GetPatchParam().x & 0xfffffff;\n  return fvarCoord + ptexIndex * {} + localIndex;\n}}\n",
                primitive_type.fvar_stride()
            ));
        } else {
            accessors.push_str(
                "ivec3 GetPatchParam() {\n  return ivec3(0, 0, 0);\n}\n\
                 int GetEdgeFlag(int localIndex) {\n  return 0;\n}\n\
                 int GetElementID() {\n  return 0;\n}\n\
                 int GetFVarIndex(int localIndex) {\n  return 0;\n}\n",
            );
        }

        for (binding, primvar) in &self.metadata.element_data {
            let name = resolve(primvar.name);
            let ty = resolve(primvar.data_type);
            if declarer.declare(&mut declarations, name, ty, *binding, 0) {
                emit_accessor(&mut accessors, name, ty, *binding, Some("GetElementID()"));
            }
        }

        out.push_stages(&ELEMENT_STAGES, &declarations);
        out.push_stages(&ELEMENT_STAGES, &accessors);
    }

    // ─── Vertex and Face-Varying ─────────────────────────────────────────────

    pub(super) fn gen_vertex_primvars(&self, out: &mut StageBuffers, errors: &mut CodingErrors) {
        let mut declarer = Declarer::new(&self.caps, errors);
        let primitive_type = self.geometric.primitive_type();

        let mut interface = String::new();
        let mut vs_declarations = String::new();
        let mut vs_accessors = String::new();
        let mut tcs_accessors = String::new();
        let mut tes_accessors = String::new();
        let mut gs_declarations = String::new();
        let mut gs_accessors = String::new();
        let mut fs_accessors = String::new();

        for (binding, primvar) in &self.metadata.vertex_data {
            let name = resolve(primvar.name);
            let ty = resolve(primvar.data_type);
            if !declarer.declare(&mut vs_declarations, name, ty, *binding, 0) {
                continue;
            }
            interface.push_str(&format!("  {ty} {name};\n"));

            emit_accessor(&mut vs_accessors, name, ty, *binding, None);
            emit_struct_accessor(&mut tcs_accessors, "inPrimVars", name, ty, 1, Some("gl_InvocationID"));
            emit_struct_accessor(&mut tes_accessors, "inPrimVars", name, ty, 1, Some("localIndex"));
            emit_struct_accessor(&mut gs_accessors, "inPrimVars", name, ty, 1, Some("localIndex"));
            emit_struct_accessor(&mut fs_accessors, "inPrimVars", name, ty, 1, None);

            out.proc_vs
                .push_str(&format!("  outPrimVars.{name} = {name};\n"));
            out.proc_tcs.push_str(&format!(
                "  outPrimVars[gl_InvocationID].{name} = inPrimVars[gl_InvocationID].{name};\n"
            ));
            out.proc_tes.push_str(&format!(
                "  outPrimVars.{name} = mix(mix(inPrimVars[i3].{name}, inPrimVars[i2].{name}, u), mix(inPrimVars[i1].{name}, inPrimVars[i0].{name}, u), v);\n"
            ));
            out.proc_gs
                .push_str(&format!("  outPrimVars.{name} = inPrimVars[index].{name};\n"));
        }

        // without a geometry stage the fragment stage fetches face-varying
        // data itself; points have no faces to vary over
        let has_gs = self.geometric.has_stage(ShaderStage::Geometry);
        let mut fs_declarations = String::new();
        for (binding, primvar) in &self.metadata.fvar_data {
            let name = resolve(primvar.name);
            let ty = resolve(primvar.data_type);

            if !has_gs {
                if primitive_type != PrimitiveType::Points
                    && declarer.declare(&mut fs_declarations, name, ty, *binding, 0)
                {
                    emit_fvar_accessor(&mut fs_accessors, name, ty, *binding, primitive_type);
                }
                continue;
            }

            if !declarer.declare(&mut gs_declarations, name, ty, *binding, 0) {
                continue;
            }
            interface.push_str(&format!("  {ty} {name};\n"));

            emit_accessor(&mut gs_accessors, name, ty, *binding, Some("GetFVarIndex(localIndex)"));
            emit_struct_accessor(&mut fs_accessors, "inPrimVars", name, ty, 1, None);

            out.proc_vs
                .push_str(&format!("  outPrimVars.{name} = {ty}(0);\n"));
            out.proc_tcs.push_str(&format!(
                "  outPrimVars[gl_InvocationID].{name} = inPrimVars[gl_InvocationID].{name};\n"
            ));
            out.proc_tes.push_str(&format!(
                "  outPrimVars.{name} = mix(mix(inPrimVars[i3].{name}, inPrimVars[i2].{name}, u), mix(inPrimVars[i1].{name}, inPrimVars[i0].{name}, u), v);\n"
            ));
            if primitive_type.is_bilinear() {
                out.proc_gs.push_str(&format!(
                    "  outPrimVars.{name} = mix(mix(Get_{name}(0), Get_{name}(1), localST.x), mix(Get_{name}(3), Get_{name}(2), localST.x), localST.y);\n"
                ));
            } else {
                out.proc_gs.push_str(&format!(
                    "  outPrimVars.{name} = Get_{name}(0) * localST.x + Get_{name}(1) * localST.y + Get_{name}(2) * (1 - localST.x - localST.y);\n"
                ));
            }
        }

        out.vs.push_str(&vs_declarations);
        out.gs.push_str(&gs_declarations);
        if !interface.is_empty() {
            let block = |qualifier: &str, var: &str| {
                format!("{qualifier} PrimVars {{\n{interface}}} {var};\n")
            };
            out.vs.push_str(&block("out", "outPrimVars"));
            out.tcs
                .push_str(&block("in", "inPrimVars[gl_MaxPatchVertices]"));
            out.tcs
                .push_str(&block("out", "outPrimVars[NUM_PATCH_VERTS]"));
            out.tes
                .push_str(&block("in", "inPrimVars[gl_MaxPatchVertices]"));
            out.tes.push_str(&block("out", "outPrimVars"));
            out.gs
                .push_str(&block("in", "inPrimVars[NUM_PRIMITIVE_VERTS]"));
            out.gs.push_str(&block("out", "outPrimVars"));
            out.fs.push_str(&block("in", "inPrimVars"));
        }

        out.fs.push_str(&fs_declarations);
        out.fs.push_str(
            "vec4 GetPatchCoord(int index);\nvec4 GetPatchCoord() { return GetPatchCoord(0); }\n",
        );

        out.vs.push_str(&vs_accessors);
        out.tcs.push_str(&tcs_accessors);
        out.tes.push_str(&tes_accessors);
        out.gs.push_str(&gs_accessors);
        out.fs.push_str(&fs_accessors);

        out.gs.push_str("vec4 GetPatchCoord(int localIndex);\n");
    }
}

/// Fragment-stage face-varying accessors.
///
/// `Get_<name>_Coarse(i)` reads the value authored at corner `i` of the
/// primitive. `Get_<name>(i)` interpolates the corners at the patch
/// coordinate of `i`.
fn emit_fvar_accessor(
    out: &mut String,
    name: &str,
    ty: &str,
    binding: Binding,
    primitive_type: PrimitiveType,
) {
    let fetch = if binding.class() == StorageClass::TextureBuffer {
        format!("texelFetch({name}, fvarIndex){}", swizzle(ty))
    } else {
        format!("{}({name}[fvarIndex])", packed_accessor(ty))
    };
    out.push_str(&format!(
        "{ty} Get_{name}_Coarse(int localIndex) {{\n  int fvarIndex = GetFVarIndex(localIndex);\n  return {fetch};\n}}\n"
    ));

    let coarse = |corner: u32| format!("Get_{name}_Coarse({corner})");
    let value = if primitive_type.is_bilinear() {
        format!(
            "mix(mix({}, {}, st.x), mix({}, {}, st.x), st.y)",
            coarse(0),
            coarse(1),
            coarse(3),
            coarse(2)
        )
    } else if primitive_type == PrimitiveType::Triangles {
        format!(
            "{} * st.x + {} * st.y + {} * (1 - st.x - st.y)",
            coarse(0),
            coarse(1),
            coarse(2)
        )
    } else {
        format!("Get_{name}_Coarse(localIndex)")
    };
    out.push_str(&format!(
        "{ty} Get_{name}(int localIndex) {{\n  vec2 st = GetPatchCoord(localIndex).xy;\n  return {value};\n}}\n"
    ));
    out.push_str(&format!("{ty} Get_{name}() {{ return Get_{name}(0); }}\n"));
}

