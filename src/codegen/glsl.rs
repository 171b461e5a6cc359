//! GLSL emission helpers.
//!
//! Every channel is emitted the same way: a declaration whose shape depends
//! on the storage class, then `Get_<name>` accessors. 3-component vectors
//! living in arrays are declared through `packed_*` structs so that std140 /
//! std430 never pad them to 16 bytes.

use crate::binding::{Binding, StorageClass};
use crate::caps::{CapabilityFlags, RenderCaps};
use crate::utils::diagnostics::CodingErrors;

/// Struct standing in for `ty` inside arrays.
#[must_use]
pub fn packed_type(ty: &str) -> &str {
    match ty {
        "ivec3" => "packed_ivec3",
        "vec3" => "packed_vec3",
        "dvec3" => "packed_dvec3",
        _ => ty,
    }
}

/// Conversion applied when reading a packed value back. Non-packed types use
/// their constructor, which is an identity.
#[must_use]
pub fn packed_accessor(ty: &str) -> &str {
    match ty {
        "ivec3" => "packed_ivec3_get",
        "vec3" => "packed_vec3_get",
        "dvec3" => "packed_dvec3_get",
        _ => ty,
    }
}

#[must_use]
pub fn sampler_buffer_type(ty: &str) -> &'static str {
    match ty {
        "int" | "ivec2" | "ivec3" | "ivec4" => "isamplerBuffer",
        _ => "samplerBuffer",
    }
}

/// Swizzle narrowing a 4-component fetch down to `ty`.
#[must_use]
pub fn swizzle(ty: &str) -> &'static str {
    match ty {
        "vec3" | "ivec3" => ".xyz",
        "vec2" | "ivec2" => ".xy",
        "float" | "int" => ".x",
        _ => "",
    }
}

/// `layout (...)` prefix for `binding`, or an empty string when the class
/// has none under `caps`.
#[must_use]
pub fn layout_qualifier(binding: Binding, caps: &RenderCaps) -> String {
    let location = binding.location();
    match binding.class() {
        StorageClass::VertexAttr
        | StorageClass::DrawIndex
        | StorageClass::DrawIndexInstance
        | StorageClass::DrawIndexInstanceArray => format!("layout (location = {location}) "),
        StorageClass::Uniform
        | StorageClass::UniformArray
        | StorageClass::TextureBuffer
        | StorageClass::BindlessUniform
        | StorageClass::Texture2D
        | StorageClass::BindlessTexture2D
        | StorageClass::TexturePtexTexel
        | StorageClass::TexturePtexLayout => {
            if caps.has(CapabilityFlags::EXPLICIT_UNIFORM_LOCATION) {
                format!("layout (location = {location}) ")
            } else {
                String::new()
            }
        }
        StorageClass::StorageBlock => format!("layout (std430, binding = {location}) "),
        StorageClass::UniformBlock => {
            if caps.has(CapabilityFlags::SHADING_LANGUAGE_420PACK) {
                format!("layout (std140, binding = {location}) ")
            } else {
                "layout (std140) ".to_string()
            }
        }
        _ => String::new(),
    }
}

/// Emits declarations, reporting malformed channels as coding errors.
pub struct Declarer<'a> {
    caps: &'a RenderCaps,
    errors: &'a mut CodingErrors,
}

impl<'a> Declarer<'a> {
    pub fn new(caps: &'a RenderCaps, errors: &'a mut CodingErrors) -> Self {
        Self { caps, errors }
    }

    pub fn report(&mut self, message: impl Into<String>) {
        self.errors.report(message);
    }

    /// Declares `name` for `binding`. `array_size == 0` declares a scalar.
    ///
    /// Returns `false` when nothing was emitted; the caller must then skip
    /// the accessor as well.
    ///
    /// ```text
    /// [attribute]  layout (location = L) in T name;
    /// [uniform]    layout (location = L) uniform T name;
    /// [UBO]        layout (std140, binding = L) uniform block_name { T name[N]; };
    /// [SSBO]       layout (std430, binding = L) buffer buffer_L { T name[]; };
    /// [bindless]   layout (location = L) uniform T *name;
    /// ```
    pub fn declare(
        &mut self,
        out: &mut String,
        name: &str,
        ty: &str,
        binding: Binding,
        array_size: u32,
    ) -> bool {
        let class = binding.class();
        if name.is_empty() {
            self.errors.report(format!("Empty channel name for binding type {class}"));
            return false;
        }
        if ty.is_empty() {
            self.errors.report(format!("Unknown dataType for {name}"));
            return false;
        }
        if array_size > 0
            && !matches!(
                class,
                StorageClass::UniformArray
                    | StorageClass::DrawIndexInstanceArray
                    | StorageClass::UniformBlock
                    | StorageClass::StorageBlock
                    | StorageClass::BindlessUniform
            )
        {
            self.errors
                .report(format!("Binding type {class} of {name} cannot be declared as an array"));
            return false;
        }

        let layout = layout_qualifier(binding, self.caps);
        let decl = match class {
            StorageClass::VertexAttr | StorageClass::DrawIndex | StorageClass::DrawIndexInstance => {
                format!("in {ty} {name};\n")
            }
            StorageClass::DrawIndexInstanceArray => format!("in {ty} {name}[{array_size}];\n"),
            StorageClass::Uniform => format!("uniform {ty} {name};\n"),
            StorageClass::UniformArray => format!("uniform {ty} {name}[{array_size}];\n"),
            StorageClass::UniformBlock => {
                let array = if array_size > 0 {
                    format!("[{array_size}]")
                } else {
                    String::new()
                };
                // block_ prefix is matched by ResourceBinder::introspect_bindings
                format!("uniform block_{name} {{\n  {} {name}{array};\n}};\n", packed_type(ty))
            }
            StorageClass::StorageBlock => format!(
                "buffer buffer_{} {{\n  {} {name}[];\n}};\n",
                binding.location(),
                packed_type(ty)
            ),
            StorageClass::TextureBuffer => {
                format!("uniform {} {name};\n", sampler_buffer_type(ty))
            }
            StorageClass::BindlessUniform => format!("uniform {} *{name};\n", packed_type(ty)),
            StorageClass::Texture2D | StorageClass::BindlessTexture2D => {
                format!("uniform sampler2D {name};\n")
            }
            // sampler prefixes are matched by ResourceBinder::introspect_bindings
            StorageClass::TexturePtexTexel => format!("uniform sampler2DArray sampler2darray_{name};\n"),
            StorageClass::TexturePtexLayout => format!("uniform isamplerBuffer isamplerbuffer_{name};\n"),
            _ => {
                self.errors
                    .report(format!("Unknown binding type {class}, for {name}"));
                return false;
            }
        };

        out.push_str(&layout);
        out.push_str(&decl);
        true
    }
}

/// Emits `Get_<name>` for a plain declaration.
///
/// With an `index` expression the value is read from an array (or a buffer
/// texture). Without one only uniforms and vertex attributes get a
/// `Get_<name>(int)`; the `Get_<name>()` overload is always emitted.
pub fn emit_accessor(out: &mut String, name: &str, ty: &str, binding: Binding, index: Option<&str>) {
    let class = binding.class();
    if let Some(index) = index {
        out.push_str(&format!(
            "{ty} Get_{name}(int localIndex) {{\n  int index = {index};\n"
        ));
        if class == StorageClass::TextureBuffer {
            out.push_str(&format!(
                "  return texelFetch({name}, index){};\n}}\n",
                swizzle(ty)
            ));
        } else {
            out.push_str(&format!(
                "  return {}({name}[index]);\n}}\n",
                packed_accessor(ty)
            ));
        }
    } else if matches!(class, StorageClass::Uniform | StorageClass::VertexAttr) {
        out.push_str(&format!(
            "{ty} Get_{name}(int localIndex) {{ return {}({name}); }}\n",
            packed_accessor(ty)
        ));
    }
    // no default arguments in GLSL
    out.push_str(&format!("{ty} Get_{name}() {{ return Get_{name}(0); }}\n"));
}

/// Emits `Get_<name>` for a member of `struct_name`.
///
/// `index` is set when the struct itself is an array; `array_size > 1` when
/// the member is.
pub fn emit_struct_accessor(
    out: &mut String,
    struct_name: &str,
    name: &str,
    ty: &str,
    array_size: u32,
    index: Option<&str>,
) {
    match (index, array_size > 1) {
        (Some(index), true) => out.push_str(&format!(
            "{ty} Get_{name}(int arrayIndex, int localIndex) {{\n  int index = {index};\n  return {struct_name}[index].{name}[arrayIndex];\n}}\n"
        )),
        (Some(index), false) => out.push_str(&format!(
            "{ty} Get_{name}(int localIndex) {{\n  int index = {index};\n  return {struct_name}[index].{name};\n}}\n"
        )),
        (None, true) => out.push_str(&format!(
            "{ty} Get_{name}(int arrayIndex, int localIndex) {{ return {struct_name}.{name}[arrayIndex]; }}\n"
        )),
        (None, false) => out.push_str(&format!(
            "{ty} Get_{name}(int localIndex) {{ return {struct_name}.{name}; }}\n"
        )),
    }
    if array_size > 1 {
        out.push_str(&format!(
            "{ty} Get_{name}(int arrayIndex) {{ return Get_{name}(arrayIndex, 0); }}\n"
        ));
    } else {
        out.push_str(&format!("{ty} Get_{name}() {{ return Get_{name}(0); }}\n"));
    }
}
