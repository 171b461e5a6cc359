//! Resource Binder
//!
//! Owns the name → [`Binding`] map of one program and drives the device
//! with it:
//!
//! - [`ResourceBinder::resolve_bindings`] decides the storage class of
//!   every channel and produces the [`Metadata`] the code generator consumes
//! - [`ResourceBinder::introspect_bindings`] patches the map with the
//!   locations the compiler actually assigned
//! - the `bind_*` / `unbind_*` family issues the class-specific device calls
//!
//! Device calls are not thread-safe. They must be issued on the thread that
//! owns the graphics context; the binder does not check this.

pub mod device;
mod introspect;
mod resolve;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::binding::{Binding, StorageClass};
use crate::draw_item::{BindingRequest, BindingRequestKind, BufferArrayRange, BufferResource};
use crate::shader::{ShaderCode, TextureKind};
use crate::utils::diagnostics::CodingErrors;
use crate::utils::interner::{self, Symbol};

pub use device::{BufferTarget, DRAW_CONSTANT_DIVISOR, GraphicsDevice, TextureTarget};
pub use introspect::ProgramIntrospection;

/// Map key: channel name plus instancing level for instance primvars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameAndLevel {
    pub name: Symbol,
    pub level: Option<u32>,
}

impl NameAndLevel {
    #[inline]
    #[must_use]
    pub fn new(name: Symbol, level: Option<u32>) -> Self {
        Self { name, level }
    }
}

pub(crate) const CONSTANT_PRIMVARS: &str = "constantPrimvars";
pub(crate) const SURFACE_SHADER_PARAMS: &str = "surfaceShaderParams";

#[derive(Debug, Default)]
pub struct ResourceBinder {
    binding_map: FxHashMap<NameAndLevel, Binding>,
    reserved_texture_units: u32,
    num_reserved_texture_units: u32,
    errors: Mutex<CodingErrors>,
}

impl ResourceBinder {
    /// Creates a binder whose texture units start at `reserved_texture_units`.
    #[must_use]
    pub fn new(reserved_texture_units: u32) -> Self {
        Self {
            binding_map: FxHashMap::default(),
            reserved_texture_units,
            num_reserved_texture_units: reserved_texture_units,
            errors: Mutex::new(CodingErrors::new()),
        }
    }

    /// Binding of `name` at `level`, or [`Binding::invalid`] when the
    /// channel was never resolved.
    #[must_use]
    pub fn get_binding(&self, name: &str, level: Option<u32>) -> Binding {
        interner::get(name)
            .and_then(|symbol| self.binding_map.get(&NameAndLevel::new(symbol, level)))
            .copied()
            .unwrap_or_default()
    }

    /// Texture units taken by the host plus the ones handed out by the last
    /// resolution pass.
    #[inline]
    #[must_use]
    pub fn num_reserved_texture_units(&self) -> u32 {
        self.num_reserved_texture_units
    }

    /// Snapshot of the coding errors raised so far.
    #[must_use]
    pub fn coding_errors(&self) -> CodingErrors {
        self.errors.lock().clone()
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&NameAndLevel, &Binding)> {
        self.binding_map.iter()
    }

    fn report(&self, message: impl Into<String>) {
        self.errors.lock().report(message);
    }

    // ─── Buffers ─────────────────────────────────────────────────────────────

    /// Binds `resource` to the location resolved for `name` at `level`.
    pub fn bind_buffer(
        &self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        resource: &BufferResource,
        offset: u32,
        level: Option<u32>,
    ) {
        let binding = self.get_binding(name, level);
        self.bind_buffer_at(device, name, binding, resource, offset);
    }

    /// Binds `resource` at an already resolved `binding`.
    ///
    /// A resource with no device buffer yet and a binding the compiler
    /// removed are both skipped without error.
    pub fn bind_buffer_at(
        &self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        binding: Binding,
        resource: &BufferResource,
        offset: u32,
    ) {
        let buffer = resource.buffer_id;
        if buffer == 0 || !binding.exists() {
            return;
        }
        let loc = binding.location();

        match binding.class() {
            StorageClass::VertexAttr => {
                let (components, normalized) = if resource.component_type.is_packed() {
                    (4, true)
                } else {
                    (resource.num_components, false)
                };
                device.bind_buffer(BufferTarget::Array, buffer);
                device.vertex_attrib_pointer(
                    loc,
                    components,
                    resource.component_type,
                    normalized,
                    resource.stride,
                    offset,
                );
                device.bind_buffer(BufferTarget::Array, 0);
                device.enable_vertex_attrib_array(loc);
            }
            StorageClass::DrawIndex => {
                device.bind_buffer(BufferTarget::Array, buffer);
                device.vertex_attrib_i_pointer(loc, resource.num_components, resource.stride, offset);
                device.bind_buffer(BufferTarget::Array, 0);
                device.enable_vertex_attrib_array(loc);
            }
            StorageClass::DrawIndexInstance => {
                device.bind_buffer(BufferTarget::Array, buffer);
                device.vertex_attrib_i_pointer(loc, resource.num_components, resource.stride, offset);
                device.bind_buffer(BufferTarget::Array, 0);
                device.vertex_attrib_divisor(loc, DRAW_CONSTANT_DIVISOR);
                device.enable_vertex_attrib_array(loc);
            }
            StorageClass::DrawIndexInstanceArray => {
                device.bind_buffer(BufferTarget::Array, buffer);
                // one int attribute per component
                for i in 0..resource.num_components {
                    device.vertex_attrib_i_pointer(loc + i, 1, resource.stride, offset + i * 4);
                    device.vertex_attrib_divisor(loc + i, DRAW_CONSTANT_DIVISOR);
                    device.enable_vertex_attrib_array(loc + i);
                }
                device.bind_buffer(BufferTarget::Array, 0);
            }
            StorageClass::IndexAttr => device.bind_buffer(BufferTarget::ElementArray, buffer),
            StorageClass::BindlessUniform => {
                if !device.is_buffer_resident(buffer) {
                    device.make_buffer_resident(buffer);
                }
                device.uniform_ui64(loc, resource.gpu_address);
            }
            StorageClass::StorageBlock => {
                device.bind_buffer_base(BufferTarget::ShaderStorage, loc, buffer);
            }
            StorageClass::Dispatch => device.bind_buffer(BufferTarget::DrawIndirect, buffer),
            StorageClass::UniformBlock | StorageClass::Uniform => {
                device.bind_buffer_range(BufferTarget::Uniform, loc, buffer, offset, resource.stride);
            }
            StorageClass::TextureBuffer => {
                let unit = binding.texture_unit();
                device.uniform_i(loc, &[unit as i32]);
                device.active_texture(unit);
                device.bind_sampler(unit, 0);
                device.bind_texture(TextureTarget::Buffer, resource.texture_buffer);
            }
            StorageClass::Texture2D => {}
            class => self.report(format!("binding type {class} not found for {name}")),
        }
    }

    pub fn unbind_buffer(
        &self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        resource: &BufferResource,
        level: Option<u32>,
    ) {
        let binding = self.get_binding(name, level);
        self.unbind_buffer_at(device, name, binding, resource);
    }

    pub fn unbind_buffer_at(
        &self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        binding: Binding,
        resource: &BufferResource,
    ) {
        let buffer = resource.buffer_id;
        if buffer == 0 || !binding.exists() {
            return;
        }
        let loc = binding.location();

        match binding.class() {
            StorageClass::VertexAttr | StorageClass::DrawIndex => {
                device.disable_vertex_attrib_array(loc);
            }
            StorageClass::DrawIndexInstance => {
                device.vertex_attrib_divisor(loc, 0);
                device.disable_vertex_attrib_array(loc);
            }
            StorageClass::DrawIndexInstanceArray => {
                for i in 0..resource.num_components {
                    device.vertex_attrib_divisor(loc + i, 0);
                    device.disable_vertex_attrib_array(loc + i);
                }
            }
            StorageClass::IndexAttr => device.bind_buffer(BufferTarget::ElementArray, 0),
            StorageClass::BindlessUniform => {
                if device.is_buffer_resident(buffer) {
                    device.make_buffer_non_resident(buffer);
                }
            }
            StorageClass::StorageBlock => {
                device.bind_buffer_base(BufferTarget::ShaderStorage, loc, 0);
            }
            StorageClass::UniformBlock | StorageClass::Uniform => {
                device.bind_buffer_base(BufferTarget::Uniform, loc, 0);
            }
            StorageClass::Dispatch => device.bind_buffer(BufferTarget::DrawIndirect, 0),
            StorageClass::TextureBuffer => {
                device.active_texture(binding.texture_unit());
                device.bind_texture(TextureTarget::Buffer, 0);
            }
            StorageClass::Texture2D => {}
            class => self.report(format!("binding type {class} not found for {name}")),
        }
    }

    // ─── Buffer Arrays ───────────────────────────────────────────────────────

    /// Binds the interleaved constant block.
    pub fn bind_constant_buffer(&self, device: &mut dyn GraphicsDevice, range: &BufferArrayRange) {
        if let Some(resource) = range.resource() {
            self.bind_buffer(device, CONSTANT_PRIMVARS, resource, resource.offset, None);
        }
    }

    pub fn unbind_constant_buffer(&self, device: &mut dyn GraphicsDevice, range: &BufferArrayRange) {
        if let Some(resource) = range.resource() {
            self.unbind_buffer(device, CONSTANT_PRIMVARS, resource, None);
        }
    }

    pub fn bind_instance_buffer_array(
        &self,
        device: &mut dyn GraphicsDevice,
        range: &BufferArrayRange,
        level: u32,
    ) {
        for (name, resource) in range.resources() {
            self.bind_buffer(device, interner::resolve(*name), resource, resource.offset, Some(level));
        }
    }

    pub fn unbind_instance_buffer_array(
        &self,
        device: &mut dyn GraphicsDevice,
        range: &BufferArrayRange,
        level: u32,
    ) {
        for (name, resource) in range.resources() {
            self.unbind_buffer(device, interner::resolve(*name), resource, Some(level));
        }
    }

    /// Binds every resource of a non-interleaved range under its own name.
    pub fn bind_buffer_array(&self, device: &mut dyn GraphicsDevice, range: &BufferArrayRange) {
        for (name, resource) in range.resources() {
            self.bind_buffer(device, interner::resolve(*name), resource, resource.offset, None);
        }
    }

    pub fn unbind_buffer_array(&self, device: &mut dyn GraphicsDevice, range: &BufferArrayRange) {
        for (name, resource) in range.resources() {
            self.unbind_buffer(device, interner::resolve(*name), resource, None);
        }
    }

    // ─── Custom Requests ─────────────────────────────────────────────────────

    pub fn bind(&self, device: &mut dyn GraphicsDevice, request: &BindingRequest) {
        let name = interner::resolve(request.name);
        match &request.kind {
            BindingRequestKind::Typeless | BindingRequestKind::Value { .. } => {}
            BindingRequestKind::Resource(resource) => {
                self.bind_buffer(device, name, resource, resource.offset, None);
            }
            BindingRequestKind::InterleavedBufferArray(range) => {
                if let Some(resource) = range.resource() {
                    self.bind_buffer(device, name, resource, resource.offset, None);
                }
            }
            BindingRequestKind::BufferArray(range) => self.bind_buffer_array(device, range),
        }
    }

    pub fn unbind(&self, device: &mut dyn GraphicsDevice, request: &BindingRequest) {
        let name = interner::resolve(request.name);
        match &request.kind {
            BindingRequestKind::Typeless | BindingRequestKind::Value { .. } => {}
            BindingRequestKind::Resource(resource) => {
                self.unbind_buffer(device, name, resource, None);
            }
            BindingRequestKind::InterleavedBufferArray(range) => {
                if let Some(resource) = range.resource() {
                    self.unbind_buffer(device, name, resource, None);
                }
            }
            BindingRequestKind::BufferArray(range) => self.unbind_buffer_array(device, range),
        }
    }

    // ─── Shader Resources ────────────────────────────────────────────────────

    /// Binds the shader data block and the textures of `shader`.
    pub fn bind_shader_resources(&self, device: &mut dyn GraphicsDevice, shader: &dyn ShaderCode) {
        if shader.is_surface()
            && let Some(resource) = shader.shader_data().and_then(|range| range.resource())
        {
            self.bind_buffer(device, SURFACE_SHADER_PARAMS, resource, resource.offset, None);
        }

        for texture in shader.textures() {
            let name = interner::resolve(texture.name);
            let binding = self.get_binding(name, None);
            match (texture.kind, binding.class()) {
                (TextureKind::Texture2D, StorageClass::Texture2D) => {
                    self.bind_texture_unit(device, binding, TextureTarget::Texture2D, texture.texture, texture.sampler);
                }
                (TextureKind::Texture2D, StorageClass::BindlessTexture2D) => {
                    make_resident(device, texture.handle);
                }
                (TextureKind::Ptex, StorageClass::TexturePtexTexel) => {
                    self.bind_texture_unit(device, binding, TextureTarget::Texture2DArray, texture.texture, 0);
                    let layout = self.get_binding(&format!("{name}_layout"), None);
                    if layout.class() == StorageClass::TexturePtexLayout {
                        self.bind_texture_unit(device, layout, TextureTarget::Buffer, texture.layout, 0);
                    }
                }
                (TextureKind::Ptex, StorageClass::BindlessTexturePtexTexel) => {
                    make_resident(device, texture.handle);
                    make_resident(device, texture.layout_handle);
                }
                (_, class) => self.report(format!("binding type {class} not found for texture {name}")),
            }
        }
        device.active_texture(0);
    }

    pub fn unbind_shader_resources(&self, device: &mut dyn GraphicsDevice, shader: &dyn ShaderCode) {
        if shader.is_surface()
            && let Some(resource) = shader.shader_data().and_then(|range| range.resource())
        {
            self.unbind_buffer(device, SURFACE_SHADER_PARAMS, resource, None);
        }

        for texture in shader.textures() {
            let name = interner::resolve(texture.name);
            let binding = self.get_binding(name, None);
            match (texture.kind, binding.class()) {
                (TextureKind::Texture2D, StorageClass::Texture2D) => {
                    unbind_texture_unit(device, binding, TextureTarget::Texture2D);
                }
                (TextureKind::Texture2D, StorageClass::BindlessTexture2D) => {
                    make_non_resident(device, texture.handle);
                }
                (TextureKind::Ptex, StorageClass::TexturePtexTexel) => {
                    unbind_texture_unit(device, binding, TextureTarget::Texture2DArray);
                    let layout = self.get_binding(&format!("{name}_layout"), None);
                    if layout.class() == StorageClass::TexturePtexLayout {
                        unbind_texture_unit(device, layout, TextureTarget::Buffer);
                    }
                }
                (TextureKind::Ptex, StorageClass::BindlessTexturePtexTexel) => {
                    make_non_resident(device, texture.handle);
                    make_non_resident(device, texture.layout_handle);
                }
                (_, class) => self.report(format!("binding type {class} not found for texture {name}")),
            }
        }
        device.active_texture(0);
    }

    fn bind_texture_unit(
        &self,
        device: &mut dyn GraphicsDevice,
        binding: Binding,
        target: TextureTarget,
        texture: u32,
        sampler: u32,
    ) {
        let unit = binding.texture_unit();
        device.active_texture(unit);
        device.bind_texture(target, texture);
        device.bind_sampler(unit, sampler);
        if binding.exists() {
            device.uniform_i(binding.location(), &[unit as i32]);
        }
    }

    // ─── Uniforms ────────────────────────────────────────────────────────────

    /// Location of a uniform of `class`. `None` when the compiler removed it
    /// or (after reporting) when the channel is not such a uniform.
    fn uniform_location(&self, name: &str, class: StorageClass) -> Option<u32> {
        let binding = self.get_binding(name, None);
        if !binding.exists() {
            return None;
        }
        if binding.class() != class {
            self.report(format!("{name} is bound as {}, not {class}", binding.class()));
            return None;
        }
        Some(binding.location())
    }

    pub fn bind_uniform_i(&self, device: &mut dyn GraphicsDevice, name: &str, values: &[i32]) {
        let Some(location) = self.uniform_location(name, StorageClass::Uniform) else {
            return;
        };
        match values.len() {
            1..=4 => device.uniform_i(location, values),
            n => self.report(format!("Invalid count {n} for uniform {name}")),
        }
    }

    pub fn bind_uniform_ui(&self, device: &mut dyn GraphicsDevice, name: &str, values: &[u32]) {
        let Some(location) = self.uniform_location(name, StorageClass::Uniform) else {
            return;
        };
        match values.len() {
            1..=4 => device.uniform_ui(location, values),
            n => self.report(format!("Invalid count {n} for uniform {name}")),
        }
    }

    /// Accepts 1 to 4 components or 16 for a `mat4`.
    pub fn bind_uniform_f(&self, device: &mut dyn GraphicsDevice, name: &str, values: &[f32]) {
        let Some(location) = self.uniform_location(name, StorageClass::Uniform) else {
            return;
        };
        match values.len() {
            1..=4 | 16 => device.uniform_f(location, values),
            n => self.report(format!("Invalid count {n} for uniform {name}")),
        }
    }

    pub fn bind_uniform_array_i(&self, device: &mut dyn GraphicsDevice, name: &str, values: &[i32]) {
        let Some(location) = self.uniform_location(name, StorageClass::UniformArray) else {
            return;
        };
        device.uniform_array_i(location, values);
    }
}

fn unbind_texture_unit(device: &mut dyn GraphicsDevice, binding: Binding, target: TextureTarget) {
    let unit = binding.texture_unit();
    device.active_texture(unit);
    device.bind_texture(target, 0);
    device.bind_sampler(unit, 0);
}

fn make_resident(device: &mut dyn GraphicsDevice, handle: u64) {
    if handle != 0 && !device.is_texture_handle_resident(handle) {
        device.make_texture_handle_resident(handle);
    }
}

fn make_non_resident(device: &mut dyn GraphicsDevice, handle: u64) {
    if handle != 0 && device.is_texture_handle_resident(handle) {
        device.make_texture_handle_non_resident(handle);
    }
}
