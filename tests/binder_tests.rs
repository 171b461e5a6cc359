//! ResourceBinder tests
//!
//! Tests for:
//! - Storage class and location resolution per capability set
//! - Draw-mode dependent drawing coordinates
//! - Device calls issued by bind/unbind
//! - Coding errors for duplicates and class mismatches
//! - Post-link introspection

use std::cell::RefCell;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use shadergen::binder::{BufferTarget, DRAW_CONSTANT_DIVISOR, TextureTarget};
use shadergen::shader::ShaderParam;
use shadergen::{
    Binding, BufferArrayRange, BufferResource, CapabilityFlags, ComponentType, DrawItem, DrawMode,
    GraphicsDevice, ProgramIntrospection, RenderCaps, ResourceBinder, ShaderCode, StorageClass,
    SurfaceShader, TextureDescriptor, TextureKind,
};

// ============================================================================
// Recording device
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    BindBuffer(BufferTarget, u32),
    BindBufferBase(BufferTarget, u32, u32),
    BindBufferRange(BufferTarget, u32, u32, u32, u32),
    AttribPointer(u32, u32, ComponentType, bool, u32, u32),
    AttribIPointer(u32, u32, u32, u32),
    AttribDivisor(u32, u32),
    EnableAttrib(u32),
    DisableAttrib(u32),
    MakeBufferResident(u32),
    MakeBufferNonResident(u32),
    MakeHandleResident(u64),
    MakeHandleNonResident(u64),
    UniformI(u32, Vec<i32>),
    UniformUi(u32, Vec<u32>),
    UniformF(u32, Vec<f32>),
    UniformArrayI(u32, Vec<i32>),
    UniformUi64(u32, u64),
    ActiveTexture(u32),
    BindTexture(TextureTarget, u32),
    BindSampler(u32, u32),
}

#[derive(Default)]
struct RecordingDevice {
    calls: Vec<Call>,
    resident_buffers: FxHashSet<u32>,
    resident_handles: FxHashSet<u64>,
}

impl GraphicsDevice for RecordingDevice {
    fn bind_buffer(&mut self, target: BufferTarget, buffer: u32) {
        self.calls.push(Call::BindBuffer(target, buffer));
    }
    fn bind_buffer_base(&mut self, target: BufferTarget, index: u32, buffer: u32) {
        self.calls.push(Call::BindBufferBase(target, index, buffer));
    }
    fn bind_buffer_range(&mut self, target: BufferTarget, index: u32, buffer: u32, offset: u32, size: u32) {
        self.calls
            .push(Call::BindBufferRange(target, index, buffer, offset, size));
    }
    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        components: u32,
        component_type: ComponentType,
        normalized: bool,
        stride: u32,
        offset: u32,
    ) {
        self.calls.push(Call::AttribPointer(
            location,
            components,
            component_type,
            normalized,
            stride,
            offset,
        ));
    }
    fn vertex_attrib_i_pointer(&mut self, location: u32, components: u32, stride: u32, offset: u32) {
        self.calls
            .push(Call::AttribIPointer(location, components, stride, offset));
    }
    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32) {
        self.calls.push(Call::AttribDivisor(location, divisor));
    }
    fn enable_vertex_attrib_array(&mut self, location: u32) {
        self.calls.push(Call::EnableAttrib(location));
    }
    fn disable_vertex_attrib_array(&mut self, location: u32) {
        self.calls.push(Call::DisableAttrib(location));
    }
    fn is_buffer_resident(&self, buffer: u32) -> bool {
        self.resident_buffers.contains(&buffer)
    }
    fn make_buffer_resident(&mut self, buffer: u32) {
        self.resident_buffers.insert(buffer);
        self.calls.push(Call::MakeBufferResident(buffer));
    }
    fn make_buffer_non_resident(&mut self, buffer: u32) {
        self.resident_buffers.remove(&buffer);
        self.calls.push(Call::MakeBufferNonResident(buffer));
    }
    fn is_texture_handle_resident(&self, handle: u64) -> bool {
        self.resident_handles.contains(&handle)
    }
    fn make_texture_handle_resident(&mut self, handle: u64) {
        self.resident_handles.insert(handle);
        self.calls.push(Call::MakeHandleResident(handle));
    }
    fn make_texture_handle_non_resident(&mut self, handle: u64) {
        self.resident_handles.remove(&handle);
        self.calls.push(Call::MakeHandleNonResident(handle));
    }
    fn uniform_i(&mut self, location: u32, values: &[i32]) {
        self.calls.push(Call::UniformI(location, values.to_vec()));
    }
    fn uniform_ui(&mut self, location: u32, values: &[u32]) {
        self.calls.push(Call::UniformUi(location, values.to_vec()));
    }
    fn uniform_f(&mut self, location: u32, values: &[f32]) {
        self.calls.push(Call::UniformF(location, values.to_vec()));
    }
    fn uniform_array_i(&mut self, location: u32, values: &[i32]) {
        self.calls.push(Call::UniformArrayI(location, values.to_vec()));
    }
    fn uniform_ui64(&mut self, location: u32, value: u64) {
        self.calls.push(Call::UniformUi64(location, value));
    }
    fn active_texture(&mut self, unit: u32) {
        self.calls.push(Call::ActiveTexture(unit));
    }
    fn bind_texture(&mut self, target: TextureTarget, texture: u32) {
        self.calls.push(Call::BindTexture(target, texture));
    }
    fn bind_sampler(&mut self, unit: u32, sampler: u32) {
        self.calls.push(Call::BindSampler(unit, sampler));
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn caps(flags: CapabilityFlags) -> RenderCaps {
    RenderCaps::new(450, flags)
}

fn mesh_draw_item() -> DrawItem {
    DrawItem::new()
        .with_constant(
            BufferArrayRange::new()
                .with_resource("transform", BufferResource::new("mat4", 16, 0).with_buffer(10))
                .with_resource("displayColor", BufferResource::new("vec3", 3, 64).with_buffer(10)),
        )
        .with_vertex(
            BufferArrayRange::new()
                .with_resource("points", BufferResource::new("vec3", 3, 0).with_buffer(11).with_stride(12))
                .with_resource("normals", BufferResource::new("vec3", 3, 0).with_buffer(12).with_stride(12)),
        )
        .with_topology(
            BufferArrayRange::new()
                .with_resource("indices", BufferResource::new("ivec3", 3, 0).with_buffer(13))
                .with_resource("primitiveParam", BufferResource::new("int", 1, 0).with_buffer(14)),
        )
}

fn resolve(flags: CapabilityFlags, draw_item: &DrawItem, mode: DrawMode) -> ResourceBinder {
    let mut binder = ResourceBinder::new(5);
    binder.resolve_bindings(&caps(flags), draw_item, &[], &[], mode);
    binder
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn resolve_without_storage_buffers_uses_ubo_and_texture_buffers() {
    let binder = resolve(CapabilityFlags::empty(), &mesh_draw_item(), DrawMode::default());

    assert_eq!(
        binder.get_binding("constantPrimvars", None),
        Binding::new(StorageClass::UniformBlock, 0, 0)
    );
    assert_eq!(
        binder.get_binding("points", None),
        Binding::new(StorageClass::VertexAttr, 0, 0)
    );
    assert_eq!(
        binder.get_binding("normals", None),
        Binding::new(StorageClass::VertexAttr, 1, 0)
    );
    assert_eq!(binder.get_binding("indices", None).class(), StorageClass::IndexAttr);
    // texture buffers take a uniform location and a texture unit
    assert_eq!(
        binder.get_binding("primitiveParam", None),
        Binding::new(StorageClass::TextureBuffer, 0, 5)
    );
    assert_eq!(
        binder.get_binding("drawingCoord0", None),
        Binding::new(StorageClass::Uniform, 1, 0)
    );
    assert_eq!(
        binder.get_binding("drawingCoord1", None),
        Binding::new(StorageClass::Uniform, 2, 0)
    );
    assert_eq!(binder.num_reserved_texture_units(), 6);
    assert!(binder.coding_errors().is_empty());
}

#[test]
fn resolve_prefers_storage_blocks() {
    let binder = resolve(
        CapabilityFlags::STORAGE_BUFFER | CapabilityFlags::BINDLESS_BUFFER,
        &mesh_draw_item(),
        DrawMode::default(),
    );

    assert_eq!(
        binder.get_binding("constantPrimvars", None),
        Binding::new(StorageClass::StorageBlock, 0, 0)
    );
    assert_eq!(
        binder.get_binding("primitiveParam", None),
        Binding::new(StorageClass::StorageBlock, 1, 0)
    );
    assert_eq!(binder.num_reserved_texture_units(), 5);
}

#[test]
fn resolve_bindless_buffers_without_storage() {
    let binder = resolve(CapabilityFlags::BINDLESS_BUFFER, &mesh_draw_item(), DrawMode::default());
    assert_eq!(
        binder.get_binding("constantPrimvars", None).class(),
        StorageClass::BindlessUniform
    );
    assert_eq!(
        binder.get_binding("primitiveParam", None).class(),
        StorageClass::BindlessUniform
    );
}

#[test]
fn resolve_indirect_instanced_draw() {
    let draw_item = DrawItem::new()
        .with_vertex(
            BufferArrayRange::new().with_resource("points", BufferResource::new("vec3", 3, 0).with_buffer(11)),
        )
        .with_instance_level(Some(
            BufferArrayRange::new().with_resource("translate", BufferResource::new("vec3", 3, 0).with_buffer(20)),
        ))
        .with_instance_level(Some(
            BufferArrayRange::new().with_resource("translate", BufferResource::new("vec3", 3, 0).with_buffer(21)),
        ));
    let mode = DrawMode {
        indirect: true,
        instanced: true,
    };
    let binder = resolve(CapabilityFlags::STORAGE_BUFFER, &draw_item, mode);

    // same name on two levels is not a duplicate
    assert_eq!(
        binder.get_binding("translate", Some(0)),
        Binding::new(StorageClass::StorageBlock, 0, 0)
    );
    assert_eq!(
        binder.get_binding("translate", Some(1)),
        Binding::new(StorageClass::StorageBlock, 1, 0)
    );
    assert!(!binder.get_binding("translate", None).is_valid());

    assert_eq!(
        binder.get_binding("drawingCoord0", None),
        Binding::new(StorageClass::DrawIndexInstance, 1, 0)
    );
    assert_eq!(
        binder.get_binding("drawingCoord1", None),
        Binding::new(StorageClass::DrawIndexInstance, 2, 0)
    );
    assert_eq!(
        binder.get_binding("drawingCoordI", None),
        Binding::new(StorageClass::DrawIndexInstanceArray, 3, 0)
    );
    assert_eq!(binder.get_binding("drawDispatch", None).class(), StorageClass::Dispatch);
    assert!(binder.coding_errors().is_empty());
}

#[test]
fn resolve_indirect_non_instanced_uses_draw_index() {
    let mode = DrawMode {
        indirect: true,
        instanced: false,
    };
    let binder = resolve(CapabilityFlags::STORAGE_BUFFER, &mesh_draw_item(), mode);
    assert_eq!(binder.get_binding("drawingCoord0", None).class(), StorageClass::DrawIndex);
}

#[test]
fn duplicate_channel_is_reported_once_and_first_wins() {
    let draw_item = mesh_draw_item().with_element(
        BufferArrayRange::new().with_resource("points", BufferResource::new("vec3", 3, 0)),
    );
    let binder = resolve(CapabilityFlags::STORAGE_BUFFER, &draw_item, DrawMode::default());

    let errors = binder.coding_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors.iter().next().unwrap().contains("points"));
    assert_eq!(binder.get_binding("points", None).class(), StorageClass::VertexAttr);
}

#[test]
fn resolve_replaces_previous_map() {
    let mut binder = ResourceBinder::new(5);
    let caps = caps(CapabilityFlags::STORAGE_BUFFER);
    binder.resolve_bindings(&caps, &mesh_draw_item(), &[], &[], DrawMode::default());
    assert!(binder.get_binding("points", None).is_valid());

    binder.resolve_bindings(&caps, &DrawItem::new(), &[], &[], DrawMode::default());
    assert!(!binder.get_binding("points", None).is_valid());
    assert!(binder.get_binding("drawingCoord0", None).is_valid());
}

// ============================================================================
// Device binding
// ============================================================================

#[test]
fn bind_vertex_attribute() {
    let binder = resolve(CapabilityFlags::STORAGE_BUFFER, &mesh_draw_item(), DrawMode::default());
    let mut device = RecordingDevice::default();

    let resource = BufferResource::new("vec3", 3, 0).with_buffer(11).with_stride(12);
    binder.bind_buffer(&mut device, "normals", &resource, 24, None);
    assert_eq!(
        device.calls,
        vec![
            Call::BindBuffer(BufferTarget::Array, 11),
            Call::AttribPointer(1, 3, ComponentType::Float, false, 12, 24),
            Call::BindBuffer(BufferTarget::Array, 0),
            Call::EnableAttrib(1),
        ]
    );

    device.calls.clear();
    binder.unbind_buffer(&mut device, "normals", &resource, None);
    assert_eq!(device.calls, vec![Call::DisableAttrib(1)]);
}

#[test]
fn bind_packed_normals_are_normalized_vec4() {
    let binder = resolve(CapabilityFlags::STORAGE_BUFFER, &mesh_draw_item(), DrawMode::default());
    let mut device = RecordingDevice::default();

    let resource = BufferResource::new("vec3", 1, 0)
        .with_buffer(12)
        .with_component_type(ComponentType::Int2101010Rev);
    binder.bind_buffer(&mut device, "normals", &resource, 0, None);
    assert!(device
        .calls
        .contains(&Call::AttribPointer(1, 4, ComponentType::Int2101010Rev, true, 0, 0)));
}

#[test]
fn bind_skips_unallocated_buffer() {
    let binder = resolve(CapabilityFlags::STORAGE_BUFFER, &mesh_draw_item(), DrawMode::default());
    let mut device = RecordingDevice::default();

    binder.bind_buffer(&mut device, "points", &BufferResource::new("vec3", 3, 0), 0, None);
    assert!(device.calls.is_empty());
    assert!(binder.coding_errors().is_empty());
}

#[test]
fn bind_unresolved_name_is_coding_error() {
    let binder = resolve(CapabilityFlags::STORAGE_BUFFER, &mesh_draw_item(), DrawMode::default());
    let mut device = RecordingDevice::default();

    binder.bind_buffer(
        &mut device,
        "neverResolved",
        &BufferResource::new("vec3", 3, 0).with_buffer(3),
        0,
        None,
    );
    assert!(device.calls.is_empty());
    assert_eq!(binder.coding_errors().len(), 1);
}

#[test]
fn bind_storage_and_uniform_blocks() {
    let mut device = RecordingDevice::default();
    let constant = BufferArrayRange::new()
        .with_resource("transform", BufferResource::new("mat4", 16, 32).with_buffer(10).with_stride(80));

    let ssbo = resolve(CapabilityFlags::STORAGE_BUFFER, &mesh_draw_item(), DrawMode::default());
    ssbo.bind_constant_buffer(&mut device, &constant);
    ssbo.unbind_constant_buffer(&mut device, &constant);
    assert_eq!(
        device.calls,
        vec![
            Call::BindBufferBase(BufferTarget::ShaderStorage, 0, 10),
            Call::BindBufferBase(BufferTarget::ShaderStorage, 0, 0),
        ]
    );

    device.calls.clear();
    let ubo = resolve(CapabilityFlags::empty(), &mesh_draw_item(), DrawMode::default());
    ubo.bind_constant_buffer(&mut device, &constant);
    assert_eq!(
        device.calls,
        vec![Call::BindBufferRange(BufferTarget::Uniform, 0, 10, 32, 80)]
    );
}

#[test]
fn bind_bindless_uniform_makes_buffer_resident_once() {
    let binder = resolve(CapabilityFlags::BINDLESS_BUFFER, &mesh_draw_item(), DrawMode::default());
    let mut device = RecordingDevice::default();
    let resource = BufferResource::new("int", 1, 0).with_buffer(14).with_gpu_address(0xdead_0000);

    binder.bind_buffer(&mut device, "primitiveParam", &resource, 0, None);
    binder.bind_buffer(&mut device, "primitiveParam", &resource, 0, None);
    let location = binder.get_binding("primitiveParam", None).location();
    assert_eq!(
        device.calls,
        vec![
            Call::MakeBufferResident(14),
            Call::UniformUi64(location, 0xdead_0000),
            Call::UniformUi64(location, 0xdead_0000),
        ]
    );

    device.calls.clear();
    binder.unbind_buffer(&mut device, "primitiveParam", &resource, None);
    assert_eq!(device.calls, vec![Call::MakeBufferNonResident(14)]);
}

#[test]
fn bind_texture_buffer_sets_sampler_unit() {
    let binder = resolve(CapabilityFlags::empty(), &mesh_draw_item(), DrawMode::default());
    let mut device = RecordingDevice::default();
    let resource = BufferResource::new("int", 1, 0).with_buffer(14).with_texture_buffer(99);

    binder.bind_buffer(&mut device, "primitiveParam", &resource, 0, None);
    assert_eq!(
        device.calls,
        vec![
            Call::UniformI(0, vec![5]),
            Call::ActiveTexture(5),
            Call::BindSampler(5, 0),
            Call::BindTexture(TextureTarget::Buffer, 99),
        ]
    );
}

#[test]
fn bind_drawing_coord_instance_array_per_level() {
    let draw_item = DrawItem::new()
        .with_instance_level(Some(
            BufferArrayRange::new().with_resource("translate", BufferResource::new("vec3", 3, 0)),
        ))
        .with_instance_level(Some(
            BufferArrayRange::new().with_resource("rotate", BufferResource::new("vec4", 4, 0)),
        ));
    let mode = DrawMode {
        indirect: true,
        instanced: true,
    };
    let binder = resolve(CapabilityFlags::STORAGE_BUFFER, &draw_item, mode);
    let mut device = RecordingDevice::default();

    let resource = BufferResource::new("int", 2, 0).with_buffer(30).with_stride(48);
    binder.bind_buffer(&mut device, "drawingCoordI", &resource, 28, None);
    assert_eq!(
        device.calls,
        vec![
            Call::BindBuffer(BufferTarget::Array, 30),
            Call::AttribIPointer(2, 1, 48, 28),
            Call::AttribDivisor(2, DRAW_CONSTANT_DIVISOR),
            Call::EnableAttrib(2),
            Call::AttribIPointer(3, 1, 48, 32),
            Call::AttribDivisor(3, DRAW_CONSTANT_DIVISOR),
            Call::EnableAttrib(3),
            Call::BindBuffer(BufferTarget::Array, 0),
        ]
    );
}

#[test]
fn bind_draw_index_attributes_source_their_own_buffer() {
    let draw_item = mesh_draw_item();
    let mode = DrawMode {
        indirect: true,
        instanced: false,
    };
    let binder = resolve(CapabilityFlags::STORAGE_BUFFER, &draw_item, mode);
    let binding = binder.get_binding("drawingCoord0", None);
    assert_eq!(binding.class(), StorageClass::DrawIndex);

    let mut device = RecordingDevice::default();
    let resource = BufferResource::new("int", 4, 0).with_buffer(31).with_stride(48);
    binder.bind_buffer(&mut device, "drawingCoord0", &resource, 0, None);

    let loc = binding.location();
    let pointer = device
        .calls
        .iter()
        .position(|c| *c == Call::AttribIPointer(loc, 4, 48, 0))
        .expect("attribute pointer recorded");
    assert_eq!(device.calls[pointer - 1], Call::BindBuffer(BufferTarget::Array, 31));
    assert_eq!(device.calls[pointer + 1], Call::BindBuffer(BufferTarget::Array, 0));
    assert_eq!(device.calls.last(), Some(&Call::EnableAttrib(loc)));
}

#[test]
fn bind_uniforms_check_class_and_count() {
    let binder = resolve(CapabilityFlags::STORAGE_BUFFER, &mesh_draw_item(), DrawMode::default());
    let mut device = RecordingDevice::default();

    binder.bind_uniform_i(&mut device, "drawingCoord0", &[1, 2, 3, 4]);
    assert_eq!(device.calls, vec![Call::UniformI(0, vec![1, 2, 3, 4])]);

    device.calls.clear();
    binder.bind_uniform_f(&mut device, "points", &[1.0]);
    binder.bind_uniform_i(&mut device, "drawingCoord1", &[1, 2, 3, 4, 5]);
    assert!(device.calls.is_empty());
    assert_eq!(binder.coding_errors().len(), 2);
}

#[test]
fn bind_surface_textures() {
    let surface = SurfaceShader::new()
        .with_param(ShaderParam::texture("diffuse", "vec4", "st"))
        .with_texture(TextureDescriptor::new("diffuse", TextureKind::Texture2D, 42).with_sampler(7))
        .with_param(ShaderParam::ptex("color", "vec4"))
        .with_texture(TextureDescriptor::new("color", TextureKind::Ptex, 50).with_layout(51));
    let shaders: Vec<Arc<dyn ShaderCode>> = vec![Arc::new(surface.clone())];

    let mut binder = ResourceBinder::new(5);
    binder.resolve_bindings(
        &caps(CapabilityFlags::STORAGE_BUFFER),
        &mesh_draw_item(),
        &shaders,
        &[],
        DrawMode::default(),
    );
    let diffuse = binder.get_binding("diffuse", None);
    let color = binder.get_binding("color", None);
    let layout = binder.get_binding("color_layout", None);
    assert_eq!(diffuse.class(), StorageClass::Texture2D);
    assert_eq!(diffuse.texture_unit(), 5);
    assert_eq!(color, Binding::new(StorageClass::TexturePtexTexel, color.location(), 6));
    assert_eq!(layout.class(), StorageClass::TexturePtexLayout);
    assert_eq!(layout.location(), color.location() + 1);
    assert_eq!(layout.texture_unit(), 7);
    assert_eq!(binder.num_reserved_texture_units(), 8);

    let mut device = RecordingDevice::default();
    binder.bind_shader_resources(&mut device, &surface);
    assert_eq!(
        device.calls,
        vec![
            Call::ActiveTexture(5),
            Call::BindTexture(TextureTarget::Texture2D, 42),
            Call::BindSampler(5, 7),
            Call::UniformI(diffuse.location(), vec![5]),
            Call::ActiveTexture(6),
            Call::BindTexture(TextureTarget::Texture2DArray, 50),
            Call::BindSampler(6, 0),
            Call::UniformI(color.location(), vec![6]),
            Call::ActiveTexture(7),
            Call::BindTexture(TextureTarget::Buffer, 51),
            Call::BindSampler(7, 0),
            Call::UniformI(layout.location(), vec![7]),
            Call::ActiveTexture(0),
        ]
    );
}

#[test]
fn bind_bindless_surface_textures() {
    let surface = SurfaceShader::new()
        .with_param(ShaderParam::texture("diffuse", "vec4", "st"))
        .with_texture(TextureDescriptor::new("diffuse", TextureKind::Texture2D, 42).with_handle(0xabc));
    let shaders: Vec<Arc<dyn ShaderCode>> = vec![Arc::new(surface.clone())];

    let mut binder = ResourceBinder::new(5);
    binder.resolve_bindings(
        &caps(CapabilityFlags::STORAGE_BUFFER | CapabilityFlags::BINDLESS_TEXTURE),
        &DrawItem::new(),
        &shaders,
        &[],
        DrawMode::default(),
    );
    assert_eq!(
        binder.get_binding("diffuse", None).class(),
        StorageClass::BindlessTexture2D
    );

    let mut device = RecordingDevice::default();
    binder.bind_shader_resources(&mut device, &surface);
    binder.bind_shader_resources(&mut device, &surface);
    assert_eq!(
        device.calls,
        vec![
            Call::MakeHandleResident(0xabc),
            Call::ActiveTexture(0),
            Call::ActiveTexture(0),
        ]
    );
}

// ============================================================================
// Introspection
// ============================================================================

struct ScriptedIntrospection {
    blocks: Vec<String>,
    locations: Vec<(&'static str, u32)>,
    block_bindings: RefCell<Vec<(u32, u32)>>,
}

impl ProgramIntrospection for ScriptedIntrospection {
    fn active_uniform_blocks(&self, _program: u32) -> Vec<String> {
        self.blocks.clone()
    }

    fn uniform_location(&self, _program: u32, name: &str) -> Option<u32> {
        self.locations
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, location)| *location)
    }

    fn set_uniform_block_binding(&self, _program: u32, block_index: u32, binding: u32) {
        self.block_bindings.borrow_mut().push((block_index, binding));
    }
}

#[test]
fn introspection_patches_locations() {
    let mut binder = resolve(CapabilityFlags::empty(), &mesh_draw_item(), DrawMode::default());
    let introspection = ScriptedIntrospection {
        blocks: vec!["block_constantPrimvars".to_string(), "ptexBlock".to_string()],
        locations: vec![("drawingCoord0", 7), ("primitiveParam", 3)],
        block_bindings: RefCell::new(Vec::new()),
    };

    binder.introspect_bindings(&caps(CapabilityFlags::empty()), 1, &introspection);

    assert_eq!(*introspection.block_bindings.borrow(), vec![(0, 0)]);
    assert_eq!(binder.get_binding("drawingCoord0", None).location(), 7);
    assert_eq!(binder.get_binding("primitiveParam", None).location(), 3);
    assert_eq!(binder.get_binding("primitiveParam", None).texture_unit(), 5);
    // optimized away by the compiler
    let coord1 = binder.get_binding("drawingCoord1", None);
    assert!(coord1.is_valid());
    assert!(!coord1.exists());

    // removed channels are skipped silently
    let mut device = RecordingDevice::default();
    binder.bind_uniform_i(&mut device, "drawingCoord1", &[0, 0, 0]);
    assert!(device.calls.is_empty());
    assert!(binder.coding_errors().is_empty());
}

#[test]
fn introspection_resolves_ptex_samplers_by_name() {
    let surface = SurfaceShader::new()
        .with_param(ShaderParam::ptex("color", "vec4"))
        .with_texture(TextureDescriptor::new("color", TextureKind::Ptex, 50).with_layout(51));
    let shaders: Vec<Arc<dyn ShaderCode>> = vec![Arc::new(surface.clone())];
    let flags = CapabilityFlags::STORAGE_BUFFER | CapabilityFlags::SHADING_LANGUAGE_420PACK;

    let mut binder = ResourceBinder::new(5);
    binder.resolve_bindings(&caps(flags), &DrawItem::new(), &shaders, &[], DrawMode::default());
    let introspection = ScriptedIntrospection {
        blocks: Vec::new(),
        locations: vec![("sampler2darray_color", 11), ("isamplerbuffer_color_layout", 4)],
        block_bindings: RefCell::new(Vec::new()),
    };
    binder.introspect_bindings(&caps(flags), 1, &introspection);

    let color = binder.get_binding("color", None);
    let layout = binder.get_binding("color_layout", None);
    assert_eq!(color, Binding::new(StorageClass::TexturePtexTexel, 11, 5));
    assert_eq!(layout, Binding::new(StorageClass::TexturePtexLayout, 4, 6));

    let mut device = RecordingDevice::default();
    binder.bind_shader_resources(&mut device, &surface);
    assert!(device.calls.contains(&Call::UniformI(11, vec![5])));
    assert!(device.calls.contains(&Call::UniformI(4, vec![6])));
    assert!(binder.coding_errors().is_empty());
}

#[test]
fn introspection_is_noop_with_explicit_locations() {
    let flags = CapabilityFlags::EXPLICIT_UNIFORM_LOCATION | CapabilityFlags::SHADING_LANGUAGE_420PACK;
    let mut binder = resolve(flags, &mesh_draw_item(), DrawMode::default());
    let before: Vec<_> = {
        let mut v: Vec<_> = binder.bindings().map(|(k, b)| (*k, *b)).collect();
        v.sort_by_key(|(_, b)| *b);
        v
    };
    let introspection = ScriptedIntrospection {
        blocks: vec!["block_constantPrimvars".to_string()],
        locations: Vec::new(),
        block_bindings: RefCell::new(Vec::new()),
    };

    binder.introspect_bindings(&caps(flags), 1, &introspection);

    let mut after: Vec<_> = binder.bindings().map(|(k, b)| (*k, *b)).collect();
    after.sort_by_key(|(_, b)| *b);
    assert_eq!(before, after);
    assert!(introspection.block_bindings.borrow().is_empty());
}
