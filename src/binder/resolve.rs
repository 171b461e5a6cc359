//! Binding resolution.
//!
//! One pass over every channel of a draw item and its shader stack, in a
//! fixed order:
//!
//! ```text
//! constant → instance levels → vertex → topology → element → face-varying
//!   → drawing coordinates → instance indices → dispatch
//!   → shader data → shader parameters → custom requests
//! ```
//!
//! The order fixes the locations handed out per class, and with them the
//! metadata hash.

use std::sync::Arc;

use super::{CONSTANT_PRIMVARS, NameAndLevel, ResourceBinder, SURFACE_SHADER_PARAMS};
use crate::binding::policy::storage_class_for;
use crate::binding::{
    Binding, BindingAllocator, BindingDeclaration, ChannelKind, DrawMode, Metadata,
    NestedPrimVar, PrimVar, ShaderParameterAccessor, StorageClass, StructBlock, StructEntry,
};
use crate::caps::RenderCaps;
use crate::draw_item::{BindingRequest, BindingRequestKind, BufferArrayRange, DrawItem};
use crate::shader::{ShaderCode, ShaderParamKind};
use crate::utils::diagnostics::CodingErrors;
use crate::utils::interner::{self, Symbol};

/// State of one resolution pass.
struct Resolver<'a> {
    caps: &'a RenderCaps,
    mode: DrawMode,
    allocator: BindingAllocator,
    map: &'a mut rustc_hash::FxHashMap<NameAndLevel, Binding>,
    errors: CodingErrors,
    md: Metadata,
}

impl Resolver<'_> {
    fn class_for(&self, kind: ChannelKind) -> StorageClass {
        storage_class_for(kind, self.caps, self.mode, false)
    }

    /// Allocates a slot for `name` and records it in the map.
    ///
    /// Returns `None` for duplicates and failed allocations; the channel is
    /// then left out of the plan.
    fn register(&mut self, class: StorageClass, name: Symbol, level: Option<u32>) -> Option<Binding> {
        let key = NameAndLevel::new(name, level);
        if self.map.contains_key(&key) {
            self.errors.report(format!(
                "Duplicate channel {}{}",
                interner::resolve(name),
                level.map(|l| format!(" at level {l}")).unwrap_or_default()
            ));
            return None;
        }
        let binding = self.allocator.allocate(class, interner::resolve(name));
        if !binding.is_valid() {
            return None;
        }
        self.map.insert(key, binding);
        Some(binding)
    }

    fn register_array(&mut self, class: StorageClass, name: &str, count: u32) -> Option<Binding> {
        let key = NameAndLevel::new(interner::intern(name), None);
        if self.map.contains_key(&key) {
            self.errors.report(format!("Duplicate channel {name}"));
            return None;
        }
        let binding = self.allocator.allocate_array(class, count, name);
        if !binding.is_valid() {
            return None;
        }
        self.map.insert(key, binding);
        Some(binding)
    }

    fn declaration(&mut self, kind: ChannelKind, name: &str, data_type: &str) -> Option<BindingDeclaration> {
        let class = self.class_for(kind);
        let binding = self.register(class, interner::intern(name), None)?;
        Some(BindingDeclaration::new(name, data_type, binding))
    }

    fn struct_block(block_name: &str, range: &BufferArrayRange) -> StructBlock {
        let mut block = StructBlock::new(block_name);
        block.entries.extend(range.resources().iter().map(|(name, res)| StructEntry {
            name: *name,
            data_type: res.data_type,
            offset: res.offset,
            array_size: res.array_size,
        }));
        block.sort_entries();
        block
    }

    fn primvars(&mut self, kind: ChannelKind, range: &BufferArrayRange) -> Vec<(Binding, PrimVar)> {
        let class = self.class_for(kind);
        let mut out = Vec::with_capacity(range.resources().len());
        for (name, res) in range.resources() {
            if let Some(binding) = self.register(class, *name, None) {
                out.push((binding, PrimVar { name: *name, data_type: res.data_type }));
            }
        }
        out
    }

    // ─── Passes ──────────────────────────────────────────────────────────────

    fn resolve_draw_item(&mut self, draw_item: &DrawItem) {
        if let Some(range) = draw_item.constant.as_deref().filter(|r| !r.is_empty()) {
            let class = self.class_for(ChannelKind::InterleavedStruct);
            if let Some(binding) = self.register(class, interner::intern(CONSTANT_PRIMVARS), None) {
                self.md
                    .constant_data
                    .insert(binding, Self::struct_block(CONSTANT_PRIMVARS, range));
            }
        }

        let array_class = self.class_for(ChannelKind::IndexedArray);
        for (level, range) in draw_item.instance_levels.iter().enumerate() {
            let Some(range) = range else { continue };
            let level = level as u32;
            for (name, res) in range.resources() {
                if let Some(binding) = self.register(array_class, *name, Some(level)) {
                    self.md.instance_data.insert(
                        binding,
                        NestedPrimVar {
                            name: *name,
                            data_type: res.data_type,
                            level,
                        },
                    );
                }
            }
        }

        if let Some(range) = &draw_item.vertex {
            let primvars = self.primvars(ChannelKind::VertexStream, range);
            self.md.vertex_data.extend(primvars);
        }

        if let Some(range) = &draw_item.topology {
            for (name, res) in range.resources() {
                match interner::resolve(*name) {
                    // element array buffer, nothing to declare
                    "indices" => {
                        self.register(StorageClass::IndexAttr, *name, None);
                    }
                    "primitiveParam" => {
                        if let Some(binding) = self.register(array_class, *name, None) {
                            self.md.primitive_param =
                                Some(BindingDeclaration::from_symbols(*name, res.data_type, binding));
                        }
                    }
                    _ => {
                        if let Some(binding) = self.register(array_class, *name, None) {
                            self.md
                                .element_data
                                .insert(binding, PrimVar { name: *name, data_type: res.data_type });
                        }
                    }
                }
            }
        }

        if let Some(range) = &draw_item.element {
            let primvars = self.primvars(ChannelKind::IndexedArray, range);
            self.md.element_data.extend(primvars);
        }
        if let Some(range) = &draw_item.face_varying {
            let primvars = self.primvars(ChannelKind::IndexedArray, range);
            self.md.fvar_data.extend(primvars);
        }

        self.md.drawing_coord0 = self.declaration(ChannelKind::DrawingCoord, "drawingCoord0", "ivec4");
        self.md.drawing_coord1 = self.declaration(ChannelKind::DrawingCoord, "drawingCoord1", "ivec3");

        let levels = self.md.instancer_num_levels;
        if levels > 0 {
            let class = self.class_for(ChannelKind::DrawingCoordArray);
            self.md.drawing_coord_i = self
                .register_array(class, "drawingCoordI", levels)
                .map(|binding| BindingDeclaration::new("drawingCoordI", "int", binding));
        }

        if let Some(range) = &draw_item.instance_index {
            self.md.instance_index_array = self.instance_index(range, "instanceIndices");
            self.md.culled_instance_index_array = self.instance_index(range, "culledInstanceIndices");
        }

        if self.mode.indirect {
            self.register(StorageClass::Dispatch, interner::intern("drawDispatch"), None);
        }
    }

    fn instance_index(&mut self, range: &BufferArrayRange, name: &str) -> Option<BindingDeclaration> {
        let data_type = range.resource_named(name)?.type_str();
        self.declaration(ChannelKind::IndexedArray, name, data_type)
    }

    fn resolve_shaders(&mut self, shaders: &[Arc<dyn ShaderCode>]) {
        let struct_class = self.class_for(ChannelKind::InterleavedStruct);
        for shader in shaders {
            let Some(range) = shader.shader_data() else { continue };
            // only the surface shader's block is looked up by name
            let binding = if shader.is_surface() {
                self.register(struct_class, interner::intern(SURFACE_SHADER_PARAMS), None)
            } else {
                let binding = self.allocator.allocate(struct_class, SURFACE_SHADER_PARAMS);
                binding.is_valid().then_some(binding)
            };
            if let Some(binding) = binding {
                self.md
                    .shader_data
                    .insert(binding, Self::struct_block(SURFACE_SHADER_PARAMS, range));
            }
        }

        for shader in shaders {
            let allow_bindless = shader.is_surface();
            for param in shader.params() {
                let name = interner::resolve(param.name);
                let accessor = ShaderParameterAccessor {
                    name: param.name,
                    data_type: param.data_type,
                    in_primvars: param.sampler_coords.clone(),
                };
                match param.kind {
                    // fallbacks and redirects read other channels, no slot
                    ShaderParamKind::Fallback => {
                        let binding = self.allocator.allocate(StorageClass::Fallback, name);
                        self.md.shader_parameters.insert(binding, accessor);
                    }
                    ShaderParamKind::Primvar => {
                        let binding = self.allocator.allocate(StorageClass::PrimvarRedirect, name);
                        self.md.shader_parameters.insert(binding, accessor);
                    }
                    ShaderParamKind::Texture => {
                        let class = storage_class_for(ChannelKind::Texture2D, self.caps, self.mode, allow_bindless);
                        if let Some(binding) = self.register(class, param.name, None) {
                            self.md.shader_parameters.insert(binding, accessor);
                        }
                    }
                    ShaderParamKind::PtexTexture => {
                        let texel = storage_class_for(ChannelKind::PtexTexel, self.caps, self.mode, allow_bindless);
                        let Some(binding) = self.register(texel, param.name, None) else {
                            continue;
                        };
                        self.md.shader_parameters.insert(binding, accessor);

                        let layout_name = format!("{name}_layout");
                        let layout = storage_class_for(ChannelKind::PtexLayout, self.caps, self.mode, allow_bindless);
                        if let Some(binding) = self.register(layout, interner::intern(&layout_name), None) {
                            self.md
                                .shader_parameters
                                .insert(binding, ShaderParameterAccessor::new(&layout_name, "isamplerBuffer"));
                        }
                    }
                }
            }
        }
    }

    fn resolve_custom(&mut self, custom: &[BindingRequest]) {
        for request in custom {
            let name = interner::resolve(request.name);
            match &request.kind {
                BindingRequestKind::InterleavedBufferArray(range) => {
                    if let Some(binding) = self.register(request.class, request.name, None) {
                        self.md
                            .custom_interleaved
                            .insert(binding, Self::struct_block(name, range));
                    }
                }
                BindingRequestKind::BufferArray(range) => {
                    for (res_name, res) in range.resources() {
                        if let Some(binding) = self.register(request.class, *res_name, None) {
                            self.md.custom_bindings.push(BindingDeclaration::from_symbols(
                                *res_name,
                                res.data_type,
                                binding,
                            ));
                        }
                    }
                }
                BindingRequestKind::Typeless
                | BindingRequestKind::Value { .. }
                | BindingRequestKind::Resource(_) => {
                    if let Some(binding) = self.register(request.class, request.name, None) {
                        self.md.custom_bindings.push(BindingDeclaration::from_symbols(
                            request.name,
                            request.data_type(),
                            binding,
                        ));
                    }
                }
            }
        }
    }
}

impl ResourceBinder {
    /// Decides the storage class and slot of every channel of `draw_item`,
    /// `shaders` and `custom`, and returns the resulting plan.
    ///
    /// Replaces the binding map of any earlier pass. Duplicate channel names
    /// are reported as coding errors and only the first registration is
    /// kept.
    pub fn resolve_bindings(
        &mut self,
        caps: &RenderCaps,
        draw_item: &DrawItem,
        shaders: &[Arc<dyn ShaderCode>],
        custom: &[BindingRequest],
        mode: DrawMode,
    ) -> Metadata {
        self.binding_map.clear();

        let mut md = Metadata::new();
        md.instancer_num_levels = draw_item.instancer_num_levels();

        let mut resolver = Resolver {
            caps,
            mode,
            allocator: BindingAllocator::new(self.reserved_texture_units),
            map: &mut self.binding_map,
            errors: CodingErrors::new(),
            md,
        };
        resolver.resolve_draw_item(draw_item);
        resolver.resolve_shaders(shaders);
        resolver.resolve_custom(custom);

        let Resolver {
            mut allocator,
            mut errors,
            md,
            ..
        } = resolver;
        errors.append(&mut allocator.take_errors());
        self.num_reserved_texture_units = allocator.next_texture_unit();
        self.errors.lock().append(&mut errors);

        log::debug!(
            "Resolved {} bindings ({} vertex, {} instance, {} shader parameters)",
            self.binding_map.len(),
            md.vertex_data.len(),
            md.instance_data.len(),
            md.shader_parameters.len()
        );
        md
    }
}
