//! Draw Item
//!
//! The view this crate has of the buffer registry: named buffer resources
//! grouped into array ranges, attached to a drawable per channel category.
//! The registry owns the device memory; these descriptors only carry what
//! binding resolution and device binding need.

use std::sync::Arc;

use crate::binding::StorageClass;
use crate::utils::interner::{self, Symbol};

/// Component encoding of a vertex attribute stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComponentType {
    #[default]
    Float,
    Double,
    Int,
    UnsignedInt,
    /// Signed 2_10_10_10 packed normals.
    Int2101010Rev,
    /// Unsigned 2_10_10_10 packed values.
    UnsignedInt2101010Rev,
}

impl ComponentType {
    /// Packed formats are fetched normalized.
    #[inline]
    #[must_use]
    pub fn is_packed(self) -> bool {
        matches!(self, Self::Int2101010Rev | Self::UnsignedInt2101010Rev)
    }
}

/// One named buffer resource: a typed view into a device buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferResource {
    /// GLSL type name of one element (`vec3`, `mat4`, `int`...).
    pub data_type: Symbol,
    pub component_type: ComponentType,
    pub num_components: u32,
    /// Byte offset of the first element.
    pub offset: u32,
    pub stride: u32,
    pub array_size: u32,
    /// Device buffer name. Zero means not allocated yet.
    pub buffer_id: u32,
    /// Resident GPU address for bindless access.
    pub gpu_address: u64,
    /// Buffer texture name for texture-buffer access.
    pub texture_buffer: u32,
}

impl BufferResource {
    #[must_use]
    pub fn new(data_type: &str, num_components: u32, offset: u32) -> Self {
        Self {
            data_type: interner::intern(data_type),
            component_type: ComponentType::Float,
            num_components,
            offset,
            stride: 0,
            array_size: 1,
            buffer_id: 0,
            gpu_address: 0,
            texture_buffer: 0,
        }
    }

    #[must_use]
    pub fn with_buffer(mut self, buffer_id: u32) -> Self {
        self.buffer_id = buffer_id;
        self
    }

    #[must_use]
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    #[must_use]
    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }

    #[must_use]
    pub fn with_component_type(mut self, component_type: ComponentType) -> Self {
        self.component_type = component_type;
        self
    }

    #[must_use]
    pub fn with_gpu_address(mut self, gpu_address: u64) -> Self {
        self.gpu_address = gpu_address;
        self
    }

    #[must_use]
    pub fn with_texture_buffer(mut self, texture_buffer: u32) -> Self {
        self.texture_buffer = texture_buffer;
        self
    }

    #[inline]
    #[must_use]
    pub fn type_str(&self) -> &'static str {
        interner::resolve(self.data_type)
    }
}

/// An ordered set of named resources sharing one allocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferArrayRange {
    resources: Vec<(Symbol, BufferResource)>,
}

impl BufferArrayRange {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resource(mut self, name: &str, resource: BufferResource) -> Self {
        self.add_resource(name, resource);
        self
    }

    pub fn add_resource(&mut self, name: &str, resource: BufferResource) {
        self.resources.push((interner::intern(name), resource));
    }

    #[must_use]
    pub fn resources(&self) -> &[(Symbol, BufferResource)] {
        &self.resources
    }

    /// The single resource of an interleaved range.
    #[must_use]
    pub fn resource(&self) -> Option<&BufferResource> {
        self.resources.first().map(|(_, res)| res)
    }

    #[must_use]
    pub fn resource_named(&self, name: &str) -> Option<&BufferResource> {
        let symbol = interner::get(name)?;
        self.resources
            .iter()
            .find(|(n, _)| *n == symbol)
            .map(|(_, res)| res)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Channel ranges of one drawable.
#[derive(Debug, Clone, Default)]
pub struct DrawItem {
    pub constant: Option<Arc<BufferArrayRange>>,
    /// Instance primvars per nesting level, level 0 first. A level may be
    /// absent while deeper levels exist.
    pub instance_levels: Vec<Option<Arc<BufferArrayRange>>>,
    pub vertex: Option<Arc<BufferArrayRange>>,
    /// `indices` and `primitiveParam`.
    pub topology: Option<Arc<BufferArrayRange>>,
    pub element: Option<Arc<BufferArrayRange>>,
    pub face_varying: Option<Arc<BufferArrayRange>>,
    /// `instanceIndices` and `culledInstanceIndices`.
    pub instance_index: Option<Arc<BufferArrayRange>>,
}

impl DrawItem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_constant(mut self, range: BufferArrayRange) -> Self {
        self.constant = Some(Arc::new(range));
        self
    }

    #[must_use]
    pub fn with_instance_level(mut self, range: Option<BufferArrayRange>) -> Self {
        self.instance_levels.push(range.map(Arc::new));
        self
    }

    #[must_use]
    pub fn with_vertex(mut self, range: BufferArrayRange) -> Self {
        self.vertex = Some(Arc::new(range));
        self
    }

    #[must_use]
    pub fn with_topology(mut self, range: BufferArrayRange) -> Self {
        self.topology = Some(Arc::new(range));
        self
    }

    #[must_use]
    pub fn with_element(mut self, range: BufferArrayRange) -> Self {
        self.element = Some(Arc::new(range));
        self
    }

    #[must_use]
    pub fn with_face_varying(mut self, range: BufferArrayRange) -> Self {
        self.face_varying = Some(Arc::new(range));
        self
    }

    #[must_use]
    pub fn with_instance_index(mut self, range: BufferArrayRange) -> Self {
        self.instance_index = Some(Arc::new(range));
        self
    }

    #[inline]
    #[must_use]
    pub fn instancer_num_levels(&self) -> u32 {
        self.instance_levels.len() as u32
    }
}

/// Payload of a [`BindingRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum BindingRequestKind {
    /// A slot with no data type: gets a macro but no declaration.
    Typeless,
    /// A declared value with no resource attached yet.
    Value { data_type: Symbol },
    /// A single resource bound at its own offset.
    Resource(BufferResource),
    /// Non-interleaved range: one binding per resource.
    BufferArray(Arc<BufferArrayRange>),
    /// Interleaved range: one binding for the whole block.
    InterleavedBufferArray(Arc<BufferArrayRange>),
}

/// A custom binding added to the plan by the caller (render passes,
/// compute culling, selection buffers...).
#[derive(Debug, Clone, PartialEq)]
pub struct BindingRequest {
    pub class: StorageClass,
    pub name: Symbol,
    pub kind: BindingRequestKind,
}

impl BindingRequest {
    #[must_use]
    pub fn typeless(class: StorageClass, name: &str) -> Self {
        Self {
            class,
            name: interner::intern(name),
            kind: BindingRequestKind::Typeless,
        }
    }

    #[must_use]
    pub fn value(class: StorageClass, name: &str, data_type: &str) -> Self {
        Self {
            class,
            name: interner::intern(name),
            kind: BindingRequestKind::Value {
                data_type: interner::intern(data_type),
            },
        }
    }

    #[must_use]
    pub fn resource(class: StorageClass, name: &str, resource: BufferResource) -> Self {
        Self {
            class,
            name: interner::intern(name),
            kind: BindingRequestKind::Resource(resource),
        }
    }

    #[must_use]
    pub fn buffer_array(class: StorageClass, name: &str, range: Arc<BufferArrayRange>) -> Self {
        Self {
            class,
            name: interner::intern(name),
            kind: BindingRequestKind::BufferArray(range),
        }
    }

    #[must_use]
    pub fn interleaved(class: StorageClass, name: &str, range: Arc<BufferArrayRange>) -> Self {
        Self {
            class,
            name: interner::intern(name),
            kind: BindingRequestKind::InterleavedBufferArray(range),
        }
    }

    /// Data type recorded in the plan. Empty for typeless requests and
    /// buffer arrays, whose resources carry their own types.
    #[must_use]
    pub fn data_type(&self) -> Symbol {
        match &self.kind {
            BindingRequestKind::Value { data_type } => *data_type,
            BindingRequestKind::Resource(res) => res.data_type,
            _ => interner::intern(""),
        }
    }
}
