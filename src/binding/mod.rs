//! Bindings
//!
//! A [`Binding`] pairs a [`StorageClass`] with the slot it was assigned by
//! the [`BindingAllocator`](allocator::BindingAllocator). Bindings are plain
//! `Copy` values, totally ordered so they can key the ordered maps of
//! [`Metadata`](metadata::Metadata).

pub mod allocator;
pub mod metadata;
pub mod policy;

use std::fmt;

use crate::utils::interner::{self, Symbol};

pub use allocator::BindingAllocator;
pub use metadata::{
    Metadata, NestedPrimVar, PrimVar, ShaderParameterAccessor, StructBlock, StructEntry,
};
pub use policy::{ChannelKind, DrawMode};

/// GPU data-residency strategy of one channel.
///
/// The set is closed: code that dispatches on it matches exhaustively, and
/// the allocator, the binder and the code generator each report a coding
/// error for classes they cannot handle rather than guessing.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageClass {
    Unknown = 0,
    /// Plain uniform, one location.
    Uniform,
    /// Uniform array, one location per element.
    UniformArray,
    /// Uniform block (std140).
    UniformBlock,
    /// Shader storage block (std430).
    StorageBlock,
    /// Buffer texture sampled with `texelFetch`.
    TextureBuffer,
    /// Resident buffer addressed through a GPU pointer uniform.
    BindlessUniform,
    /// Per-vertex attribute stream.
    VertexAttr,
    /// Integer attribute fed by the indirect draw command buffer.
    DrawIndex,
    /// Like [`StorageClass::DrawIndex`] with a divisor, constant per draw.
    DrawIndexInstance,
    /// One [`StorageClass::DrawIndexInstance`] attribute per nesting level.
    DrawIndexInstanceArray,
    /// Element array buffer. No shader-side declaration.
    IndexAttr,
    /// Indirect draw command buffer. No shader-side declaration.
    Dispatch,
    /// Shader parameter read from the interleaved shader data block.
    Fallback,
    /// Shader parameter aliased to another primvar accessor.
    PrimvarRedirect,
    Texture2D,
    BindlessTexture2D,
    TexturePtexTexel,
    TexturePtexLayout,
    BindlessTexturePtexTexel,
    BindlessTexturePtexLayout,
}

impl StorageClass {
    /// Stable numeric tag used when hashing.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// The class occupies one or more vertex attribute locations.
    #[must_use]
    pub const fn is_attribute(self) -> bool {
        matches!(
            self,
            Self::VertexAttr | Self::DrawIndex | Self::DrawIndexInstance | Self::DrawIndexInstanceArray
        )
    }

    #[must_use]
    pub const fn is_bindless(self) -> bool {
        matches!(
            self,
            Self::BindlessUniform
                | Self::BindlessTexture2D
                | Self::BindlessTexturePtexTexel
                | Self::BindlessTexturePtexLayout
        )
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A storage class plus the slot it was assigned.
///
/// `location` may be patched to [`Binding::NOT_EXIST`] by introspection when
/// the compiler optimized the channel away. Such bindings are valid; device
/// operations silently skip them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Binding {
    class: StorageClass,
    location: u32,
    texture_unit: u32,
}

impl Default for Binding {
    fn default() -> Self {
        Self::invalid()
    }
}

impl Binding {
    /// Location sentinel for channels the compiler removed.
    pub const NOT_EXIST: u32 = u32::MAX;

    #[inline]
    #[must_use]
    pub const fn new(class: StorageClass, location: u32, texture_unit: u32) -> Self {
        Self {
            class,
            location,
            texture_unit,
        }
    }

    #[inline]
    #[must_use]
    pub const fn invalid() -> Self {
        Self::new(StorageClass::Unknown, 0, 0)
    }

    #[inline]
    #[must_use]
    pub const fn class(&self) -> StorageClass {
        self.class
    }

    #[inline]
    #[must_use]
    pub const fn location(&self) -> u32 {
        self.location
    }

    #[inline]
    #[must_use]
    pub const fn texture_unit(&self) -> u32 {
        self.texture_unit
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !matches!(self.class, StorageClass::Unknown)
    }

    /// The location survived compilation.
    #[inline]
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.location != Self::NOT_EXIST
    }

    #[inline]
    #[must_use]
    pub const fn with_location(self, location: u32) -> Self {
        Self { location, ..self }
    }

    /// Single value identifying the binding, used to name per-binding
    /// generated types such as `ConstantData<N>`.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u32 {
        (self.class.as_u32() << 24) | (self.location & 0x00ff_ffff)
    }
}

/// A named, typed handle to one [`Binding`].
///
/// An empty `data_type` marks a typeless custom binding, which gets a
/// `HAS_` macro but no declaration or accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingDeclaration {
    pub name: Symbol,
    pub data_type: Symbol,
    pub binding: Binding,
}

impl BindingDeclaration {
    #[must_use]
    pub fn new(name: &str, data_type: &str, binding: Binding) -> Self {
        Self::from_symbols(interner::intern(name), interner::intern(data_type), binding)
    }

    #[inline]
    #[must_use]
    pub const fn from_symbols(name: Symbol, data_type: Symbol, binding: Binding) -> Self {
        Self {
            name,
            data_type,
            binding,
        }
    }

    #[inline]
    #[must_use]
    pub fn name_str(&self) -> &'static str {
        interner::resolve(self.name)
    }

    #[inline]
    #[must_use]
    pub fn type_str(&self) -> &'static str {
        interner::resolve(self.data_type)
    }

    #[inline]
    #[must_use]
    pub fn is_typeless(&self) -> bool {
        self.type_str().is_empty()
    }
}
