//! Storage-class decision policy.
//!
//! The priority order between storage classes is data: each table lists
//! `(class, predicate)` pairs from most to least preferred and
//! [`select`] returns the first class whose predicate holds for the current
//! [`RenderCaps`]. Missing capabilities downgrade silently.

use crate::binding::StorageClass;
use crate::caps::{CapabilityFlags, RenderCaps};

pub type CapabilityPredicate = fn(&RenderCaps) -> bool;
pub type PolicyTable = [(StorageClass, CapabilityPredicate)];

fn has_storage_buffer(caps: &RenderCaps) -> bool {
    caps.has(CapabilityFlags::STORAGE_BUFFER)
}

fn has_bindless_buffer(caps: &RenderCaps) -> bool {
    caps.has(CapabilityFlags::BINDLESS_BUFFER)
}

fn has_bindless_texture(caps: &RenderCaps) -> bool {
    caps.has(CapabilityFlags::BINDLESS_TEXTURE)
}

fn always(_: &RenderCaps) -> bool {
    true
}

/// One interleaved struct shared by the whole draw.
pub const STRUCT_POLICY: &PolicyTable = &[
    (StorageClass::StorageBlock, has_storage_buffer),
    (StorageClass::BindlessUniform, has_bindless_buffer),
    (StorageClass::UniformBlock, always),
];

/// Non-interleaved arrays indexed per instance, element or primitive.
pub const ARRAY_POLICY: &PolicyTable = &[
    (StorageClass::StorageBlock, has_storage_buffer),
    (StorageClass::BindlessUniform, has_bindless_buffer),
    (StorageClass::TextureBuffer, always),
];

pub const TEXTURE_2D_POLICY: &PolicyTable = &[
    (StorageClass::BindlessTexture2D, has_bindless_texture),
    (StorageClass::Texture2D, always),
];

pub const PTEX_TEXEL_POLICY: &PolicyTable = &[
    (StorageClass::BindlessTexturePtexTexel, has_bindless_texture),
    (StorageClass::TexturePtexTexel, always),
];

pub const PTEX_LAYOUT_POLICY: &PolicyTable = &[
    (StorageClass::BindlessTexturePtexLayout, has_bindless_texture),
    (StorageClass::TexturePtexLayout, always),
];

/// Returns the first class of `table` supported by `caps`.
#[must_use]
pub fn select(table: &PolicyTable, caps: &RenderCaps) -> StorageClass {
    table
        .iter()
        .find(|(_, predicate)| predicate(caps))
        .map_or(StorageClass::Unknown, |(class, _)| {
            log::trace!("storage policy selected {class}");
            *class
        })
}

/// How the draw is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DrawMode {
    pub indirect: bool,
    pub instanced: bool,
}

/// What a channel is, independent of how it will be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Single interleaved struct (constant primvars, shader data).
    InterleavedStruct,
    /// Non-interleaved array (instance, element, face-varying, primitive
    /// param, instance indices).
    IndexedArray,
    /// Per-vertex attribute stream.
    VertexStream,
    /// Per-draw drawing-coordinate vector.
    DrawingCoord,
    /// Per-draw drawing coordinate, one entry per instancing level.
    DrawingCoordArray,
    Texture2D,
    PtexTexel,
    PtexLayout,
}

/// Storage class for a channel of `kind`.
///
/// Textures only consider bindless handles when `allow_bindless_texture` is
/// set; the binder passes `false` for shaders other than the surface shader.
#[must_use]
pub fn storage_class_for(
    kind: ChannelKind,
    caps: &RenderCaps,
    mode: DrawMode,
    allow_bindless_texture: bool,
) -> StorageClass {
    let texture = |table: &PolicyTable| {
        if allow_bindless_texture {
            select(table, caps)
        } else {
            select(&table[1..], caps)
        }
    };

    match kind {
        ChannelKind::InterleavedStruct => select(STRUCT_POLICY, caps),
        ChannelKind::IndexedArray => select(ARRAY_POLICY, caps),
        ChannelKind::VertexStream => StorageClass::VertexAttr,
        ChannelKind::DrawingCoord => match (mode.indirect, mode.instanced) {
            (true, true) => StorageClass::DrawIndexInstance,
            (true, false) => StorageClass::DrawIndex,
            (false, _) => StorageClass::Uniform,
        },
        ChannelKind::DrawingCoordArray => {
            if mode.indirect {
                StorageClass::DrawIndexInstanceArray
            } else {
                StorageClass::UniformArray
            }
        }
        ChannelKind::Texture2D => texture(TEXTURE_2D_POLICY),
        ChannelKind::PtexTexel => texture(PTEX_TEXEL_POLICY),
        ChannelKind::PtexLayout => texture(PTEX_LAYOUT_POLICY),
    }
}
