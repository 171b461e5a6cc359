//! Binding Metadata
//!
//! [`Metadata`] is the binding plan of one drawable + shader stack: for each
//! channel category an ordered map from [`Binding`] to what lives there,
//! plus the singleton declarations every draw carries.
//!
//! # Hash layout
//!
//! [`Metadata::compute_hash`] is the cache key contribution of the plan. It
//! walks the categories in a fixed order and writes a separator between
//! them, so equal entries filed under different categories never produce
//! the same key:
//!
//! ```text
//! version, drawingCoord0, drawingCoord1, drawingCoordI, instanceIndices,
//! culledInstanceIndices, primitiveParam, instancerNumLevels,
//! | custom bindings | custom interleaved | constant | instance | vertex
//! | element | face-varying | shader data | shader parameters
//! ```
//!
//! Reordering this walk changes every key. Bump
//! [`METADATA_HASH_LAYOUT_VERSION`] whenever it changes.

use std::collections::BTreeMap;

use smallvec::SmallVec;
use xxhash_rust::xxh3::Xxh3;

use crate::binding::{Binding, BindingDeclaration};
use crate::utils::interner::{self, Symbol};

/// Version of the hash walk. Hashed first.
pub const METADATA_HASH_LAYOUT_VERSION: u32 = 1;

const CATEGORY_SEPARATOR: u32 = 0xffff_fffe;

/// One field inside an interleaved block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructEntry {
    pub name: Symbol,
    pub data_type: Symbol,
    /// Byte offset inside the block.
    pub offset: u32,
    pub array_size: u32,
}

impl StructEntry {
    #[must_use]
    pub fn new(name: &str, data_type: &str, offset: u32, array_size: u32) -> Self {
        Self {
            name: interner::intern(name),
            data_type: interner::intern(data_type),
            offset,
            array_size,
        }
    }
}

/// An interleaved block. Entries are kept in ascending offset order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructBlock {
    pub block_name: Symbol,
    pub entries: Vec<StructEntry>,
}

impl StructBlock {
    #[must_use]
    pub fn new(block_name: &str) -> Self {
        Self {
            block_name: interner::intern(block_name),
            entries: Vec::new(),
        }
    }

    /// Restores ascending offset order. Stable, so entries sharing an
    /// offset keep their insertion order.
    pub fn sort_entries(&mut self) {
        self.entries.sort_by_key(|entry| entry.offset);
    }

    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].offset <= w[1].offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimVar {
    pub name: Symbol,
    pub data_type: Symbol,
}

impl PrimVar {
    #[must_use]
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: interner::intern(name),
            data_type: interner::intern(data_type),
        }
    }
}

/// Instance primvar at one nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NestedPrimVar {
    pub name: Symbol,
    pub data_type: Symbol,
    pub level: u32,
}

impl NestedPrimVar {
    #[must_use]
    pub fn new(name: &str, data_type: &str, level: u32) -> Self {
        Self {
            name: interner::intern(name),
            data_type: interner::intern(data_type),
            level,
        }
    }
}

/// A shader parameter accessor. `in_primvars` names the primvars the
/// parameter reads from (sampler coordinates, redirect source).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderParameterAccessor {
    pub name: Symbol,
    pub data_type: Symbol,
    pub in_primvars: SmallVec<[Symbol; 2]>,
}

impl ShaderParameterAccessor {
    #[must_use]
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: interner::intern(name),
            data_type: interner::intern(data_type),
            in_primvars: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn with_primvars(mut self, primvars: &[Symbol]) -> Self {
        self.in_primvars.extend_from_slice(primvars);
        self
    }
}

/// Binding plan of one drawable + shader stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    // ---- Singleton declarations ----
    pub drawing_coord0: Option<BindingDeclaration>,
    pub drawing_coord1: Option<BindingDeclaration>,
    pub drawing_coord_i: Option<BindingDeclaration>,
    pub instance_index_array: Option<BindingDeclaration>,
    pub culled_instance_index_array: Option<BindingDeclaration>,
    pub primitive_param: Option<BindingDeclaration>,

    pub instancer_num_levels: u32,

    // ---- Channel categories ----
    pub custom_bindings: Vec<BindingDeclaration>,
    pub custom_interleaved: BTreeMap<Binding, StructBlock>,
    pub constant_data: BTreeMap<Binding, StructBlock>,
    pub instance_data: BTreeMap<Binding, NestedPrimVar>,
    pub vertex_data: BTreeMap<Binding, PrimVar>,
    pub element_data: BTreeMap<Binding, PrimVar>,
    pub fvar_data: BTreeMap<Binding, PrimVar>,
    pub shader_data: BTreeMap<Binding, StructBlock>,
    pub shader_parameters: BTreeMap<Binding, ShaderParameterAccessor>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Width of the per-instance index tuple: one global id plus one index
    /// per nesting level.
    #[inline]
    #[must_use]
    pub fn instance_index_width(&self) -> u32 {
        self.instancer_num_levels + 1
    }

    /// Content hash of the plan. See the module docs for the walk order.
    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        let mut h = MetadataHasher::new();
        h.write_u32(METADATA_HASH_LAYOUT_VERSION);

        for decl in [
            &self.drawing_coord0,
            &self.drawing_coord1,
            &self.drawing_coord_i,
            &self.instance_index_array,
            &self.culled_instance_index_array,
            &self.primitive_param,
        ] {
            match decl {
                Some(decl) => {
                    h.write_binding(decl.binding);
                    h.write_symbol(decl.data_type);
                }
                None => h.write_u32(0),
            }
        }
        h.write_u32(self.instancer_num_levels);

        h.separator();
        for decl in &self.custom_bindings {
            h.write_symbol(decl.name);
            h.write_symbol(decl.data_type);
            h.write_binding(decl.binding);
        }

        h.separator();
        h.write_blocks(&self.custom_interleaved);

        h.separator();
        h.write_blocks(&self.constant_data);

        h.separator();
        for (binding, primvar) in &self.instance_data {
            h.write_binding(*binding);
            h.write_symbol(primvar.name);
            h.write_symbol(primvar.data_type);
            h.write_u32(primvar.level);
        }

        for category in [&self.vertex_data, &self.element_data, &self.fvar_data] {
            h.separator();
            for (binding, primvar) in category {
                h.write_binding(*binding);
                h.write_symbol(primvar.name);
                h.write_symbol(primvar.data_type);
            }
        }

        h.separator();
        h.write_blocks(&self.shader_data);

        h.separator();
        for (binding, param) in &self.shader_parameters {
            h.write_binding(*binding);
            h.write_symbol(param.name);
            h.write_symbol(param.data_type);
            h.write_u32(param.in_primvars.len() as u32);
            for primvar in &param.in_primvars {
                h.write_symbol(*primvar);
            }
        }

        h.finish()
    }
}

/// Streaming xxh3 over the resolved text of every symbol.
struct MetadataHasher {
    state: Xxh3,
}

impl MetadataHasher {
    fn new() -> Self {
        Self { state: Xxh3::new() }
    }

    #[inline]
    fn write_u32(&mut self, value: u32) {
        self.state.update(&value.to_le_bytes());
    }

    /// Length-prefixed, so adjacent strings cannot run into each other.
    fn write_symbol(&mut self, symbol: Symbol) {
        let text = interner::resolve(symbol);
        self.write_u32(text.len() as u32);
        self.state.update(text.as_bytes());
    }

    fn write_binding(&mut self, binding: Binding) {
        self.write_u32(binding.class().as_u32());
        self.write_u32(binding.location());
        self.write_u32(binding.texture_unit());
    }

    fn write_blocks(&mut self, blocks: &BTreeMap<Binding, StructBlock>) {
        for (binding, block) in blocks {
            self.write_binding(*binding);
            self.write_symbol(block.block_name);
            self.write_u32(block.entries.len() as u32);
            for entry in &block.entries {
                self.write_symbol(entry.name);
                self.write_symbol(entry.data_type);
                self.write_u32(entry.offset);
                self.write_u32(entry.array_size);
            }
        }
    }

    #[inline]
    fn separator(&mut self) {
        self.write_u32(CATEGORY_SEPARATOR);
    }

    fn finish(&self) -> u64 {
        self.state.digest()
    }
}
