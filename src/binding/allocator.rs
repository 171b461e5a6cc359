//! Binding Allocator
//!
//! One counter per storage class. A fresh allocator is created for every
//! resolution pass, so locations never carry over between drawables and
//! passes can run concurrently, one allocator each.
//!
//! | Class                                   | Counter                      |
//! |-----------------------------------------|------------------------------|
//! | `Uniform`, `BindlessUniform`            | uniform                      |
//! | `UniformArray`                          | uniform (advanced by count)  |
//! | `UniformBlock`                          | uniform block                |
//! | `StorageBlock`                          | storage block                |
//! | `VertexAttr`, `DrawIndex*`              | attribute                    |
//! | `DrawIndexInstanceArray`                | attribute (advanced by count)|
//! | `TextureBuffer`, `Texture2D`, ptex      | uniform + texture unit       |
//! | bindless textures                       | bindless texture (hash only) |
//! | `Fallback`                              | fallback (hash only)         |
//! | `PrimvarRedirect`                       | redirect (hash only)         |
//! | `IndexAttr`, `Dispatch`                 | fixed location 0             |

use crate::binding::{Binding, StorageClass};
use crate::utils::diagnostics::CodingErrors;

#[derive(Debug, Clone)]
pub struct BindingAllocator {
    uniform: u32,
    uniform_block: u32,
    storage_block: u32,
    attribute: u32,
    texture_unit: u32,
    bindless_texture: u32,
    fallback: u32,
    redirect: u32,
    errors: CodingErrors,
}

impl BindingAllocator {
    /// Creates an allocator whose texture units start at `reserved_texture_units`.
    #[must_use]
    pub fn new(reserved_texture_units: u32) -> Self {
        Self {
            uniform: 0,
            uniform_block: 0,
            storage_block: 0,
            attribute: 0,
            texture_unit: reserved_texture_units,
            bindless_texture: 0,
            fallback: 0,
            redirect: 0,
            errors: CodingErrors::new(),
        }
    }

    /// Hands out the next slot for `class`.
    ///
    /// Array classes get a single slot; use [`Self::allocate_array`] to
    /// reserve one slot per element. Classes with no slot semantics report a
    /// coding error and return [`Binding::invalid`].
    pub fn allocate(&mut self, class: StorageClass, debug_name: &str) -> Binding {
        let binding = match class {
            StorageClass::Uniform | StorageClass::BindlessUniform => {
                bump(&mut self.uniform, 1).map(|loc| Binding::new(class, loc, 0))
            }
            StorageClass::UniformArray | StorageClass::DrawIndexInstanceArray => {
                return self.allocate_array(class, 1, debug_name);
            }
            StorageClass::UniformBlock => {
                bump(&mut self.uniform_block, 1).map(|loc| Binding::new(class, loc, 0))
            }
            StorageClass::StorageBlock => {
                bump(&mut self.storage_block, 1).map(|loc| Binding::new(class, loc, 0))
            }
            StorageClass::VertexAttr | StorageClass::DrawIndex | StorageClass::DrawIndexInstance => {
                bump(&mut self.attribute, 1).map(|loc| Binding::new(class, loc, 0))
            }
            StorageClass::TextureBuffer
            | StorageClass::Texture2D
            | StorageClass::TexturePtexTexel
            | StorageClass::TexturePtexLayout => bump(&mut self.uniform, 1)
                .zip(bump(&mut self.texture_unit, 1))
                .map(|(loc, unit)| Binding::new(class, loc, unit)),
            StorageClass::BindlessTexture2D
            | StorageClass::BindlessTexturePtexTexel
            | StorageClass::BindlessTexturePtexLayout => {
                bump(&mut self.bindless_texture, 1).map(|loc| Binding::new(class, loc, 0))
            }
            StorageClass::Fallback => bump(&mut self.fallback, 1).map(|loc| Binding::new(class, loc, 0)),
            StorageClass::PrimvarRedirect => {
                bump(&mut self.redirect, 1).map(|loc| Binding::new(class, loc, 0))
            }
            StorageClass::IndexAttr | StorageClass::Dispatch => Some(Binding::new(class, 0, 0)),
            StorageClass::Unknown => {
                self.errors
                    .report(format!("Unknown binding type {class} for {debug_name}"));
                return Binding::invalid();
            }
        };
        binding.unwrap_or_else(|| self.exhausted(class, debug_name))
    }

    /// Reserves `count` consecutive slots for an array class and returns a
    /// binding at the first one.
    pub fn allocate_array(&mut self, class: StorageClass, count: u32, debug_name: &str) -> Binding {
        let count = count.max(1);
        let binding = match class {
            StorageClass::UniformArray => {
                bump(&mut self.uniform, count).map(|loc| Binding::new(class, loc, 0))
            }
            StorageClass::DrawIndexInstanceArray => {
                bump(&mut self.attribute, count).map(|loc| Binding::new(class, loc, 0))
            }
            _ => {
                self.errors.report(format!(
                    "Binding type {class} of {debug_name} cannot be allocated as an array"
                ));
                return Binding::invalid();
            }
        };
        binding.unwrap_or_else(|| self.exhausted(class, debug_name))
    }

    fn exhausted(&mut self, class: StorageClass, debug_name: &str) -> Binding {
        self.errors
            .report(format!("Out of {class} slots allocating {debug_name}"));
        Binding::invalid()
    }

    /// First texture unit not taken by this pass.
    #[inline]
    #[must_use]
    pub fn next_texture_unit(&self) -> u32 {
        self.texture_unit
    }

    #[inline]
    #[must_use]
    pub fn errors(&self) -> &CodingErrors {
        &self.errors
    }

    pub fn take_errors(&mut self) -> CodingErrors {
        std::mem::take(&mut self.errors)
    }
}

/// Advances `counter` by `count` and returns its previous value, or `None`
/// when the counter would overflow.
#[inline]
fn bump(counter: &mut u32, count: u32) -> Option<u32> {
    let value = *counter;
    *counter = value.checked_add(count)?;
    Some(value)
}
