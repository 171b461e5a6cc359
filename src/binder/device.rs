//! Graphics device interface.
//!
//! The binder never talks to a graphics API directly. Every state change it
//! performs goes through [`GraphicsDevice`], implemented by the host over
//! its context. Calls must be issued on the thread that owns the context;
//! nothing here enforces that.

use crate::draw_item::ComponentType;

/// Divisor that keeps an instanced attribute constant for the whole draw.
pub const DRAW_CONSTANT_DIVISOR: u32 = 0x7fff_ffff;

/// Buffer binding points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
    DrawIndirect,
    Uniform,
    ShaderStorage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    Texture2DArray,
    Buffer,
}

/// Device state changes issued by the binder.
///
/// Locations and units are the ones recorded in the binding plan. Buffer and
/// texture names are the host's own.
pub trait GraphicsDevice {
    // ---- Buffers ----
    fn bind_buffer(&mut self, target: BufferTarget, buffer: u32);
    fn bind_buffer_base(&mut self, target: BufferTarget, index: u32, buffer: u32);
    fn bind_buffer_range(
        &mut self,
        target: BufferTarget,
        index: u32,
        buffer: u32,
        offset: u32,
        size: u32,
    );

    // ---- Vertex attributes ----
    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        components: u32,
        component_type: ComponentType,
        normalized: bool,
        stride: u32,
        offset: u32,
    );
    /// Integer attribute, fetched without conversion.
    fn vertex_attrib_i_pointer(&mut self, location: u32, components: u32, stride: u32, offset: u32);
    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32);
    fn enable_vertex_attrib_array(&mut self, location: u32);
    fn disable_vertex_attrib_array(&mut self, location: u32);

    // ---- Residency ----
    fn is_buffer_resident(&self, buffer: u32) -> bool;
    fn make_buffer_resident(&mut self, buffer: u32);
    fn make_buffer_non_resident(&mut self, buffer: u32);
    fn is_texture_handle_resident(&self, handle: u64) -> bool;
    fn make_texture_handle_resident(&mut self, handle: u64);
    fn make_texture_handle_non_resident(&mut self, handle: u64);

    // ---- Uniforms ----
    /// `values.len()` is the vector width (1 to 4).
    fn uniform_i(&mut self, location: u32, values: &[i32]);
    fn uniform_ui(&mut self, location: u32, values: &[u32]);
    /// `values.len()` is the vector width (1 to 4) or 16 for a 4x4 matrix.
    fn uniform_f(&mut self, location: u32, values: &[f32]);
    /// One `int` per element, starting at `location`.
    fn uniform_array_i(&mut self, location: u32, values: &[i32]);
    fn uniform_ui64(&mut self, location: u32, value: u64);

    // ---- Textures ----
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: TextureTarget, texture: u32);
    fn bind_sampler(&mut self, unit: u32, sampler: u32);
}
