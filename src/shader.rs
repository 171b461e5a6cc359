//! Shader Code Providers
//!
//! A program is assembled from one [`GeometricShader`], which owns `main()`
//! for every stage, and a stack of attached providers (render pass,
//! lighting, surface) that contribute functions. All of them implement
//! [`ShaderCode`].
//!
//! [`MixinShader`] decorates another provider with extra text instead of
//! mutating it, so one surface shader can be shared by many programs.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::draw_item::BufferArrayRange;
use crate::utils::hash::{fx_hash_key, hash_combine};
use crate::utils::interner::{self, Symbol};

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShaderStage {
    Vertex,
    TessControl,
    TessEval,
    Geometry,
    Fragment,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 5] = [
        Self::Vertex,
        Self::TessControl,
        Self::TessEval,
        Self::Geometry,
        Self::Fragment,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::TessControl => "tess control",
            Self::TessEval => "tess evaluation",
            Self::Geometry => "geometry",
            Self::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which source bucket a provider is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKey {
    /// Text shared by every stage, emitted right after the generated preamble.
    Common,
    Stage(ShaderStage),
}

impl SourceKey {
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Common => 0,
            Self::Stage(stage) => stage.index() + 1,
        }
    }
}

/// How a shader parameter gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderParamKind {
    /// Read from the shader data block.
    Fallback,
    /// Sampled from a 2D texture at the given sampler coordinates.
    Texture,
    /// Sampled from a ptex texture at the patch coordinate.
    PtexTexture,
    /// Aliased to a primvar accessor.
    Primvar,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderParam {
    pub name: Symbol,
    pub data_type: Symbol,
    pub kind: ShaderParamKind,
    /// Primvars supplying coordinates (textures) or the value (redirects).
    pub sampler_coords: SmallVec<[Symbol; 2]>,
}

impl ShaderParam {
    #[must_use]
    pub fn new(name: &str, data_type: &str, kind: ShaderParamKind) -> Self {
        Self {
            name: interner::intern(name),
            data_type: interner::intern(data_type),
            kind,
            sampler_coords: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn fallback(name: &str, data_type: &str) -> Self {
        Self::new(name, data_type, ShaderParamKind::Fallback)
    }

    #[must_use]
    pub fn texture(name: &str, data_type: &str, coords: &str) -> Self {
        Self::new(name, data_type, ShaderParamKind::Texture).with_coords(&[coords])
    }

    #[must_use]
    pub fn ptex(name: &str, data_type: &str) -> Self {
        Self::new(name, data_type, ShaderParamKind::PtexTexture)
    }

    #[must_use]
    pub fn primvar(name: &str, data_type: &str, source: &str) -> Self {
        Self::new(name, data_type, ShaderParamKind::Primvar).with_coords(&[source])
    }

    #[must_use]
    pub fn with_coords(mut self, coords: &[&str]) -> Self {
        self.sampler_coords
            .extend(coords.iter().map(|c| interner::intern(c)));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Texture2D,
    Ptex,
}

/// A texture a provider wants bound while it draws.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub name: Symbol,
    pub kind: TextureKind,
    /// Device texture name (texel array for ptex).
    pub texture: u32,
    /// Layout buffer texture for ptex, zero otherwise.
    pub layout: u32,
    pub sampler: u32,
    /// Resident handle for bindless access.
    pub handle: u64,
    /// Resident handle of the ptex layout buffer texture.
    pub layout_handle: u64,
}

impl TextureDescriptor {
    #[must_use]
    pub fn new(name: &str, kind: TextureKind, texture: u32) -> Self {
        Self {
            name: interner::intern(name),
            kind,
            texture,
            layout: 0,
            sampler: 0,
            handle: 0,
            layout_handle: 0,
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: u32) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: u32) -> Self {
        self.sampler = sampler;
        self
    }

    #[must_use]
    pub fn with_handle(mut self, handle: u64) -> Self {
        self.handle = handle;
        self
    }

    #[must_use]
    pub fn with_layout_handle(mut self, layout_handle: u64) -> Self {
        self.layout_handle = layout_handle;
        self
    }
}

/// Capability set every shader provider exposes.
pub trait ShaderCode: Send + Sync + fmt::Debug {
    /// Content hash of everything this provider contributes.
    fn compute_hash(&self) -> u64;

    fn source(&self, key: SourceKey) -> Cow<'_, str>;

    fn params(&self) -> &[ShaderParam] {
        &[]
    }

    fn textures(&self) -> &[TextureDescriptor] {
        &[]
    }

    /// Interleaved shader parameter storage, if any.
    fn shader_data(&self) -> Option<&Arc<BufferArrayRange>> {
        None
    }

    /// The surface shader owns the `surfaceShaderParams` binding and is the
    /// only provider whose textures may be bindless.
    fn is_surface(&self) -> bool {
        false
    }
}

/// Hash of an ordered shader stack.
#[must_use]
pub fn compute_stack_hash(shaders: &[Arc<dyn ShaderCode>]) -> u64 {
    shaders
        .iter()
        .fold(0, |seed, shader| hash_combine(seed, shader.compute_hash()))
}

// ─── Sources ─────────────────────────────────────────────────────────────────

/// Per-bucket source text, indexed by [`SourceKey::index`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct SourceSet {
    buckets: [String; 6],
}

impl SourceSet {
    fn get(&self, key: SourceKey) -> &str {
        &self.buckets[key.index()]
    }

    fn set(&mut self, key: SourceKey, text: String) {
        self.buckets[key.index()] = text;
    }
}

// ─── Geometric Shader ────────────────────────────────────────────────────────

/// Primitive parameterization of the drawable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Points,
    Lines,
    /// Curves drawn as line segments with adjacency.
    LinesAdjacency,
    Triangles,
    /// Coarse quads, primitive param is `ivec2`.
    CoarseQuads,
    /// Uniformly refined quads, primitive param is `ivec3`.
    RefinedQuads,
    /// Adaptively refined patches, primitive param is `ivec4`.
    Patches,
}

impl PrimitiveType {
    #[must_use]
    pub const fn is_quads(self) -> bool {
        matches!(self, Self::CoarseQuads | Self::RefinedQuads)
    }

    /// Quads and patches interpolate bilinearly within the primitive.
    #[must_use]
    pub const fn is_bilinear(self) -> bool {
        matches!(self, Self::CoarseQuads | Self::RefinedQuads | Self::Patches)
    }

    /// Element index stride of face-varying data.
    #[must_use]
    pub const fn fvar_stride(self) -> u32 {
        if self.is_bilinear() { 4 } else { 3 }
    }

    #[must_use]
    pub const fn define_name(self) -> &'static str {
        match self {
            Self::Points => "PRIM_POINTS",
            Self::Lines => "PRIM_LINES",
            Self::LinesAdjacency => "PRIM_LINES_ADJACENCY",
            Self::Triangles => "PRIM_TRIANGLES",
            Self::CoarseQuads => "PRIM_COARSE_QUADS",
            Self::RefinedQuads => "PRIM_REFINED_QUADS",
            Self::Patches => "PRIM_PATCHES",
        }
    }
}

/// The provider that owns `main()` for every stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeometricShader {
    primitive_type: PrimitiveType,
    patch_vertices: u32,
    culling_pass: bool,
    sources: SourceSet,
}

impl GeometricShader {
    #[must_use]
    pub fn new(primitive_type: PrimitiveType) -> Self {
        Self {
            primitive_type,
            patch_vertices: 16,
            culling_pass: false,
            sources: SourceSet::default(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, key: SourceKey, text: impl Into<String>) -> Self {
        self.sources.set(key, text.into());
        self
    }

    #[must_use]
    pub fn with_stage(self, stage: ShaderStage, text: impl Into<String>) -> Self {
        self.with_source(SourceKey::Stage(stage), text)
    }

    /// Control points per patch. Only meaningful for tessellated primitives.
    #[must_use]
    pub fn with_patch_vertices(mut self, count: u32) -> Self {
        self.patch_vertices = count;
        self
    }

    /// The frustum culling pass reads unculled instance indices and writes
    /// the culled ones.
    #[must_use]
    pub fn with_culling_pass(mut self, culling_pass: bool) -> Self {
        self.culling_pass = culling_pass;
        self
    }

    #[inline]
    #[must_use]
    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }

    #[inline]
    #[must_use]
    pub fn patch_vertices(&self) -> u32 {
        self.patch_vertices
    }

    #[inline]
    #[must_use]
    pub fn is_culling_pass(&self) -> bool {
        self.culling_pass
    }

    /// Vertices per primitive as seen by the geometry stage.
    #[must_use]
    pub fn primitive_index_size(&self) -> u32 {
        match self.primitive_type {
            PrimitiveType::Points => 1,
            PrimitiveType::Lines => 2,
            PrimitiveType::Triangles => 3,
            PrimitiveType::LinesAdjacency
            | PrimitiveType::CoarseQuads
            | PrimitiveType::RefinedQuads => 4,
            PrimitiveType::Patches => self.patch_vertices,
        }
    }

    #[must_use]
    pub fn has_stage(&self, stage: ShaderStage) -> bool {
        !self.sources.get(SourceKey::Stage(stage)).is_empty()
    }
}

impl ShaderCode for GeometricShader {
    fn compute_hash(&self) -> u64 {
        fx_hash_key(self)
    }

    fn source(&self, key: SourceKey) -> Cow<'_, str> {
        Cow::Borrowed(self.sources.get(key))
    }
}

// ─── Surface Shader ──────────────────────────────────────────────────────────

/// Material shader: contributes functions, parameters and textures.
#[derive(Debug, Clone, Default)]
pub struct SurfaceShader {
    sources: SourceSet,
    params: Vec<ShaderParam>,
    textures: Vec<TextureDescriptor>,
    shader_data: Option<Arc<BufferArrayRange>>,
}

impl SurfaceShader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_source(mut self, key: SourceKey, text: impl Into<String>) -> Self {
        self.sources.set(key, text.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, param: ShaderParam) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn with_texture(mut self, texture: TextureDescriptor) -> Self {
        self.textures.push(texture);
        self
    }

    #[must_use]
    pub fn with_shader_data(mut self, range: BufferArrayRange) -> Self {
        self.shader_data = Some(Arc::new(range));
        self
    }
}

impl ShaderCode for SurfaceShader {
    /// Bound texture names and handles do not affect the generated code and
    /// are left out.
    fn compute_hash(&self) -> u64 {
        let params: Vec<_> = self
            .params
            .iter()
            .map(|p| {
                let coords: Vec<&str> = p.sampler_coords.iter().map(|s| interner::resolve(*s)).collect();
                (interner::resolve(p.name), interner::resolve(p.data_type), p.kind, coords)
            })
            .collect();
        let layout: Vec<_> = self
            .shader_data
            .iter()
            .flat_map(|range| range.resources())
            .map(|(name, res)| (interner::resolve(*name), res.type_str(), res.offset, res.array_size))
            .collect();
        fx_hash_key(&(&self.sources, params, layout))
    }

    fn source(&self, key: SourceKey) -> Cow<'_, str> {
        Cow::Borrowed(self.sources.get(key))
    }

    fn params(&self) -> &[ShaderParam] {
        &self.params
    }

    fn textures(&self) -> &[TextureDescriptor] {
        &self.textures
    }

    fn shader_data(&self) -> Option<&Arc<BufferArrayRange>> {
        self.shader_data.as_ref()
    }

    fn is_surface(&self) -> bool {
        true
    }
}

// ─── Mixin Shader ────────────────────────────────────────────────────────────

/// Prepends `mixin` to every stage source of a wrapped provider.
#[derive(Debug, Clone)]
pub struct MixinShader {
    mixin: String,
    inner: Arc<dyn ShaderCode>,
}

impl MixinShader {
    #[must_use]
    pub fn new(mixin: impl Into<String>, inner: Arc<dyn ShaderCode>) -> Self {
        Self {
            mixin: mixin.into(),
            inner,
        }
    }
}

impl ShaderCode for MixinShader {
    fn compute_hash(&self) -> u64 {
        hash_combine(fx_hash_key(&self.mixin), self.inner.compute_hash())
    }

    fn source(&self, key: SourceKey) -> Cow<'_, str> {
        match key {
            SourceKey::Common => self.inner.source(key),
            SourceKey::Stage(_) => {
                let inner = self.inner.source(key);
                if inner.is_empty() {
                    return inner;
                }
                Cow::Owned(format!("{}{}", self.mixin, inner))
            }
        }
    }

    fn params(&self) -> &[ShaderParam] {
        self.inner.params()
    }

    fn textures(&self) -> &[TextureDescriptor] {
        self.inner.textures()
    }

    fn shader_data(&self) -> Option<&Arc<BufferArrayRange>> {
        self.inner.shader_data()
    }

    fn is_surface(&self) -> bool {
        self.inner.is_surface()
    }
}
