//! GLSL Template Environment
//!
//! Fixed GLSL text (the preamble, the drawing-coordinate plumbing and the
//! helper chunks) lives in `.glsl` files under `src/codegen/glsl` and is
//! rendered through minijinja. Everything that depends on the binding plan
//! is generated in Rust and passed in as plain strings.
//!
//! Template syntax:
//!
//! | Construct          | Delimiter        |
//! |--------------------|------------------|
//! | block              | `{$ ... $}`      |
//! | variable           | `{{ ... }}`      |
//! | line statement     | `$$ if ...`      |
//!
//! Templates are named by their path under `glsl/` without the extension.
//! `{$ include "x" $}` resolves to `chunks/x`. Every context is a typed
//! struct, so an undefined variable is a template bug and fails the render.

use std::sync::LazyLock;

use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, syntax::SyntaxConfig};
use rust_embed::RustEmbed;
use serde::Serialize;

use crate::caps::{CapabilityFlags, RenderCaps};
use crate::errors::Result;
use crate::settings::CodegenSettings;

#[derive(RustEmbed)]
#[folder = "src/codegen/glsl"]
struct GlslChunks;

static GLSL_TEMPLATES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_syntax(
        SyntaxConfig::builder()
            .block_delimiters("{$", "$}")
            .line_statement_prefix("$$")
            .build()
            .expect("GLSL template delimiters are valid"),
    );
    // generated GLSL is line oriented; statements must not leave blank lines
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_keep_trailing_newline(true);
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_loader(load_chunk);
    env.set_path_join_callback(|name, _parent| format!("chunks/{name}").into());
    env
});

fn load_chunk(name: &str) -> std::result::Result<Option<String>, Error> {
    let Some(file) = GlslChunks::get(&format!("{name}.glsl")) else {
        return Ok(None);
    };
    String::from_utf8(file.data.into_owned()).map(Some).map_err(|e| {
        Error::new(ErrorKind::TemplateNotFound, format!("GLSL chunk {name} is not UTF-8: {e}"))
    })
}

fn render<S: Serialize>(name: &str, ctx: S) -> Result<String> {
    Ok(GLSL_TEMPLATES.get_template(name)?.render(ctx)?)
}

// ─── Contexts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PreambleContext {
    glsl_version: u32,
    bindless_buffer: bool,
    bindless_texture: bool,
    explicit_uniform_location: bool,
    shading_language_420pack: bool,
    supports_double: bool,
    shader_api_version: u32,
    mat4_type: &'static str,
}

/// Inputs of one section of `drawing_coord.glsl`.
#[derive(Debug, Default, Serialize)]
pub struct DrawingCoordContext<'a> {
    /// `common`, `vertex`, `tess_control`, `tess_eval`, `geometry` or `fragment`.
    pub stage: &'a str,
    /// Declarations of the drawing-coordinate inputs (vertex stage only).
    pub declarations: &'a str,
    /// Accessor of the culled instance indices (vertex stage only).
    pub culled_accessor: &'a str,
    pub has_instance_indices: bool,
    pub has_drawing_coord_i: bool,
    pub culling_pass: bool,
}

/// Renders the common preamble: version, extensions, compatibility shims and
/// packed-type helpers.
pub fn render_preamble(caps: &RenderCaps, settings: &CodegenSettings) -> Result<String> {
    let ctx = PreambleContext {
        glsl_version: caps.glsl_version,
        bindless_buffer: caps.has(CapabilityFlags::BINDLESS_BUFFER),
        bindless_texture: caps.has(CapabilityFlags::BINDLESS_TEXTURE),
        explicit_uniform_location: caps.has(CapabilityFlags::EXPLICIT_UNIFORM_LOCATION),
        shading_language_420pack: caps.has(CapabilityFlags::SHADING_LANGUAGE_420PACK),
        supports_double: caps.supports_double(),
        shader_api_version: settings.shader_api_version,
        mat4_type: if settings.double_matrices { "dmat4" } else { "mat4" },
    };
    render("preamble", ctx)
}

pub fn render_drawing_coord(ctx: &DrawingCoordContext<'_>) -> Result<String> {
    render("drawing_coord", ctx)
}

/// Ptex packing decode and `PtexTextureLookup`.
pub fn render_ptex_helpers() -> Result<String> {
    render("chunks/ptex_texture", ())
}
