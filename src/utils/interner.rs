//! Global String Interner
//!
//! Channel names and GLSL type names are interned once and handled as
//! integer [`Symbol`]s afterwards. Comparisons and map lookups become integer
//! operations, while hashing of generated code always goes through the
//! resolved text so the resulting keys do not depend on interning order.

use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

/// Global interner instance.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Compact integer identifier for an interned string.
pub type Symbol = Spur;

/// Interns a string, returning its [`Symbol`].
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// Looks up the [`Symbol`] of an already interned string.
///
/// Does not allocate; returns `None` for strings that were never interned.
#[inline]
pub fn get(s: &str) -> Option<Symbol> {
    INTERNER.get(s)
}

/// Resolves a [`Symbol`] back to its text.
#[inline]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}

/// Pre-interns the channel names every resolution pass touches.
pub fn preload_builtin_names() {
    let builtin = [
        "",
        "int",
        "ivec2",
        "ivec3",
        "ivec4",
        "float",
        "vec2",
        "vec3",
        "vec4",
        "mat4",
        "constantPrimvars",
        "surfaceShaderParams",
        "drawingCoord0",
        "drawingCoord1",
        "drawingCoordI",
        "instanceIndices",
        "culledInstanceIndices",
        "indices",
        "primitiveParam",
        "drawDispatch",
        "isamplerBuffer",
    ];

    for name in builtin {
        intern(name);
    }
}
