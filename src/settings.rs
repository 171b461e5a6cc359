//! Code Generator Settings
//!
//! Host-tunable knobs that are not capabilities of the device. Loaded from
//! JSON or built in code; every field has a default.

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// How the program cache treats a hash hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// A matching 64-bit key is taken as proof of identical content.
    #[default]
    TrustHash,
    /// On a hit, regenerate the sources and compare their 128-bit digest with
    /// the cached program. A mismatch compiles a private, uncached program.
    VerifySource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenSettings {
    /// First texture unit handed out by the binding allocator. Units below
    /// this value belong to the host.
    pub reserved_texture_units: u32,
    /// Value of the `SHADER_API` define in every generated preamble.
    pub shader_api_version: u32,
    pub collision_policy: CollisionPolicy,
    /// Log every generated stage at debug level.
    pub dump_generated_source: bool,
    /// Emit `MAT4` as `dmat4` instead of `mat4`.
    pub double_matrices: bool,
}

impl Default for CodegenSettings {
    fn default() -> Self {
        Self {
            reserved_texture_units: 5,
            shader_api_version: 2,
            collision_policy: CollisionPolicy::TrustHash,
            dump_generated_source: false,
            double_matrices: false,
        }
    }
}

impl CodegenSettings {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
