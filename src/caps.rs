//! Render Capability Snapshot
//!
//! [`RenderCaps`] is a plain immutable description of what the current
//! graphics context supports. It is captured once per frame (or per
//! resolution pass) by the host and passed explicitly to the binder and the
//! code generator. Nothing in this crate probes the device itself.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

bitflags! {
    /// Boolean feature flags of the graphics context.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CapabilityFlags: u32 {
        /// Shader storage buffer objects are available.
        const STORAGE_BUFFER            = 1 << 0;
        /// Buffers can be addressed through resident GPU pointers.
        const BINDLESS_BUFFER           = 1 << 1;
        /// Textures can be addressed through resident 64-bit handles.
        const BINDLESS_TEXTURE          = 1 << 2;
        /// `layout (location = N)` is allowed on uniforms.
        const EXPLICIT_UNIFORM_LOCATION = 1 << 3;
        /// `layout (binding = N)` is allowed on blocks and samplers.
        const SHADING_LANGUAGE_420PACK  = 1 << 4;
    }
}

/// Read-only capability snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderCaps {
    /// Shading language version emitted in the `#version` line.
    pub glsl_version: u32,
    pub flags: CapabilityFlags,
    pub max_uniform_block_size: u32,
    pub max_storage_block_size: u32,
    pub max_texture_units: u32,
}

impl Default for RenderCaps {
    fn default() -> Self {
        Self {
            glsl_version: 450,
            flags: CapabilityFlags::empty(),
            max_uniform_block_size: 64 * 1024,
            max_storage_block_size: 128 * 1024 * 1024,
            max_texture_units: 32,
        }
    }
}

impl RenderCaps {
    #[must_use]
    pub fn new(glsl_version: u32, flags: CapabilityFlags) -> Self {
        Self {
            glsl_version,
            flags,
            ..Self::default()
        }
    }

    /// Parses a capability snapshot from JSON. Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    #[inline]
    #[must_use]
    pub fn with_flags(mut self, flags: CapabilityFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    #[must_use]
    pub fn has(&self, flag: CapabilityFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Double precision types exist natively (GLSL 4.00 and later).
    #[inline]
    #[must_use]
    pub fn supports_double(&self) -> bool {
        self.glsl_version >= 400
    }

    /// Functions may return opaque sampler types (GLSL 4.30 and later).
    #[inline]
    #[must_use]
    pub fn supports_sampler_return(&self) -> bool {
        self.glsl_version >= 430
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_features() {
        let caps = RenderCaps::default();
        assert!(!caps.has(CapabilityFlags::STORAGE_BUFFER));
        assert!(caps.supports_double());
    }

    #[test]
    fn test_from_json() {
        let caps = RenderCaps::from_json(
            r#"{ "glsl_version": 330, "flags": "STORAGE_BUFFER | BINDLESS_TEXTURE" }"#,
        )
        .unwrap();

        assert_eq!(caps.glsl_version, 330);
        assert!(caps.has(CapabilityFlags::STORAGE_BUFFER));
        assert!(caps.has(CapabilityFlags::BINDLESS_TEXTURE));
        assert!(!caps.has(CapabilityFlags::BINDLESS_BUFFER));
        assert!(!caps.supports_double());
        assert_eq!(caps.max_texture_units, 32);
    }
}
