//! Coding-error sink.
//!
//! Internal invariant violations never abort generation. They are logged at
//! error level under [`CODING_ERROR_TARGET`] and recorded, so that callers
//! and tests can inspect how many units of work were skipped.

use std::fmt;

/// Log target used for every coding error.
pub const CODING_ERROR_TARGET: &str = "shadergen::coding_error";

/// Accumulates coding errors raised during one unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodingErrors {
    messages: Vec<String>,
}

impl CodingErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs and records a coding error.
    pub fn report(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!(target: CODING_ERROR_TARGET, "{message}");
        self.messages.push(message);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    /// Moves all entries of `other` into `self` without logging them again.
    pub fn append(&mut self, other: &mut CodingErrors) {
        self.messages.append(&mut other.messages);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl fmt::Display for CodingErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for message in &self.messages {
            writeln!(f, "{message}")?;
        }
        Ok(())
    }
}
