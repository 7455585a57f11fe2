//! Basic type definitions for the chat relay
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: UUID-based unique connection identifier
//! - `DisplayName`: a client's name, never blank

use rand::seq::SliceRandom;
use uuid::Uuid;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe client identification.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

const NAME_HEADS: &[&str] = &[
    "Tooth", "Moss", "Thunder", "Pickle", "Fog", "Copper", "Ember", "Velvet", "Frost", "Puddle",
    "Marble", "Nettle", "Sprocket", "Bramble", "Wobble", "Cinder",
];

const NAME_TAILS: &[&str] = &[
    "clover", "beak", "whistle", "toe", "fang", "sock", "feather", "gazer", "spoon", "wing",
    "bottom", "nose", "crest", "paw", "loaf", "snout",
];

/// A client's display name
///
/// Guaranteed non-blank: construction either keeps a submitted name as-is
/// or falls back to a generated placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    /// Generate a random placeholder name such as "Mossbeak"
    pub fn placeholder() -> Self {
        let mut rng = rand::thread_rng();
        let head = NAME_HEADS.choose(&mut rng).copied().unwrap_or("Anon");
        let tail = NAME_TAILS.choose(&mut rng).copied().unwrap_or("ymous");
        Self(format!("{head}{tail}"))
    }

    /// Parse a submitted name
    ///
    /// Returns None if the input is empty or whitespace only; any other
    /// input is kept verbatim, surrounding spaces included.
    pub fn parse(input: &str) -> Option<Self> {
        if input.trim().is_empty() {
            None
        } else {
            Some(Self(input.to_string()))
        }
    }

    /// Resolve a submitted name, keeping `fallback` when the submission is blank
    pub fn resolve(input: &str, fallback: DisplayName) -> Self {
        Self::parse(input).unwrap_or(fallback)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for DisplayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
