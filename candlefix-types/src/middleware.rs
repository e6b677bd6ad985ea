//! Introspection types for repository middleware stacks.

use serde::{Deserialize, Serialize};

/// A single middleware layer with a name and free-form JSON configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareLayer {
    /// Layer name (e.g., "`RetryingRepository`", "`TimeoutRepository`").
    pub name: String,
    /// Configuration snapshot; concrete layers document their schema.
    pub config: serde_json::Value,
}

impl MiddlewareLayer {
    /// Convenience constructor.
    #[must_use]
    pub fn new<N: Into<String>>(name: N, config: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

/// Ordered description of the wrappers around a raw repository.
///
/// `layers[0]` is the outermost layer; the last element is the innermost one
/// (the raw repository itself when exported by a builder).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareStack {
    /// Ordered list of layers, outermost first.
    pub layers: Vec<MiddlewareLayer>,
}

impl Default for MiddlewareStack {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareStack {
    /// Create an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Push a layer at the outermost position.
    pub fn push_outer(&mut self, layer: MiddlewareLayer) {
        self.layers.insert(0, layer);
    }

    /// Append a layer as the innermost one.
    pub fn push_inner(&mut self, layer: MiddlewareLayer) {
        self.layers.push(layer);
    }
}
