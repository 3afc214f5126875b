//! Configuration for the serializer.

/// Controls how strictly the serializer treats values it cannot encode
/// faithfully.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SerializerConfig {
    /// Reject anonymous functions instead of moving them to the side table.
    pub strict_functions: bool,

    /// Fail on instances without a module name instead of inlining their state.
    pub critical: bool,
}

impl SerializerConfig {
    /// Creates a configuration that fails on anything it cannot revive.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_functions: true,
            critical: true,
        }
    }

    /// Builder method to set function strictness.
    #[must_use]
    pub fn with_strict_functions(mut self, strict: bool) -> Self {
        self.strict_functions = strict;
        self
    }

    /// Builder method to set critical mode.
    #[must_use]
    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }
}
