//! Options for parsing a batch request body.

/// Batch parser options.
///
/// # Configuration Options
///
/// | Option | Default | Description |
/// |--------|---------|-------------|
/// | `strict` | `true` | Require blank lines after header blocks and reject malformed header lines |
/// | `raw_base_uri` | `""` | Service root that request targets are resolved against |
/// | `raw_service_resolution_uri` | `""` | Copied onto every parsed request |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub strict: bool,
    pub raw_base_uri: String,
    pub raw_service_resolution_uri: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            strict: true,
            raw_base_uri: String::new(),
            raw_service_resolution_uri: String::new(),
        }
    }
}

impl BatchOptions {
    /// Create a new options builder.
    pub fn builder() -> BatchOptionsBuilder {
        BatchOptionsBuilder::default()
    }
}

/// Builder for [`BatchOptions`].
#[derive(Debug, Default)]
pub struct BatchOptionsBuilder {
    options: BatchOptions,
}

impl BatchOptionsBuilder {
    /// Enable or disable strict grammar validation.
    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    /// Set the service root.
    pub fn raw_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.options.raw_base_uri = uri.into();
        self
    }

    /// Set the service resolution URI.
    pub fn raw_service_resolution_uri(mut self, uri: impl Into<String>) -> Self {
        self.options.raw_service_resolution_uri = uri.into();
        self
    }

    /// Build the options.
    pub fn build(self) -> BatchOptions {
        self.options
    }
}
