//! Error types for real library loading

/// Error type for entry point resolution
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The system directory could not be queried
    #[error("System directory unavailable")]
    SystemDirectory,

    /// A real graphics library failed to load
    #[error("Failed to load {module}: {reason}")]
    Library { module: String, reason: String },

    /// A required export is missing from its module
    #[error("Export not found: {module}!{export}")]
    MissingExport { module: &'static str, export: String },

    /// Engine already initialized
    #[error("Engine already initialized")]
    AlreadyInitialized,
}
