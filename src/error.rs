//! Error types for the shared snapshot cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the shared snapshot cache
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid argument, raised while sizing the region pools
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No candidate data path can hold the cache file
    #[error("Could not find a directory with adequate free space for cache file of size {required}")]
    NoAdequateSpace { required: u64 },

    /// Positional access outside of a shared page
    #[error("Access [{position}, {position}+{length}) outside of region of size {region_size}")]
    OutOfBounds {
        position: u64,
        length: u64,
        region_size: u64,
    },

    /// Shared page index outside of the configured pools
    #[error("Shared page {page} out of range, cache has {pages} pages")]
    PageOutOfRange { page: usize, pages: usize },

    /// The shared cache file has already been released
    #[error("Shared cache file already closed")]
    AlreadyClosed,

    // =========================================================================
    // Settings Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML settings could not be parsed
    #[error("Failed to parse settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Returns true for failures of the underlying storage
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_) | Error::NoAdequateSpace { .. })
    }
}
