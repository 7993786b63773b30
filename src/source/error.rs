//! Source error types
//!
//! Error types for upstream resolution and decode-process control.

/// Error type for source operations
#[derive(Debug)]
pub enum SourceError {
    /// The upstream address could not be resolved
    Resolve(String),
    /// The decode process could not be spawned
    Spawn(std::io::Error),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Resolve(reason) => write!(f, "source resolution failed: {}", reason),
            SourceError::Spawn(e) => write!(f, "failed to spawn decode process: {}", e),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Resolve(_) => None,
            SourceError::Spawn(e) => Some(e),
        }
    }
}
