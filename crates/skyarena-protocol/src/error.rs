//! Error types for the shared vocabulary.

/// Errors raised while building identity types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The name is empty or only whitespace.
    #[error("name must not be empty")]
    EmptyName,

    /// Arena names double as file stems, so path syntax is rejected.
    #[error("invalid arena name {0:?}: must not contain path separators or start with '.'")]
    InvalidArenaName(String),

    /// World names from arena documents become directory names, so
    /// anything but a single plain component is rejected.
    #[error("invalid world name {0:?}: must be a single folder name")]
    InvalidWorldName(String),
}
