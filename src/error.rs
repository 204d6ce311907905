//! Error types shared by the hook, mapping table and profile store.

use crate::mapping::Category;

/// Errors surfaced to the immediate caller of a core operation.
///
/// Nothing on the per-event path returns this type; a failed lookup is the
/// ordinary "no mapping" outcome and synthesis is best-effort.
#[derive(Debug, thiserror::Error)]
pub enum WarKeyError {
    #[error("failed to install keyboard hook: {0}")]
    HookInstallFailed(String),
    #[error("invalid mapping entry ({category} #{position}): {reason}")]
    InvalidMappingEntry {
        category: Category,
        position: u32,
        reason: &'static str,
    },
    #[error("invalid configuration snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
    #[error("profile already exists: {0}")]
    ProfileExists(String),
    #[error("profile cannot be removed: {0}")]
    ProtectedProfile(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, WarKeyError>;
