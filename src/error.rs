//! Structured error types for the library engine.
//!
//! Callers of a library crate need to match on error kind, so mutation
//! contracts that can fail for a specific documented reason use a named
//! variant here instead of an opaque `anyhow::Error`. Internal plumbing that
//! has no documented recovery path (filesystem glue, ad-hoc SQL failures not
//! covered by a contract) still propagates through the `Sqlite`/`Io`
//! transparent variants.

use std::path::PathBuf;
use thiserror::Error;

/// All error kinds a consumer of this crate may need to distinguish.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// A caller attempted to create, delete, or reference a namespace/slug
    /// beginning with the reserved `tagstudio` prefix.
    #[error("'{slug}' is a reserved namespace")]
    ReservedNamespace { slug: String },

    /// A unique or foreign-key constraint failed during insert/update.
    #[error("integrity constraint violated: {0}")]
    Integrity(String),

    /// The database's stored major `DB_VERSION` is newer than this program's.
    #[error("library was created by a newer version (found major {found_major}, this build supports up to {expected_major})")]
    VersionMismatch { found_major: u32, expected_major: u32 },

    /// Only a legacy `ts_library.json` was found at the target library root.
    #[error("legacy JSON library found at {library_path:?}; call migrate_json_to_sqlite")]
    JsonMigrationRequired { library_path: PathBuf },

    /// The query string could not be parsed.
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Reached for query constructs or constraint types with no defined
    /// compilation (e.g. properties, which are reserved for future use).
    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;

/// True if the underlying sqlite error is a constraint violation (unique or
/// foreign key), i.e. the kind of failure that contracts in §4/§7 ask callers
/// to translate into `Ok(None)`/`Ok(false)` rather than a propagated error.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::ConstraintViolation,
                ..
            },
            _,
        )
    )
}
