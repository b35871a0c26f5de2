//! Low-level connection construction.
//!
//! Mirrors the donor's `Db::new` / `Db::new_without_migrations` split
//! (`examples/lacodda-kasl/src/db/db.rs`): open a connection, apply pragma
//! configuration, optionally skip migrations for tooling that needs to
//! inspect pre-migration state. Schema creation and migration orchestration
//! themselves live in `library::Library::open_library`, since that's where
//! the version-gate and backup policy (spec §4.2) belong.

use rusqlite::Connection;
use std::path::Path;

/// Opens a file-backed connection with foreign keys enabled. Each call opens
/// a fresh connection rather than sharing one across threads, matching the
/// "fresh connection per read" strategy spec §5 requires for file-backed
/// mode so idle readers don't hold the file lock.
pub fn open_file_backed(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    Ok(conn)
}

/// Opens the shared, single-threaded in-memory connection used by test
/// libraries and `":memory:"` mode (spec §5).
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    Ok(conn)
}
