//! # tagstudio-core
//!
//! The embedded library engine behind a local, file-centric media cataloging
//! system: a versioned SQLite schema, a tag graph with inheritance, a typed
//! per-entry field system, a small boolean query language with a SQL
//! compiler, and a facade that ties them together into one object callers
//! open, search, and mutate through.
//!
//! Out of scope (see `spec.md` §1 Non-goals): thumbnail/preview rendering,
//! the GUI layer, network/server mode, full-text content indexing, and
//! multi-writer concurrency.

pub mod browsing;
pub mod db;
pub mod error;
pub mod library;
pub mod logging;
pub mod media_types;
pub mod path;
pub mod query;
pub mod storage;

pub use browsing::{BrowsingState, SortingMode};
pub use error::{LibraryError, Result};
pub use library::{Library, OpenOutcome};
