//! Database layer: SQLite connection handling, schema, migrations, and the
//! per-entity stores (tags, fields, entries) that sit directly on top of the
//! schema.
//!
//! Mirrors the donor's layout (`examples/lacodda-kasl/src/db/mod.rs`) of one
//! file per storage concern under `db/`, grouped behind this module rather
//! than exposed loose at the crate root.

/// Low-level connection construction (open file-backed or in-memory,
/// pragma setup).
pub mod db;

/// Versioned schema & data patch runner.
pub mod migrations;

/// Declarative schema (DDL) and default seed data.
pub mod schema;

/// Tag graph store: tags, aliases, parent links, color groups, namespaces.
pub mod tags;

/// Field type registry and per-entry field store.
pub mod fields;

/// Entry store: creation, removal, lookup, path updates.
pub mod entries;
