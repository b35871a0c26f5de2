//! Versioned schema & data patch runner.
//!
//! Directly adapted from the donor's `MigrationManager`
//! (`examples/lacodda-kasl/src/db/migrations.rs`): an ordered list of
//! `Migration { version, name, up }` entries, each applied inside one
//! transaction, tracked against a `versions` bookkeeping row. The patch list
//! itself and its semantics come from spec §4.2 / §9 rather than the
//! donor's own migrations (task/workday tables), which have no counterpart
//! here.

use crate::db::tags::{TAG_ARCHIVED, TAG_FAVORITE};
use rusqlite::{Connection, Transaction};
use tracing::{debug, info, warn};

pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub up: fn(&Transaction) -> rusqlite::Result<()>,
}

fn column_exists(tx: &Transaction, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = tx.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// DB8 schema patch: adds `color_border` to `tag_colors` if missing.
fn migrate_db8_schema(tx: &Transaction) -> rusqlite::Result<()> {
    if !column_exists(tx, "tag_colors", "color_border")? {
        tx.execute("ALTER TABLE tag_colors ADD COLUMN color_border INTEGER NOT NULL DEFAULT 0", [])?;
    }
    Ok(())
}

/// DB9 schema patch: adds `filename` to `entries` if missing.
fn migrate_db9_schema(tx: &Transaction) -> rusqlite::Result<()> {
    if !column_exists(tx, "entries", "filename")? {
        tx.execute("ALTER TABLE entries ADD COLUMN filename TEXT NOT NULL DEFAULT ''", [])?;
    }
    Ok(())
}

/// DB6 data patch: repairs the Description value-type key and nulls out any
/// dangling `disambiguation_id` left over from a deleted tag.
fn migrate_db6_data(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute(
        "UPDATE value_type SET kind = 'text_box' WHERE key = 'description' AND kind != 'text_box'",
        [],
    )?;
    tx.execute(
        "UPDATE tags SET disambiguation_id = NULL
         WHERE disambiguation_id IS NOT NULL
           AND disambiguation_id NOT IN (SELECT id FROM tags)",
        [],
    )?;
    Ok(())
}

/// DB8 data patch: idempotently ensures neon swatches carry
/// `color_border = 1`, re-running the same UPDATE every time is harmless.
fn migrate_db8_data(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute("UPDATE tag_colors SET color_border = 1 WHERE namespace = 'tagstudio-neon'", [])?;
    Ok(())
}

/// DB9 data patch: populates `filename` from the trailing path segment for
/// every entry.
fn migrate_db9_data(tx: &Transaction) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare("SELECT id, path FROM entries")?;
    let rows: Vec<(i64, String)> = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?.collect::<rusqlite::Result<_>>()?;
    drop(stmt);
    for (id, path) in rows {
        let filename = path.rsplit('/').next().unwrap_or(&path).to_string();
        tx.execute("UPDATE entries SET filename = ?1 WHERE id = ?2", rusqlite::params![filename, id])?;
    }
    Ok(())
}

/// DB100 data patch: swaps the historically reversed `parent_id`/`child_id`
/// pair in `tag_parents` (spec §9 "Historical column naming"). Goes through
/// a staging table rather than an in-place `UPDATE` because the composite
/// primary key would collide mid-swap whenever both `(a, b)` and `(b, a)`
/// already exist in the table.
fn migrate_db100_data(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute("CREATE TEMP TABLE tag_parents_swap AS SELECT child_id AS parent_id, parent_id AS child_id FROM tag_parents", [])?;
    tx.execute("DELETE FROM tag_parents", [])?;
    tx.execute(
        "INSERT OR IGNORE INTO tag_parents (parent_id, child_id) SELECT DISTINCT parent_id, child_id FROM tag_parents_swap",
        [],
    )?;
    tx.execute("DROP TABLE tag_parents_swap", [])?;
    Ok(())
}

fn reserved_tags_sanity(tx: &Transaction) -> rusqlite::Result<()> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM tags WHERE id IN (?1, ?2)",
        rusqlite::params![TAG_ARCHIVED, TAG_FAVORITE],
        |r| r.get(0),
    )?;
    if count < 2 {
        warn!("reserved tags missing after migration; library may predate reserved-tag seeding");
    }
    Ok(())
}

pub fn register_migrations() -> Vec<Migration> {
    vec![
        Migration { version: 6, name: "db6_description_and_disambiguation_repair", up: migrate_db6_data },
        Migration { version: 8, name: "db8_color_border_column", up: migrate_db8_schema },
        Migration { version: 8, name: "db8_default_color_data", up: migrate_db8_data },
        Migration { version: 9, name: "db9_filename_column", up: migrate_db9_schema },
        Migration { version: 9, name: "db9_filename_population", up: migrate_db9_data },
        Migration { version: 100, name: "db100_parent_child_repair", up: migrate_db100_data },
    ]
}

pub fn get_current_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("SELECT value FROM versions WHERE key = 'current'", [], |r| r.get(0))
}

pub fn set_current_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO versions (key, value) VALUES ('current', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![version],
    )?;
    conn.execute(
        "INSERT INTO preferences (key, value) VALUES ('DB_VERSION', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}

/// Applies every pending migration (by version, in registration order) in
/// one transaction, then advances `versions(current)` to `DB_VERSION`.
pub fn run_pending(conn: &mut Connection, loaded_version: u32) -> rusqlite::Result<()> {
    let migrations = register_migrations();
    let pending: Vec<&Migration> = migrations.iter().filter(|m| m.version > loaded_version).collect();

    if pending.is_empty() {
        debug!("no pending migrations (loaded version {loaded_version})");
        return Ok(());
    }
    info!(count = pending.len(), "applying pending migrations");

    let tx = conn.transaction()?;
    for m in &pending {
        debug!(version = m.version, name = m.name, "running migration");
        (m.up)(&tx)?;
    }
    reserved_tags_sanity(&tx)?;
    tx.commit()?;

    set_current_version(conn, super::schema::DB_VERSION)?;
    info!("all pending migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    #[test]
    fn run_pending_is_noop_when_already_current() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_and_seed(&conn).unwrap();
        let mut conn = conn;
        run_pending(&mut conn, schema::DB_VERSION).unwrap();
        assert_eq!(get_current_version(&conn).unwrap(), schema::DB_VERSION);
    }

    #[test]
    fn db100_swap_is_idempotent_and_collision_free() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE tags (id INTEGER PRIMARY KEY);
             CREATE TABLE tag_parents (parent_id INTEGER, child_id INTEGER, PRIMARY KEY(parent_id, child_id));
             INSERT INTO tags (id) VALUES (1), (2), (3);
             INSERT INTO tag_parents (parent_id, child_id) VALUES (1, 2), (2, 1), (1, 3);",
        )
        .unwrap();
        let tx = conn.unchecked_transaction().unwrap();
        migrate_db100_data(&tx).unwrap();
        tx.commit().unwrap();
        let mut stmt = conn.prepare("SELECT parent_id, child_id FROM tag_parents ORDER BY parent_id, child_id").unwrap();
        let rows: Vec<(i64, i64)> = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?))).unwrap().collect::<rusqlite::Result<_>>().unwrap();
        assert!(rows.contains(&(2, 1)));
        assert!(rows.contains(&(1, 2)));
        assert!(rows.contains(&(3, 1)));
    }
}
