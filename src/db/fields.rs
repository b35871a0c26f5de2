//! Field type registry and per-entry field store.
//!
//! The registry (`value_type`) is seeded once by `db::schema::create_and_seed`
//! from the fixed catalog in `db::schema::DEFAULT_VALUE_TYPES`; this module
//! only reads it back and manages the three per-kind field tables it backs
//! (`text_fields`, `datetime_fields`, `boolean_fields`). Grounded on the
//! donor's `Tags` CRUD shape (`examples/lacodda-kasl/src/db/tags.rs`) and on
//! `original_source/.../alchemy/library.py`'s `add_field_to_entry`,
//! `update_entry_field`, `remove_entry_field`, `mirror_entry_fields`,
//! `merge_entries`.

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    TextLine,
    TextBox,
    DateTime,
    Boolean,
}

impl ValueKind {
    fn as_str(self) -> &'static str {
        match self {
            ValueKind::TextLine => "text_line",
            ValueKind::TextBox => "text_box",
            ValueKind::DateTime => "datetime",
            ValueKind::Boolean => "boolean",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "text_line" => Some(ValueKind::TextLine),
            "text_box" => Some(ValueKind::TextBox),
            "datetime" => Some(ValueKind::DateTime),
            "boolean" => Some(ValueKind::Boolean),
            _ => None,
        }
    }

    fn table(self) -> &'static str {
        match self {
            ValueKind::TextLine | ValueKind::TextBox => "text_fields",
            ValueKind::DateTime => "datetime_fields",
            ValueKind::Boolean => "boolean_fields",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueType {
    pub key: String,
    pub name: String,
    pub kind: ValueKind,
    pub is_default: bool,
    pub position: i64,
}

/// A field value in its kind-appropriate representation. Text fields default
/// to an empty string on insert; datetime fields default to `None` (spec
/// §4.4).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    DateTime(Option<String>),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryField {
    pub id: i64,
    pub type_key: String,
    pub entry_id: i64,
    pub value: FieldValue,
    pub position: i64,
}

fn row_to_value_type(row: &rusqlite::Row) -> rusqlite::Result<ValueType> {
    let kind_str: String = row.get("kind")?;
    Ok(ValueType {
        key: row.get("key")?,
        name: row.get("name")?,
        kind: ValueKind::from_str(&kind_str).unwrap_or(ValueKind::TextLine),
        is_default: row.get::<_, i64>("is_default")? != 0,
        position: row.get("position")?,
    })
}

pub fn get_value_types(conn: &Connection) -> Result<Vec<ValueType>> {
    let mut stmt = conn.prepare("SELECT key, name, kind, is_default, position FROM value_type ORDER BY position")?;
    let types = stmt.query_map([], row_to_value_type)?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(types)
}

pub fn get_value_type(conn: &Connection, key: &str) -> Result<Option<ValueType>> {
    conn.query_row(
        "SELECT key, name, kind, is_default, position FROM value_type WHERE key = ?1",
        params![key],
        row_to_value_type,
    )
    .optional()
    .map_err(Into::into)
}

/// Inserts a row in the kind-appropriate field table, defaulting the value
/// per spec §4.4, then renumbers positions for `(entry_id, type_key)` to
/// `0..n-1`.
pub fn add_field_to_entry(conn: &Connection, entry_id: i64, type_key: &str, value: Option<FieldValue>) -> Result<i64> {
    let vt = get_value_type(conn, type_key)?
        .ok_or_else(|| crate::error::LibraryError::Integrity(format!("unknown field type '{type_key}'")))?;

    let id = match vt.kind {
        ValueKind::TextLine | ValueKind::TextBox => {
            let text = match value {
                Some(FieldValue::Text(t)) => t,
                _ => String::new(),
            };
            conn.execute(
                "INSERT INTO text_fields (type_key, entry_id, value, position) VALUES (?1, ?2, ?3, 0)",
                params![type_key, entry_id, text],
            )?;
            conn.last_insert_rowid()
        }
        ValueKind::DateTime => {
            let dt = match value {
                Some(FieldValue::DateTime(d)) => d,
                _ => None,
            };
            conn.execute(
                "INSERT INTO datetime_fields (type_key, entry_id, value, position) VALUES (?1, ?2, ?3, 0)",
                params![type_key, entry_id, dt],
            )?;
            conn.last_insert_rowid()
        }
        ValueKind::Boolean => {
            let b = matches!(value, Some(FieldValue::Boolean(true)));
            conn.execute(
                "INSERT INTO boolean_fields (type_key, entry_id, value, position) VALUES (?1, ?2, ?3, 0)",
                params![type_key, entry_id, b as i64],
            )?;
            conn.last_insert_rowid()
        }
    };

    renumber_positions(conn, vt.kind, entry_id, type_key)?;
    Ok(id)
}

/// Renumbers every row of `(entry_id, type_key)` in the kind's table to
/// `0..n-1`, ordered by current position then id (stable under ties).
fn renumber_positions(conn: &Connection, kind: ValueKind, entry_id: i64, type_key: &str) -> Result<()> {
    let table = kind.table();
    let mut stmt = conn.prepare(&format!(
        "SELECT id FROM {table} WHERE entry_id = ?1 AND type_key = ?2 ORDER BY position, id"
    ))?;
    let ids: Vec<i64> = stmt.query_map(params![entry_id, type_key], |r| r.get(0))?.collect::<rusqlite::Result<_>>()?;
    drop(stmt);
    for (position, id) in ids.into_iter().enumerate() {
        conn.execute(&format!("UPDATE {table} SET position = ?1 WHERE id = ?2"), params![position as i64, id])?;
    }
    Ok(())
}

/// Updates every field row matching `(type_key, entry_id)` for each id in
/// `entry_ids` to the given content (spec §4.4).
pub fn update_entry_field(conn: &Connection, entry_ids: &[i64], type_key: &str, value: FieldValue) -> Result<()> {
    let vt = get_value_type(conn, type_key)?
        .ok_or_else(|| crate::error::LibraryError::Integrity(format!("unknown field type '{type_key}'")))?;
    let table = vt.kind.table();

    for &entry_id in entry_ids {
        match &value {
            FieldValue::Text(t) => {
                conn.execute(
                    &format!("UPDATE {table} SET value = ?1 WHERE type_key = ?2 AND entry_id = ?3"),
                    params![t, type_key, entry_id],
                )?;
            }
            FieldValue::DateTime(d) => {
                conn.execute(
                    &format!("UPDATE {table} SET value = ?1 WHERE type_key = ?2 AND entry_id = ?3"),
                    params![d, type_key, entry_id],
                )?;
            }
            FieldValue::Boolean(b) => {
                conn.execute(
                    &format!("UPDATE {table} SET value = ?1 WHERE type_key = ?2 AND entry_id = ?3"),
                    params![*b as i64, type_key, entry_id],
                )?;
            }
        }
    }
    Ok(())
}

/// Deletes matching rows. Positions of the survivors are **not**
/// renumbered — a documented gap (spec §9): a later `add_field_to_entry`
/// on the same `(entry, type)` pair will still leave a contiguous sequence,
/// but a hole can persist until then.
pub fn remove_entry_field(conn: &Connection, type_key: &str, entry_ids: &[i64]) -> Result<()> {
    let vt = get_value_type(conn, type_key)?
        .ok_or_else(|| crate::error::LibraryError::Integrity(format!("unknown field type '{type_key}'")))?;
    let table = vt.kind.table();
    for &entry_id in entry_ids {
        conn.execute(
            &format!("DELETE FROM {table} WHERE type_key = ?1 AND entry_id = ?2"),
            params![type_key, entry_id],
        )?;
    }
    Ok(())
}

fn entry_field_type_keys(conn: &Connection, entry_id: i64) -> Result<HashSet<String>> {
    let mut keys = HashSet::new();
    for table in ["text_fields", "datetime_fields", "boolean_fields"] {
        let mut stmt = conn.prepare(&format!("SELECT DISTINCT type_key FROM {table} WHERE entry_id = ?1"))?;
        for key in stmt.query_map(params![entry_id], |r| r.get::<_, String>(0))? {
            keys.insert(key?);
        }
    }
    Ok(keys)
}

/// Unions the field-type set of the first entry with every other entry's,
/// then for every entry missing a type present elsewhere in the group,
/// attaches that type with its default value (spec §4.4). Checks each
/// entry's own field set independently rather than assuming uniformity
/// across the whole group (`SPEC_FULL.md` §12).
pub fn mirror_entry_fields(conn: &Connection, entry_ids: &[i64]) -> Result<()> {
    if entry_ids.len() < 2 {
        return Ok(());
    }
    let mut union: HashSet<String> = HashSet::new();
    for &id in entry_ids {
        union.extend(entry_field_type_keys(conn, id)?);
    }
    for &id in entry_ids {
        let present = entry_field_type_keys(conn, id)?;
        for type_key in union.difference(&present) {
            add_field_to_entry(conn, id, type_key, None)?;
        }
    }
    debug!(entries = entry_ids.len(), types = union.len(), "mirror_entry_fields");
    Ok(())
}

/// Copies every field and tag attachment from `from_id` onto `into_id`,
/// then deletes `from_id` (spec §4.4). Field rows are copied with fresh ids
/// rather than reassigned so `from_id`'s deletion via cascade cannot orphan
/// `into_id`'s copies.
pub fn merge_entries(conn: &Connection, from_id: i64, into_id: i64) -> Result<()> {
    for table in ["text_fields", "datetime_fields", "boolean_fields"] {
        conn.execute(
            &format!("INSERT INTO {table} (type_key, entry_id, value, position) SELECT type_key, ?2, value, position FROM {table} WHERE entry_id = ?1"),
            params![from_id, into_id],
        )?;
    }
    conn.execute(
        "INSERT OR IGNORE INTO tag_entries (tag_id, entry_id) SELECT tag_id, ?2 FROM tag_entries WHERE entry_id = ?1",
        params![from_id, into_id],
    )?;
    conn.execute("DELETE FROM entries WHERE id = ?1", params![from_id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn fresh_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_and_seed(&conn).unwrap();
        conn
    }

    fn make_entry(conn: &Connection, path: &str) -> i64 {
        conn.execute("INSERT INTO folders (id, path, uuid) VALUES (1, '/lib', 'u') ON CONFLICT(id) DO NOTHING", []).unwrap();
        conn.execute(
            "INSERT INTO entries (folder_id, path, filename, suffix) VALUES (1, ?1, ?1, 'txt')",
            params![path],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn add_field_renumbers_to_contiguous_range() {
        let conn = fresh_conn();
        let e = make_entry(&conn, "a.txt");
        add_field_to_entry(&conn, e, "author", Some(FieldValue::Text("a".into()))).unwrap();
        add_field_to_entry(&conn, e, "author", Some(FieldValue::Text("b".into()))).unwrap();
        add_field_to_entry(&conn, e, "author", Some(FieldValue::Text("c".into()))).unwrap();

        let mut stmt = conn.prepare("SELECT position FROM text_fields WHERE entry_id = ?1 AND type_key = 'author' ORDER BY position").unwrap();
        let positions: Vec<i64> = stmt.query_map(params![e], |r| r.get(0)).unwrap().collect::<rusqlite::Result<_>>().unwrap();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn remove_entry_field_leaves_gap() {
        let conn = fresh_conn();
        let e = make_entry(&conn, "a.txt");
        add_field_to_entry(&conn, e, "author", Some(FieldValue::Text("a".into()))).unwrap();
        add_field_to_entry(&conn, e, "author", Some(FieldValue::Text("b".into()))).unwrap();
        remove_entry_field(&conn, "author", &[e]).unwrap();

        let remaining: i64 = conn
            .query_row("SELECT position FROM text_fields WHERE entry_id = ?1 AND type_key = 'author'", params![e], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[test]
    fn mirror_entry_fields_unions_across_entries() {
        let conn = fresh_conn();
        let e1 = make_entry(&conn, "a.txt");
        let e2 = make_entry(&conn, "b.txt");
        add_field_to_entry(&conn, e1, "author", Some(FieldValue::Text("a".into()))).unwrap();
        add_field_to_entry(&conn, e2, "artist", Some(FieldValue::Text("b".into()))).unwrap();

        mirror_entry_fields(&conn, &[e1, e2]).unwrap();

        assert!(entry_field_type_keys(&conn, e1).unwrap().contains("artist"));
        assert!(entry_field_type_keys(&conn, e2).unwrap().contains("author"));
    }

    #[test]
    fn merge_entries_copies_fields_and_deletes_source() {
        let conn = fresh_conn();
        let e1 = make_entry(&conn, "a.txt");
        let e2 = make_entry(&conn, "b.txt");
        add_field_to_entry(&conn, e1, "author", Some(FieldValue::Text("a".into()))).unwrap();

        merge_entries(&conn, e1, e2).unwrap();

        assert!(entry_field_type_keys(&conn, e2).unwrap().contains("author"));
        let exists: bool = conn.query_row("SELECT EXISTS(SELECT 1 FROM entries WHERE id = ?1)", params![e1], |r| r.get(0)).unwrap();
        assert!(!exists);
    }
}
