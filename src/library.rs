//! Library facade: the single entry point callers use (spec §4.9).
//!
//! Owns the driver handle, the current library root, and the `Folder` row id
//! for that root. Ties together `db::schema`/`db::migrations` (open +
//! migrate), `db::tags`/`db::fields`/`db::entries` (mutation surface), and
//! `query`/`browsing` (search). Grounded on the donor's `Db` construction
//! (`examples/lacodda-kasl/src/db/db.rs`) for the open/backup/migrate
//! sequencing, and on `original_source/.../alchemy/library.py::Library`
//! (the `open_library`/`library_dir`/`folder` fields) for the facade's own
//! shape.

use crate::db::{db as conn_factory, fields, migrations, schema, tags};
use crate::error::{LibraryError, Result};
use crate::path::LibPath;
use crate::storage::LibraryPaths;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::Map as JsonMap;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Legacy field kinds, keyed by the numeric field id the pre-SQLite JSON
/// format used. Grounded on the default field list in
/// `original_source/tagstudio/src/core/library.py` (around its
/// `create_default_fields` table, ids 0–30). Collation fields (9, 17–20,
/// 24–26) have no counterpart in this engine's field model and are skipped.
enum LegacyFieldKind {
    Text(&'static str),
    DateTime(&'static str),
    TagBox,
    Checkbox(i64),
    Collation,
}

fn legacy_field_kind(legacy_id: i64) -> Option<LegacyFieldKind> {
    use LegacyFieldKind::*;
    Some(match legacy_id {
        0 => Text("title"),
        1 => Text("author"),
        2 => Text("artist"),
        3 => Text("url"),
        4 => Text("description"),
        5 => Text("notes"),
        6 | 7 | 8 => TagBox,
        9 | 17 | 18 | 19 | 20 | 24 | 25 | 26 => Collation,
        10 => DateTime("date"),
        11 => DateTime("date_created"),
        12 => DateTime("date_modified"),
        13 => DateTime("date_taken"),
        14 => DateTime("date_published"),
        15 => Checkbox(tags::TAG_ARCHIVED),
        16 => Checkbox(tags::TAG_FAVORITE),
        21 => Text("source"),
        22 => DateTime("date_uploaded"),
        23 => DateTime("date_released"),
        27 => Text("publisher"),
        28 => Text("guest_artist"),
        29 => Text("composer"),
        30 => Text("comments"),
        _ => return None,
    })
}

#[derive(Debug, Deserialize)]
struct LegacyJsonLibrary {
    #[serde(default)]
    ignored_extensions: Option<Vec<String>>,
    #[serde(default)]
    ext_list: Option<Vec<String>>,
    #[serde(default)]
    #[allow(dead_code)]
    is_exclude_list: Option<bool>,
    #[serde(default)]
    tags: Vec<LegacyTag>,
    #[serde(default)]
    entries: Vec<LegacyEntry>,
}

#[derive(Debug, Deserialize)]
struct LegacyTag {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    shorthand: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    subtag_ids: Vec<i64>,
    #[serde(default)]
    color: String,
}

#[derive(Debug, Deserialize)]
struct LegacyEntry {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    filename: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    fields: Vec<JsonMap<String, serde_json::Value>>,
}

/// Outcome of `open_library`: either a ready facade, or a flag asking the
/// caller to invoke `migrate_json_to_sqlite` first (spec §4.2, §7
/// `JsonMigrationRequired`).
pub enum OpenOutcome {
    Ready(Library),
    JsonMigrationRequired { library_path: PathBuf },
}

/// The single object callers use to interact with a library (spec §4.9).
pub struct Library {
    conn: Connection,
    root: PathBuf,
    paths: LibraryPaths,
    folder_id: i64,
}

impl Library {
    /// Opens (or creates) the library rooted at `root`. `storage_path`
    /// overrides the on-disk sqlite location; pass `":memory:"` for the
    /// shared in-memory mode spec §5 describes for tests.
    pub fn open_library(root: impl Into<PathBuf>, storage_path: Option<&str>) -> Result<OpenOutcome> {
        let root = root.into();
        let paths = LibraryPaths::new(&root);
        paths.ensure_ts_folder()?;

        if storage_path.is_none() && paths.json_file().exists() && !paths.sqlite_file().exists() {
            return Ok(OpenOutcome::JsonMigrationRequired { library_path: paths.json_file() });
        }

        let is_memory = matches!(storage_path, Some(":memory:"));
        let is_new = is_memory || !paths.sqlite_file().exists();

        let mut conn = if is_memory {
            conn_factory::open_in_memory()?
        } else {
            conn_factory::open_file_backed(&paths.sqlite_file())?
        };

        if is_new {
            info!(root = %root.display(), "creating new library");
            schema::create_and_seed(&conn)?;
        } else {
            let loaded_version = read_stored_version(&conn)?;
            let found_major = loaded_version / 100;
            let expected_major = schema::DB_VERSION / 100;
            if found_major > expected_major {
                return Err(LibraryError::VersionMismatch { found_major, expected_major });
            }
            if loaded_version < schema::DB_VERSION {
                if let Some(backup) = paths.backup_now()? {
                    info!(backup = %backup.display(), "backed up library before migration");
                }
                migrations::run_pending(&mut conn, loaded_version)?;
            }
            migrate_ignore_list_to_file(&conn, &paths)?;
        }

        let folder_id = ensure_folder(&conn, &root)?;
        Ok(OpenOutcome::Ready(Library { conn, root, paths, folder_id }))
    }

    /// Consumes the legacy `ts_library.json` at `library_path` (the path
    /// `OpenOutcome::JsonMigrationRequired` carried), creating a fresh
    /// SQLite library in its place (spec §4.2).
    pub fn migrate_json_to_sqlite(root: impl Into<PathBuf>, library_path: &Path) -> Result<Library> {
        let root = root.into();
        let paths = LibraryPaths::new(&root);
        paths.ensure_ts_folder()?;

        let raw = fs::read_to_string(library_path)?;
        let legacy: LegacyJsonLibrary = serde_json::from_str(&raw)
            .map_err(|e| LibraryError::Integrity(format!("malformed legacy library json: {e}")))?;

        let mut conn = conn_factory::open_file_backed(&paths.sqlite_file())?;
        schema::create_and_seed(&conn)?;
        let folder_id = ensure_folder(&conn, &root)?;

        import_legacy_tags(&conn, &legacy.tags)?;
        import_legacy_entries(&mut conn, folder_id, &legacy.entries)?;
        import_legacy_extensions(&paths, legacy.ignored_extensions.or(legacy.ext_list))?;

        info!(
            tags = legacy.tags.len(),
            entries = legacy.entries.len(),
            "migrated legacy json library to sqlite"
        );
        Ok(Library { conn, root, paths, folder_id })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn folder_id(&self) -> i64 {
        self.folder_id
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Copies the sqlite file into `.TagStudio/backups/` with a UTC-stamped
    /// name (spec §4.9).
    pub fn save_library_backup_to_disk(&self) -> Result<Option<PathBuf>> {
        self.paths.backup_now()
    }

    /// Disposes the connection and drops cached state. There is nothing
    /// further to flush: every mutation above already committed its own
    /// transaction.
    pub fn close(self) {
        debug!(root = %self.root.display(), "closing library");
        drop(self.conn);
    }
}

/// `Version(current)`, falling back to the deprecated `Preferences` key for
/// legacy ≤9.4 libraries that predate the `versions` table (spec §4.2 step
/// 5).
fn read_stored_version(conn: &Connection) -> Result<u32> {
    if let Some(v) = conn
        .query_row("SELECT value FROM versions WHERE key = 'current'", [], |r| r.get::<_, i64>(0))
        .optional()?
    {
        return Ok(v as u32);
    }
    let legacy: Option<String> = conn
        .query_row("SELECT value FROM preferences WHERE key = 'DB_VERSION'", [], |r| r.get(0))
        .optional()?;
    legacy
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| LibraryError::Integrity("library has neither a versions nor a preferences DB_VERSION row".into()))
}

/// Writes the legacy extension-exclusion list into `.ts_ignore` if that file
/// does not already exist (spec §4.2 step 8). No-op for libraries that have
/// never stored one.
fn migrate_ignore_list_to_file(conn: &Connection, paths: &LibraryPaths) -> Result<()> {
    if paths.ignore_file().exists() {
        return Ok(());
    }
    let raw: Option<String> = conn
        .query_row("SELECT value FROM preferences WHERE key = 'ext_list'", [], |r| r.get(0))
        .optional()?;
    let Some(raw) = raw else { return Ok(()) };
    let extensions: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
    if extensions.is_empty() {
        return Ok(());
    }
    fs::write(paths.ignore_file(), extensions.join("\n"))?;
    Ok(())
}

fn import_legacy_extensions(paths: &LibraryPaths, extensions: Option<Vec<String>>) -> Result<()> {
    let Some(extensions) = extensions else { return Ok(()) };
    if extensions.is_empty() || paths.ignore_file().exists() {
        return Ok(());
    }
    let sanitized: Vec<String> = extensions
        .into_iter()
        .map(|ext| if ext.starts_with('.') { ext } else { format!(".{ext}") })
        .collect();
    fs::write(paths.ignore_file(), sanitized.join("\n"))?;
    Ok(())
}

/// Aliases already attached to `tag_id`, used to dedupe a legacy tag's
/// alias list against the built-in aliases `create_and_seed` already
/// inserted for reserved tags (spec §4.2 "aliases ... deduplicated against
/// built-ins").
fn existing_alias_names(conn: &Connection, tag_id: i64) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM tag_aliases WHERE tag_id = ?1")?;
    let names = stmt.query_map(params![tag_id], |r| r.get(0))?.collect::<rusqlite::Result<HashSet<String>>>()?;
    Ok(names)
}

fn ensure_folder(conn: &Connection, root: &Path) -> Result<i64> {
    let path = root.to_string_lossy().replace('\\', "/");
    if let Some(id) = conn
        .query_row("SELECT id FROM folders WHERE path = ?1", params![path], |r| r.get(0))
        .optional()?
    {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO folders (path, uuid) VALUES (?1, ?2)",
        params![path, Uuid::new_v4().to_string()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Imports legacy tags preserving their original IDs. Reserved IDs
/// (`0..FIRST_USER_TAG_ID`) already exist from `create_and_seed`, so those
/// rows get user edits applied via `update_tag` instead of a fresh insert;
/// everything else is inserted with its original id. Parent links
/// (`subtag_ids`) are applied in a second pass once every tag row exists.
fn import_legacy_tags(conn: &Connection, legacy_tags: &[LegacyTag]) -> Result<()> {
    for lt in legacy_tags {
        let color_slug = (!lt.color.is_empty()).then(|| lt.color.to_lowercase());
        let mut tag = tags::Tag::new(&lt.name);
        tag.id = Some(lt.id);
        tag.shorthand = (!lt.shorthand.is_empty()).then(|| lt.shorthand.clone());
        tag.color_namespace = color_slug.as_ref().map(|_| "tagstudio-standard".to_string());
        tag.color_slug = color_slug;

        if lt.id < tags::FIRST_USER_TAG_ID {
            tags::update_tag(conn, &tag, None, None, None)?;
        } else if tags::add_tag(conn, &tag, None, None, None)?.is_none() {
            warn!(tag_id = lt.id, "legacy tag import: id collision, skipped");
            continue;
        }

        let existing_aliases = existing_alias_names(conn, lt.id)?;
        for alias in &lt.aliases {
            if alias.is_empty() || existing_aliases.contains(alias) {
                continue;
            }
            let _ = tags::add_alias(conn, alias, lt.id);
        }
    }

    for lt in legacy_tags {
        for parent_id in &lt.subtag_ids {
            if let Err(e) = tags::add_parent_tag(conn, *parent_id, lt.id) {
                debug!(parent_id, child_id = lt.id, error = %e, "legacy parent link import: skipped");
            }
        }
    }
    Ok(())
}

/// Imports legacy entries, shifting each JSON id by +1 (spec §4.2: "JSON IDs
/// are shifted by +1 because they started at 0") and converting legacy
/// `tag_box` field content into `tag_entries` rows rather than typed fields.
fn import_legacy_entries(conn: &mut Connection, folder_id: i64, legacy_entries: &[LegacyEntry]) -> Result<()> {
    let tx = conn.transaction()?;
    for (index, le) in legacy_entries.iter().enumerate() {
        let legacy_id = le.id.unwrap_or(index as i64);
        let new_id = legacy_id + 1;
        let path = LibPath::new(&le.path);

        tx.execute(
            "INSERT INTO entries (id, folder_id, path, filename, suffix) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![new_id, folder_id, path, path.filename(), path.suffix()],
        )?;

        for field in &le.fields {
            let Some((key, value)) = field.iter().next() else { continue };
            let Ok(legacy_field_id) = key.parse::<i64>() else { continue };
            let Some(kind) = legacy_field_kind(legacy_field_id) else { continue };

            match kind {
                LegacyFieldKind::Text(type_key) => {
                    let text = value.as_str().unwrap_or_default().to_string();
                    fields::add_field_to_entry(&tx, new_id, type_key, Some(fields::FieldValue::Text(text)))?;
                }
                LegacyFieldKind::DateTime(type_key) => {
                    let dt = value.as_str().map(|s| s.to_string());
                    fields::add_field_to_entry(&tx, new_id, type_key, Some(fields::FieldValue::DateTime(dt)))?;
                }
                LegacyFieldKind::Checkbox(tag_id) => {
                    if value.as_bool().unwrap_or(false) {
                        tx.execute(
                            "INSERT OR IGNORE INTO tag_entries (tag_id, entry_id) VALUES (?1, ?2)",
                            params![tag_id, new_id],
                        )?;
                    }
                }
                LegacyFieldKind::TagBox => {
                    if let Some(ids) = value.as_array() {
                        for id in ids.iter().filter_map(|v| v.as_i64()) {
                            tx.execute(
                                "INSERT OR IGNORE INTO tag_entries (tag_id, entry_id) VALUES (?1, ?2)",
                                params![id, new_id],
                            )?;
                        }
                    }
                }
                LegacyFieldKind::Collation => {
                    debug!(entry_id = new_id, "legacy collation field dropped during migration");
                }
            }
        }
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entries;
    use tempfile::tempdir;

    #[test]
    fn open_library_creates_fresh_in_memory_library() {
        let outcome = Library::open_library("/tmp/irrelevant", Some(":memory:")).unwrap();
        match outcome {
            OpenOutcome::Ready(lib) => {
                assert_eq!(schema::DB_VERSION, migrations::get_current_version(lib.connection()).unwrap());
            }
            OpenOutcome::JsonMigrationRequired { .. } => panic!("expected a ready library"),
        }
    }

    #[test]
    fn reopening_an_existing_file_backed_library_preserves_data() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let outcome = Library::open_library(&root, None).unwrap();
        let OpenOutcome::Ready(mut lib) = outcome else { panic!("expected ready") };
        let folder_id = lib.folder_id();
        entries::add_entries(
            lib.connection_mut(),
            &[entries::NewEntry { folder_id, path: LibPath::new("a.txt"), date_created: None, date_modified: None, date_added: None }],
        )
        .unwrap();
        lib.close();

        let outcome = Library::open_library(&root, None).unwrap();
        let OpenOutcome::Ready(lib) = outcome else { panic!("expected ready") };
        assert!(entries::has_path_entry(lib.connection(), &LibPath::new("a.txt")).unwrap());
    }

    #[test]
    fn missing_sqlite_but_present_json_requests_migration() {
        let dir = tempdir().unwrap();
        let paths = LibraryPaths::new(dir.path());
        paths.ensure_ts_folder().unwrap();
        fs::write(paths.json_file(), r#"{"tags":[],"entries":[]}"#).unwrap();

        let outcome = Library::open_library(dir.path(), None).unwrap();
        assert!(matches!(outcome, OpenOutcome::JsonMigrationRequired { .. }));
    }

    #[test]
    fn migrate_json_to_sqlite_imports_tags_and_shifts_entry_ids() {
        let dir = tempdir().unwrap();
        let paths = LibraryPaths::new(dir.path());
        paths.ensure_ts_folder().unwrap();
        let json = r#"{
            "tags": [
                {"id": 1, "name": "Archived", "aliases": ["Archive"], "subtag_ids": [], "color": "red"},
                {"id": 1000, "name": "Cat", "aliases": [], "subtag_ids": [], "color": "blue"}
            ],
            "entries": [
                {"id": 0, "path": "a.png", "fields": [{"6": [1000]}, {"15": true}]}
            ]
        }"#;
        fs::write(paths.json_file(), json).unwrap();

        let lib = Library::migrate_json_to_sqlite(dir.path(), &paths.json_file()).unwrap();
        assert!(entries::has_path_entry(lib.connection(), &LibPath::new("a.png")).unwrap());
        let full = entries::get_entry_full(lib.connection(), 1, false, true).unwrap().unwrap();
        let tag_ids: Vec<i64> = full.tags.iter().filter_map(|t| t.id).collect();
        assert!(tag_ids.contains(&1000));
        assert!(tag_ids.contains(&tags::TAG_ARCHIVED));
    }
}
