//! Declarative schema (DDL) and default seed data for a freshly created
//! library, grounded on the table list in spec §6 and the seed sequence in
//! `original_source/.../alchemy/library.py::open_sqlite_library`.

use crate::db::tags::{TAG_ARCHIVED, TAG_FAVORITE, TAG_META};
use rusqlite::{params, Connection};

pub const DB_VERSION: u32 = 100;

pub const RESERVED_NAMESPACE_PREFIX: &str = "tagstudio";

pub const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE folders (
        id INTEGER PRIMARY KEY,
        path TEXT NOT NULL UNIQUE,
        uuid TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE entries (
        id INTEGER PRIMARY KEY,
        folder_id INTEGER NOT NULL REFERENCES folders(id),
        path TEXT NOT NULL UNIQUE,
        filename TEXT NOT NULL,
        suffix TEXT NOT NULL,
        date_created TEXT,
        date_modified TEXT,
        date_added TEXT
    )",
    "CREATE TABLE namespaces (
        namespace TEXT PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE tag_colors (
        slug TEXT NOT NULL,
        namespace TEXT NOT NULL REFERENCES namespaces(namespace) ON DELETE CASCADE,
        name TEXT NOT NULL,
        primary_color TEXT NOT NULL,
        secondary_color TEXT,
        color_border INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (slug, namespace)
    )",
    "CREATE TABLE tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        shorthand TEXT,
        color_namespace TEXT,
        color_slug TEXT,
        is_category INTEGER NOT NULL DEFAULT 0,
        icon TEXT,
        disambiguation_id INTEGER REFERENCES tags(id),
        FOREIGN KEY (color_namespace, color_slug) REFERENCES tag_colors(namespace, slug)
    )",
    "CREATE TABLE tag_aliases (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE
    )",
    "CREATE TABLE tag_parents (
        parent_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        child_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (parent_id, child_id)
    )",
    "CREATE TABLE tag_entries (
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        entry_id INTEGER NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
        PRIMARY KEY (tag_id, entry_id)
    )",
    "CREATE TABLE value_type (
        key TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        is_default INTEGER NOT NULL DEFAULT 0,
        position INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE text_fields (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type_key TEXT NOT NULL REFERENCES value_type(key),
        entry_id INTEGER NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
        value TEXT,
        position INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE datetime_fields (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type_key TEXT NOT NULL REFERENCES value_type(key),
        entry_id INTEGER NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
        value TEXT,
        position INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE boolean_fields (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type_key TEXT NOT NULL REFERENCES value_type(key),
        entry_id INTEGER NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
        value INTEGER NOT NULL DEFAULT 0,
        position INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE versions (
        key TEXT PRIMARY KEY,
        value INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE preferences (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
    "CREATE INDEX idx_tag_aliases_tag_id ON tag_aliases(tag_id)",
    "CREATE INDEX idx_tag_entries_entry_id ON tag_entries(entry_id)",
    "CREATE INDEX idx_text_fields_entry_id ON text_fields(entry_id)",
    "CREATE INDEX idx_datetime_fields_entry_id ON datetime_fields(entry_id)",
    "CREATE INDEX idx_boolean_fields_entry_id ON boolean_fields(entry_id)",
];

/// The six curated color namespaces (spec §4.2 step 4), plus a handful of
/// swatches per namespace. Exact hex values were not recoverable from the
/// retrieved source; a representative, self-consistent palette is used
/// instead (see `DESIGN.md`).
struct Swatch {
    slug: &'static str,
    name: &'static str,
    primary: &'static str,
    secondary: Option<&'static str>,
    border: bool,
}

const NAMESPACES: &[(&str, &str)] = &[
    ("tagstudio-standard", "TagStudio Standard"),
    ("tagstudio-pastels", "TagStudio Pastels"),
    ("tagstudio-shades", "TagStudio Shades"),
    ("tagstudio-earth-tones", "TagStudio Earth Tones"),
    ("tagstudio-grayscale", "TagStudio Grayscale"),
    ("tagstudio-neon", "TagStudio Neon"),
];

fn swatches_for(namespace: &str) -> Vec<Swatch> {
    match namespace {
        "tagstudio-standard" => vec![
            Swatch { slug: "red", name: "Red", primary: "#E22C3C", secondary: None, border: false },
            Swatch { slug: "yellow", name: "Yellow", primary: "#FFD63D", secondary: None, border: false },
            Swatch { slug: "green", name: "Green", primary: "#3DC255", secondary: None, border: false },
            Swatch { slug: "blue", name: "Blue", primary: "#3D71C2", secondary: None, border: false },
            Swatch { slug: "purple", name: "Purple", primary: "#8D3DC2", secondary: None, border: false },
        ],
        "tagstudio-pastels" => vec![
            Swatch { slug: "pastel-pink", name: "Pastel Pink", primary: "#F7C6D9", secondary: None, border: false },
            Swatch { slug: "pastel-blue", name: "Pastel Blue", primary: "#C6DCF7", secondary: None, border: false },
        ],
        "tagstudio-shades" => vec![
            Swatch { slug: "dark-red", name: "Dark Red", primary: "#8A1A24", secondary: None, border: false },
            Swatch { slug: "light-blue", name: "Light Blue", primary: "#9AC2F2", secondary: None, border: false },
        ],
        "tagstudio-earth-tones" => vec![
            Swatch { slug: "clay", name: "Clay", primary: "#B0654A", secondary: None, border: false },
            Swatch { slug: "moss", name: "Moss", primary: "#6B7A4F", secondary: None, border: false },
        ],
        "tagstudio-grayscale" => vec![
            Swatch { slug: "black", name: "Black", primary: "#111111", secondary: None, border: false },
            Swatch { slug: "white", name: "White", primary: "#F5F5F5", secondary: None, border: true },
            Swatch { slug: "gray", name: "Gray", primary: "#808080", secondary: None, border: false },
        ],
        "tagstudio-neon" => vec![
            Swatch { slug: "neon-pink", name: "Neon Pink", primary: "#FF3EC9", secondary: Some("#FF9EDB"), border: true },
            Swatch { slug: "neon-green", name: "Neon Green", primary: "#39FF14", secondary: Some("#9BFF7A"), border: true },
        ],
        _ => vec![],
    }
}

/// Fixed default value-type catalog. Keys and positions must be preserved
/// exactly (spec §4.4) or legacy field data will unbind.
pub const DEFAULT_VALUE_TYPES: &[(&str, &str, &str, bool, i64)] = &[
    ("title", "Title", "text_line", true, 0),
    ("author", "Author", "text_line", false, 1),
    ("artist", "Artist", "text_line", false, 2),
    ("url", "URL", "text_line", false, 3),
    ("description", "Description", "text_box", false, 4),
    ("notes", "Notes", "text_box", false, 5),
    ("collation", "Collation", "text_line", false, 9),
    ("date", "Date", "datetime", false, 10),
    ("date_created", "Date Created", "datetime", false, 11),
    ("date_modified", "Date Modified", "datetime", false, 12),
    ("date_taken", "Date Taken", "datetime", false, 13),
    ("date_published", "Date Published", "datetime", false, 14),
    ("book", "Book", "text_line", false, 17),
    ("comic", "Comic", "text_line", false, 18),
    ("series", "Series", "text_line", false, 19),
    ("manga", "Manga", "text_line", false, 20),
    ("source", "Source", "text_line", false, 21),
    ("date_uploaded", "Date Uploaded", "datetime", false, 22),
    ("date_released", "Date Released", "datetime", false, 23),
    ("volume", "Volume", "text_line", false, 24),
    ("anthology", "Anthology", "text_line", false, 25),
    ("magazine", "Magazine", "text_line", false, 26),
    ("publisher", "Publisher", "text_line", false, 27),
    ("guest_artist", "Guest Artist", "text_line", false, 28),
    ("composer", "Composer", "text_line", false, 29),
    ("comments", "Comments", "text_line", false, 30),
];

/// Creates all tables and seeds namespaces, color groups, default value
/// types, reserved tags, and the `Version` rows. Called exactly once, on
/// first open of a library (spec §4.2 step 4).
pub fn create_and_seed(conn: &Connection) -> rusqlite::Result<()> {
    for stmt in CREATE_TABLES {
        conn.execute(stmt, [])?;
    }

    for (slug, name) in NAMESPACES {
        conn.execute("INSERT INTO namespaces (namespace, name) VALUES (?1, ?2)", params![slug, name])?;
        for sw in swatches_for(slug) {
            conn.execute(
                "INSERT INTO tag_colors (slug, namespace, name, primary_color, secondary_color, color_border)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![sw.slug, slug, sw.name, sw.primary, sw.secondary, sw.border as i64],
            )?;
        }
    }

    for (key, name, kind, is_default, position) in DEFAULT_VALUE_TYPES {
        conn.execute(
            "INSERT INTO value_type (key, name, kind, is_default, position) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key, name, kind, *is_default as i64, position],
        )?;
    }

    seed_reserved_tags(conn)?;

    conn.execute(
        "INSERT INTO versions (key, value) VALUES ('initial', ?1), ('current', ?1)",
        params![DB_VERSION],
    )?;
    conn.execute(
        "INSERT INTO preferences (key, value) VALUES ('DB_VERSION', ?1)",
        params![DB_VERSION.to_string()],
    )?;

    Ok(())
}

/// Inserts the Meta/Archived/Favorite tags at their fixed reserved IDs and
/// pins the `tags` autoincrement counter so user tags start at 1000 (spec
/// §3, §6 "Reserved identifiers"; see `SPEC_FULL.md` §12 for the exact IDs).
fn seed_reserved_tags(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO tags (id, name, is_category) VALUES (?1, 'Meta Tags', 1)",
        params![TAG_META],
    )?;
    conn.execute(
        "INSERT INTO tags (id, name, color_namespace, color_slug) VALUES (?1, 'Archived', 'tagstudio-standard', 'red')",
        params![TAG_ARCHIVED],
    )?;
    conn.execute(
        "INSERT INTO tags (id, name, color_namespace, color_slug) VALUES (?1, 'Favorite', 'tagstudio-standard', 'yellow')",
        params![TAG_FAVORITE],
    )?;
    conn.execute(
        "INSERT INTO tag_parents (parent_id, child_id) VALUES (?1, ?2)",
        params![TAG_META, TAG_ARCHIVED],
    )?;
    conn.execute(
        "INSERT INTO tag_parents (parent_id, child_id) VALUES (?1, ?2)",
        params![TAG_META, TAG_FAVORITE],
    )?;
    for (name, tag_id) in [("Meta", TAG_META), ("Meta Tag", TAG_META), ("Archive", TAG_ARCHIVED), ("Favorited", TAG_FAVORITE), ("Favorites", TAG_FAVORITE)] {
        conn.execute("INSERT INTO tag_aliases (name, tag_id) VALUES (?1, ?2)", params![name, tag_id])?;
    }
    conn.execute(
        "INSERT OR REPLACE INTO sqlite_sequence (name, seq) VALUES ('tags', 999)",
        [],
    )?;
    Ok(())
}
