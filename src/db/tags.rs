//! Tag graph store: CRUD over tags, aliases, parent links, color groups, and
//! namespaces, with reserved-namespace and reserved-ID protections.
//!
//! Grounded on the donor's `Tag` struct / `const` SQL-string pattern
//! (`examples/lacodda-kasl/src/db/tags.rs`) for shape, and on
//! `original_source/.../alchemy/library.py`'s `add_tag`, `update_tag`,
//! `remove_tag`, `update_parent_tags`, `update_aliases`,
//! `get_default_tags` for semantics.

use crate::db::schema::RESERVED_NAMESPACE_PREFIX;
use crate::error::{is_constraint_violation, LibraryError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Reserved tag IDs (spec §3, §6; resolved per `SPEC_FULL.md` §12).
pub const TAG_META: i64 = 0;
pub const TAG_ARCHIVED: i64 = 1;
pub const TAG_FAVORITE: i64 = 2;
/// User tag IDs are guaranteed to start here (schema seeds the sqlite
/// autoincrement counter accordingly).
pub const FIRST_USER_TAG_ID: i64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: Option<i64>,
    pub name: String,
    pub shorthand: Option<String>,
    pub color_namespace: Option<String>,
    pub color_slug: Option<String>,
    pub is_category: bool,
    pub icon: Option<String>,
    pub disambiguation_id: Option<i64>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            shorthand: None,
            color_namespace: None,
            color_slug: None,
            is_category: false,
            icon: None,
            disambiguation_id: None,
        }
    }
}

fn row_to_tag(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        shorthand: row.get("shorthand")?,
        color_namespace: row.get("color_namespace")?,
        color_slug: row.get("color_slug")?,
        is_category: row.get::<_, i64>("is_category")? != 0,
        icon: row.get("icon")?,
        disambiguation_id: row.get("disambiguation_id")?,
    })
}

const SELECT_TAG_COLUMNS: &str = "id, name, shorthand, color_namespace, color_slug, is_category, icon, disambiguation_id";

fn slugify(input: &str) -> String {
    let mut out = String::new();
    let mut last_was_sep = false;
    for c in input.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('-');
            last_was_sep = true;
        }
    }
    out.trim_matches('-').to_string()
}

fn reject_if_reserved(slug: &str, allow_reserved: bool) -> Result<()> {
    if !allow_reserved && slug.starts_with(RESERVED_NAMESPACE_PREFIX) {
        return Err(LibraryError::ReservedNamespace { slug: slug.to_string() });
    }
    Ok(())
}

/// Inserts a tag, optionally syncing its parent set and alias set. Returns
/// `Ok(None)` on a constraint violation (rolled back), matching spec §7's
/// contract for integrity errors on operations that return the object.
pub fn add_tag(
    conn: &Connection,
    tag: &Tag,
    parent_ids: Option<&[i64]>,
    alias_names: Option<&[String]>,
    alias_ids: Option<&[i64]>,
) -> Result<Option<Tag>> {
    if let (Some(ns), Some(slug)) = (&tag.color_namespace, &tag.color_slug) {
        reject_if_reserved(&format!("{ns}/{slug}"), ns.starts_with(RESERVED_NAMESPACE_PREFIX))?;
    }

    let result = (|| -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO tags (id, name, shorthand, color_namespace, color_slug, is_category, icon, disambiguation_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                tag.id,
                tag.name,
                tag.shorthand,
                tag.color_namespace,
                tag.color_slug,
                tag.is_category as i64,
                tag.icon,
                tag.disambiguation_id,
            ],
        )?;
        Ok(if tag.id.is_some() { tag.id.unwrap() } else { conn.last_insert_rowid() })
    })();

    let tag_id = match result {
        Ok(id) => id,
        Err(e) if is_constraint_violation(&e) => {
            warn!(error = %e, "add_tag: constraint violation, rolling back");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(parents) = parent_ids {
        update_parent_tags(conn, tag_id, parents)?;
    }
    if let (Some(names), Some(ids)) = (alias_names, alias_ids) {
        update_aliases(conn, tag_id, ids, names)?;
    }

    get_tag(conn, tag_id)
}

/// Same code path as `add_tag`, used for rename/recolor/re-parent/realias
/// against an existing id (spec §4.3).
pub fn update_tag(
    conn: &Connection,
    tag: &Tag,
    parent_ids: Option<&[i64]>,
    alias_names: Option<&[String]>,
    alias_ids: Option<&[i64]>,
) -> Result<Option<Tag>> {
    let id = tag.id.expect("update_tag requires an existing id");
    conn.execute(
        "UPDATE tags SET name = ?2, shorthand = ?3, color_namespace = ?4, color_slug = ?5,
         is_category = ?6, icon = ?7, disambiguation_id = ?8 WHERE id = ?1",
        params![
            id,
            tag.name,
            tag.shorthand,
            tag.color_namespace,
            tag.color_slug,
            tag.is_category as i64,
            tag.icon,
            tag.disambiguation_id,
        ],
    )?;

    if let Some(parents) = parent_ids {
        update_parent_tags(conn, id, parents)?;
    }
    if let (Some(names), Some(ids)) = (alias_names, alias_ids) {
        update_aliases(conn, id, ids, names)?;
    }

    get_tag(conn, id)
}

/// Syncs `tag_parents` rows for `tag_id` to exactly `parent_ids` (minus any
/// self-reference). Does **not** clear `disambiguation_id` when its target
/// leaves the parent set — spec §9 explicitly calls for that looseness,
/// diverging from the original source's extra coupling (see `DESIGN.md`).
pub fn update_parent_tags(conn: &Connection, tag_id: i64, parent_ids: &[i64]) -> Result<()> {
    let wanted: HashSet<i64> = parent_ids.iter().copied().filter(|&p| p != tag_id).collect();

    let mut stmt = conn.prepare("SELECT parent_id FROM tag_parents WHERE child_id = ?1")?;
    let existing: HashSet<i64> = stmt.query_map(params![tag_id], |r| r.get(0))?.collect::<rusqlite::Result<_>>()?;
    drop(stmt);

    for stale in existing.difference(&wanted) {
        conn.execute("DELETE FROM tag_parents WHERE parent_id = ?1 AND child_id = ?2", params![stale, tag_id])?;
    }
    for new in wanted.difference(&existing) {
        conn.execute("INSERT INTO tag_parents (parent_id, child_id) VALUES (?1, ?2)", params![new, tag_id])?;
    }
    Ok(())
}

/// Syncs `tag_aliases` rows for `tag_id` to exactly the `(alias_ids,
/// alias_names)` pairs supplied, matching by id-or-name.
pub fn update_aliases(conn: &Connection, tag_id: i64, alias_ids: &[i64], alias_names: &[String]) -> Result<()> {
    let id_set: HashSet<i64> = alias_ids.iter().copied().collect();
    let mut name_set: HashSet<String> = alias_names.iter().cloned().collect();

    let mut stmt = conn.prepare("SELECT id, name FROM tag_aliases WHERE tag_id = ?1")?;
    let existing: Vec<(i64, String)> = stmt.query_map(params![tag_id], |r| Ok((r.get(0)?, r.get(1)?)))?.collect::<rusqlite::Result<_>>()?;
    drop(stmt);

    for (alias_id, alias_name) in existing {
        if !id_set.contains(&alias_id) || !name_set.contains(&alias_name) {
            conn.execute("DELETE FROM tag_aliases WHERE id = ?1", params![alias_id])?;
        } else {
            name_set.remove(&alias_name);
        }
    }
    for name in name_set {
        add_alias(conn, &name, tag_id)?;
    }
    Ok(())
}

/// Rejects empty names; inserts otherwise (spec §4.3).
pub fn add_alias(conn: &Connection, name: &str, tag_id: i64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LibraryError::Integrity("alias name must not be empty".into()));
    }
    conn.execute("INSERT INTO tag_aliases (name, tag_id) VALUES (?1, ?2)", params![name, tag_id])?;
    Ok(())
}

/// Rejects self-edges; otherwise inserts (spec §4.3).
pub fn add_parent_tag(conn: &Connection, parent_id: i64, child_id: i64) -> Result<()> {
    if parent_id == child_id {
        return Err(LibraryError::Integrity("a tag cannot be its own parent".into()));
    }
    conn.execute("INSERT INTO tag_parents (parent_id, child_id) VALUES (?1, ?2)", params![parent_id, child_id])?;
    Ok(())
}

/// Deletes all aliases, all `tag_parents` rows where the tag appears as
/// *either* parent or child, nulls any `disambiguation_id` referencing it,
/// then deletes the tag row. Cascades (via FK) to `tag_entries`. Broader
/// than the original source's `remove_tag`, which only cleaned up rows
/// where the tag was the child (see `DESIGN.md`).
pub fn remove_tag(conn: &Connection, tag_id: i64) -> Result<Option<Tag>> {
    let existing = get_tag(conn, tag_id)?;
    if existing.is_none() {
        return Ok(None);
    }

    let result = (|| -> rusqlite::Result<()> {
        conn.execute("DELETE FROM tag_aliases WHERE tag_id = ?1", params![tag_id])?;
        conn.execute("DELETE FROM tag_parents WHERE parent_id = ?1 OR child_id = ?1", params![tag_id])?;
        conn.execute("UPDATE tags SET disambiguation_id = NULL WHERE disambiguation_id = ?1", params![tag_id])?;
        conn.execute("DELETE FROM tags WHERE id = ?1", params![tag_id])?;
        Ok(())
    })();

    match result {
        Ok(()) => Ok(existing),
        Err(e) if is_constraint_violation(&e) => {
            warn!(error = %e, tag_id, "remove_tag: constraint violation, rolling back");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_tag(conn: &Connection, tag_id: i64) -> Result<Option<Tag>> {
    conn.query_row(&format!("SELECT {SELECT_TAG_COLUMNS} FROM tags WHERE id = ?1"), params![tag_id], row_to_tag)
        .optional()
        .map_err(Into::into)
}

/// Ids of all tags whose name, shorthand, or any alias case-insensitively
/// equals `name_or_alias`. Ambiguous (more than one match) is permitted and
/// left for the caller to resolve (spec §3 invariant).
pub fn find_tag_ids_by_name(conn: &Connection, name_or_alias: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM tags WHERE name = ?1 COLLATE NOCASE OR shorthand = ?1 COLLATE NOCASE
         UNION
         SELECT tag_id FROM tag_aliases WHERE name = ?1 COLLATE NOCASE",
    )?;
    let ids = stmt.query_map(params![name_or_alias], |r| r.get(0))?.collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// Walks `tag_parents` from `tag_id` outward along `parent_id -> child_id`
/// (current semantics: parent is the ancestor) to find every *descendant*
/// of `tag_id`, i.e. every tag that inherits it during search (spec §4.7).
/// Deduplicates via a visited set so a cycle in the graph terminates.
pub fn descendant_closure(conn: &Connection, seed_ids: &[i64]) -> Result<HashSet<i64>> {
    let mut visited: HashSet<i64> = seed_ids.iter().copied().collect();
    let mut frontier: Vec<i64> = seed_ids.to_vec();

    let mut stmt = conn.prepare("SELECT child_id FROM tag_parents WHERE parent_id = ?1")?;
    while let Some(id) = frontier.pop() {
        let children: Vec<i64> = stmt.query_map(params![id], |r| r.get(0))?.collect::<rusqlite::Result<_>>()?;
        for child in children {
            if visited.insert(child) {
                frontier.push(child);
            }
        }
    }
    Ok(visited)
}

/// Returns the seed tags plus all transitive ancestors, keyed by id, with
/// each tag's direct parent list materialized (spec §4.3
/// `get_tag_hierarchy`). Iterative with a visited set, terminating on
/// cycles.
pub fn get_tag_hierarchy(conn: &Connection, seed_ids: &[i64]) -> Result<HashMap<i64, Tag>> {
    let mut out: HashMap<i64, Tag> = HashMap::new();
    let mut visited: HashSet<i64> = HashSet::new();
    let mut frontier: Vec<i64> = seed_ids.to_vec();

    while let Some(id) = frontier.pop() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(tag) = get_tag(conn, id)? {
            out.insert(id, tag);
        }
        let mut stmt = conn.prepare("SELECT parent_id FROM tag_parents WHERE child_id = ?1")?;
        let parents: Vec<i64> = stmt.query_map(params![id], |r| r.get(0))?.collect::<rusqlite::Result<_>>()?;
        for parent in parents {
            if !visited.contains(&parent) {
                frontier.push(parent);
            }
        }
    }
    Ok(out)
}

/// Case-insensitive substring match over name, shorthand, and alias;
/// returns the directly matched tags and the (deduplicated) union of their
/// transitive ancestors (spec §4.3 `search_tags`).
pub fn search_tags(conn: &Connection, name: Option<&str>, limit: i64) -> Result<(Vec<Tag>, Vec<Tag>)> {
    let mut stmt = if name.is_some() {
        conn.prepare(&format!(
            "SELECT DISTINCT {SELECT_TAG_COLUMNS} FROM tags t
             LEFT JOIN tag_aliases a ON a.tag_id = t.id
             WHERE t.name LIKE '%' || ?1 || '%' COLLATE NOCASE
                OR t.shorthand LIKE '%' || ?1 || '%' COLLATE NOCASE
                OR a.name LIKE '%' || ?1 || '%' COLLATE NOCASE
             ORDER BY t.name COLLATE NOCASE
             LIMIT ?2"
        ))?
    } else {
        conn.prepare(&format!("SELECT {SELECT_TAG_COLUMNS} FROM tags t ORDER BY t.name COLLATE NOCASE LIMIT ?2"))?
    };

    let direct: Vec<Tag> = if let Some(n) = name {
        stmt.query_map(params![n, limit], row_to_tag)?.collect::<rusqlite::Result<_>>()?
    } else {
        stmt.query_map(params!["", limit], row_to_tag)?.collect::<rusqlite::Result<_>>()?
    };

    let direct_ids: HashSet<i64> = direct.iter().filter_map(|t| t.id).collect();
    let mut ancestor_ids: HashSet<i64> = HashSet::new();
    for id in &direct_ids {
        let hierarchy = get_tag_hierarchy(conn, &[*id])?;
        ancestor_ids.extend(hierarchy.keys().copied());
    }
    ancestor_ids.retain(|id| !direct_ids.contains(id));

    let mut ancestors = Vec::new();
    for id in ancestor_ids {
        if let Some(t) = get_tag(conn, id)? {
            ancestors.push(t);
        }
    }

    debug!(matched = direct.len(), ancestors = ancestors.len(), "search_tags");
    Ok((direct, ancestors))
}

/// Reserved slugs (any slug starting with `tagstudio`) are rejected; the
/// original source catches the same error internally but (per its comment)
/// fails to actually abort afterward — this crate hard-refuses, per spec §7
/// (see `DESIGN.md`).
pub fn add_namespace(conn: &Connection, namespace: &str, name: &str) -> Result<()> {
    if namespace.trim().is_empty() {
        return Err(LibraryError::Integrity("namespace must not be empty".into()));
    }
    let slug = slugify(namespace);
    reject_if_reserved(&slug, false)?;
    conn.execute("INSERT INTO namespaces (namespace, name) VALUES (?1, ?2)", params![slug, name])?;
    Ok(())
}

/// Deletion cascades (via FK `ON DELETE CASCADE`) to the namespace's color
/// groups.
pub fn delete_namespace(conn: &Connection, namespace: &str) -> Result<()> {
    reject_if_reserved(namespace, false)?;
    conn.execute("DELETE FROM namespaces WHERE namespace = ?1", params![namespace])?;
    Ok(())
}

/// If `(old_namespace, old_slug)` exists, updates it in place and rewrites
/// every tag referencing it; otherwise inserts a new color group at
/// `(new_namespace, new_slug)` (spec §4.3 `update_color`).
#[allow(clippy::too_many_arguments)]
pub fn update_color(
    conn: &Connection,
    old_namespace: &str,
    old_slug: &str,
    new_namespace: &str,
    new_slug: &str,
    name: &str,
    primary: &str,
    secondary: Option<&str>,
    border: bool,
) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tag_colors WHERE namespace = ?1 AND slug = ?2)",
        params![old_namespace, old_slug],
        |r| r.get(0),
    )?;

    if exists {
        conn.execute(
            "UPDATE tag_colors SET slug = ?1, namespace = ?2, name = ?3, primary_color = ?4, secondary_color = ?5, color_border = ?6
             WHERE namespace = ?7 AND slug = ?8",
            params![new_slug, new_namespace, name, primary, secondary, border as i64, old_namespace, old_slug],
        )?;
        conn.execute(
            "UPDATE tags SET color_namespace = ?1, color_slug = ?2 WHERE color_namespace = ?3 AND color_slug = ?4",
            params![new_namespace, new_slug, old_namespace, old_slug],
        )?;
    } else {
        conn.execute(
            "INSERT INTO tag_colors (slug, namespace, name, primary_color, secondary_color, color_border)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![new_slug, new_namespace, name, primary, secondary, border as i64],
        )?;
    }
    Ok(())
}

/// `"<name>"` if no disambiguator is set, else
/// `"<name> (<shorthand-or-name-of-disambiguator>)"` (spec §4.3).
pub fn tag_display_name(conn: &Connection, tag: &Tag) -> Result<String> {
    let Some(disam_id) = tag.disambiguation_id else {
        return Ok(tag.name.clone());
    };
    match get_tag(conn, disam_id)? {
        Some(disam) => {
            let label = disam.shorthand.filter(|s| !s.is_empty()).unwrap_or(disam.name);
            Ok(format!("{} ({})", tag.name, label))
        }
        None => Ok(format!("{} (<NO DISAM TAG>)", tag.name)),
    }
}

/// The three reserved seed tags, in `(archive, favorite, meta)` order,
/// matching the original source's property of the same name.
pub fn get_default_tags(conn: &Connection) -> Result<(Tag, Tag, Tag)> {
    let archive = get_tag(conn, TAG_ARCHIVED)?.expect("reserved tag ARCHIVED must exist");
    let favorite = get_tag(conn, TAG_FAVORITE)?.expect("reserved tag FAVORITE must exist");
    let meta = get_tag(conn, TAG_META)?.expect("reserved tag META must exist");
    Ok((archive, favorite, meta))
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

    #[test]
    fn add_tag_then_lookup() {
        let conn = fresh_conn();
        let t = add_tag(&conn, &Tag::new("Landscape"), None, None, None).unwrap().unwrap();
        assert!(t.id.unwrap() >= FIRST_USER_TAG_ID);
        let fetched = get_tag(&conn, t.id.unwrap()).unwrap().unwrap();
        assert_eq!(fetched.name, "Landscape");
    }

    #[test]
    fn remove_tag_clears_both_parent_directions() {
        let conn = fresh_conn();
        let parent = add_tag(&conn, &Tag::new("Parent"), None, None, None).unwrap().unwrap();
        let child = add_tag(&conn, &Tag::new("Child"), Some(&[parent.id.unwrap()]), None, None).unwrap().unwrap();
        let grandchild = add_tag(&conn, &Tag::new("GrandChild"), Some(&[child.id.unwrap()]), None, None).unwrap().unwrap();

        remove_tag(&conn, child.id.unwrap()).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM tag_parents WHERE parent_id = ?1 OR child_id = ?1",
                params![child.id.unwrap()],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
        assert!(get_tag(&conn, grandchild.id.unwrap()).unwrap().is_some());
    }

    #[test]
    fn disambiguation_id_survives_parent_change() {
        let conn = fresh_conn();
        let p1 = add_tag(&conn, &Tag::new("P1"), None, None, None).unwrap().unwrap();
        let p2 = add_tag(&conn, &Tag::new("P2"), None, None, None).unwrap().unwrap();
        let mut child = add_tag(&conn, &Tag::new("Child"), Some(&[p1.id.unwrap()]), None, None).unwrap().unwrap();
        child.disambiguation_id = Some(p1.id.unwrap());
        let child = update_tag(&conn, &child, None, None, None).unwrap().unwrap();

        update_parent_tags(&conn, child.id.unwrap(), &[p2.id.unwrap()]).unwrap();

        let refreshed = get_tag(&conn, child.id.unwrap()).unwrap().unwrap();
        assert_eq!(refreshed.disambiguation_id, Some(p1.id.unwrap()));
    }

    #[test]
    fn descendant_closure_terminates_on_cycle() {
        let conn = fresh_conn();
        let a = add_tag(&conn, &Tag::new("A"), None, None, None).unwrap().unwrap();
        let b = add_tag(&conn, &Tag::new("B"), Some(&[a.id.unwrap()]), None, None).unwrap().unwrap();
        add_parent_tag(&conn, b.id.unwrap(), a.id.unwrap()).unwrap();

        let closure = descendant_closure(&conn, &[a.id.unwrap()]).unwrap();
        assert!(closure.contains(&a.id.unwrap()));
        assert!(closure.contains(&b.id.unwrap()));
        assert_eq!(closure.len(), 2);
    }

    #[test]
    fn add_namespace_refuses_reserved_prefix() {
        let conn = fresh_conn();
        let err = add_namespace(&conn, "tagstudio-custom", "Custom").unwrap_err();
        assert!(matches!(err, LibraryError::ReservedNamespace { .. }));
    }

    #[test]
    fn add_parent_tag_rejects_self_edge() {
        let conn = fresh_conn();
        let t = add_tag(&conn, &Tag::new("Solo"), None, None, None).unwrap().unwrap();
        let err = add_parent_tag(&conn, t.id.unwrap(), t.id.unwrap()).unwrap_err();
        assert!(matches!(err, LibraryError::Integrity(_)));
    }
}
