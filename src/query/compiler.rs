//! Compiles a query AST into a boolean SQL expression over `entries.id`
//! (spec §4.7).
//!
//! Grounded directly on `SQLBoolExpressionBuilder`
//! (`original_source/.../alchemy/visitors.py`): the AND/OR single-tag-id
//! collection optimizations, the relational-division "has all tags" clause,
//! and the descendant-closure-via-recursive-walk approach are all carried
//! over from there, translated from SQLAlchemy expression objects into
//! parameterized SQL text plus a bound-value list (rusqlite has no
//! expression-builder API to mirror directly).

use super::ast::{Node, Property, Visitor};
use crate::db::tags;
use crate::error::{LibraryError, Result};
use crate::media_types;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::HashSet;

/// A boolean SQL fragment (evaluated against a row with an `id` column
/// named `entries.id` in scope) plus its positional bound parameters.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub sql: String,
    pub params: Vec<Value>,
}

impl CompiledExpr {
    fn literal(sql: impl Into<String>) -> Self {
        Self { sql: sql.into(), params: Vec::new() }
    }

    fn join(parts: Vec<CompiledExpr>, op: &str, identity: &str) -> Self {
        if parts.is_empty() {
            return CompiledExpr::literal(identity);
        }
        if parts.len() == 1 {
            return parts.into_iter().next().unwrap();
        }
        let mut sql = String::from("(");
        let mut params = Vec::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                sql.push_str(op);
            }
            sql.push_str(&part.sql);
            params.extend(part.params);
        }
        sql.push(')');
        CompiledExpr { sql, params }
    }
}

fn in_list_placeholder(n: usize) -> String {
    vec!["?"; n].join(",")
}

struct Compiler<'a> {
    conn: &'a Connection,
}

impl<'a> Compiler<'a> {
    /// Resolves a `tag`/`tag_id` constraint with no properties to a single
    /// tag id, the way the original's AND/OR special-casing does, so the
    /// caller can decide whether to fold it into a relational-division or
    /// union clause instead of compiling it as a standalone subquery.
    fn resolve_single_tag_id(&self, node: &Node) -> Option<i64> {
        let Node::Constraint { type_, value, properties } = node else { return None };
        if !properties.is_empty() {
            return None;
        }
        match type_.as_str() {
            "tag_id" => value.parse::<i64>().ok(),
            "tag" => {
                let ids = tags::find_tag_ids_by_name(self.conn, value).ok()?;
                if ids.len() == 1 {
                    Some(ids[0])
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Every tag id a `tag`/`tag_id` constraint with no properties refers
    /// to, even when ambiguous — used by the OR-list union optimization,
    /// which doesn't require single-resolution the way AND's division does.
    fn resolve_any_tag_ids(&self, node: &Node) -> Option<Vec<i64>> {
        let Node::Constraint { type_, value, properties } = node else { return None };
        if !properties.is_empty() {
            return None;
        }
        match type_.as_str() {
            "tag_id" => value.parse::<i64>().ok().map(|id| vec![id]),
            "tag" => tags::find_tag_ids_by_name(self.conn, value).ok(),
            _ => None,
        }
    }

    fn entries_with_any_tag_in(&self, ids: &HashSet<i64>) -> CompiledExpr {
        if ids.is_empty() {
            return CompiledExpr::literal("0");
        }
        let placeholders = in_list_placeholder(ids.len());
        CompiledExpr {
            sql: format!("entries.id IN (SELECT entry_id FROM tag_entries WHERE tag_id IN ({placeholders}))"),
            params: ids.iter().map(|id| Value::Integer(*id)).collect(),
        }
    }

    fn entries_with_all_tags(&self, ids: &[i64]) -> CompiledExpr {
        let placeholders = in_list_placeholder(ids.len());
        CompiledExpr {
            sql: format!(
                "entries.id IN (SELECT entry_id FROM tag_entries WHERE tag_id IN ({placeholders}) GROUP BY entry_id HAVING COUNT(DISTINCT tag_id) = {})",
                ids.len()
            ),
            params: ids.iter().map(|id| Value::Integer(*id)).collect(),
        }
    }

    /// `{matched} ∪ descendants(matched)` — the closure a `tag:`/`tag_id:`
    /// constraint must match against (spec §4.7).
    fn closure(&self, seed_ids: &[i64]) -> Result<HashSet<i64>> {
        Ok(tags::descendant_closure(self.conn, seed_ids)?)
    }

    fn compile_tag_constraint(&self, value: &str) -> Result<CompiledExpr> {
        let matched = tags::find_tag_ids_by_name(self.conn, value)?;
        let closure = self.closure(&matched)?;
        Ok(self.entries_with_any_tag_in(&closure))
    }

    fn compile_tag_id_constraint(&self, value: &str) -> Result<CompiledExpr> {
        let id: i64 = value
            .parse()
            .map_err(|_| LibraryError::Integrity(format!("'{value}' is not a valid tag id")))?;
        let closure = self.closure(&[id])?;
        Ok(self.entries_with_any_tag_in(&closure))
    }

    /// Smart path matching (spec §4.7): `*` anywhere switches to `GLOB`
    /// semantics; an all-lowercase value is matched case-insensitively in
    /// either mode; anything else falls back to a literal, case-sensitive
    /// substring match. `GLOB` and `instr` are both case-sensitive in
    /// SQLite by default, so the case-insensitive branches route through
    /// `LOWER()` explicitly instead of relying on `LIKE`'s ASCII
    /// case-folding, which would wrongly match mixed-case paths too.
    fn compile_path_constraint(&self, value: &str) -> CompiledExpr {
        let params = vec![Value::Text(value.to_string())];
        if value.contains('*') {
            if value == value.to_lowercase() {
                CompiledExpr { sql: "LOWER(entries.path) GLOB LOWER(?)".into(), params }
            } else {
                CompiledExpr { sql: "entries.path GLOB ?".into(), params }
            }
        } else if value == value.to_lowercase() {
            CompiledExpr { sql: "instr(LOWER(entries.path), LOWER(?)) > 0".into(), params }
        } else {
            CompiledExpr { sql: "instr(entries.path, ?) > 0".into(), params }
        }
    }

    fn compile_mediatype_constraint(&self, value: &str) -> CompiledExpr {
        match media_types::extensions_for(value) {
            Some(exts) if !exts.is_empty() => {
                let placeholders = in_list_placeholder(exts.len());
                CompiledExpr {
                    sql: format!("LOWER(entries.suffix) IN ({placeholders})"),
                    params: exts.into_iter().map(|e| Value::Text(e.to_string())).collect(),
                }
            }
            _ => CompiledExpr::literal("0"),
        }
    }

    fn compile_filetype_constraint(&self, value: &str) -> CompiledExpr {
        let class = media_types::filetype_equivalency_list(value);
        let class: Vec<String> = if class.is_empty() {
            vec![value.to_lowercase()]
        } else {
            class.into_iter().map(|e| e.to_lowercase()).collect()
        };
        let placeholders = in_list_placeholder(class.len());
        CompiledExpr {
            sql: format!("LOWER(entries.suffix) IN ({placeholders})"),
            params: class.into_iter().map(Value::Text).collect(),
        }
    }

    fn compile_special_constraint(&self, value: &str) -> Result<CompiledExpr> {
        if value.eq_ignore_ascii_case("untagged") {
            Ok(CompiledExpr::literal("entries.id NOT IN (SELECT entry_id FROM tag_entries)"))
        } else {
            Err(LibraryError::NotImplemented(format!("special:{value}")))
        }
    }
}

impl<'a> Visitor<Result<CompiledExpr>> for Compiler<'a> {
    fn visit_or(&mut self, elements: &[Node]) -> Result<CompiledExpr> {
        let mut tag_ids: HashSet<i64> = HashSet::new();
        let mut rest = Vec::new();

        for el in elements {
            if let Some(ids) = self.resolve_any_tag_ids(el) {
                tag_ids.extend(ids);
            } else {
                rest.push(el.accept(self)?);
            }
        }

        if !tag_ids.is_empty() {
            let closure = self.closure(&tag_ids.into_iter().collect::<Vec<_>>())?;
            rest.push(self.entries_with_any_tag_in(&closure));
        }

        Ok(CompiledExpr::join(rest, " OR ", "0"))
    }

    fn visit_and(&mut self, terms: &[Node]) -> Result<CompiledExpr> {
        let mut tag_ids: Vec<i64> = Vec::new();
        let mut rest = Vec::new();

        for term in terms {
            if let Some(id) = self.resolve_single_tag_id(term) {
                tag_ids.push(id);
            } else {
                rest.push(term.accept(self)?);
            }
        }

        if tag_ids.len() > 1 {
            rest.push(self.entries_with_all_tags(&tag_ids));
        } else if tag_ids.len() == 1 {
            let closure = self.closure(&tag_ids)?;
            rest.push(self.entries_with_any_tag_in(&closure));
        }

        Ok(CompiledExpr::join(rest, " AND ", "1"))
    }

    fn visit_not(&mut self, child: &Node) -> Result<CompiledExpr> {
        let inner = child.accept(self)?;
        Ok(CompiledExpr { sql: format!("NOT ({})", inner.sql), params: inner.params })
    }

    fn visit_constraint(&mut self, type_: &str, value: &str, properties: &[Property]) -> Result<CompiledExpr> {
        if !properties.is_empty() {
            return Err(LibraryError::NotImplemented("constraint properties".into()));
        }
        match type_ {
            "tag" => self.compile_tag_constraint(value),
            "tag_id" => self.compile_tag_id_constraint(value),
            "path" => Ok(self.compile_path_constraint(value)),
            "mediatype" => Ok(self.compile_mediatype_constraint(value)),
            "filetype" => Ok(self.compile_filetype_constraint(value)),
            "special" => self.compile_special_constraint(value),
            other => Err(LibraryError::NotImplemented(format!("constraint type '{other}'"))),
        }
    }
}

/// Compiles `ast` against `conn` into a boolean SQL fragment over
/// `entries.id`. `None` compiles to the always-true literal `1` (spec
/// §7: "a missing/failed AST" means "no filter").
pub fn compile(conn: &Connection, ast: Option<&Node>) -> Result<CompiledExpr> {
    match ast {
        None => Ok(CompiledExpr::literal("1")),
        Some(node) => node.accept(&mut Compiler { conn }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{entries, schema};
    use crate::db::entries::NewEntry;
    use crate::db::tags::{add_tag, Tag};
    use crate::path::LibPath;
    use crate::query::parser;
    use rusqlite::params_from_iter;

    fn fresh_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_and_seed(&conn).unwrap();
        conn.execute("INSERT INTO folders (id, path, uuid) VALUES (1, '/lib', 'u')", []).unwrap();
        conn
    }

    fn matching_ids(conn: &Connection, query: &str) -> Vec<i64> {
        let ast = parser::parse(query).unwrap();
        let compiled = compile(conn, ast.as_ref()).unwrap();
        let sql = format!("SELECT id FROM entries WHERE {}", compiled.sql);
        let mut stmt = conn.prepare(&sql).unwrap();
        let mut ids: Vec<i64> = stmt
            .query_map(params_from_iter(compiled.params.iter()), |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn and_of_two_single_tags_uses_relational_division() {
        let mut conn = fresh_conn();
        let cat = add_tag(&conn, &Tag::new("Cat"), None, None, None).unwrap().unwrap();
        let orange = add_tag(&conn, &Tag::new("Orange"), None, None, None).unwrap().unwrap();
        let ids = entries::add_entries(
            &mut conn,
            &[
                NewEntry { folder_id: 1, path: LibPath::new("a.jpg"), date_created: None, date_modified: None, date_added: None },
                NewEntry { folder_id: 1, path: LibPath::new("b.jpg"), date_created: None, date_modified: None, date_added: None },
            ],
        )
        .unwrap();
        conn.execute("INSERT INTO tag_entries (tag_id, entry_id) VALUES (?1, ?2)", rusqlite::params![cat.id, ids[0]]).unwrap();
        conn.execute("INSERT INTO tag_entries (tag_id, entry_id) VALUES (?1, ?2)", rusqlite::params![orange.id, ids[0]]).unwrap();
        conn.execute("INSERT INTO tag_entries (tag_id, entry_id) VALUES (?1, ?2)", rusqlite::params![cat.id, ids[1]]).unwrap();

        assert_eq!(matching_ids(&conn, "tag:Cat AND tag:Orange"), vec![ids[0]]);
    }

    #[test]
    fn tag_constraint_matches_descendants() {
        let mut conn = fresh_conn();
        let animal = add_tag(&conn, &Tag::new("Animal"), None, None, None).unwrap().unwrap();
        let cat = add_tag(&conn, &Tag::new("Cat"), Some(&[animal.id.unwrap()]), None, None).unwrap().unwrap();
        let ids = entries::add_entries(
            &mut conn,
            &[NewEntry { folder_id: 1, path: LibPath::new("a.jpg"), date_created: None, date_modified: None, date_added: None }],
        )
        .unwrap();
        conn.execute("INSERT INTO tag_entries (tag_id, entry_id) VALUES (?1, ?2)", rusqlite::params![cat.id, ids[0]]).unwrap();

        assert_eq!(matching_ids(&conn, "tag:Animal"), vec![ids[0]]);
    }

    #[test]
    fn special_untagged_matches_entries_without_tags() {
        let mut conn = fresh_conn();
        let ids = entries::add_entries(
            &mut conn,
            &[NewEntry { folder_id: 1, path: LibPath::new("a.jpg"), date_created: None, date_modified: None, date_added: None }],
        )
        .unwrap();

        assert_eq!(matching_ids(&conn, "special:untagged"), vec![ids[0]]);
    }

    #[test]
    fn mediatype_constraint_filters_by_extension_set() {
        let mut conn = fresh_conn();
        let ids = entries::add_entries(
            &mut conn,
            &[
                NewEntry { folder_id: 1, path: LibPath::new("a.jpg"), date_created: None, date_modified: None, date_added: None },
                NewEntry { folder_id: 1, path: LibPath::new("b.mp3"), date_created: None, date_modified: None, date_added: None },
            ],
        )
        .unwrap();

        assert_eq!(matching_ids(&conn, "mediatype:image"), vec![ids[0]]);
    }

    fn path_fixture() -> (Connection, Vec<i64>) {
        let mut conn = fresh_conn();
        let ids = entries::add_entries(
            &mut conn,
            &[
                NewEntry { folder_id: 1, path: LibPath::new("a/b/c.png"), date_created: None, date_modified: None, date_added: None },
                NewEntry { folder_id: 1, path: LibPath::new("A/B/c.png"), date_created: None, date_modified: None, date_added: None },
            ],
        )
        .unwrap();
        (conn, ids)
    }

    #[test]
    fn path_glob_lowercase_matches_case_insensitively() {
        let (conn, ids) = path_fixture();
        let mut expected = vec![ids[0], ids[1]];
        expected.sort_unstable();
        assert_eq!(matching_ids(&conn, "path:\"*c.png\""), expected);
    }

    #[test]
    fn path_glob_mixed_case_matches_case_sensitively() {
        let (conn, ids) = path_fixture();
        assert_eq!(matching_ids(&conn, "path:\"*/B/c.png\""), vec![ids[1]]);
    }

    #[test]
    fn path_no_glob_lowercase_matches_case_insensitively() {
        let (conn, ids) = path_fixture();
        let mut expected = vec![ids[0], ids[1]];
        expected.sort_unstable();
        assert_eq!(matching_ids(&conn, "path:\"a/b/c.png\""), expected);
    }

    #[test]
    fn path_no_glob_mixed_case_matches_case_sensitively() {
        let (conn, ids) = path_fixture();
        assert_eq!(matching_ids(&conn, "path:\"A/B/c.png\""), vec![ids[1]]);
    }

    #[test]
    fn not_negates_child_expression() {
        let mut conn = fresh_conn();
        let ids = entries::add_entries(
            &mut conn,
            &[NewEntry { folder_id: 1, path: LibPath::new("a.jpg"), date_created: None, date_modified: None, date_added: None }],
        )
        .unwrap();

        assert_eq!(matching_ids(&conn, "NOT special:untagged"), Vec::<i64>::new());
        let _ = ids;
    }
}
