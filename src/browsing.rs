//! Browsing state: an immutable value object describing one "view" of the
//! library grid (spec §4.8).
//!
//! Grounded on `FilterState`
//! (`original_source/.../alchemy/enums.py`) for the convenience
//! constructors and the "mutators return a new value" shape — `with_*`
//! methods that `dataclasses.replace` the whole struct rather than mutate
//! in place.

use crate::error::LibraryError;
use crate::query::{self, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortingMode {
    DateAdded,
    FileName,
    Path,
    Random,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowsingState {
    page_index: u32,
    sorting_mode: SortingMode,
    ascending: bool,
    random_seed: u32,
    show_hidden_entries: bool,
    query: Option<String>,
    grouping: Option<String>,
}

impl Default for BrowsingState {
    fn default() -> Self {
        Self {
            page_index: 0,
            sorting_mode: SortingMode::DateAdded,
            ascending: true,
            random_seed: 1,
            show_hidden_entries: false,
            query: None,
            grouping: None,
        }
    }
}

impl BrowsingState {
    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn sorting_mode(&self) -> SortingMode {
        self.sorting_mode
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    pub fn random_seed(&self) -> u32 {
        self.random_seed
    }

    pub fn show_hidden_entries(&self) -> bool {
        self.show_hidden_entries
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn grouping(&self) -> Option<&str> {
        self.grouping.as_deref()
    }

    /// Lazily parses `query` into an AST. A missing or unparseable query is
    /// treated by `search_library` as "no filter" (spec §7); callers that
    /// need the parse error itself should call `query::parse` directly.
    pub fn ast(&self) -> Result<Option<Node>, LibraryError> {
        match &self.query {
            Some(q) => query::parse(q),
            None => Ok(None),
        }
    }

    pub fn show_all() -> Self {
        Self::default()
    }

    pub fn from_search_query(query: impl Into<String>) -> Self {
        Self { query: Some(query.into()), ..Self::default() }
    }

    pub fn from_tag_id(tag_id: i64) -> Self {
        Self::from_search_query(format!("tag_id:{tag_id}"))
    }

    pub fn from_tag_name(name: &str) -> Self {
        Self::from_search_query(format!("tag:{name}"))
    }

    pub fn from_path(path: &str) -> Self {
        Self::from_search_query(format!("path:{}", path.trim()))
    }

    pub fn from_mediatype(mediatype: &str) -> Self {
        Self::from_search_query(format!("mediatype:{mediatype}"))
    }

    pub fn from_filetype(filetype: &str) -> Self {
        Self::from_search_query(format!("filetype:{filetype}"))
    }

    pub fn with_page_index(&self, page_index: u32) -> Self {
        Self { page_index, ..self.clone() }
    }

    /// Switching to `Random` refreshes the seed; any other mode preserves
    /// whatever seed is already set (spec §4.8).
    pub fn with_sorting_mode(&self, mode: SortingMode, fresh_random_seed: u32) -> Self {
        let random_seed = if mode == SortingMode::Random { fresh_random_seed } else { self.random_seed };
        Self { sorting_mode: mode, random_seed, ..self.clone() }
    }

    pub fn with_ascending(&self, ascending: bool) -> Self {
        Self { ascending, ..self.clone() }
    }

    pub fn with_show_hidden_entries(&self, show_hidden_entries: bool) -> Self {
        Self { show_hidden_entries, ..self.clone() }
    }

    pub fn with_grouping(&self, grouping: Option<String>) -> Self {
        Self { grouping, ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_all_has_no_query() {
        assert_eq!(BrowsingState::show_all().query(), None);
    }

    #[test]
    fn convenience_constructors_build_expected_query_text() {
        assert_eq!(BrowsingState::from_tag_id(42).query(), Some("tag_id:42"));
        assert_eq!(BrowsingState::from_mediatype("image").query(), Some("mediatype:image"));
    }

    #[test]
    fn switching_to_random_refreshes_seed_otherwise_preserves_it() {
        let state = BrowsingState::show_all().with_sorting_mode(SortingMode::Random, 7);
        assert_eq!(state.random_seed(), 7);
        let state = state.with_ascending(false);
        assert_eq!(state.random_seed(), 7);
    }

    #[test]
    fn mutators_do_not_change_the_original() {
        let original = BrowsingState::show_all();
        let moved = original.with_page_index(3);
        assert_eq!(original.page_index(), 0);
        assert_eq!(moved.page_index(), 3);
    }
}
