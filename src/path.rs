//! Normalized, OS-independent relative path value type.
//!
//! Stored as forward-slash text; comparisons are byte-exact on that form.
//! Callers on case-insensitive filesystems are responsible for their own
//! case normalization before constructing a `LibPath`.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LibPath(String);

impl LibPath {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().replace('\\', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }

    /// Last path segment, matching `Entry.filename`.
    pub fn filename(&self) -> String {
        Path::new(&self.0)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercased extension without the leading dot, matching `Entry.suffix`.
    pub fn suffix(&self) -> String {
        Path::new(&self.0)
            .extension()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

impl fmt::Display for LibPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LibPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LibPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl ToSql for LibPath {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for LibPath {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(LibPath::new).map_err(|_| FromSqlError::InvalidType)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_backslashes() {
        assert_eq!(LibPath::new("a\\b\\c.png").as_str(), "a/b/c.png");
    }

    #[test]
    fn derives_filename_and_suffix() {
        let p = LibPath::new("photos/a/B.JPG");
        assert_eq!(p.filename(), "B.JPG");
        assert_eq!(p.suffix(), "jpg");
    }

    #[test]
    fn suffix_empty_when_no_extension() {
        assert_eq!(LibPath::new("README").suffix(), "");
    }
}
