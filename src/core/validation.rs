//! Validation for database and collection names
//!
//! Names end up in file paths (`{directory}/{database}.ns`) and in catalog
//! lookups, so they are checked before any file is touched.

use crate::error::{ReaderError, Result};
use regex::Regex;

/// A database name
///
/// # Rules
/// - 1 to 64 bytes
/// - None of `/ \ . " $ * < > : | ?` and no spaces
///
/// # Examples
///
/// ```
/// use extent_reader::core::validation::DatabaseName;
///
/// assert!(DatabaseName::new("deepmr_test").is_ok());
/// assert!(DatabaseName::new("my.db").is_err());
/// assert!(DatabaseName::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseName(String);

impl DatabaseName {
    const PATTERN: &'static str = r#"^[^/\\. "$*<>:|?]+$"#;

    pub const MAX_LENGTH: usize = 64;

    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(DatabaseName(name))
    }

    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(ReaderError::InvalidDatabaseName(
                "database name cannot be empty".to_string(),
            ));
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(ReaderError::InvalidDatabaseName(format!(
                "database name too long (max {} bytes)",
                Self::MAX_LENGTH
            )));
        }

        let re = Regex::new(Self::PATTERN)
            .map_err(|e| ReaderError::InvalidDatabaseName(e.to_string()))?;
        if !re.is_match(name) {
            return Err(ReaderError::InvalidDatabaseName(format!(
                "database name '{}' contains a reserved character",
                name
            )));
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for DatabaseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A collection name, without the database prefix
///
/// Must be non-empty and contain neither `$` nor NUL. Dots are allowed
/// (`system.indexes`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionName(String);

impl CollectionName {
    const PATTERN: &'static str = r"^[^$\x00]+$";

    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(CollectionName(name))
    }

    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(ReaderError::InvalidCollectionName(
                "collection name cannot be empty".to_string(),
            ));
        }

        let re = Regex::new(Self::PATTERN)
            .map_err(|e| ReaderError::InvalidCollectionName(e.to_string()))?;
        if !re.is_match(name) {
            return Err(ReaderError::InvalidCollectionName(format!(
                "collection name '{}' cannot contain '$' or NUL",
                name.escape_default()
            )));
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Catalog key for this collection in `database`
    pub fn qualified(&self, database: &DatabaseName) -> String {
        format!("{}.{}", database, self.0)
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
