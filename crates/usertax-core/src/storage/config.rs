//! Storage configuration.

use std::path::PathBuf;

use crate::scope::ObjectScope;

/// Base name of the native content relationship table.
const NATIVE_RELATIONSHIPS: &str = "term_relationships";

/// Base name of the user relationship table.
const USER_RELATIONSHIPS: &str = "user_term_relationships";

/// Naming of the scope-specific relationship tables.
///
/// Tables are named `{base_prefix}{blog_prefix}{table}`, where the blog prefix
/// is empty for the main blog and `"{blog_id}_"` for every other blog of a
/// multi-site installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Installation-wide table prefix.
    pub base_prefix: String,

    /// Blog the tables belong to (1 is the main blog).
    pub blog_id: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            base_prefix: "wp_".to_string(),
            blog_id: 1,
        }
    }
}

impl TableConfig {
    /// Create a table configuration.
    pub fn new(base_prefix: impl Into<String>, blog_id: u64) -> Self {
        Self {
            base_prefix: base_prefix.into(),
            blog_id,
        }
    }

    /// Prefix inserted between the base prefix and the table name.
    pub fn blog_prefix(&self) -> String {
        if self.blog_id > 1 {
            format!("{}_", self.blog_id)
        } else {
            String::new()
        }
    }

    /// Name of the relationship table serving the given scope.
    pub fn relationship_table(&self, scope: ObjectScope) -> String {
        let table = match scope {
            ObjectScope::Post => NATIVE_RELATIONSHIPS,
            ObjectScope::User => USER_RELATIONSHIPS,
        };
        format!("{}{}{}", self.base_prefix, self.blog_prefix(), table)
    }
}

/// Configuration for the storage engine.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the database directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush on every write.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,

    /// Relationship table naming.
    pub tables: TableConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./usertax_data"),
            cache_capacity: 256 * 1024 * 1024, // 256MB
            flush_every_ms: Some(1000),
            compression: true,
            temporary: false,
            tables: TableConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary in-memory configuration for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::from(""),
            temporary: true,
            ..Default::default()
        }
    }

    /// Set the relationship table naming.
    pub fn with_tables(mut self, tables: TableConfig) -> Self {
        self.tables = tables;
        self
    }

    /// Set the page cache capacity.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Convert to sled configuration.
    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        if let Some(ms) = self.flush_every_ms {
            config = config.flush_every_ms(Some(ms));
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_blog_table_names() {
        let tables = TableConfig::default();
        assert_eq!(
            tables.relationship_table(ObjectScope::Post),
            "wp_term_relationships"
        );
        assert_eq!(
            tables.relationship_table(ObjectScope::User),
            "wp_user_term_relationships"
        );
    }

    #[test]
    fn test_multisite_table_names() {
        let tables = TableConfig::new("site_", 3);
        assert_eq!(tables.blog_prefix(), "3_");
        assert_eq!(
            tables.relationship_table(ObjectScope::User),
            "site_3_user_term_relationships"
        );
    }
}
