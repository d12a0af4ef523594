//! Key schema configuration
//!
//! Names the partition and (optional) sort attributes of the base table and
//! of secondary indexes. Resolution beyond a pluggable name mapping is out
//! of scope: the resolver is a plain closure, not a catalog lookup.

use std::sync::Arc;

/// The attribute names making up a two-part primary key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Partition key attribute name
    pub partition: String,
    /// Sort key attribute name, if the table/index has one
    pub sort: Option<String>,
}

impl KeySchema {
    /// Create a schema with partition and sort attributes
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }

    /// Create a partition-only schema
    pub fn partition_only(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    /// The attribute names in partition-then-sort order
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition.as_str()).chain(self.sort.as_deref())
    }
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::new("PK", "SK")
    }
}

/// Maps an index name to the key pair that index projects
pub type IndexKeyResolver = Arc<dyn Fn(&str) -> KeySchema + Send + Sync>;

/// The default index resolver: `<Prefix>PK` / `<Prefix>SK`, where the
/// prefix is the index name up to the first `.`.
///
/// `status.by-date` resolves to `statusPK` / `statusSK`.
pub fn default_index_resolver() -> IndexKeyResolver {
    Arc::new(|index_name: &str| {
        let prefix = index_name.split('.').next().unwrap_or(index_name);
        KeySchema::new(format!("{prefix}PK"), format!("{prefix}SK"))
    })
}
