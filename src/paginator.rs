//! Paginator factory
//!
//! Binds a secret (or lazy secret provider) and a store handle once, then
//! produces query, scan, and parallel-scan pagers that all share the same
//! memoized sub-keys and schema configuration.

use crate::cipher::{KeyCache, Secret};
use crate::engine::{Pager, PagerOptions, PagerShared};
use crate::error::Result;
use crate::parallel::ParallelScanner;
use crate::schema::{default_index_resolver, IndexKeyResolver, KeySchema};
use crate::types::{Operation, PageSource, QueryDescriptor};
use std::fmt;
use std::sync::Arc;

/// Entry point for resumable pagination against one store.
///
/// ```rust,ignore
/// use dynapage::{Paginator, QueryDescriptor};
///
/// let pages = Paginator::new(store, "secret passphrase");
/// let mut pager = pages
///     .query(QueryDescriptor::new("orders").with_key_condition("#pk = :pk"))
///     .limit(25)
///     .context(session_id);
///
/// while let Some(order) = pager.next_item().await? {
///     // ...
/// }
/// let token = pager.next_token()?; // hand to the client, opaque
/// ```
pub struct Paginator {
    store: Arc<dyn PageSource>,
    keys: Arc<KeyCache>,
    schema: KeySchema,
    index_resolver: IndexKeyResolver,
}

impl fmt::Debug for Paginator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Paginator {
    /// Bind a store handle and a secret.
    ///
    /// The secret may be raw bytes, a string, or a [`Secret::provider`]
    /// closure resolved lazily on first use.
    pub fn new(store: Arc<dyn PageSource>, secret: impl Into<Secret>) -> Self {
        Self {
            store,
            keys: Arc::new(KeyCache::new(secret.into())),
            schema: KeySchema::default(),
            index_resolver: default_index_resolver(),
        }
    }

    /// Override the base table key schema (default `PK` / `SK`)
    #[must_use]
    pub fn with_schema(mut self, schema: KeySchema) -> Self {
        self.schema = schema;
        self
    }

    /// Override how index names resolve to key pairs.
    ///
    /// The default derives `<Prefix>PK` / `<Prefix>SK` from the index
    /// name's prefix before the first `.`.
    #[must_use]
    pub fn with_index_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str) -> KeySchema + Send + Sync + 'static,
    {
        self.index_resolver = Arc::new(resolver);
        self
    }

    /// A pager driving the store's range-query operation
    pub fn query(&self, descriptor: QueryDescriptor) -> Pager {
        self.pager(descriptor, Operation::Query)
    }

    /// A pager driving the store's scan operation
    pub fn scan(&self, descriptor: QueryDescriptor) -> Pager {
        self.pager(descriptor, Operation::Scan)
    }

    /// A coordinated scan over `segments` independent segments.
    ///
    /// Fails when `segments` is zero or the descriptor targets a secondary
    /// index (parallel scans run against the base table).
    pub fn parallel_scan(
        &self,
        descriptor: QueryDescriptor,
        segments: u32,
    ) -> Result<ParallelScanner> {
        ParallelScanner::new(
            self.store.clone(),
            self.keys.clone(),
            self.schema.clone(),
            descriptor,
            segments,
        )
    }

    fn pager(&self, descriptor: QueryDescriptor, operation: Operation) -> Pager {
        let index_schema = descriptor
            .index_name
            .as_deref()
            .map(|name| (self.index_resolver)(name));
        let shared = PagerShared {
            store: self.store.clone(),
            keys: self.keys.clone(),
            descriptor,
            operation,
            base_schema: self.schema.clone(),
            index_schema,
            segment: None,
        };
        Pager::new(Arc::new(shared), PagerOptions::default())
    }
}
