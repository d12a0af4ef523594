//! Pagination engine
//!
//! The per-query iterator that issues page requests, tracks position,
//! applies filters, enforces limits, supports lookahead, and exposes
//! resumption through opaque tokens.
//!
//! # Overview
//!
//! A `Pager` tracks two continuation pointers: the key derived from the last
//! item it handed out, and the continuation key the store itself returned.
//! While the buffer still holds items, the locally derived key is the truth;
//! once the buffer drains, the store's key wins, because a server-side
//! filter expression can make the store's position sit past the last item it
//! returned. `next_token` seals whichever pointer is current.
//!
//! Fetching is demand-driven: at most one page request is ever outstanding,
//! issued only when a pull finds the buffer empty. `peek` shares the same
//! buffer, so lookahead never duplicates a request.

mod types;

pub use types::FilterPredicate;
pub(crate) use types::{PagerOptions, PagerShared};

use crate::cipher;
use crate::codec;
use crate::error::{Error, Result};
use crate::types::{Item, Key, KeyValue, PageRequest, PageResponse};
use futures::Stream;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a synchronous drain pass produced
pub(crate) enum Step {
    /// A qualifying item
    Item(Item),
    /// Buffer is empty and the store has more pages
    Fetch,
    /// Limit reached, or store exhausted and buffer drained
    Finished,
}

/// Per-instance consumption state
#[derive(Debug, Default)]
struct PagerState {
    /// Unconsumed items from the last page, front is next
    buffer: VecDeque<Item>,
    /// Locally tracked resumption pointer
    next_key: Option<Key>,
    /// The store's own continuation key from the last page
    store_key: Option<Key>,
    /// Store signaled exhaustion
    done: bool,
    /// From-token decoded and sub-keys resolved
    prepared: bool,
    /// Qualifying items yielded
    count: u64,
    /// Page requests completed
    request_count: u64,
    /// Items the store examined
    scanned_count: u64,
    /// Capacity units consumed
    consumed_capacity: f64,
}

/// Resumable, filtered, limit-aware iteration over one query or scan.
///
/// Created by [`Paginator::query`](crate::Paginator::query) and
/// [`Paginator::scan`](crate::Paginator::scan). Configuration methods
/// return a new pager with fresh consumption state; the receiver is never
/// mutated.
#[derive(Debug)]
pub struct Pager {
    shared: Arc<PagerShared>,
    options: PagerOptions,
    state: PagerState,
}

impl Pager {
    pub(crate) fn new(shared: Arc<PagerShared>, options: PagerOptions) -> Self {
        // Internally constructed segment engines carry their decoded
        // starting key in the descriptor; seed the pointer directly.
        let state = PagerState {
            next_key: shared.descriptor.start_key.clone(),
            ..PagerState::default()
        };
        Self {
            shared,
            options,
            state,
        }
    }

    // ============================================================================
    // Fluent configuration (copy-on-configure)
    // ============================================================================

    /// A sibling pager yielding at most `limit` qualifying items
    #[must_use]
    pub fn limit(&self, limit: u64) -> Self {
        self.configured(PagerOptions {
            limit: Some(limit),
            ..self.options.clone()
        })
    }

    /// A sibling pager resuming from an opaque continuation token
    #[must_use]
    pub fn start_from(&self, token: impl Into<String>) -> Self {
        self.configured(PagerOptions {
            from: Some(token.into()),
            ..self.options.clone()
        })
    }

    /// A sibling pager applying a client-side item predicate.
    ///
    /// Items failing the predicate are dropped silently; when a limit is
    /// also set, the pager keeps fetching pages until the limit is met or
    /// the store is exhausted, so filtering never under-returns.
    #[must_use]
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.configured(PagerOptions {
            filter: Some(Arc::new(predicate)),
            ..self.options.clone()
        })
    }

    /// A sibling pager binding tokens to the given associated data.
    ///
    /// Tokens sealed under one context fail to open under another.
    #[must_use]
    pub fn context(&self, aad: impl AsRef<[u8]>) -> Self {
        self.configured(PagerOptions {
            context: aad.as_ref().to_vec(),
            ..self.options.clone()
        })
    }

    fn configured(&self, options: PagerOptions) -> Self {
        Self::new(self.shared.clone(), options)
    }

    // ============================================================================
    // Iteration
    // ============================================================================

    /// Pull the next qualifying item, fetching pages as needed.
    ///
    /// Returns `Ok(None)` once the limit is reached or the store is
    /// exhausted. A failed page fetch leaves the pager untouched, so
    /// retrying the same pull is safe.
    pub async fn next_item(&mut self) -> Result<Option<Item>> {
        self.prepare().await?;
        loop {
            match self.drain_step()? {
                Step::Item(item) => return Ok(Some(item)),
                Step::Finished => return Ok(None),
                Step::Fetch => {
                    let request = self.page_request();
                    debug!(
                        table = %self.shared.descriptor.table,
                        requests = self.state.request_count,
                        "fetching page"
                    );
                    let page = self.shared.store.fetch_page(request).await?;
                    self.absorb_page(page);
                }
            }
        }
    }

    /// Return the next qualifying item without consuming it.
    ///
    /// Idempotent: repeated peeks return the same item and issue no request
    /// beyond the one that filled the buffer. Returns `None` when exhausted
    /// or the limit is already reached.
    pub async fn peek(&mut self) -> Result<Option<Item>> {
        match self.next_item().await? {
            Some(item) => {
                self.state.count -= 1;
                self.state.buffer.push_front(item.clone());
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// Drain every remaining qualifying item into a vector.
    ///
    /// Without a limit this buffers the store's entire remaining result
    /// set; set one unless the query is known to be small.
    pub async fn all(&mut self) -> Result<Vec<Item>> {
        if self.options.limit.is_none() {
            warn!(
                table = %self.shared.descriptor.table,
                "draining a pager with no limit buffers the entire result set"
            );
        }
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Adapt this pager into a `futures` stream.
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Item>> {
        futures::stream::unfold((self, false), |(mut pager, failed)| async move {
            if failed {
                return None;
            }
            match pager.next_item().await {
                Ok(Some(item)) => Some((Ok(item), (pager, false))),
                Ok(None) => None,
                Err(err) => Some((Err(err), (pager, true))),
            }
        })
    }

    // ============================================================================
    // Read accessors
    // ============================================================================

    /// Seal the current resumption pointer into an opaque token.
    ///
    /// `Ok(None)` when no pointer is set. Fails with a state error when
    /// called before any pull resolved the sub-keys.
    pub fn next_token(&self) -> Result<Option<String>> {
        let Some(key) = &self.state.next_key else {
            return Ok(None);
        };
        let keys = self
            .shared
            .keys
            .resolved()
            .ok_or_else(|| Error::state("next_token read before any page was fetched"))?;
        let bytes = codec::flatten(key)?;
        Ok(Some(cipher::seal(&bytes, keys, &self.options.context)))
    }

    /// True once the store signaled exhaustion and the buffer is drained.
    ///
    /// Distinguishes "no more pages" from "still holding unconsumed items".
    pub fn finished(&self) -> bool {
        self.state.done && self.state.buffer.is_empty()
    }

    /// Qualifying items yielded so far
    pub fn count(&self) -> u64 {
        self.state.count
    }

    /// Page requests completed so far
    pub fn request_count(&self) -> u64 {
        self.state.request_count
    }

    /// Items the store examined so far
    pub fn scanned_count(&self) -> u64 {
        self.state.scanned_count
    }

    /// Capacity units consumed so far
    pub fn consumed_capacity(&self) -> f64 {
        self.state.consumed_capacity
    }

    // ============================================================================
    // Internals (shared with the parallel coordinator)
    // ============================================================================

    /// Resolve sub-keys and decode the from-token, once
    pub(crate) async fn prepare(&mut self) -> Result<()> {
        if self.state.prepared {
            return Ok(());
        }
        let keys = self.shared.keys.sub_keys().await?;
        if let Some(token) = &self.options.from {
            let plaintext = cipher::open(token, keys, &self.options.context)?;
            let key = codec::unflatten(&plaintext).map_err(|_| Error::Token)?;
            debug!(table = %self.shared.descriptor.table, "resuming from token");
            self.state.next_key = Some(key);
        }
        self.state.prepared = true;
        Ok(())
    }

    /// Synchronous drain pass: limit check, pop, pointer maintenance,
    /// filter. Never fetches.
    pub(crate) fn drain_step(&mut self) -> Result<Step> {
        loop {
            if let Some(limit) = self.options.limit {
                if self.state.count >= limit {
                    return Ok(Step::Finished);
                }
            }

            let Some(item) = self.state.buffer.pop_front() else {
                if self.state.done {
                    return Ok(Step::Finished);
                }
                return Ok(Step::Fetch);
            };

            if self.state.buffer.is_empty() && self.state.store_key.is_some() {
                // Once the buffer drains the store's continuation key is
                // authoritative: a server-side filter may have advanced it
                // past the last item the page contained.
                self.state.next_key = self.state.store_key.clone();
            } else {
                self.state.next_key = Some(self.item_key(&item)?);
            }

            if let Some(filter) = &self.options.filter {
                if !filter(&item) {
                    continue;
                }
            }

            self.state.count += 1;
            return Ok(Step::Item(item));
        }
    }

    /// The page request a drained pager would issue next
    pub(crate) fn page_request(&self) -> PageRequest {
        PageRequest {
            operation: self.shared.operation,
            descriptor: self.shared.descriptor.clone(),
            exclusive_start_key: self.state.next_key.clone(),
            segment: self.shared.segment,
        }
    }

    /// Fold a fetched page into counters, buffer, and continuation state
    pub(crate) fn absorb_page(&mut self, page: PageResponse) {
        self.state.request_count += 1;
        self.state.scanned_count += page.scanned_count.unwrap_or(page.items.len() as u64);
        self.state.consumed_capacity += page.consumed_capacity.unwrap_or(0.0);
        self.state.done = page.last_evaluated_key.is_none();
        self.state.store_key = page.last_evaluated_key;
        self.state.buffer.extend(page.items);
        // A server-side filter expression can reject a whole page: zero
        // items, but a continuation key. The pointer must advance anyway
        // or the next request would repeat this one verbatim.
        if self.state.buffer.is_empty() && self.state.store_key.is_some() {
            self.state.next_key = self.state.store_key.clone();
        }
    }

    /// The current resumption pointer
    pub(crate) fn pointer(&self) -> Option<&Key> {
        self.state.next_key.as_ref()
    }

    /// Derive a resumption key from an item's key attributes.
    ///
    /// Uses the base schema merged with the index schema when the query
    /// targets a secondary index, so both the index position and the base
    /// table key survive resumption.
    fn item_key(&self, item: &Item) -> Result<Key> {
        let index_attrs = self
            .shared
            .index_schema
            .iter()
            .flat_map(|schema| schema.attributes());
        let mut key = Key::new();
        for name in self.shared.base_schema.attributes().chain(index_attrs) {
            if let Some(value) = item.get(name) {
                key.insert(name.to_string(), KeyValue::try_from(value)?);
            }
        }
        Ok(key)
    }
}
