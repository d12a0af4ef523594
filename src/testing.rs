//! In-memory store used by unit tests

use crate::error::{Error, Result};
use crate::types::{
    AttributeValue, Item, Key, KeyValue, PageRequest, PageResponse, PageSource,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A `PageSource` over a fixed vector of items, paged by position.
///
/// Segmented requests see every `total`-th item starting at the segment
/// index, which partitions the table with no overlap.
pub(crate) struct MemoryStore {
    items: Vec<Item>,
    page_size: usize,
    key_attrs: Vec<String>,
    fail_requests: Vec<u64>,
    requests: AtomicU64,
}

impl MemoryStore {
    pub fn new(items: Vec<Item>, page_size: usize) -> Self {
        Self {
            items,
            page_size,
            key_attrs: vec!["PK".to_string(), "SK".to_string()],
            fail_requests: Vec::new(),
            requests: AtomicU64::new(0),
        }
    }

    /// Continuation keys will carry these attributes
    pub fn with_key_attrs(mut self, attrs: &[&str]) -> Self {
        self.key_attrs = attrs.iter().map(|a| (*a).to_string()).collect();
        self
    }

    /// Fail the nth request (1-based) with a store error
    pub fn fail_on(mut self, ordinal: u64) -> Self {
        self.fail_requests.push(ordinal);
        self
    }

    /// Total requests served (including failed ones)
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    fn continuation_key(&self, item: &Item) -> Key {
        self.key_attrs
            .iter()
            .filter_map(|name| {
                item.get(name)
                    .and_then(|value| KeyValue::try_from(value).ok())
                    .map(|value| (name.clone(), value))
            })
            .collect()
    }

    fn matches(&self, item: &Item, key: &Key) -> bool {
        key.iter().all(|(name, expected)| {
            item.get(name)
                .and_then(|value| KeyValue::try_from(value).ok())
                .is_some_and(|value| &value == expected)
        })
    }
}

#[async_trait]
impl PageSource for MemoryStore {
    async fn fetch_page(&self, request: PageRequest) -> Result<PageResponse> {
        let ordinal = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_requests.contains(&ordinal) {
            return Err(Error::store("injected store failure"));
        }

        let selected: Vec<&Item> = match request.segment {
            Some(segment) => self
                .items
                .iter()
                .enumerate()
                .filter(|(position, _)| (*position as u32) % segment.total == segment.index)
                .map(|(_, item)| item)
                .collect(),
            None => self.items.iter().collect(),
        };

        let start = match &request.exclusive_start_key {
            Some(key) => selected
                .iter()
                .position(|item| self.matches(item, key))
                .map_or(selected.len(), |position| position + 1),
            None => 0,
        };
        let page_size = request
            .descriptor
            .page_size
            .map_or(self.page_size, |size| size as usize);
        let end = (start + page_size).min(selected.len());

        let items: Vec<Item> = selected[start..end].iter().map(|item| (*item).clone()).collect();
        let last_evaluated_key = if end < selected.len() {
            items.last().map(|item| self.continuation_key(item))
        } else {
            None
        };

        Ok(PageResponse {
            scanned_count: Some(items.len() as u64),
            consumed_capacity: Some(0.5),
            items,
            last_evaluated_key,
        })
    }
}

/// A `PageSource` replaying a fixed script of page responses in call
/// order, recording the exclusive start key of every request it serves.
pub(crate) struct ScriptedStore {
    pages: Mutex<VecDeque<PageResponse>>,
    start_keys: Mutex<Vec<Option<Key>>>,
}

impl ScriptedStore {
    pub fn new(pages: Vec<PageResponse>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            start_keys: Mutex::new(Vec::new()),
        }
    }

    /// Exclusive start keys of the requests served so far
    pub fn start_keys(&self) -> Vec<Option<Key>> {
        self.start_keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for ScriptedStore {
    async fn fetch_page(&self, request: PageRequest) -> Result<PageResponse> {
        self.start_keys
            .lock()
            .unwrap()
            .push(request.exclusive_start_key);
        let page = self.pages.lock().unwrap().pop_front();
        page.ok_or_else(|| Error::store("page script exhausted"))
    }
}

/// A test item with `PK`, `SK`, and a numeric `value` attribute
pub(crate) fn item(pk: &str, sk: &str, value: i64) -> Item {
    let mut item = Item::new();
    item.insert("PK".to_string(), AttributeValue::s(pk));
    item.insert("SK".to_string(), AttributeValue::s(sk));
    item.insert("value".to_string(), AttributeValue::n(value));
    item
}

/// `count` items under one partition, sort keys `item#0000` onward
pub(crate) fn items(count: usize) -> Vec<Item> {
    (0..count)
        .map(|position| item("user#1", &format!("item#{position:04}"), position as i64))
        .collect()
}

/// The numeric `value` attribute of an item
pub(crate) fn value_of(item: &Item) -> i64 {
    match item.get("value") {
        Some(AttributeValue::N(n)) => n.parse().unwrap(),
        other => panic!("missing numeric value attribute: {other:?}"),
    }
}
