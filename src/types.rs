//! Common types shared across the crate
//!
//! Defines the item/attribute data model, query descriptors, the page
//! request/response shapes, and the `PageSource` trait that abstracts the
//! underlying store's query/scan RPC.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single attribute value as returned by the store.
///
/// Items are flat: values are never nested maps or lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// UTF-8 string
    S(String),
    /// Raw bytes
    B(Bytes),
    /// Number, kept in the store's decimal string form
    N(String),
    /// Boolean
    Bool(bool),
    /// Null marker
    Null,
}

impl AttributeValue {
    /// Create a string attribute
    pub fn s(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    /// Create a binary attribute
    pub fn b(value: impl Into<Bytes>) -> Self {
        Self::B(value.into())
    }

    /// Create a number attribute
    pub fn n(value: impl ToString) -> Self {
        Self::N(value.to_string())
    }

    /// Get the string value, if this is a string attribute
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Get the binary value, if this is a binary attribute
    pub fn as_b(&self) -> Option<&Bytes> {
        match self {
            Self::B(b) => Some(b),
            _ => None,
        }
    }
}

/// A stored item: flat mapping of attribute name to value
pub type Item = HashMap<String, AttributeValue>;

/// A key attribute value: string or binary, nothing else.
///
/// The string/binary distinction is preserved exactly through the token
/// round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyValue {
    /// UTF-8 string key part
    S(String),
    /// Binary key part
    B(Bytes),
}

impl KeyValue {
    /// Create a string key value
    pub fn s(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    /// Create a binary key value
    pub fn b(value: impl Into<Bytes>) -> Self {
        Self::B(value.into())
    }

    /// The raw bytes of this key value
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::S(s) => s.as_bytes(),
            Self::B(b) => b,
        }
    }
}

impl TryFrom<&AttributeValue> for KeyValue {
    type Error = Error;

    fn try_from(value: &AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::S(s) => Ok(Self::S(s.clone())),
            AttributeValue::B(b) => Ok(Self::B(b.clone())),
            other => Err(Error::encoding(format!(
                "key attributes must be string or binary, got {other:?}"
            ))),
        }
    }
}

impl From<KeyValue> for AttributeValue {
    fn from(value: KeyValue) -> Self {
        match value {
            KeyValue::S(s) => Self::S(s),
            KeyValue::B(b) => Self::B(b),
        }
    }
}

/// A structured continuation key: attribute name to string-or-binary value.
///
/// Absent attributes are simply not present in the map.
pub type Key = HashMap<String, KeyValue>;

/// The store operation a pager drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Key-condition range query
    Query,
    /// Full or segmented table scan
    Scan,
}

/// One shard of a parallel scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentId {
    /// Zero-based segment index
    pub index: u32,
    /// Total number of segments in the scan
    pub total: u32,
}

/// Describes a query or scan to run against the store.
///
/// This crate does not validate the descriptor against store constraints;
/// it is handed to the `PageSource` as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Target table name
    pub table: String,
    /// Key condition expression (queries only)
    pub key_condition: Option<String>,
    /// Server-side filter expression, applied by the store before paging
    pub filter_expression: Option<String>,
    /// Placeholder values referenced by the expressions
    pub expression_values: HashMap<String, AttributeValue>,
    /// Placeholder attribute names referenced by the expressions
    pub expression_names: HashMap<String, String>,
    /// Secondary index to run against, if any
    pub index_name: Option<String>,
    /// Store-side page size (items per request), not the caller-facing limit
    pub page_size: Option<u32>,
    /// Explicit starting key, seeded directly into the pager
    pub start_key: Option<Key>,
}

impl QueryDescriptor {
    /// Create a descriptor for the given table
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Set the key condition expression
    #[must_use]
    pub fn with_key_condition(mut self, expression: impl Into<String>) -> Self {
        self.key_condition = Some(expression.into());
        self
    }

    /// Set a server-side filter expression
    #[must_use]
    pub fn with_filter_expression(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self
    }

    /// Bind an expression placeholder value
    #[must_use]
    pub fn with_value(mut self, placeholder: impl Into<String>, value: AttributeValue) -> Self {
        self.expression_values.insert(placeholder.into(), value);
        self
    }

    /// Bind an expression placeholder attribute name
    #[must_use]
    pub fn with_name(mut self, placeholder: impl Into<String>, name: impl Into<String>) -> Self {
        self.expression_names.insert(placeholder.into(), name.into());
        self
    }

    /// Target a secondary index
    #[must_use]
    pub fn with_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Set the store-side page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// One page request handed to the store
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Query or scan
    pub operation: Operation,
    /// The immutable descriptor the pager was built with
    pub descriptor: QueryDescriptor,
    /// Resume position, exclusive
    pub exclusive_start_key: Option<Key>,
    /// Segment coordinates for parallel scans
    pub segment: Option<SegmentId>,
}

/// One page of results returned by the store
#[derive(Debug, Clone, Default)]
pub struct PageResponse {
    /// Items in store order
    pub items: Vec<Item>,
    /// The store's own continuation key, absent when the page is the last
    pub last_evaluated_key: Option<Key>,
    /// Items the store examined to produce this page
    pub scanned_count: Option<u64>,
    /// Capacity units consumed by this request
    pub consumed_capacity: Option<f64>,
}

/// The underlying store's paged query/scan operation.
///
/// Consumed as a black box: implementations own credential wiring, transport,
/// and transient-fault handling. Failures propagate verbatim; this crate
/// never retries.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page of results
    async fn fetch_page(&self, request: PageRequest) -> Result<PageResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_key_value_from_attribute() {
        let s = KeyValue::try_from(&AttributeValue::s("hello")).unwrap();
        assert_eq!(s, KeyValue::s("hello"));

        let b = KeyValue::try_from(&AttributeValue::b(vec![1u8, 2, 3])).unwrap();
        assert_eq!(b, KeyValue::b(vec![1u8, 2, 3]));

        let err = KeyValue::try_from(&AttributeValue::n(42)).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_descriptor_serde_round_trip() {
        let descriptor = QueryDescriptor::new("orders")
            .with_filter_expression("attribute_exists(#status)")
            .with_name("#status", "status")
            .with_value(":v", AttributeValue::b(vec![0xde_u8, 0xad]));

        let json = serde_json::to_string(&descriptor).unwrap();
        let back: QueryDescriptor = serde_json::from_str(&json).unwrap();

        assert_eq!(back.table, "orders");
        assert_eq!(
            back.filter_expression.as_deref(),
            Some("attribute_exists(#status)")
        );
        assert_eq!(
            back.expression_values.get(":v"),
            Some(&AttributeValue::b(vec![0xde_u8, 0xad]))
        );
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = QueryDescriptor::new("orders")
            .with_key_condition("#pk = :pk")
            .with_name("#pk", "PK")
            .with_value(":pk", AttributeValue::s("customer#42"))
            .with_index("status.by-date")
            .with_page_size(25);

        assert_eq!(descriptor.table, "orders");
        assert_eq!(descriptor.index_name.as_deref(), Some("status.by-date"));
        assert_eq!(descriptor.page_size, Some(25));
        assert_eq!(
            descriptor.expression_values.get(":pk"),
            Some(&AttributeValue::s("customer#42"))
        );
    }
}
