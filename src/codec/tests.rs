//! Tests for the key codec

use super::*;
use pretty_assertions::assert_eq;

fn string_key(pairs: &[(&str, &str)]) -> Key {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), KeyValue::s(*value)))
        .collect()
}

// ============================================================================
// Flatten Tests
// ============================================================================

#[test]
fn test_flatten_single_string_attribute() {
    let key = string_key(&[("PK", "hello")]);
    let bytes = flatten(&key).unwrap();

    // tag + name len + "PK" + be16 value len + "hello"
    assert_eq!(bytes.len(), 1 + 1 + 2 + 2 + 5);
    assert_eq!(bytes[0], b'S');
    assert_eq!(bytes[1], 2);
    assert_eq!(&bytes[2..4], b"PK");
    assert_eq!(&bytes[4..6], &[0, 5]);
    assert_eq!(&bytes[6..], b"hello");
}

#[test]
fn test_flatten_binary_attribute_tagged() {
    let mut key = Key::new();
    key.insert("PK".to_string(), KeyValue::b(vec![0u8, 1, 2, 255]));
    let bytes = flatten(&key).unwrap();

    assert_eq!(bytes[0], b'B');
    assert_eq!(&bytes[6..], &[0u8, 1, 2, 255]);
}

#[test]
fn test_flatten_two_attributes_length() {
    let key = string_key(&[("PK", "hello"), ("SK", "world")]);
    let bytes = flatten(&key).unwrap();
    assert_eq!(bytes.len(), 22);
}

#[test]
fn test_flatten_empty_key() {
    let bytes = flatten(&Key::new()).unwrap();
    assert!(bytes.is_empty());
}

#[test]
fn test_flatten_name_too_long() {
    let key = string_key(&[(&"a".repeat(256), "v")]);
    let err = flatten(&key).unwrap_err();
    assert!(matches!(err, Error::Encoding { .. }));
}

#[test]
fn test_flatten_name_at_limit() {
    let key = string_key(&[(&"a".repeat(255), "v")]);
    assert!(flatten(&key).is_ok());
}

#[test]
fn test_flatten_value_too_long() {
    let key = string_key(&[("PK", &"v".repeat(65536))]);
    let err = flatten(&key).unwrap_err();
    assert!(matches!(err, Error::Encoding { .. }));
}

#[test]
fn test_flatten_value_at_limit() {
    let key = string_key(&[("PK", &"v".repeat(65535))]);
    assert!(flatten(&key).is_ok());
}

// ============================================================================
// Round-trip Tests
// ============================================================================

#[test]
fn test_round_trip_strings() {
    let key = string_key(&[("PK", "customer#42"), ("SK", "order#2026-08-27")]);
    let decoded = unflatten(&flatten(&key).unwrap()).unwrap();
    assert_eq!(decoded, key);
}

#[test]
fn test_round_trip_mixed_types() {
    let mut key = Key::new();
    key.insert("PK".to_string(), KeyValue::s("user#1"));
    key.insert("SK".to_string(), KeyValue::b(vec![0u8, 159, 146, 150]));

    let decoded = unflatten(&flatten(&key).unwrap()).unwrap();
    assert_eq!(decoded, key);
    assert!(matches!(decoded.get("SK"), Some(KeyValue::B(_))));
}

#[test]
fn test_round_trip_preserves_binary_vs_string() {
    // Same raw bytes, different tags: must not collapse into one type.
    let mut key = Key::new();
    key.insert("A".to_string(), KeyValue::s("data"));
    key.insert("B".to_string(), KeyValue::b(&b"data"[..]));

    let decoded = unflatten(&flatten(&key).unwrap()).unwrap();
    assert_eq!(decoded.get("A"), Some(&KeyValue::s("data")));
    assert_eq!(decoded.get("B"), Some(&KeyValue::b(&b"data"[..])));
}

#[test]
fn test_round_trip_unicode() {
    let key = string_key(&[("PK", "café ☕"), ("SK", "naïve")]);
    let decoded = unflatten(&flatten(&key).unwrap()).unwrap();
    assert_eq!(decoded, key);
}

#[test]
fn test_round_trip_empty_value() {
    let key = string_key(&[("PK", "")]);
    let decoded = unflatten(&flatten(&key).unwrap()).unwrap();
    assert_eq!(decoded, key);
}

// ============================================================================
// Unflatten Failure Tests
// ============================================================================

#[test]
fn test_unflatten_truncated_input() {
    let key = string_key(&[("PK", "hello")]);
    let bytes = flatten(&key).unwrap();

    for end in 1..bytes.len() {
        let err = unflatten(&bytes[..end]).unwrap_err();
        assert!(matches!(err, Error::Decoding { .. }), "prefix len {end}");
    }
}

#[test]
fn test_unflatten_unknown_tag() {
    let err = unflatten(&[b'X', 1, b'a', 0, 0]).unwrap_err();
    assert!(matches!(err, Error::Decoding { .. }));
}

#[test]
fn test_unflatten_invalid_utf8_name() {
    let err = unflatten(&[b'S', 1, 0xff, 0, 0]).unwrap_err();
    assert!(matches!(err, Error::Decoding { .. }));
}

#[test]
fn test_unflatten_invalid_utf8_string_value() {
    let err = unflatten(&[b'S', 1, b'a', 0, 1, 0xff]).unwrap_err();
    assert!(matches!(err, Error::Decoding { .. }));
}

#[test]
fn test_unflatten_binary_value_accepts_any_bytes() {
    let key = unflatten(&[b'B', 1, b'a', 0, 1, 0xff]).unwrap();
    assert_eq!(key.get("a"), Some(&KeyValue::b(vec![0xffu8])));
}

#[test]
fn test_unflatten_empty_input() {
    assert_eq!(unflatten(&[]).unwrap(), Key::new());
}
