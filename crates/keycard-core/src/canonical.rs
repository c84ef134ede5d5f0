//! Canonical JSON encoding for deterministic snapshots.
//!
//! Snapshots are encoded as JSON with deterministic rules (RFC 8785 style):
//! - Object keys sorted by byte comparison
//! - No insignificant whitespace
//! - Minimal string escaping
//! - Integers only (floats are rejected)
//! - Nesting bounded by [`MAX_DEPTH`]
//!
//! The canonical encoding is critical: the fingerprint of a card, and hence
//! every signature over it, is computed from these bytes. The same logical
//! value must produce identical bytes on every platform.
//!
//! **CRITICAL**: This encoding is FROZEN. Changes break all published cards.

use std::fmt::{self, Write as _};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::{CoreError, Result};

/// Identifier of the canonical encoding.
pub const CANONICALIZER_ID: &str = "keycard-json/v1";

/// Maximum nesting depth accepted by the canonicalizer.
pub const MAX_DEPTH: usize = 64;

/// An immutable canonical byte encoding of a structured value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Snapshot(Bytes);

impl Snapshot {
    /// Wrap bytes received from elsewhere (e.g. an imported card).
    ///
    /// The bytes are taken as-is; fingerprints are always computed over
    /// exactly these bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Decode from standard base64.
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| CoreError::Decoding(format!("snapshot base64: {}", e)))?;
        Ok(Self(bytes.into()))
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot({} bytes)", self.0.len())
    }
}

impl AsRef<[u8]> for Snapshot {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Canonicalize any serializable value into a snapshot.
///
/// Fails with [`CoreError::Encoding`] if the value cannot be represented as
/// canonical JSON (non-string map keys, floats, excessive nesting).
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> Result<Snapshot> {
    let value = serde_json::to_value(value).map_err(|e| CoreError::Encoding(e.to_string()))?;
    canonicalize_value(&value)
}

/// Canonicalize an already-built JSON value.
pub fn canonicalize_value(value: &Value) -> Result<Snapshot> {
    let mut out = String::new();
    emit_value(value, &mut out, 0)?;
    Ok(Snapshot(Bytes::from(out.into_bytes())))
}

/// Parse a snapshot back into a typed value.
pub fn parse_snapshot<T: DeserializeOwned>(snapshot: &Snapshot) -> Result<T> {
    serde_json::from_slice(snapshot.as_bytes()).map_err(|e| CoreError::Decoding(e.to_string()))
}

/// Check whether bytes are already in canonical form.
pub fn is_canonical(bytes: &[u8]) -> bool {
    let Ok(value) = serde_json::from_slice::<Value>(bytes) else {
        return false;
    };
    canonicalize_value(&value).is_ok_and(|s| s.as_bytes() == bytes)
}

fn emit_value(value: &Value, out: &mut String, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(CoreError::Encoding(format!(
            "nesting deeper than {} levels",
            MAX_DEPTH
        )));
    }
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => emit_number(n, out)?,
        Value::String(s) => emit_string(s, out),
        Value::Array(arr) => emit_array(arr, out, depth)?,
        Value::Object(obj) => emit_object(obj, out, depth)?,
    }
    Ok(())
}

fn emit_number(n: &Number, out: &mut String) -> Result<()> {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{}", i);
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{}", u);
    } else {
        return Err(CoreError::Encoding(format!(
            "floating-point number {} has no canonical form",
            n
        )));
    }
    Ok(())
}

/// Only `"`, `\` and C0 controls are escaped.
fn emit_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\u{0020}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn emit_array(arr: &[Value], out: &mut String, depth: usize) -> Result<()> {
    out.push('[');
    for (i, item) in arr.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        emit_value(item, out, depth + 1)?;
    }
    out.push(']');
    Ok(())
}

fn emit_object(obj: &Map<String, Value>, out: &mut String, depth: usize) -> Result<()> {
    // Sort by key bytes regardless of the map's own iteration order
    let mut keys: Vec<&String> = obj.keys().collect();
    keys.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        emit_string(key, out);
        out.push(':');
        emit_value(&obj[key], out, depth + 1)?;
    }
    out.push('}');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_keys_sorted_and_compact() {
        let snapshot = canonicalize(&json!({"z": 1, "a": 2, "m": [true, null]})).unwrap();
        assert_eq!(snapshot.as_bytes(), br#"{"a":2,"m":[true,null],"z":1}"#);
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let mut a = HashMap::new();
        a.insert("identity", "alice");
        a.insert("version", "1.0");
        a.insert("created_at", "0");

        let mut b = BTreeMap::new();
        b.insert("version", "1.0");
        b.insert("created_at", "0");
        b.insert("identity", "alice");

        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn test_string_escaping() {
        let snapshot = canonicalize(&json!("q\"b\\n\nt\tc\u{0001}é")).unwrap();
        assert_eq!(
            std::str::from_utf8(snapshot.as_bytes()).unwrap(),
            "\"q\\\"b\\\\n\\nt\\tc\\u0001é\""
        );
    }

    #[test]
    fn test_integers() {
        let snapshot = canonicalize(&json!([0, -1, i64::MIN, u64::MAX])).unwrap();
        assert_eq!(
            snapshot.as_bytes(),
            format!("[0,-1,{},{}]", i64::MIN, u64::MAX).as_bytes()
        );
    }

    #[test]
    fn test_float_rejected() {
        let err = canonicalize(&json!({"x": 1.5})).unwrap_err();
        assert!(matches!(err, CoreError::Encoding(_)));
    }

    #[test]
    fn test_non_string_keys_rejected() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1u8);
        let err = canonicalize(&map).unwrap_err();
        assert!(matches!(err, CoreError::Encoding(_)));
    }

    #[test]
    fn test_depth_limit() {
        let mut value = json!(0);
        for _ in 0..=MAX_DEPTH + 1 {
            value = json!([value]);
        }
        assert!(matches!(
            canonicalize_value(&value),
            Err(CoreError::Encoding(_))
        ));

        let mut shallow = json!(0);
        for _ in 0..MAX_DEPTH {
            shallow = json!([shallow]);
        }
        assert!(canonicalize_value(&shallow).is_ok());
    }

    #[test]
    fn test_is_canonical() {
        assert!(is_canonical(br#"{"a":1,"b":2}"#));
        assert!(!is_canonical(br#"{"b":2,"a":1}"#));
        assert!(!is_canonical(br#"{"a": 1}"#));
        assert!(!is_canonical(b"not json"));
    }

    #[test]
    fn test_parse_snapshot_roundtrip() {
        let snapshot = canonicalize(&json!({"identity": "bob"})).unwrap();
        let value: Value = parse_snapshot(&snapshot).unwrap();
        assert_eq!(value["identity"], "bob");
    }

    #[test]
    fn test_base64_roundtrip() {
        let snapshot = canonicalize(&json!({"k": "v"})).unwrap();
        let recovered = Snapshot::from_base64(&snapshot.to_base64()).unwrap();
        assert_eq!(snapshot, recovered);
        assert!(Snapshot::from_base64("***").is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn leaf() -> impl Strategy<Value = Value> {
            prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(|i| json!(i)),
                ".{0,12}".prop_map(Value::String),
            ]
        }

        fn value() -> impl Strategy<Value = Value> {
            leaf().prop_recursive(4, 32, 6, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                    prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                        .prop_map(|m| Value::Object(m.into_iter().collect())),
                ]
            })
        }

        proptest! {
            #[test]
            fn canonicalize_is_deterministic(v in value()) {
                let a = canonicalize_value(&v).unwrap();
                let b = canonicalize_value(&v.clone()).unwrap();
                prop_assert_eq!(a, b);
            }

            #[test]
            fn canonical_output_is_fixed_point(v in value()) {
                let snapshot = canonicalize_value(&v).unwrap();
                prop_assert!(is_canonical(snapshot.as_bytes()));
            }
        }
    }
}
