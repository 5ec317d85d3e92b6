//! Canonical byte encoding for hashing and signing
//!
//! Every value that is committed to, encrypted as a ballot payload, or signed
//! goes through [`to_canonical_bytes`]. The encoding is compact JSON with object
//! keys sorted by their UTF-8 bytes at every nesting level. Key order is
//! imposed here rather than inherited from `serde_json::Map`, whose ordering
//! changes when any crate in the build enables `preserve_order`.
//!
//! ```rust
//! use std::collections::HashMap;
//! use vote_engine::canonical::to_canonical_string;
//!
//! let mut map = HashMap::new();
//! map.insert("b", 2);
//! map.insert("a", 1);
//! assert_eq!(to_canonical_string(&map).unwrap(), r#"{"a":1,"b":2}"#);
//! ```

use crate::Result;
use serde::Serialize;
use serde_json::Value;

/// Version of the canonical encoding. Bump when the byte format changes.
pub const CANONICAL_ENCODING_VERSION: u8 = 1;

/// Encode a value into its canonical bytes
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(to_canonical_string(value)?.into_bytes())
}

/// Encode a value into its canonical text form
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let tree = serde_json::to_value(value)?;
    let mut out = String::new();
    write_value(&mut out, &tree)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => out.push_str(&value.to_string()),
        Value::String(s) => out.push_str(&serde_json::to_string(s)?),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_value(out, item)?;
            }
            out.push('}');
        }
    }
    Ok(())
}
