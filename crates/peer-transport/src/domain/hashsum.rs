//! Chain-relay integrity sum.
//!
//! Not a signature: anyone can compute it. It detects corruption and lets
//! relaying nodes recognise a message they have already seen.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Integrity sum of a relay body stamped at `timestamp`.
///
/// SHA-256 over the canonical JSON of `body` followed by the decimal
/// timestamp; the first 8 digest bytes, reversed, read as a big-endian
/// integer and rendered in decimal.
pub fn hashsum(body: &Value, timestamp: u64) -> String {
    let mut canonical = String::new();
    write_canonical(body, &mut canonical);
    canonical.push_str(&timestamp.to_string());

    let digest = Sha256::digest(canonical.as_bytes());
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(low).to_string()
}

/// Compact JSON with object keys sorted, so that equal values hash equally
/// whatever order their keys arrived in.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        leaf => out.push_str(&leaf.to_string()),
    }
}
