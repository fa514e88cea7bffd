//! Canonical serialization and content hashing.
//!
//! The rendered document is written with object keys sorted and a fixed
//! four-space indent, without a trailing newline. Two documents with the same
//! content therefore always produce the same bytes, and the content hash is a
//! pure function of those bytes.

use serde::Serialize;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde_json::Value as Json;
use serde_json::ser::PrettyFormatter;
use sha2::{Digest, Sha256};

const INDENT: &[u8] = b"    ";

struct Sorted<'a>(&'a Json);

impl Serialize for Sorted<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Json::Object(fields) => {
                let mut entries: Vec<_> = fields.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, &Sorted(value))?;
                }
                map.end()
            }
            Json::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Sorted(item))?;
                }
                seq.end()
            }
            other => other.serialize(serializer),
        }
    }
}

/// Serialize `document` in canonical form.
pub fn to_canonical_string(document: &Json) -> Result<String, serde_json::Error> {
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(INDENT));
    Sorted(document).serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Re-serialize JSON text in canonical form, discarding incidental whitespace
/// and key order.
pub fn canonicalize_text(text: &str) -> Result<String, serde_json::Error> {
    let document: Json = serde_json::from_str(text)?;
    to_canonical_string(&document)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_are_sorted_at_every_depth() {
        let document = json!({"b": {"z": 1, "a": [{"y": 1, "x": 2}]}, "a": true});
        let text = to_canonical_string(&document).unwrap();
        assert_eq!(
            text,
            "{\n    \"a\": true,\n    \"b\": {\n        \"a\": [\n            {\n                \"x\": 2,\n                \"y\": 1\n            }\n        ],\n        \"z\": 1\n    }\n}"
        );
    }

    #[test]
    fn test_whitespace_does_not_change_canonical_text() {
        let compact = r#"{"Resources":{"B":{},"A":{"Type":"x"}}}"#;
        let spaced = "{\n  \"Resources\" : {\n   \"A\": {\"Type\": \"x\"},\n \"B\": {}\n }\n}\n";
        assert_eq!(canonicalize_text(compact).unwrap(), canonicalize_text(spaced).unwrap());
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(content_hash(b"{\"a\": 1}"), content_hash(b"{\"a\": 2}"));
    }
}
