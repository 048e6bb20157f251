//! Content hashing and the canonical encodings that feed it.
//!
//! The engine's only hash algorithm is SHA-256 (§3 of the specification
//! fixes this; it is what makes a `Resource` and a `Blob` content-addressed).
//! This mirrors `chem-domain`'s own choice of `sha2` for molecule identity,
//! not `chem-core`'s `blake3` — the latter was a good fit for an in-memory
//! fingerprint scheme, not for a wire-stable content address.

use sha2::{Digest, Sha256};

/// Lower-case hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Canonical text encoding of an ordered list of step names, used to compare
/// a `Step.inputs` or `Column.dependencies` list for equality up to nothing
/// but exact order (the spec requires *ordered* comparison, not set
/// comparison: "inputs are canonicalised ... interpreted as an ordered
/// list"). Empty and absent both canonicalise to the same string so that
/// "empty and null compare equal" (§4.2) holds without a separate branch at
/// every call site.
pub fn canonical_name_list(names: &[String]) -> String {
    if names.is_empty() {
        return String::new();
    }
    names.join("\u{1f}")
}

/// Inverse of `canonical_name_list`, used by storage backends that persist
/// the canonical string and need the ordered list back.
pub fn parse_name_list(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        Vec::new()
    } else {
        encoded.split('\u{1f}').map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn canonical_name_list_empty_and_absent_are_equal() {
        assert_eq!(canonical_name_list(&[]), canonical_name_list(&Vec::<String>::new()));
        assert_eq!(canonical_name_list(&[]), "");
    }

    #[test]
    fn canonical_name_list_is_order_sensitive() {
        let a = canonical_name_list(&["a".into(), "b".into()]);
        let b = canonical_name_list(&["b".into(), "a".into()]);
        assert_ne!(a, b);
    }

    #[test]
    fn parse_name_list_round_trips() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let encoded = canonical_name_list(&names);
        assert_eq!(parse_name_list(&encoded), names);
        assert_eq!(parse_name_list(""), Vec::<String>::new());
    }
}
