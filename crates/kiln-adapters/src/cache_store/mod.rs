//! Cache store adapters.

mod fs;
mod memory;

pub use fs::FsCacheStore;
pub use memory::MemoryCacheStore;

/// Fingerprints are lowercase SHA-256 hex; anything else is refused before
/// it can become part of a path.
pub(crate) fn is_valid_key(fingerprint: &str) -> bool {
    fingerprint.len() == 64
        && fingerprint
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_must_be_sha256_hex() {
        assert!(is_valid_key(&fixtures::key(7)));
        assert!(!is_valid_key("../../etc/passwd"));
        assert!(!is_valid_key(&"A".repeat(64)));
        assert!(!is_valid_key("abc"));
    }
}
