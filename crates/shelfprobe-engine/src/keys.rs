//! Stable keys derived from a run's identity.

use sha2::{Digest, Sha256};

/// Cache key for a run: hex SHA-256 of `run_id`, a NUL byte, and
/// `retailer_code`.
#[must_use]
pub fn run_key(run_id: &str, retailer_code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(retailer_code.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Seed for the settle-jitter generator, taken from the first eight bytes of
/// the key's digest.
#[must_use]
pub fn jitter_seed(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_key_is_stable_hex() {
        let a = run_key("run-1", "ah_nl");
        assert_eq!(a, run_key("run-1", "ah_nl"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn separator_prevents_concatenation_collisions() {
        assert_ne!(run_key("ab", "c"), run_key("a", "bc"));
    }

    #[test]
    fn seed_follows_key() {
        let key = run_key("run-1", "ah_nl");
        assert_eq!(jitter_seed(&key), jitter_seed(&key));
        assert_ne!(jitter_seed(&key), jitter_seed(&run_key("run-2", "ah_nl")));
    }
}
