//! Context fingerprinting — hash of the `(id, version)` pairs of a trip's
//! records. Any edit to a contributing record changes the fingerprint and
//! invalidates cached answers, without active invalidation messages.

use base64::Engine;
use sha2::{Digest, Sha256};

use wayfarer_core::store::RecordVersion;

/// Deterministic fingerprint over a set of record versions.
///
/// Pairs are sorted by record id first, so adapter response order never
/// affects the result.
pub fn fingerprint_of(versions: &[RecordVersion]) -> String {
    let mut sorted: Vec<&RecordVersion> = versions.iter().collect();
    sorted.sort_by(|a, b| a.record_id.cmp(&b.record_id));

    let mut hasher = Sha256::new();
    for rv in sorted {
        hasher.update(rv.record_id.as_bytes());
        hasher.update([b':']);
        hasher.update(rv.version.to_le_bytes());
        hasher.update([b'\n']);
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rv(id: &str, version: u64) -> RecordVersion {
        RecordVersion { record_id: id.into(), version }
    }

    #[test]
    fn order_independent() {
        let a = fingerprint_of(&[rv("a", 1), rv("b", 2)]);
        let b = fingerprint_of(&[rv("b", 2), rv("a", 1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn version_change_changes_fingerprint() {
        let before = fingerprint_of(&[rv("a", 1), rv("b", 2)]);
        let after = fingerprint_of(&[rv("a", 1), rv("b", 3)]);
        assert_ne!(before, after);
    }

    #[test]
    fn added_record_changes_fingerprint() {
        let before = fingerprint_of(&[rv("a", 1)]);
        let after = fingerprint_of(&[rv("a", 1), rv("b", 1)]);
        assert_ne!(before, after);
    }

    #[test]
    fn empty_set_is_stable() {
        assert_eq!(fingerprint_of(&[]), fingerprint_of(&[]));
    }
}
