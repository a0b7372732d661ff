//! Revision tokens.

use crate::error::{StorageError, StorageResult};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Number of hex characters kept from the revision digest.
const HASH_LEN: usize = 32;

/// An opaque version marker assigned by the store on every write.
///
/// Rendered as `<generation>-<hash>`. The generation grows by one on each
/// write to the same key; the hash is derived from the previous revision
/// and the new body, so two stores that apply the same write sequence
/// produce identical revisions.
///
/// Revisions are totally ordered by generation, then hash. Replication
/// uses this order to pick the same winner on every replica.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Revision {
    generation: u64,
    hash: String,
}

impl Revision {
    /// Derives the revision that follows `previous` for a write of `body`.
    pub fn next(previous: Option<&Revision>, body: &[u8], deleted: bool) -> Self {
        let generation = previous.map_or(1, |rev| rev.generation + 1);

        let mut hasher = Sha256::new();
        if let Some(prev) = previous {
            hasher.update(prev.to_string().as_bytes());
        }
        hasher.update([u8::from(deleted)]);
        hasher.update(body);
        let digest = hasher.finalize();

        let mut hash = String::with_capacity(HASH_LEN);
        for byte in digest.iter().take(HASH_LEN / 2) {
            let _ = write!(hash, "{byte:02x}");
        }

        Self { generation, hash }
    }

    /// Returns the write generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the hash part of the token.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.generation
            .cmp(&other.generation)
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.hash)
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Revision({self})")
    }
}

impl FromStr for Revision {
    type Err = StorageError;

    fn from_str(value: &str) -> StorageResult<Self> {
        let invalid = || StorageError::InvalidRevision {
            value: value.to_string(),
        };

        let (generation, hash) = value.split_once('-').ok_or_else(invalid)?;
        let generation: u64 = generation.parse().map_err(|_| invalid())?;
        if generation == 0 || hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        Ok(Self {
            generation,
            hash: hash.to_ascii_lowercase(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_revision_is_generation_one() {
        let rev = Revision::next(None, b"body", false);
        assert_eq!(rev.generation(), 1);
        assert_eq!(rev.hash().len(), HASH_LEN);
    }

    #[test]
    fn hash_is_truncated_lowercase_sha256() {
        let rev = Revision::next(None, b"", false);
        assert_eq!(rev.to_string(), "1-6e340b9cffb37a989ca544e6bb780a2c");
    }

    #[test]
    fn next_increments_generation() {
        let first = Revision::next(None, b"a", false);
        let second = Revision::next(Some(&first), b"b", false);
        assert_eq!(second.generation(), 2);
        assert!(second > first);
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = Revision::next(None, b"same", false);
        let b = Revision::next(None, b"same", false);
        assert_eq!(a, b);

        let tombstone = Revision::next(None, b"same", true);
        assert_ne!(a, tombstone);
    }

    #[test]
    fn parse_display_agree() {
        let rev = Revision::next(None, b"x", false);
        let parsed: Revision = rev.to_string().parse().unwrap();
        assert_eq!(parsed, rev);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Revision>().is_err());
        assert!("abc".parse::<Revision>().is_err());
        assert!("0-abc".parse::<Revision>().is_err());
        assert!("1-".parse::<Revision>().is_err());
        assert!("1-xyz".parse::<Revision>().is_err());
    }

    #[test]
    fn ordering_breaks_ties_by_hash() {
        let low: Revision = "3-0a".parse().unwrap();
        let high: Revision = "3-0b".parse().unwrap();
        let older: Revision = "2-ff".parse().unwrap();
        assert!(low < high);
        assert!(older < low);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn successor_always_wins(bodies in proptest::collection::vec(any::<Vec<u8>>(), 1..8)) {
                let mut current: Option<Revision> = None;
                for body in &bodies {
                    let next = Revision::next(current.as_ref(), body, false);
                    if let Some(prev) = &current {
                        prop_assert!(next > *prev);
                    }
                    let reparsed: Revision = next.to_string().parse().unwrap();
                    prop_assert_eq!(&reparsed, &next);
                    current = Some(next);
                }
            }
        }
    }
}
