//! Permanently denied identities.

use parking_lot::RwLock;
use std::collections::HashSet;

/// A set of identities that are always denied.
///
/// Managed by the operator, independent of the store and the sweeper.
#[derive(Debug, Default)]
pub struct Blocklist {
    identities: RwLock<HashSet<String>>,
}

impl Blocklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identity. Returns `false` if it was already blocked.
    pub fn insert(&self, identity: impl Into<String>) -> bool {
        self.identities.write().insert(identity.into())
    }

    /// Remove an identity. Returns `false` if it was not blocked.
    pub fn remove(&self, identity: &str) -> bool {
        self.identities.write().remove(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.identities.read().contains(identity)
    }

    pub fn len(&self) -> usize {
        self.identities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.read().is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Blocklist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            identities: RwLock::new(iter.into_iter().map(Into::into).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove() {
        let blocklist = Blocklist::new();
        assert!(blocklist.is_empty());

        assert!(blocklist.insert("203.0.113.7"));
        assert!(!blocklist.insert("203.0.113.7"));
        assert!(blocklist.contains("203.0.113.7"));
        assert_eq!(blocklist.len(), 1);

        assert!(blocklist.remove("203.0.113.7"));
        assert!(!blocklist.contains("203.0.113.7"));
    }

    #[test]
    fn test_exact_match_only() {
        let blocklist: Blocklist = ["10.0.0.1"].into_iter().collect();
        assert!(blocklist.contains("10.0.0.1"));
        assert!(!blocklist.contains("10.0.0.10"));
        assert!(!blocklist.contains("10.0.0"));
    }
}
