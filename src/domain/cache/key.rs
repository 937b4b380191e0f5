//! Cache key derivation

use sha2::{Digest, Sha256};

/// Normalizes query text before it is used as cache key material
///
/// Trims, collapses internal whitespace runs to a single space and lowercases.
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Builds bounded-size cache keys of the form `namespace:kind:<sha256>`
#[derive(Debug, Clone)]
pub struct HashedKeyBuilder {
    namespace: String,
}

impl HashedKeyBuilder {
    /// Creates a builder for the given namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Returns the namespace prefix
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Derives a key from an ordered list of components
    ///
    /// Each component is length-prefixed before hashing so that component
    /// boundaries are part of the digest.
    pub fn key(&self, kind: &str, components: &[&str]) -> String {
        format!("{}:{}:{}", self.namespace, kind, digest(components))
    }
}

fn digest(components: &[&str]) -> String {
    let mut hasher = Sha256::new();

    for component in components {
        hasher.update((component.len() as u64).to_be_bytes());
        hasher.update(component.as_bytes());
    }

    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_query() {
        assert_eq!(
            normalize_query("  What is   the ROI\ton Villa Mar? "),
            "what is the roi on villa mar?"
        );
    }

    #[test]
    fn test_key_is_deterministic() {
        let builder = HashedKeyBuilder::new("rag");
        let a = builder.key("semantic", &["tenant-1", "buyer", "pool hours"]);
        let b = builder.key("semantic", &["tenant-1", "buyer", "pool hours"]);

        assert_eq!(a, b);
        assert!(a.starts_with("rag:semantic:"));
        assert_eq!(a.len(), "rag:semantic:".len() + 64);
    }

    #[test]
    fn test_component_boundaries_matter() {
        let builder = HashedKeyBuilder::new("rag");

        assert_ne!(
            builder.key("semantic", &["a", "bc"]),
            builder.key("semantic", &["ab", "c"])
        );
    }

    #[test]
    fn test_kind_separates_keys() {
        let builder = HashedKeyBuilder::new("rag");

        assert_ne!(
            builder.key("semantic", &["q"]),
            builder.key("embedding", &["q"])
        );
    }

    #[test]
    fn test_key_size_is_bounded() {
        let builder = HashedKeyBuilder::new("rag");
        let long_query = "villa ".repeat(10_000);

        let key = builder.key("embedding", &[&long_query]);
        assert_eq!(key.len(), "rag:embedding:".len() + 64);
    }
}
