//! URL deduplication
//!
//! Assigns each unique URL a 1-based ordinal in order of first appearance.
//! Ordinals are always dense: `1..=len()`.

use crate::schema::Reference;
use std::collections::HashMap;

/// Ordered mapping from URL to ordinal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlRegistry {
    urls: Vec<String>,
    index: HashMap<String, usize>,
}

impl UrlRegistry {
    /// Build from references in document order; first occurrence wins
    pub fn from_references(refs: &[Reference]) -> Self {
        let mut registry = Self::default();
        for r in refs {
            registry.insert(&r.url);
        }
        registry
    }

    /// Register a URL, returning its ordinal (existing or new)
    pub fn insert(&mut self, url: &str) -> usize {
        if let Some(&ordinal) = self.index.get(url) {
            return ordinal;
        }
        self.urls.push(url.to_string());
        let ordinal = self.urls.len();
        self.index.insert(url.to_string(), ordinal);
        ordinal
    }

    pub fn ordinal(&self, url: &str) -> Option<usize> {
        self.index.get(url).copied()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// `(ordinal, url)` pairs in ascending ordinal order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.urls
            .iter()
            .enumerate()
            .map(|(i, url)| (i + 1, url.as_str()))
    }

    /// New registry holding only the kept URLs, renumbered densely
    pub fn retain<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&str) -> bool,
    {
        let mut registry = Self::default();
        for url in self.urls.iter().filter(|u| keep(u)) {
            registry.insert(url);
        }
        registry
    }
}
