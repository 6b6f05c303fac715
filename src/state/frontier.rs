//! Frontier and visited-set tracking
//!
//! The frontier is an unordered set of pending URLs. A URL leaves it only by
//! being marked visited, and the visited set never shrinks, so no URL can be
//! dispatched twice.
//!
//! Identity is the canonical key. Each pending key also remembers the location
//! it was first discovered at, which is the URL the fetcher requests.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// A pending URL: its canonical key plus the location to request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub key: String,
    pub location: String,
}

impl FrontierEntry {
    pub fn new(key: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            location: location.into(),
        }
    }
}

impl From<String> for FrontierEntry {
    fn from(url: String) -> Self {
        Self {
            key: url.clone(),
            location: url,
        }
    }
}

impl From<&str> for FrontierEntry {
    fn from(url: &str) -> Self {
        Self::from(url.to_string())
    }
}

/// URLs already dispatched to the extraction pipeline
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    /// Inserts a URL, returning false if it was already present
    fn insert(&mut self, url: &str) -> bool {
        if self.urls.contains(url) {
            return false;
        }
        self.urls.insert(url.to_string())
    }
}

/// Pending work plus the visited set that guards it
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    pending: HashMap<String, String>,
    visited: VisitedSet,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every entry whose key is neither visited nor already pending
    ///
    /// Returns how many entries were actually added. A key that is already
    /// pending keeps its first location.
    pub fn enqueue<I, E>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = E>,
        E: Into<FrontierEntry>,
    {
        let mut added = 0;
        for entry in entries {
            let FrontierEntry { key, location } = entry.into();
            if self.visited.contains(&key) {
                continue;
            }
            if let Entry::Vacant(slot) = self.pending.entry(key) {
                slot.insert(location);
                added += 1;
            }
        }
        added
    }

    /// Removes and returns an arbitrary pending entry
    pub fn dequeue(&mut self) -> Option<FrontierEntry> {
        let key = self.pending.keys().next().cloned()?;
        let location = self.pending.remove(&key)?;
        Some(FrontierEntry { key, location })
    }

    /// Marks a URL as dispatched
    ///
    /// The check and the insert happen together: the call returns true exactly
    /// once per URL for the lifetime of the frontier. The URL is also dropped
    /// from the pending set.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.pending.remove(url);
        self.visited.insert(url)
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.pending.contains_key(url)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    /// True when no URL is waiting
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }
}
