use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

/// Content captured for one locale of a page
///
/// `Structured` holds the JSON object or array returned by the structuring
/// service. `Raw` keeps the service output verbatim when it could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocaleContent {
    Raw(String),
    Structured(serde_json::Value),
}

impl LocaleContent {
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

/// Extraction result for one URL
///
/// Each locale slot is either present content or `None` when that locale
/// could not be captured. Serialized as `{"url": ..., "locales": {...}}` with
/// absent slots written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub locales: BTreeMap<String, Option<LocaleContent>>,
}

impl PageRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            locales: BTreeMap::new(),
        }
    }

    /// Sets a locale slot, replacing any earlier value for the same key
    pub fn set_locale(&mut self, key: impl Into<String>, content: Option<LocaleContent>) {
        self.locales.insert(key.into(), content);
    }

    /// Content stored for a locale, if the slot exists and is populated
    pub fn locale(&self, key: &str) -> Option<&LocaleContent> {
        self.locales.get(key).and_then(Option::as_ref)
    }

    /// Number of slots holding content
    pub fn populated_locales(&self) -> usize {
        self.locales.values().filter(|slot| slot.is_some()).count()
    }

    /// Keys of slots that were attempted but left empty
    pub fn absent_locales(&self) -> impl Iterator<Item = &str> {
        self.locales
            .iter()
            .filter(|(_, slot)| slot.is_none())
            .map(|(key, _)| key.as_str())
    }
}

/// All records of a crawl, keyed by URL
///
/// Entries are write-once. Keys iterate in sorted order so the output file is
/// stable between runs over the same pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDatabase {
    records: BTreeMap<String, PageRecord>,
}

impl ContentDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record under its URL
    ///
    /// Returns false, leaving the existing entry untouched, if the URL already
    /// has a record.
    pub fn insert(&mut self, record: PageRecord) -> bool {
        match self.records.entry(record.url.clone()) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    pub fn get(&self, url: &str) -> Option<&PageRecord> {
        self.records.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.records.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PageRecord)> {
        self.records.iter().map(|(url, record)| (url.as_str(), record))
    }
}
