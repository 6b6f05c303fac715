use crate::content::{ContentDatabase, PageRecord};
use crate::state::{Frontier, FrontierEntry};
use serde::Serialize;

/// Counters describing how a crawl went
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// Pages marked visited and handed to the pipeline
    pub pages_dispatched: usize,
    /// Records stored in the content database
    pub records_stored: usize,
    /// Pages whose navigation failed or timed out
    pub navigation_failures: usize,
    /// Locale slots left empty on otherwise successful pages
    pub absent_locales: usize,
    /// Captures where normalization fell back to raw markup
    pub degraded_normalizations: usize,
    /// Structuring outputs kept as raw text
    pub raw_outputs: usize,
    /// Discovered links that passed admission and were new
    pub links_enqueued: usize,
    /// Discovered links rejected by the admission filter
    pub links_rejected: usize,
}

/// All mutable state of one crawl
///
/// Owned by the coordinator for the whole run; nothing else mutates the
/// frontier or the database.
#[derive(Debug, Default)]
pub struct CrawlSession {
    frontier: Frontier,
    database: ContentDatabase,
    stats: CrawlStats,
}

impl CrawlSession {
    /// Starts a session whose frontier holds only the seed
    pub fn seeded(seed: impl Into<FrontierEntry>) -> Self {
        let mut frontier = Frontier::new();
        frontier.enqueue([seed.into()]);
        Self {
            frontier,
            database: ContentDatabase::new(),
            stats: CrawlStats::default(),
        }
    }

    /// Next pending URL that has not been visited yet
    pub fn next_pending(&mut self) -> Option<FrontierEntry> {
        while let Some(entry) = self.frontier.dequeue() {
            if !self.frontier.is_visited(&entry.key) {
                return Some(entry);
            }
            tracing::debug!(url = %entry.key, "skipping already visited URL");
        }
        None
    }

    /// Marks a URL visited and counts the dispatch
    ///
    /// Returns false when the URL was dispatched before.
    pub fn begin(&mut self, url: &str) -> bool {
        if !self.frontier.mark_visited(url) {
            return false;
        }
        self.stats.pages_dispatched += 1;
        true
    }

    /// Stores a record; a second record for the same URL is dropped
    pub fn store(&mut self, record: PageRecord) -> bool {
        let url = record.url.clone();
        if self.database.insert(record) {
            self.stats.records_stored += 1;
            true
        } else {
            tracing::warn!(url = %url, "record already stored, keeping the first one");
            false
        }
    }

    /// Enqueues admitted links, returning how many were new
    pub fn enqueue<I, E>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = E>,
        E: Into<FrontierEntry>,
    {
        let added = self.frontier.enqueue(entries);
        self.stats.links_enqueued += added;
        added
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn database(&self) -> &ContentDatabase {
        &self.database
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut CrawlStats {
        &mut self.stats
    }

    pub fn visited_len(&self) -> usize {
        self.frontier.visited_len()
    }

    /// Consumes the session, returning the database and final counters
    pub fn finish(self) -> (ContentDatabase, CrawlStats) {
        (self.database, self.stats)
    }
}
