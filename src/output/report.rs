//! Run report printed at the end of a crawl

use crate::state::CrawlStats;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Why the crawl loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    /// No admissible URL was left to visit
    FrontierExhausted,
    /// The page budget was used up
    BudgetReached,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrontierExhausted => write!(f, "frontier exhausted"),
            Self::BudgetReached => write!(f, "page budget reached"),
        }
    }
}

/// Summary of a finished crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub termination: TerminationReason,
    pub stats: CrawlStats,
    /// URLs with a stored record, sorted
    pub stored_urls: Vec<String>,
    /// Where the database was written, once it has been
    pub output_path: Option<String>,
}

impl CrawlReport {
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        termination: TerminationReason,
        stats: CrawlStats,
        stored_urls: Vec<String>,
    ) -> Self {
        Self {
            started_at,
            finished_at,
            termination,
            stats,
            stored_urls,
            output_path: None,
        }
    }

    /// Wall-clock length of the run
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Number of pages that produced a record
    pub fn pages_processed(&self) -> usize {
        self.stored_urls.len()
    }

    /// Lines of the human-readable summary
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            "=== Crawl Summary ===".to_string(),
            String::new(),
            format!("Total pages processed: {}", self.pages_processed()),
            format!("  Pages visited: {}", self.stats.pages_dispatched),
            format!("  Navigation failures: {}", self.stats.navigation_failures),
            format!("  Absent locales: {}", self.stats.absent_locales),
            format!("  Raw (non-JSON) outputs: {}", self.stats.raw_outputs),
            format!("  Degraded normalizations: {}", self.stats.degraded_normalizations),
            format!(
                "  Links enqueued / rejected: {} / {}",
                self.stats.links_enqueued, self.stats.links_rejected
            ),
            format!("  Stopped: {}", self.termination),
            format!("  Duration: {}s", self.duration_seconds()),
        ];

        match &self.output_path {
            Some(path) => lines.push(format!("  Output: {}", path)),
            None => lines.push("  Output NOT saved".to_string()),
        }

        if !self.stored_urls.is_empty() {
            lines.push(String::new());
            lines.push("Processed URLs:".to_string());
            lines.extend(self.stored_urls.iter().map(|url| format!("  - {}", url)));
        }

        lines
    }

    /// Prints the summary to stdout
    pub fn print_summary(&self) {
        for line in self.summary_lines() {
            println!("{}", line);
        }
    }
}
