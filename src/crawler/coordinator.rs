//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the pieces together:
//! - Seeding and draining the frontier within the page budget
//! - Running the extraction pipeline for each page
//! - Filtering discovered links through the crawl scope
//! - Pacing, checkpointing and the final report

use crate::config::{validate, Config, CrawlerConfig};
use crate::content::ContentDatabase;
use crate::crawler::fetcher::{HttpPageFetcher, PageFetcher};
use crate::crawler::pacing::{Pacer, Sleeper, TokioSleeper};
use crate::crawler::pipeline::{ExtractionPipeline, PipelineError};
use crate::output::{save_database, CrawlReport, OutputError, TerminationReason};
use crate::state::{CrawlSession, FrontierEntry};
use crate::structurer::GeminiStructurer;
use crate::url::{canonicalize_url, fetch_url, CrawlTarget};
use crate::CrawlError;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Result of a crawl: everything stored plus the run report
#[derive(Debug)]
pub struct CrawlOutcome {
    pub database: ContentDatabase,
    pub report: CrawlReport,
    /// Set when the final results file could not be written
    pub save_error: Option<OutputError>,
}

/// Main crawler coordinator structure
///
/// Owns the crawl session for the whole run. Pages are processed one at a
/// time on a single fetcher.
pub struct Coordinator<F: PageFetcher> {
    target: CrawlTarget,
    fetcher: F,
    pipeline: ExtractionPipeline,
    session: CrawlSession,
    pacer: Pacer,
    sleeper: Arc<dyn Sleeper>,
    max_pages: usize,
    page_timeout: Option<Duration>,
    checkpoint: Option<(usize, PathBuf)>,
}

impl<F: PageFetcher> Coordinator<F> {
    /// Creates a coordinator whose frontier holds the seed
    ///
    /// The seed is keyed by its canonical form and requested as written.
    ///
    /// # Arguments
    ///
    /// * `target` - The site and scope to crawl
    /// * `fetcher` - Backend used to load pages
    /// * `pipeline` - Turns loaded pages into records
    /// * `config` - Page budget, pacing bounds and per-page deadline
    pub fn new(
        target: CrawlTarget,
        fetcher: F,
        pipeline: ExtractionPipeline,
        config: &CrawlerConfig,
    ) -> Self {
        let seed = FrontierEntry::new(target.base_url().as_str(), target.seed().as_str());
        if !target.admits(target.base_url()) {
            tracing::warn!(
                seed = %seed.location,
                "seed URL is outside the allow list; it will be crawled but its links may be filtered"
            );
        }

        let page_timeout = match config.page_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            target,
            fetcher,
            pipeline,
            session: CrawlSession::seeded(seed),
            pacer: Pacer::from_config(config),
            sleeper: Arc::new(TokioSleeper),
            max_pages: config.max_pages,
            page_timeout,
            checkpoint: None,
        }
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Writes the database to `path` after every `every` dispatched pages
    pub fn with_checkpoint(mut self, every: usize, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = (every > 0).then(|| (every, path.into()));
        self
    }

    /// Runs the crawl loop to completion
    ///
    /// Per-page failures are logged and never abort the run. The fetcher is
    /// always closed before returning.
    pub async fn run(mut self) -> CrawlOutcome {
        let started_at = Utc::now();
        let start_time = Instant::now();

        tracing::info!(
            seed = %self.target.base_url(),
            domain = %self.target.domain(),
            allow_list = self.target.allow_list().len(),
            max_pages = self.max_pages,
            "Starting crawl"
        );

        let termination = loop {
            if self.session.visited_len() >= self.max_pages {
                tracing::info!("Page budget of {} reached", self.max_pages);
                break TerminationReason::BudgetReached;
            }

            let entry = match self.session.next_pending() {
                Some(entry) => entry,
                None => {
                    tracing::info!("Frontier is empty, crawl complete");
                    break TerminationReason::FrontierExhausted;
                }
            };

            if !self.session.begin(&entry.key) {
                continue;
            }

            let location = match Url::parse(&entry.location) {
                Ok(location) => location,
                Err(e) => {
                    tracing::warn!(url = %entry.location, stage = "dispatch", error = %e, "unparsable frontier URL");
                    continue;
                }
            };

            tracing::info!(
                url = %location,
                "Processing page {}/{}",
                self.session.visited_len(),
                self.max_pages
            );

            if self.process_url(&entry.key, &location).await {
                self.handle_discovered_links(&entry.key).await;
            }

            let dispatched = self.session.stats().pages_dispatched;

            if dispatched % 10 == 0 {
                let rate = dispatched as f64 / start_time.elapsed().as_secs_f64().max(f64::EPSILON);
                tracing::info!(
                    "Progress: {} pages crawled, {} in frontier, {:.2} pages/sec",
                    dispatched,
                    self.session.frontier().pending_len(),
                    rate
                );
            }

            self.maybe_checkpoint(dispatched);

            // No pause when the loop is about to stop
            if !self.session.frontier().is_empty() && self.session.visited_len() < self.max_pages {
                self.sleeper.sleep(self.pacer.next_delay()).await;
            }
        };

        if let Err(e) = self.fetcher.close().await {
            tracing::warn!(error = %e, "failed to close fetcher");
        }

        let (database, stats) = self.session.finish();
        let stored_urls = database.urls().map(str::to_string).collect();
        let report = CrawlReport::new(started_at, Utc::now(), termination, stats, stored_urls);

        tracing::info!(
            "Crawl completed: {} pages visited, {} records stored in {:?}",
            report.stats.pages_dispatched,
            report.stats.records_stored,
            start_time.elapsed()
        );

        CrawlOutcome {
            database,
            report,
            save_error: None,
        }
    }

    /// Extracts one page and stores its record
    ///
    /// Returns true when the page loaded and a record was stored, i.e. when
    /// its links are worth discovering.
    async fn process_url(&mut self, url: &str, location: &Url) -> bool {
        let extraction = self.pipeline.extract(url, location, &mut self.fetcher);

        let result = match self.page_timeout {
            Some(limit) => match tokio::time::timeout(limit, extraction).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout(limit.as_secs())),
            },
            None => extraction.await,
        };

        match result {
            Ok(page) => {
                let stats = self.session.stats_mut();
                stats.absent_locales += page.notes.absent_locales;
                stats.raw_outputs += page.notes.raw_outputs;
                stats.degraded_normalizations += page.notes.degraded_normalizations;

                self.session.store(page.record);
                true
            }
            Err(e) => {
                self.session.stats_mut().navigation_failures += 1;
                tracing::warn!(url = %url, stage = "navigation", error = %e, "page skipped");
                false
            }
        }
    }

    /// Filters the loaded page's links through the scope and enqueues new ones
    ///
    /// Each admitted link is keyed by its canonical form and keeps the
    /// location it was written with.
    async fn handle_discovered_links(&mut self, url: &str) {
        let links = match self.fetcher.discover_links().await {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!(url = %url, stage = "discovery", error = %e, "link discovery failed");
                return;
            }
        };

        let mut admitted = Vec::new();
        let mut rejected = 0;

        for link in &links {
            let resolved = fetch_url(link).and_then(|location| {
                canonicalize_url(location.as_str()).map(|canonical| (canonical, location))
            });

            match resolved {
                Ok((canonical, location)) if self.target.admits(&canonical) => {
                    admitted.push(FrontierEntry::new(canonical.as_str(), location.as_str()));
                }
                Ok(_) => {
                    tracing::debug!(link = %link, "outside crawl scope");
                    rejected += 1;
                }
                Err(e) => {
                    tracing::debug!(link = %link, error = %e, "rejecting unparsable link");
                    rejected += 1;
                }
            }
        }

        self.session.stats_mut().links_rejected += rejected;
        let added = self.session.enqueue(admitted);

        tracing::debug!(
            url = %url,
            found = links.len(),
            added,
            rejected,
            "links processed"
        );
    }

    fn maybe_checkpoint(&self, dispatched: usize) {
        let Some((every, path)) = &self.checkpoint else {
            return;
        };

        if dispatched % every != 0 {
            return;
        }

        match save_database(self.session.database(), path) {
            Ok(()) => tracing::info!(
                path = %path.display(),
                records = self.session.database().len(),
                "checkpoint written"
            ),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "checkpoint failed"),
        }
    }
}

/// Runs a complete crawl from configuration
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the crawl target from the seed URL and allow list
/// 2. Build the HTTP fetcher and the structuring service client
/// 3. Run the crawl loop
/// 4. Write the content database to the output path
///
/// Setup problems are returned before any page is fetched. A failure to write
/// the final output is kept in `CrawlOutcome::save_error` instead, so the
/// caller can still show what was crawled.
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlOutcome)` - Crawl ran to completion
/// * `Err(CrawlError)` - Setup failed
pub async fn run_crawl(config: Config) -> crate::Result<CrawlOutcome> {
    validate(&config)?;

    let target = CrawlTarget::new(&config.target.seed_url, &config.target.allow_list)?;
    let fetcher = HttpPageFetcher::new(&config.fetcher)?;
    let structurer = GeminiStructurer::from_config(&config.structurer)?;

    let pipeline = ExtractionPipeline::from_config(&config, Arc::new(structurer))
        .map_err(|e| CrawlError::Setup(e.to_string()))?;

    let output_path = PathBuf::from(&config.output.path);

    let outcome = Coordinator::new(target, fetcher, pipeline, &config.crawler)
        .with_checkpoint(config.crawler.checkpoint_every, output_path.clone())
        .run()
        .await;

    Ok(persist(outcome, output_path))
}

/// Writes the final database
///
/// On success the path is recorded in the report; on failure the error is
/// kept in `save_error`.
pub fn persist(mut outcome: CrawlOutcome, path: PathBuf) -> CrawlOutcome {
    match save_database(&outcome.database, &path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), records = outcome.database.len(), "results saved");
            outcome.report.output_path = Some(path.display().to_string());
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to save results");
            outcome.save_error = Some(e);
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocaleConfig;
    use crate::crawler::fetcher::FetchError;
    use crate::crawler::pacing::SettlePolicy;
    use crate::output::load_database;
    use crate::structurer::{StructureError, Structurer};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory site: URL -> (markup, outbound links)
    ///
    /// Loading a URL listed in `stalled` never finishes in time.
    #[derive(Default)]
    struct SiteFetcher {
        pages: HashMap<String, (String, Vec<String>)>,
        stalled: Vec<String>,
        current: Option<String>,
        loads: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl SiteFetcher {
        fn page(mut self, url: &str, links: &[&str]) -> Self {
            self.pages.insert(
                url.to_string(),
                (
                    format!("<main><p>Content of {}</p></main>", url),
                    links.iter().map(|l| l.to_string()).collect(),
                ),
            );
            self
        }

        fn stalled(mut self, url: &str) -> Self {
            self.stalled.push(url.to_string());
            self
        }
    }

    #[async_trait]
    impl PageFetcher for SiteFetcher {
        async fn load(&mut self, url: &Url) -> Result<(), FetchError> {
            self.loads.lock().unwrap().push(url.to_string());
            if self.stalled.iter().any(|s| s == url.as_str()) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.pages.contains_key(url.as_str()) {
                self.current = Some(url.to_string());
                Ok(())
            } else {
                self.current = None;
                Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            }
        }

        async fn switch_locale(&mut self, code: &str) -> Result<(), FetchError> {
            Err(FetchError::LocaleUnavailable(code.to_string()))
        }

        async fn current_markup(&mut self) -> Result<String, FetchError> {
            let current = self.current.as_ref().ok_or(FetchError::NoPageLoaded)?;
            Ok(self.pages[current].0.clone())
        }

        async fn discover_links(&mut self) -> Result<Vec<String>, FetchError> {
            let current = self.current.as_ref().ok_or(FetchError::NoPageLoaded)?;
            Ok(self.pages[current].1.clone())
        }

        async fn close(&mut self) -> Result<(), FetchError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    struct JsonStructurer;

    #[async_trait]
    impl Structurer for JsonStructurer {
        async fn structure(&self, _text: &str, source_url: &str) -> Result<String, StructureError> {
            Ok(format!("{{\"url\": \"{}\"}}", source_url))
        }
    }

    #[derive(Default)]
    struct CountingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for CountingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    fn pipeline() -> ExtractionPipeline {
        ExtractionPipeline::new(Arc::new(JsonStructurer), LocaleConfig::default(), "#lang_select")
            .unwrap()
            .with_settle_policy(SettlePolicy::immediate())
    }

    fn crawler_config(max_pages: usize) -> CrawlerConfig {
        CrawlerConfig {
            max_pages,
            min_delay_ms: 0,
            max_delay_ms: 0,
            page_timeout_secs: 0,
            checkpoint_every: 0,
        }
    }

    fn chain_site(n: usize) -> SiteFetcher {
        let mut site = SiteFetcher::default();
        for i in 0..n {
            let url = format!("https://site.example/p{}", i);
            let next = format!("https://site.example/p{}", i + 1);
            let links: Vec<&str> = if i + 1 < n { vec![next.as_str()] } else { vec![] };
            site = site.page(&url, &links);
        }
        site
    }

    #[tokio::test]
    async fn test_budget_limits_visits() {
        let target = CrawlTarget::new("https://site.example/p0", Vec::<String>::new()).unwrap();
        let fetcher = chain_site(10);
        let loads = fetcher.loads.clone();

        let outcome = Coordinator::new(target, fetcher, pipeline(), &crawler_config(3))
            .run()
            .await;

        assert_eq!(loads.lock().unwrap().len(), 3);
        assert_eq!(outcome.database.len(), 3);
        assert_eq!(outcome.report.termination, TerminationReason::BudgetReached);
        assert_eq!(outcome.report.stats.pages_dispatched, 3);
    }

    #[tokio::test]
    async fn test_exhausts_frontier_and_closes_fetcher() {
        let target = CrawlTarget::new("https://site.example/", Vec::<String>::new()).unwrap();
        let fetcher = SiteFetcher::default()
            .page(
                "https://site.example/",
                &[
                    "https://site.example/a",
                    "https://site.example/a#top",
                    "https://other.example/x",
                    "mailto:office@site.example",
                ],
            )
            .page("https://site.example/a", &["https://site.example/"]);
        let closed = fetcher.closed.clone();

        let outcome = Coordinator::new(target, fetcher, pipeline(), &crawler_config(10))
            .run()
            .await;

        assert_eq!(outcome.report.termination, TerminationReason::FrontierExhausted);
        assert_eq!(
            outcome.report.stored_urls,
            vec!["https://site.example/", "https://site.example/a"]
        );
        assert_eq!(outcome.report.stats.links_rejected, 2);
        assert!(*closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_navigation_failure_stores_nothing() {
        let target = CrawlTarget::new("https://site.example/", Vec::<String>::new()).unwrap();
        let fetcher = SiteFetcher::default().page("https://site.example/", &["https://site.example/gone"]);

        let outcome = Coordinator::new(target, fetcher, pipeline(), &crawler_config(10))
            .run()
            .await;

        assert!(!outcome.database.contains("https://site.example/gone"));
        assert_eq!(outcome.report.stats.pages_dispatched, 2);
        assert_eq!(outcome.report.stats.navigation_failures, 1);
        assert_eq!(outcome.report.stats.records_stored, 1);
    }

    #[tokio::test]
    async fn test_pacing_between_pages_only() {
        let target = CrawlTarget::new("https://site.example/p0", Vec::<String>::new()).unwrap();
        let sleeper = Arc::new(CountingSleeper::default());
        let pacer = Pacer::new(Duration::from_millis(2000), Duration::from_millis(4000));

        Coordinator::new(target, chain_site(3), pipeline(), &crawler_config(10))
            .with_pacer(pacer)
            .with_sleeper(sleeper.clone())
            .run()
            .await;

        let waits = sleeper.waits.lock().unwrap();
        assert_eq!(waits.len(), 2);
        assert!(waits
            .iter()
            .all(|d| *d >= Duration::from_millis(2000) && *d <= Duration::from_millis(4000)));
    }

    #[tokio::test]
    async fn test_checkpoint_written_during_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        let target = CrawlTarget::new("https://site.example/p0", Vec::<String>::new()).unwrap();

        Coordinator::new(target, chain_site(3), pipeline(), &crawler_config(10))
            .with_checkpoint(2, &path)
            .run()
            .await;

        // Written after the second page, not rewritten at the end
        assert_eq!(load_database(&path).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_page_deadline_skips_stalled_page() {
        let target = CrawlTarget::new("https://site.example/", Vec::<String>::new()).unwrap();
        let fetcher = SiteFetcher::default()
            .page(
                "https://site.example/",
                &["https://site.example/slow", "https://site.example/fast"],
            )
            .page("https://site.example/slow", &["https://site.example/hidden"])
            .page("https://site.example/fast", &[])
            .page("https://site.example/hidden", &[])
            .stalled("https://site.example/slow");
        let config = CrawlerConfig {
            page_timeout_secs: 1,
            ..crawler_config(10)
        };

        let outcome = Coordinator::new(target, fetcher, pipeline(), &config)
            .run()
            .await;

        assert_eq!(outcome.report.stats.navigation_failures, 1);
        assert_eq!(outcome.report.stats.pages_dispatched, 3);
        assert!(!outcome.database.contains("https://site.example/slow"));
        assert!(!outcome.database.contains("https://site.example/hidden"));
        assert!(outcome.database.contains("https://site.example/fast"));
        assert_eq!(outcome.report.termination, TerminationReason::FrontierExhausted);
    }

    #[tokio::test]
    async fn test_requests_locations_as_written() {
        let target =
            CrawlTarget::new("https://site.example/docs/", Vec::<String>::new()).unwrap();
        let fetcher = SiteFetcher::default()
            .page(
                "https://site.example/docs/",
                &[
                    "https://site.example/view?print",
                    "https://site.example/docs#top",
                ],
            )
            .page("https://site.example/view?print", &[]);
        let loads = fetcher.loads.clone();

        let outcome = Coordinator::new(target, fetcher, pipeline(), &crawler_config(10))
            .run()
            .await;

        assert_eq!(
            *loads.lock().unwrap(),
            vec![
                "https://site.example/docs/".to_string(),
                "https://site.example/view?print".to_string(),
            ]
        );
        assert_eq!(
            outcome.report.stored_urls,
            vec![
                "https://site.example/docs",
                "https://site.example/view?print=",
            ]
        );
        assert_eq!(outcome.report.stats.navigation_failures, 0);
    }

    #[test]
    fn test_persist_records_failure() {
        let dir = TempDir::new().unwrap();
        let blocked = dir.path().join("file");
        std::fs::write(&blocked, "x").unwrap();

        let outcome = CrawlOutcome {
            database: ContentDatabase::new(),
            report: CrawlReport::new(
                Utc::now(),
                Utc::now(),
                TerminationReason::FrontierExhausted,
                Default::default(),
                Vec::new(),
            ),
            save_error: None,
        };

        // A regular file cannot be a parent directory
        let outcome = persist(outcome, blocked.join("out.json"));
        assert!(matches!(outcome.save_error, Some(OutputError::Io { .. })));
        assert!(outcome.report.output_path.is_none());
    }
}
