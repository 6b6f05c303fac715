//! Integration tests for the crawler
//!
//! These tests use wiremock to serve small sites and run full crawls through
//! the HTTP fetcher, the extraction pipeline and the crawl loop.

use async_trait::async_trait;
use serde_json::json;
use sitelingo::config::{Config, CrawlerConfig, FetcherConfig, LocaleConfig};
use sitelingo::content::LocaleContent;
use sitelingo::crawler::{
    persist, run_crawl, Coordinator, CrawlOutcome, ExtractionPipeline, HttpPageFetcher,
    SettlePolicy,
};
use sitelingo::output::{load_database, TerminationReason};
use sitelingo::structurer::{StructureError, Structurer};
use sitelingo::{CrawlError, CrawlTarget};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Wraps the normalized text in a JSON object instead of calling a real service
struct EchoStructurer;

#[async_trait]
impl Structurer for EchoStructurer {
    async fn structure(&self, text: &str, source_url: &str) -> Result<String, StructureError> {
        Ok(json!({ "url": source_url, "text": text }).to_string())
    }
}

fn fast_crawler(max_pages: usize) -> CrawlerConfig {
    CrawlerConfig {
        max_pages,
        min_delay_ms: 0,
        max_delay_ms: 0,
        page_timeout_secs: 30,
        checkpoint_every: 0,
    }
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(format!("<html><body>{}</body></html>", body))
}

/// Runs a crawl against the mock server with an echoing structurer
async fn crawl(seed: &str, allow_list: &[String], max_pages: usize) -> CrawlOutcome {
    let target = CrawlTarget::new(seed, allow_list).expect("valid target");
    let fetcher = HttpPageFetcher::new(&FetcherConfig::default()).expect("fetcher");
    let pipeline = ExtractionPipeline::new(
        Arc::new(EchoStructurer),
        LocaleConfig::default(),
        "#lang_select",
    )
    .expect("pipeline")
    .with_settle_policy(SettlePolicy::immediate());

    Coordinator::new(target, fetcher, pipeline, &fast_crawler(max_pages))
        .run()
        .await
}

fn text_of(content: Option<&LocaleContent>) -> String {
    match content {
        Some(LocaleContent::Structured(value)) => value["text"].as_str().unwrap_or_default().to_string(),
        other => panic!("expected structured content, got {:?}", other),
    }
}

#[tokio::test]
async fn test_budget_stops_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let links: String = (1..10)
        .map(|i| format!(r#"<a href="/p{}">Page {}</a>"#, i, i))
        .collect();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&links))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(html_page("<main><p>Leaf page</p></main>"))
        .mount(&mock_server)
        .await;

    let outcome = crawl(&base_url, &[], 3).await;

    assert_eq!(outcome.report.stats.pages_dispatched, 3);
    assert_eq!(outcome.database.len(), 3);
    assert_eq!(outcome.report.termination, TerminationReason::BudgetReached);
    assert!(outcome.database.contains(&format!("{}/", base_url)));
}

#[tokio::test]
async fn test_allow_list_limits_scope() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/programs"))
        .respond_with(html_page(
            r#"
            <main><p>Programs</p></main>
            <a href="/programs/apply">Apply</a>
            <a href="/about">About</a>
            <a href="/programsextra">Look-alike</a>
            <a href="http://other.example/x">Elsewhere</a>
            "#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/programs/apply"))
        .respond_with(html_page(
            r#"<main><p>How to apply</p></main><a href="/programs">Back</a>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html_page("<p>About us</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/programsextra"))
        .respond_with(html_page("<p>Not in scope</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let seed = format!("{}/programs", base_url);
    let outcome = crawl(&seed, &[seed.clone()], 10).await;

    let stored: Vec<&str> = outcome.database.urls().collect();
    assert_eq!(
        stored,
        vec![seed.as_str(), format!("{}/programs/apply", base_url).as_str()]
    );
    assert_eq!(outcome.report.termination, TerminationReason::FrontierExhausted);
    assert_eq!(outcome.report.stats.links_rejected, 3);
}

#[tokio::test]
async fn test_single_locale_page_uses_default_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("<main><h1>Notices</h1><p>Exam dates</p></main>"))
        .mount(&mock_server)
        .await;

    let outcome = crawl(&mock_server.uri(), &[], 5).await;

    let record = outcome
        .database
        .get(&format!("{}/", mock_server.uri()))
        .expect("record stored");
    assert_eq!(record.locales.len(), 1);
    assert!(text_of(record.locale("english")).contains("Exam dates"));
}

#[tokio::test]
async fn test_multi_locale_page_with_failed_locale() {
    let mock_server = MockServer::start().await;

    let switch = r#"
        <select id="lang_select">
            <option value="en">English</option>
            <option value="od">ଓଡ଼ିଆ</option>
        </select>
    "#;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("lang", "od"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("lang", "en"))
        .respond_with(html_page(&format!(
            "{}<main><p>Department of Higher Education</p></main>",
            switch
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&format!("{}<main><p>Loading</p></main>", switch)))
        .mount(&mock_server)
        .await;

    let outcome = crawl(&mock_server.uri(), &[], 5).await;

    let record = outcome
        .database
        .get(&format!("{}/", mock_server.uri()))
        .expect("record stored");

    assert_eq!(record.locales.len(), 2);
    assert!(text_of(record.locale("english")).contains("Department of Higher Education"));
    assert_eq!(record.locales.get("odia"), Some(&None));
    assert_eq!(outcome.report.stats.absent_locales, 1);
}

#[tokio::test]
async fn test_navigation_failure_produces_no_record() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<p>Home</p><a href="/missing">Broken</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let outcome = crawl(&base_url, &[], 10).await;

    assert_eq!(outcome.database.len(), 1);
    assert!(!outcome.database.contains(&format!("{}/missing", base_url)));
    assert_eq!(outcome.report.stats.pages_dispatched, 2);
    assert_eq!(outcome.report.stats.navigation_failures, 1);
}

#[tokio::test]
async fn test_saved_output_round_trips() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("crawl_results.json");

    Mock::given(method("GET"))
        .respond_with(html_page(
            "<main><p>ଓଡ଼ିଶା ସରକାର</p><p>हिन्दी</p><p>English</p></main>",
        ))
        .mount(&mock_server)
        .await;

    let outcome = persist(crawl(&mock_server.uri(), &[], 1).await, output.clone());

    assert_eq!(outcome.report.output_path, Some(output.display().to_string()));
    let loaded = load_database(&output).unwrap();
    assert_eq!(loaded, outcome.database);

    let raw = std::fs::read_to_string(&output).unwrap();
    assert!(raw.contains("ଓଡ଼ିଶା ସରକାର"));
}

#[tokio::test]
async fn test_run_crawl_end_to_end() {
    let site = MockServer::start().await;
    let service = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("results.json");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<main><p>Home</p></main><a href="/contact">Contact</a>"#))
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(html_page("<main><p>Call the office</p></main>"))
        .mount(&site)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "```json\n{\"title\": \"Page\"}\n```"}]}
            }]
        })))
        .expect(2)
        .mount(&service)
        .await;

    std::env::set_var("SITELINGO_IT_API_KEY", "test-key");

    let mut config = Config::for_target(site.uri(), Vec::new());
    config.crawler = fast_crawler(10);
    config.fetcher.settle_dwell_ms = 0;
    config.structurer.endpoint = service.uri();
    config.structurer.model = "gemini-test".to_string();
    config.structurer.api_key_env = "SITELINGO_IT_API_KEY".to_string();
    config.output.path = output.display().to_string();

    let outcome = run_crawl(config).await.expect("crawl runs");

    assert_eq!(outcome.report.pages_processed(), 2);
    assert!(outcome.save_error.is_none());

    let loaded = load_database(&output).unwrap();
    let record = loaded
        .get(&format!("{}/contact", site.uri()))
        .expect("contact page stored");
    assert_eq!(
        record.locale("english"),
        Some(&LocaleContent::Structured(json!({"title": "Page"})))
    );
}

#[tokio::test]
async fn test_run_crawl_fails_without_api_key() {
    let mut config = Config::for_target("https://site.example/", Vec::new());
    config.structurer.api_key_env = "SITELINGO_IT_KEY_NEVER_SET".to_string();

    let result = run_crawl(config).await;
    assert!(matches!(
        result,
        Err(CrawlError::Structure(StructureError::MissingApiKey(_)))
    ));
}

#[tokio::test]
async fn test_run_crawl_rejects_invalid_config() {
    let mut config = Config::for_target("https://site.example/", Vec::new());
    config.crawler.max_pages = 0;

    let result = run_crawl(config).await;
    assert!(matches!(result, Err(CrawlError::Config(_))));
}

#[tokio::test]
async fn test_directory_seed_is_requested_as_written() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/docs/"))
        .respond_with(html_page(
            r#"<main><p>Guides</p></main><a href="intro">Intro</a><a href="/view?print">Print</a>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/intro"))
        .respond_with(html_page("<main><p>Getting started</p></main>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/view"))
        .respond_with(html_page("<main><p>Printable view</p></main>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let outcome = crawl(&format!("{}/docs/", base_url), &[], 10).await;

    assert_eq!(outcome.report.stats.navigation_failures, 0);
    assert_eq!(outcome.database.len(), 3);
    let record = outcome
        .database
        .get(&format!("{}/docs", base_url))
        .expect("seed stored under its canonical key");
    assert!(text_of(record.locale("english")).contains("Guides"));
    assert!(outcome.database.contains(&format!("{}/docs/intro", base_url)));

    let requests = mock_server
        .received_requests()
        .await
        .expect("request recording is on");
    let queries: Vec<Option<&str>> = requests
        .iter()
        .filter(|request| request.url.path() == "/view")
        .map(|request| request.url.query())
        .collect();
    assert_eq!(queries, vec![Some("print")]);
}
