//! Integration tests for the crawler
//!
//! These use wiremock to serve small link graphs and check discovery
//! end-to-end through the public pipeline.

use crate::support::{article, config, serve};
use pagepress::config::RenderMode;
use pagepress::Pipeline;
use wiremock::MockServer;

fn index(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|l| format!(r#"<li><a href="{}">{}</a></li>"#, l, l))
        .collect();
    format!(
        "<html><head><title>Index</title></head><body><ul>{}</ul></body></html>",
        anchors
    )
}

#[tokio::test]
async fn test_full_crawl_single_host() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    serve(&server, "/", 200, index(&["/news", "/sport", "mailto:desk@example.com"])).await;
    serve(&server, "/news", 200, index(&["/news/1", "/news/2", "/sport"])).await;
    serve(&server, "/sport", 200, index(&["/sport/1", "https://other.example.net/x"])).await;

    let mut config = config(RenderMode::Never, 10);
    config.crawl.max_depth = 2;
    // a single worker keeps admission order deterministic within a level
    config.crawl.max_workers = 1;
    let pipeline = Pipeline::builder(config).build().expect("Failed to build pipeline");

    let report = pipeline.crawl_report(&[format!("{}/", base_url)]).await;
    let urls = report.urls();

    assert_eq!(
        urls,
        vec![
            format!("{}/news", base_url),
            format!("{}/sport", base_url),
            format!("{}/news/1", base_url),
            format!("{}/news/2", base_url),
            format!("{}/sport/1", base_url),
        ]
    );
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.pages_failed, 0);
}

#[tokio::test]
async fn test_allow_and_deny_patterns() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/",
        200,
        index(&["/2024/story-a", "/2024/story-b", "/tag/politics", "/2024/story-c?print=1"]),
    )
    .await;

    let mut config = config(RenderMode::Never, 10);
    config.crawl.max_depth = 1;
    config.crawl.allow_patterns = vec![r"/\d{4}/".to_string()];
    config.crawl.deny_patterns = vec![r"story-b".to_string()];
    let pipeline = Pipeline::builder(config).build().expect("Failed to build pipeline");

    let urls = pipeline.crawl(&[format!("{}/", server.uri())]).await;

    assert_eq!(urls.len(), 2);
    assert!(urls[0].ends_with("/2024/story-a"));
    assert!(urls[1].contains("/2024/story-c"));
}

#[tokio::test]
async fn test_invalid_pattern_fails_build() {
    let mut config = config(RenderMode::Never, 10);
    config.crawl.deny_patterns = vec!["(unclosed".to_string()];
    assert!(Pipeline::builder(config).build().is_err());
}

#[tokio::test]
async fn test_crawl_then_extract_discovered() {
    let server = MockServer::start().await;
    serve(&server, "/", 200, index(&["/a", "/b", "/missing"])).await;
    serve(&server, "/a", 200, article("Alpha", 8)).await;
    serve(&server, "/b", 200, article("Beta", 8)).await;

    let mut config = config(RenderMode::Never, 100);
    config.crawl.max_depth = 1;
    config.crawl.max_workers = 2;
    let pipeline = Pipeline::builder(config).build().expect("Failed to build pipeline");

    let results = pipeline
        .crawl_and_extract(&[format!("{}/", server.uri())])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].title.as_deref(), Some("Alpha"));
    assert_eq!(results[1].title.as_deref(), Some("Beta"));

    // wiremock answers unmatched routes with 404 and an empty body
    assert_eq!(results[2].status_code, Some(404));
    assert!(results[2].text.is_none());
}
