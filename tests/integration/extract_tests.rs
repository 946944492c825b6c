//! End-to-end extraction through the public pipeline

use crate::support::{article, config, serve, shell, StaticBackend};
use pagepress::config::{OutputFormat, RenderMode};
use pagepress::render::RenderBackend;
use pagepress::{Pipeline, ResultError};
use std::sync::Arc;
use wiremock::MockServer;

fn pipeline_with(
    config: pagepress::PipelineConfig,
    backend: Option<Arc<StaticBackend>>,
) -> Pipeline {
    let mut builder = Pipeline::builder(config);
    if let Some(backend) = backend {
        builder = builder.render_backend(backend as Arc<dyn RenderBackend>);
    }
    builder.build().expect("Failed to build pipeline")
}

#[tokio::test]
async fn test_mixed_batch_renders_only_incomplete_pages() {
    let server = MockServer::start().await;
    serve(&server, "/complete", 200, article("Council", 12)).await;
    serve(&server, "/app", 200, shell()).await;

    let complete = format!("{}/complete", server.uri());
    let app = format!("{}/app", server.uri());
    let unreachable = "http://127.0.0.1:1/down".to_string();

    let backend = Arc::new(StaticBackend::new().page(&app, article("Budget", 12)));
    let pipeline = pipeline_with(config(RenderMode::Auto, 200), Some(Arc::clone(&backend)));

    let urls = vec![complete.clone(), app.clone(), unreachable.clone()];
    let results = pipeline.extract_urls(&urls).await;
    pipeline.shutdown().await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].url, complete);
    assert_eq!(results[1].url, app);
    assert_eq!(results[2].url, unreachable);

    // Fetched page was long enough
    assert!(results[0].is_ok(), "{:?}", results[0].error);
    assert!(!results[0].used_render);
    assert_eq!(results[0].title.as_deref(), Some("Council"));

    // Loading shell needed a render
    assert!(results[1].is_ok(), "{:?}", results[1].error);
    assert!(results[1].used_render);
    assert!(results[1].text.as_deref().unwrap_or_default().contains("Budget"));

    // Neither fetch nor render reached the host
    assert!(matches!(
        results[2].error,
        Some(ResultError::FetchAndRender { .. })
    ));
    assert!(results[2].text.is_none());

    assert_eq!(backend.navigations(), 2);
}

#[tokio::test]
async fn test_never_mode_without_backend() {
    let server = MockServer::start().await;
    serve(&server, "/app", 200, shell()).await;
    let url = format!("{}/app", server.uri());

    let pipeline = pipeline_with(config(RenderMode::Never, 200), None);
    let result = pipeline.extract_url(&url).await;

    assert!(!result.used_render);
    assert_eq!(result.error_code().as_deref(), Some("extraction_empty"));
    assert_eq!(result.status_code, Some(200));
}

#[tokio::test]
async fn test_auto_mode_requires_backend() {
    let result = Pipeline::builder(config(RenderMode::Auto, 200)).build();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_captcha_page_is_not_rendered() {
    let server = MockServer::start().await;
    let challenge = r#"<html><head><title>Just a moment...</title></head>
        <body><div class="g-recaptcha"></div></body></html>"#;
    serve(&server, "/wall", 200, challenge.to_string()).await;
    let url = format!("{}/wall", server.uri());

    let backend = Arc::new(StaticBackend::new().page(&url, article("Hidden", 12)));
    let pipeline = pipeline_with(config(RenderMode::Auto, 200), Some(Arc::clone(&backend)));
    let result = pipeline.extract_url(&url).await;

    assert_eq!(result.error, Some(ResultError::CaptchaDetected));
    assert!(result.text.is_none());
    assert_eq!(backend.navigations(), 0);
}

#[tokio::test]
async fn test_markdown_with_appended_images() {
    let server = MockServer::start().await;
    let page = article("Harbour", 10).replace(
        "<article>",
        r#"<article><img src="https://cdn.example.com/harbour.jpg" alt="Harbour">"#,
    );
    serve(&server, "/story", 200, page).await;
    let url = format!("{}/story", server.uri());

    let mut config = config(RenderMode::Never, 100);
    config.extract.output_format = OutputFormat::Md;
    config.extract.keep_images = true;
    config.extract.append_images = true;

    let pipeline = pipeline_with(config, None);
    let result = pipeline.extract_url(&url).await;

    let text = result.text.expect("expected text");
    assert!(text.contains("**Images**"));
    assert!(text.contains("![](https://cdn.example.com/harbour.jpg)"));
    assert_eq!(result.images, vec!["https://cdn.example.com/harbour.jpg"]);
    assert!(result.image_ms.is_some());
}

#[tokio::test]
async fn test_html_output_is_a_styled_document() {
    let server = MockServer::start().await;
    serve(&server, "/story", 200, article("Harbour", 10)).await;
    let url = format!("{}/story", server.uri());

    let mut config = config(RenderMode::Never, 100);
    config.extract.output_format = OutputFormat::Html;

    let pipeline = pipeline_with(config, None);
    let result = pipeline.extract_url(&url).await;

    let text = result.text.expect("expected html");
    assert!(text.contains("<html"));
    assert!(text.contains("<style"));
    assert!(text.contains("Paragraph 9"));
}

#[tokio::test]
async fn test_results_serialize_as_json_lines() {
    let server = MockServer::start().await;
    serve(&server, "/story", 200, article("Harbour", 10)).await;
    serve(&server, "/app", 200, shell()).await;

    let urls = vec![
        format!("{}/story", server.uri()),
        format!("{}/app", server.uri()),
    ];
    let pipeline = pipeline_with(config(RenderMode::Never, 100), None);
    let results = pipeline.extract_urls(&urls).await;

    let lines: Vec<serde_json::Value> = results
        .iter()
        .map(|r| serde_json::to_value(r).expect("serializable"))
        .collect();

    assert_eq!(lines[0]["title"], "Harbour");
    assert_eq!(lines[0]["used_render"], false);
    assert!(lines[0]["error"].is_null());
    assert!(lines[0]["extracted_at"].is_string());

    assert!(lines[1]["text"].is_null());
    assert_eq!(lines[1]["error"], "extraction_empty");
}
