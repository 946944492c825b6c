//! Configuration files driving a real pipeline

use crate::support::{article, serve};
use pagepress::config::{load_config, load_config_with_hash, OutputFormat, RenderMode};
use pagepress::Pipeline;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::MockServer;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes()).expect("Failed to write config");
    file.flush().expect("Failed to flush config");
    file
}

#[tokio::test]
async fn test_config_file_drives_pipeline() {
    let server = MockServer::start().await;
    serve(&server, "/story", 200, article("Harbour", 10)).await;

    let file = write_config(
        r#"
[fetch]
timeout-ms = 2000
retries = 0

[render]
mode = "never"

[extract]
min-text-len = 50
output-format = "md"
"#,
    );

    let (config, hash) = load_config_with_hash(file.path()).expect("Failed to load config");
    assert_eq!(hash.len(), 64);
    assert_eq!(config.render.mode, RenderMode::Never);
    assert_eq!(config.extract.output_format, OutputFormat::Md);

    let pipeline = Pipeline::builder(config).build().expect("Failed to build pipeline");
    let result = pipeline
        .extract_url(&format!("{}/story", server.uri()))
        .await;
    assert!(result.is_ok(), "{:?}", result.error);
}

#[test]
fn test_invalid_config_rejected() {
    let file = write_config(
        r#"
[extract]
output-format = "pdf"
"#,
    );
    assert!(load_config(file.path()).is_err());
}

#[test]
fn test_missing_config_file() {
    assert!(load_config(std::path::Path::new("/nonexistent/pagepress.toml")).is_err());
}
