//! Integration tests for Pagepress
//!
//! These tests run the public pipeline end-to-end against wiremock
//! servers, with a static in-memory render backend standing in for a
//! browser.

mod config_tests;
mod crawl_tests;
mod extract_tests;
mod support;
