//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock HTTP servers and run whole
//! directory harvests and site crawls end-to-end against them.

mod directory_tests;
mod site_tests;
mod support;
