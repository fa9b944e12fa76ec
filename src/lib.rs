//! Markdown to PDF conversion: validation, GitHub-flavoured rendering,
//! print templating and headless-browser capture behind an HTTP API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
