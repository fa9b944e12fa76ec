//! Conversion pipeline and the services it is composed of.

pub mod conversion;
pub mod engine;
pub mod error;
pub mod limiter;
pub mod markdown;
pub mod template;
