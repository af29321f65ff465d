//! Core domain + pipelines for the trading-chat summarizer.
//!
//! This crate is intentionally provider-agnostic. Discord / Gemini / GCS / Notion
//! live behind ports (traits) implemented in adapter crates.

pub mod aggregator;
pub mod config;
pub mod domain;
pub mod errors;
pub mod fetcher;
pub mod logging;
pub mod ports;
pub mod report;
pub mod retry;
pub mod source;
pub mod storage;
pub mod utils;

pub use errors::{Error, Result};
