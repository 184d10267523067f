//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the UserStore port
//! - reqwest HTTP client for ProfileSource

pub mod duckdb;
pub mod http;

#[cfg(test)]
pub mod feed_mock;
