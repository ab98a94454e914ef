//! HTTP API: job dispatch for the mention indexer plus the forum writes that
//! feed it.

pub mod app;
pub mod config;
