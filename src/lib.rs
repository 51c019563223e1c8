//! ZONESCAN: RSI zone frequency and breakout scanner for Binance USDT pairs.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod analysis;
pub mod market;
pub mod engine;
pub mod storage;
