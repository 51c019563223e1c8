//! Integration tests: full scan runs against an in-memory market.

mod fixture_source;
mod pipeline;
