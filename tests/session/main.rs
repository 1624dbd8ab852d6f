//! Session-layer integration tests: identity cache, iterator adapter,
//! lazy queries and session lifecycle against the in-memory engine.

#[path = "../common/mod.rs"]
mod common;

mod adapter;
mod identity;
mod lifecycle;
mod properties;
mod query;
mod scenarios;
