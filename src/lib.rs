//! Quotagate - API-key fixed-window rate limiting
//!
//! This crate authenticates callers by an opaque API key, counts their
//! requests per fixed time window, and rejects requests once the configured
//! quota is exceeded. State lives behind a pluggable backend: an in-memory
//! map or a JSON document on disk.

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;
