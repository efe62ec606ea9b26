//! HTTP client layer — `DataServiceHttp` with per-request retry policies.

pub mod client;
pub mod retry;

pub use client::DataServiceHttp;
pub use retry::{RetryConfig, RetryPolicy};
