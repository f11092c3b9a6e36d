//! HTTP client shared by both ledger integrations.

mod client;

pub use client::{HttpClient, HttpClientBuilder};
