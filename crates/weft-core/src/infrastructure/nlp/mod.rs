//! HTTP entity-extraction client

pub mod client;

pub use client::{HttpEntityExtractor, NlpClientConfig};
