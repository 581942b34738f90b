//! Upstream provider adapters for the vaultgate gateway.
//!
//! One shared HTTP transport ([`http::HttpClient`]), one admission
//! controller per provider ([`runner::ProviderRunner`]), and one adapter
//! module per upstream under [`adapters`]. Adapters implement the
//! capability traits from `vaultgate-core` and normalize every response
//! into the canonical schema.

#![forbid(unsafe_code)]

pub mod adapters;
pub mod http;
pub mod runner;

pub use http::{HttpClient, HttpMetrics};
pub use runner::ProviderRunner;
