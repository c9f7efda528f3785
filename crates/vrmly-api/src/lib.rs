// vrmly-api: Async Rust client for the Victron VRM cloud API
//
// Covers the two endpoints the poller needs: installation discovery and
// the Graph widget, which returns the latest datapoint per attribute id.

pub mod auth;
pub mod client;
pub mod error;
pub mod graph;
pub mod installations;
pub mod models;
pub mod transport;

pub use auth::{API_BASE_URL, AUTH_HEADER, default_base_url};
pub use client::VrmClient;
pub use error::Error;
pub use graph::LatestValues;
pub use models::Installation;
pub use transport::{TlsMode, TransportConfig};
