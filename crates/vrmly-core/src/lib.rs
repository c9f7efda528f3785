//! Polling and derivation engine between `vrmly-api` and its consumers.
//!
//! - **[`PollCoordinator`]** runs the fixed-interval fetch -> derive ->
//!   publish cycle for one installation, counts consecutive failures and
//!   suspends itself while the access token is being replaced.
//!
//! - **[`VrmSession`]** wraps the HTTP client and classifies every failed
//!   fetch as [`FetchError::Transient`], [`FetchError::Unauthorized`] or
//!   [`FetchError::Protocol`].
//!
//! - **[`DerivationEngine`]** computes ratio and product sensors from raw
//!   readings with null propagation and a zero-denominator guard.
//!
//! - **[`ReauthGate`]** owns the token lifecycle and exposes the
//!   reauth-required signal ([`AuthWatch`]).
//!
//! - **[`SensorStream`]** is the per-observer subscription to the
//!   published [`Feed`].

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod derive;
pub mod error;
pub mod model;
pub mod reauth;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use catalog::{AttributeCatalog, AttributeId, AttributeInfo, ValueKind};
pub use config::EngineConfig;
pub use coordinator::{PollCoordinator, PollOutcome, PollState};
pub use derive::DerivationEngine;
pub use error::{CoreError, FetchError};
pub use reauth::{AuthState, AuthStatus, AuthWatch, ReauthGate, TokenLease};
pub use session::VrmSession;
pub use store::{Feed, FeedStatus, entity_id};
pub use stream::SensorStream;

pub use model::{
    Availability, DEFAULT_SENSORS, Derivation, DerivedReading, RawReading, SensorDefinition,
    SensorKind, SensorSet, SensorUpdate, SensorValue, Snapshot, Unit,
};

pub use vrmly_api::Installation;
