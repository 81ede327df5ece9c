//! # Radar REST
//!
//! [`UnreadBackend`](radar_core::UnreadBackend) over the hosted backend's
//! RPC endpoints.
//!
//! Every call is a `POST {base}/rest/v1/rpc/<function>` with a JSON body.
//! Failures are mapped onto [`BackendError`](radar_core::BackendError); a
//! missing function surfaces as `SetupRequired` so callers can tell an
//! unprovisioned backend apart from an outage.

pub mod client;
pub mod config;
pub mod error;

pub use client::{RestBackend, rpc};
pub use config::RestConfig;
pub use error::{RestError, map_status};
