//! Whitelisting proxy and aggregated status board for a network-monitoring
//! backend.
//!
//! The proxy half (`guard`, `sanitize`, `upstream`, `routes`) runs server-side
//! and is the only component that holds the upstream token. The board half
//! (`client`, `aggregate`, `board`, `view`, `settings`) polls through the
//! proxy and derives what the dashboard shows.

pub mod aggregate;
pub mod board;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod logging;
pub mod models;
pub mod routes;
pub mod sanitize;
pub mod settings;
pub mod upstream;
pub mod view;

pub use config::{BoardConfig, Config};
pub use upstream::UpstreamClient;

// Re-exported so routes/*.rs and the binaries only depend on the crate root.
pub use models::{AggregatedDevice, Alert, Device, DeviceGroup};
