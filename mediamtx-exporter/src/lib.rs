//! Prometheus re-exporter for MediaMTX metrics.
//!
//! The exporter polls the MediaMTX metrics endpoint, parses the exposition
//! text into a snapshot and serves the latest snapshot on its own HTTP
//! `/metrics` endpoint. When MediaMTX is unreachable or rejects every
//! credential, the endpoint still answers with a minimal "down" body so the
//! exporter itself stays observable.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │    MediaMTX     │────>│    Refresher    │────>│  SnapshotStore  │
//! │   (/metrics)    │     │ fetch + parse   │     │  (Arc swap)     │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!                           ▲             ▲                │
//!                           │             │                v
//!                  ┌────────┴───────┐  ┌──┴──────────────────────┐
//!                  │   Scheduler    │  │       HTTP Server       │
//!                  │  (interval)    │  │  (/metrics, /health)    │
//!                  └────────────────┘  └─────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! mediamtx-exporter --config config.json5
//! mediamtx-exporter --auth external --upstream-url http://localhost:9998/metrics
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod error;
pub mod exposition;
pub mod fetcher;
pub mod filter;
pub mod http;
pub mod parser;
pub mod refresh;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use config::ExporterConfig;
pub use error::{HandlerError, UpstreamError};
pub use fetcher::{FetchOutcome, Fetcher};
pub use filter::MetricFilter;
pub use http::HttpServer;
pub use refresh::{RefreshReport, Refresher, SharedRefresher};
pub use scheduler::RefreshScheduler;
pub use snapshot::{SampleKey, SampleValue, Snapshot};
pub use store::{SharedStore, SnapshotStore};
