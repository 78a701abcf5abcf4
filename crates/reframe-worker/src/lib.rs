//! Crop planning request worker.
//!
//! This crate provides:
//! - An explicit processing context with scoped per-request leases
//! - Analyze, clip, render and process request handlers
//! - Configuration from the environment
//! - Structured request logging and metrics

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod processor;

pub use config::{DetectorKind, WorkerConfig};
pub use context::{ProcessingContext, RequestLease};
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, RequestLogger};
pub use processor::{Operation, RequestProcessor, WorkerRequest, WorkerResponse};
