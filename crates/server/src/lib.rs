//! House price prediction HTTP server
//!
//! Serves predictions from the current artifact bundle, trains and retrains
//! on demand, and exposes health probes and Prometheus metrics.

pub mod api;
pub mod config;
