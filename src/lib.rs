//! routeros-exporter - RouterOS device metrics collection library.
//!
//! Collectors query a device over the RouterOS command API and project the
//! returned rows into labeled metric samples:
//! - `collector` - the `Collector` contract, the firewall filter collector
//!   and the per-device `Scraper`
//! - `routeros` - command session abstractions (mock and replay sessions)
//! - `metrics` - descriptors, samples, sinks and Prometheus exposition
//! - `config` - device list

pub mod collector;
pub mod config;
pub mod metrics;
pub mod routeros;
