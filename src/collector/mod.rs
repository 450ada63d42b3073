//! Device collectors.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Scraper                             │
//! │   one thread per device, one session per device per cycle   │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              Collector (trait)                         │  │
//! │  │  describe(DescSink)        collect(CollectorContext)   │  │
//! │  │  ┌──────────────────────┐                              │  │
//! │  │  │  FirewallCollector   │  /ip/firewall/filter/print   │  │
//! │  │  └──────────┬───────────┘                              │  │
//! │  └─────────────┼──────────────────────────────────────────┘  │
//! │         ┌──────▼───────┐              ┌──────────────┐       │
//! │         │ CommandClient│ (trait)      │  MetricSink  │       │
//! │         └──────┬───────┘              └──────────────┘       │
//! └────────────────┼─────────────────────────────────────────────┘
//!                  │
//!          ┌───────┴────────┐
//!   ┌──────▼──────┐  ┌──────▼──────┐
//!   │ ReplayClient│  │ MockClient  │
//!   │ (JSON)      │  │ (Testing)   │
//!   └─────────────┘  └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use routeros_exporter::collector::{Collector, CollectorContext, FirewallCollector};
//! use routeros_exporter::config::Device;
//! use routeros_exporter::metrics::Sample;
//! use routeros_exporter::routeros::{MockClient, Sentence};
//!
//! let rule: Sentence = [("chain", "input"), ("bytes", "1024"), ("packets", "8")]
//!     .into_iter()
//!     .collect();
//! let mut client = MockClient::new().with_reply("/ip/firewall/filter/print", vec![rule]);
//! let device = Device::new("edge-1", "192.0.2.1");
//! let mut samples: Vec<Sample> = Vec::new();
//!
//! let collector = FirewallCollector::new();
//! let mut ctx = CollectorContext::new(&device, &mut client, &mut samples);
//! collector.collect(&mut ctx).unwrap();
//! assert_eq!(samples.len(), 2);
//! ```

pub mod firewall;
pub mod scrape;

use crate::config::Device;
use crate::metrics::{DescSink, MetricSink};
use crate::routeros::{CommandClient, CommandError};

pub use firewall::{FieldParseError, FirewallCollector, Projection, ValueError};
pub use scrape::Scraper;

/// Error type for a collection pass.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectError {
    /// No session could be opened to the device.
    Connect(CommandError),
    /// A collector's snapshot could not be fetched.
    Fetch {
        command: String,
        source: CommandError,
    },
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Connect(e) => write!(f, "connect failed: {}", e),
            CollectError::Fetch { command, source } => {
                write!(f, "fetch {} failed: {}", command, source)
            }
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Connect(e) => Some(e),
            CollectError::Fetch { source, .. } => Some(source),
        }
    }
}

/// Everything a collector borrows for one `collect` call.
pub struct CollectorContext<'a> {
    pub device: &'a Device,
    pub client: &'a mut dyn CommandClient,
    pub sink: &'a mut dyn MetricSink,
}

impl<'a> CollectorContext<'a> {
    pub fn new(
        device: &'a Device,
        client: &'a mut dyn CommandClient,
        sink: &'a mut dyn MetricSink,
    ) -> Self {
        Self {
            device,
            client,
            sink,
        }
    }
}

/// A source of samples for one device.
///
/// `describe` must report every descriptor `collect` can emit samples for,
/// without touching the device.
pub trait Collector: Send + Sync {
    fn describe(&self, sink: &mut dyn DescSink);

    fn collect(&self, ctx: &mut CollectorContext<'_>) -> Result<(), CollectError>;
}
