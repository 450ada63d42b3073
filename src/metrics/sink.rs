//! Destinations for descriptors and samples.

use std::sync::Arc;
use std::sync::mpsc::Sender;

use tracing::debug;

use super::{Desc, Sample};

/// Receives samples from a collector. Collectors never read back.
pub trait MetricSink {
    fn emit(&mut self, sample: Sample);
}

/// Receives descriptors during registration.
pub trait DescSink {
    fn register(&mut self, desc: Arc<Desc>);
}

impl MetricSink for Vec<Sample> {
    fn emit(&mut self, sample: Sample) {
        self.push(sample);
    }
}

impl MetricSink for Sender<Sample> {
    fn emit(&mut self, sample: Sample) {
        if self.send(sample).is_err() {
            // Receiver gone: the scrape was abandoned.
            debug!("dropping sample, receiver closed");
        }
    }
}

impl DescSink for Vec<Arc<Desc>> {
    fn register(&mut self, desc: Arc<Desc>) {
        self.push(desc);
    }
}
