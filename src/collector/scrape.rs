//! Runs collectors against every configured device.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use tracing::{debug, error};

use super::{CollectError, Collector, CollectorContext, FirewallCollector};
use crate::config::Device;
use crate::metrics::{Desc, DescSink, MetricSink, NAMESPACE, Sample, build_fq_name};
use crate::routeros::Connector;

/// Drives one scrape cycle over a set of devices.
///
/// Each device gets its own session and its own thread. Collectors run in
/// registration order and the first failing collector ends that device's
/// cycle. Every device always reports
/// `mikrotik_scrape_collector_duration_seconds` and
/// `mikrotik_scrape_collector_success`.
pub struct Scraper {
    devices: Vec<Device>,
    connector: Box<dyn Connector>,
    collectors: Vec<Box<dyn Collector>>,
    duration_desc: Arc<Desc>,
    success_desc: Arc<Desc>,
}

impl Scraper {
    /// Creates a scraper with no collectors.
    pub fn new(devices: Vec<Device>, connector: impl Connector + 'static) -> Self {
        Self {
            devices,
            connector: Box::new(connector),
            collectors: Vec::new(),
            duration_desc: Arc::new(Desc::new(
                build_fq_name(NAMESPACE, "scrape", "collector_duration_seconds"),
                "Duration of a device scrape in seconds",
                &["device"],
            )),
            success_desc: Arc::new(Desc::new(
                build_fq_name(NAMESPACE, "scrape", "collector_success"),
                "Whether the device scrape succeeded",
                &["device"],
            )),
        }
    }

    /// Creates a scraper running every built-in collector.
    pub fn with_default_collectors(
        devices: Vec<Device>,
        connector: impl Connector + 'static,
    ) -> Self {
        Self::new(devices, connector).with_collector(FirewallCollector::new())
    }

    pub fn with_collector(mut self, collector: impl Collector + 'static) -> Self {
        self.collectors.push(Box::new(collector));
        self
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Registers the scrape bookkeeping descriptors and every collector's.
    pub fn describe(&self, sink: &mut dyn DescSink) {
        sink.register(Arc::clone(&self.duration_desc));
        sink.register(Arc::clone(&self.success_desc));
        for collector in &self.collectors {
            collector.describe(sink);
        }
    }

    /// Scrapes a single device.
    pub fn scrape_device(
        &self,
        device: &Device,
        sink: &mut dyn MetricSink,
    ) -> Result<(), CollectError> {
        let start = Instant::now();
        let result = self.connect_and_collect(device, sink);
        let elapsed = start.elapsed().as_secs_f64();

        let success = match &result {
            Ok(()) => {
                debug!(device = %device.name, duration_secs = elapsed, "scrape succeeded");
                1.0
            }
            Err(e) => {
                error!(device = %device.name, duration_secs = elapsed, error = %e, "scrape failed");
                0.0
            }
        };

        let labels = vec![device.name.clone()];
        sink.emit(Sample::gauge(&self.duration_desc, elapsed, labels.clone()));
        sink.emit(Sample::gauge(&self.success_desc, success, labels));

        result
    }

    fn connect_and_collect(
        &self,
        device: &Device,
        sink: &mut dyn MetricSink,
    ) -> Result<(), CollectError> {
        let mut client = self
            .connector
            .connect(device)
            .map_err(CollectError::Connect)?;

        for collector in &self.collectors {
            let mut ctx = CollectorContext::new(device, client.as_mut(), sink);
            collector.collect(&mut ctx)?;
        }

        Ok(())
    }

    /// Scrapes all devices concurrently, forwarding every sample to `sink`.
    ///
    /// Returns the number of devices whose scrape failed.
    pub fn scrape_all(&self, sink: &mut dyn MetricSink) -> usize {
        let (tx, rx) = mpsc::channel::<Sample>();

        thread::scope(|s| {
            let handles: Vec<_> = self
                .devices
                .iter()
                .map(|device| {
                    let mut tx = tx.clone();
                    s.spawn(move || self.scrape_device(device, &mut tx).is_err())
                })
                .collect();
            drop(tx);

            for sample in rx.iter() {
                sink.emit(sample);
            }

            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(true))
                .filter(|failed| *failed)
                .count()
        })
    }
}
