//! Bridge from [`Scraper`] output to the `prometheus` crate.
//!
//! Samples are turned into const metric families on every gather, so the
//! registry never holds counter state of its own.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use prometheus::core::{Collector as PromCollector, Desc as PromDesc};
use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::warn;

use super::{Desc, MetricKind, Sample};
use crate::collector::Scraper;

/// Exposes a [`Scraper`] as a `prometheus` collector.
///
/// Each gather runs one full scrape of every device.
pub struct PrometheusBridge {
    scraper: Arc<Scraper>,
    descs: Vec<PromDesc>,
}

impl PrometheusBridge {
    pub fn new(scraper: Arc<Scraper>) -> prometheus::Result<Self> {
        let mut ours: Vec<Arc<Desc>> = Vec::new();
        scraper.describe(&mut ours);

        let descs = ours
            .iter()
            .map(|d| {
                PromDesc::new(
                    d.fq_name.clone(),
                    d.help.clone(),
                    d.label_names.clone(),
                    HashMap::new(),
                )
            })
            .collect::<prometheus::Result<Vec<_>>>()?;

        Ok(Self { scraper, descs })
    }
}

impl PromCollector for PrometheusBridge {
    fn desc(&self) -> Vec<&PromDesc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut samples: Vec<Sample> = Vec::new();
        self.scraper.scrape_all(&mut samples);
        metric_families(&samples)
    }
}

/// Groups samples into one family per metric name, ordered by name.
///
/// Samples sharing a name and label values are all kept; each repeat is
/// logged at `warn`.
pub fn metric_families(samples: &[Sample]) -> Vec<MetricFamily> {
    let mut families: BTreeMap<&str, MetricFamily> = BTreeMap::new();

    for sample in duplicate_series(samples) {
        warn!(
            metric = %sample.desc.fq_name,
            labels = ?sample.label_values,
            "duplicate series in scrape output"
        );
    }

    for sample in samples {
        let family = families
            .entry(sample.desc.fq_name.as_str())
            .or_insert_with(|| {
                let mut mf = MetricFamily::default();
                mf.set_name(sample.desc.fq_name.clone());
                mf.set_help(sample.desc.help.clone());
                mf.set_field_type(match sample.kind {
                    MetricKind::Counter => MetricType::COUNTER,
                    MetricKind::Gauge => MetricType::GAUGE,
                });
                mf
            });
        family.mut_metric().push(to_metric(sample));
    }

    families.into_values().collect()
}

/// Samples whose name and label values were already seen earlier in
/// `samples`.
fn duplicate_series(samples: &[Sample]) -> Vec<&Sample> {
    let mut seen: HashSet<(&str, &[String])> = HashSet::new();
    samples
        .iter()
        .filter(|s| !seen.insert((s.desc.fq_name.as_str(), s.label_values.as_slice())))
        .collect()
}

fn to_metric(sample: &Sample) -> Metric {
    let mut labels: Vec<LabelPair> = sample
        .desc
        .label_names
        .iter()
        .zip(&sample.label_values)
        .map(|(name, value)| {
            let mut pair = LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value(value.clone());
            pair
        })
        .collect();
    labels.sort_by(|a, b| a.get_name().cmp(b.get_name()));

    let mut metric = Metric::default();
    metric.set_label(labels.into());
    match sample.kind {
        MetricKind::Counter => {
            let mut counter = Counter::default();
            counter.set_value(sample.value);
            metric.set_counter(counter);
        }
        MetricKind::Gauge => {
            let mut gauge = Gauge::default();
            gauge.set_value(sample.value);
            metric.set_gauge(gauge);
        }
    }
    metric
}

/// Gathers `registry` and encodes it in the Prometheus text format.
pub fn render_text(registry: &Registry) -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder.encode(&registry.gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
