//! Metric descriptors and samples produced by collectors.
//!
//! Collectors describe what they export with [`Desc`] values built once at
//! construction, and emit [`Sample`]s referencing those descriptors on every
//! collection. Samples flow into a [`MetricSink`] owned by the caller.

pub mod exposition;
pub mod sink;

use std::sync::Arc;

pub use exposition::{PrometheusBridge, render_text};
pub use sink::{DescSink, MetricSink};

/// Prefix shared by every exported metric name.
pub const NAMESPACE: &str = "mikrotik";

/// Immutable metric metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Desc {
    pub fq_name: String,
    pub help: String,
    pub label_names: Vec<String>,
}

impl Desc {
    pub fn new(fq_name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self {
            fq_name: fq_name.into(),
            help: help.into(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Kind of a sampled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// One value for one label combination of a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub desc: Arc<Desc>,
    pub kind: MetricKind,
    pub value: f64,
    /// Same order and length as `desc.label_names`.
    pub label_values: Vec<String>,
}

impl Sample {
    pub fn counter(desc: &Arc<Desc>, value: f64, label_values: Vec<String>) -> Self {
        debug_assert_eq!(desc.label_names.len(), label_values.len());
        Self {
            desc: Arc::clone(desc),
            kind: MetricKind::Counter,
            value,
            label_values,
        }
    }

    pub fn gauge(desc: &Arc<Desc>, value: f64, label_values: Vec<String>) -> Self {
        debug_assert_eq!(desc.label_names.len(), label_values.len());
        Self {
            desc: Arc::clone(desc),
            kind: MetricKind::Gauge,
            value,
            label_values,
        }
    }

    /// Returns the value of the label `name`, if the descriptor has it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .label_names
            .iter()
            .position(|l| l == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// Joins non-empty name parts with `_`.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// RouterOS property names use dashes, metric names can't.
pub fn metric_name_cleanup(property: &str) -> String {
    property.replace('-', "_")
}

/// Descriptor for a device property under `subsystem`.
pub fn description_for_property(
    subsystem: &str,
    property: &str,
    help: &str,
    label_names: &[&str],
) -> Desc {
    Desc::new(
        build_fq_name(NAMESPACE, subsystem, &metric_name_cleanup(property)),
        help,
        label_names,
    )
}
