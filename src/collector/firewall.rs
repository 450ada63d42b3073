//! Collector for `/ip/firewall/filter` rule counters.
//!
//! Each filter rule becomes one series per counter property, labeled with
//! the device identity and the rule's `disabled`, `comment`, `chain` and
//! `action` fields.

use std::collections::BTreeMap;
use std::num::ParseFloatError;
use std::sync::Arc;

use tracing::error;

use super::{CollectError, Collector, CollectorContext};
use crate::config::Device;
use crate::metrics::{Desc, DescSink, Sample, description_for_property};
use crate::routeros::{CommandError, Sentence, proplist_word};

const SUBSYSTEM: &str = "firewall_filter";
const PRINT_COMMAND: &str = "/ip/firewall/filter/print";

/// Rule properties exported as label values, in label order.
pub const LABEL_PROPERTIES: [&str; 4] = ["disabled", "comment", "chain", "action"];

/// Labels taken from the device rather than the rule.
const DEVICE_LABELS: [&str; 2] = ["name", "address"];

/// A rule property exported as a counter.
#[derive(Debug, Clone, Copy)]
pub struct CounterProperty {
    pub property: &'static str,
    pub help: &'static str,
}

/// Rule properties exported as counters.
pub const COUNTER_PROPERTIES: [CounterProperty; 2] = [
    CounterProperty {
        property: "bytes",
        help: "Number of bytes matched by the firewall filter rule",
    },
    CounterProperty {
        property: "packets",
        help: "Number of packets matched by the firewall filter rule",
    },
];

/// Why a counter value was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueError {
    /// Not a number.
    Invalid(ParseFloatError),
    /// A finite literal too large for `f64`.
    OutOfRange,
}

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueError::Invalid(e) => write!(f, "{}", e),
            ValueError::OutOfRange => write!(f, "value out of range"),
        }
    }
}

impl std::error::Error for ValueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValueError::Invalid(e) => Some(e),
            ValueError::OutOfRange => None,
        }
    }
}

/// A counter value that could not be turned into a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldParseError {
    pub property: &'static str,
    pub value: String,
    pub error: ValueError,
}

impl std::fmt::Display for FieldParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid value {:?} for {}: {}",
            self.value, self.property, self.error
        )
    }
}

impl std::error::Error for FieldParseError {}

/// Parses a counter value as `f64`.
///
/// Literal infinities (`inf`, `+Infinity`, ...) are accepted. Finite
/// literals that overflow to infinity are rejected.
fn parse_counter(raw: &str) -> Result<f64, ValueError> {
    let value = raw.parse::<f64>().map_err(ValueError::Invalid)?;
    if value.is_infinite() && !is_infinity_literal(raw) {
        return Err(ValueError::OutOfRange);
    }
    Ok(value)
}

fn is_infinity_literal(raw: &str) -> bool {
    let unsigned = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

/// Outcome of projecting one rule.
#[derive(Debug, Default)]
pub struct Projection {
    /// Samples written to the sink.
    pub emitted: usize,
    /// Counters dropped because they did not parse.
    pub errors: Vec<FieldParseError>,
}

/// Firewall filter collector.
///
/// Descriptors are built once in [`FirewallCollector::new`] and never change.
pub struct FirewallCollector {
    descriptions: BTreeMap<&'static str, Arc<Desc>>,
}

impl FirewallCollector {
    pub fn new() -> Self {
        let label_names: Vec<&str> = DEVICE_LABELS
            .iter()
            .chain(LABEL_PROPERTIES.iter())
            .copied()
            .collect();

        let descriptions = COUNTER_PROPERTIES
            .iter()
            .map(|c| {
                let desc = description_for_property(SUBSYSTEM, c.property, c.help, &label_names);
                (c.property, Arc::new(desc))
            })
            .collect();

        Self { descriptions }
    }

    /// All descriptors this collector emits samples for.
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<Desc>> {
        self.descriptions.values()
    }

    /// Properties requested from the device: labels first, then counters.
    fn properties() -> impl Iterator<Item = &'static str> {
        LABEL_PROPERTIES
            .iter()
            .copied()
            .chain(COUNTER_PROPERTIES.iter().map(|c| c.property))
    }

    /// Lists the filter rules of `ctx.device`, restricted to the exported
    /// properties. Rules come back in device order.
    pub fn fetch(&self, ctx: &mut CollectorContext<'_>) -> Result<Vec<Sentence>, CommandError> {
        let words = [PRINT_COMMAND.to_string(), proplist_word(Self::properties())];

        match ctx.client.run(&words) {
            Ok(reply) => Ok(reply.re),
            Err(e) => {
                error!(device = %ctx.device.name, error = %e, "error fetching firewall filters");
                Err(e)
            }
        }
    }

    /// Emits one counter sample per non-empty counter property of `rule`.
    ///
    /// Empty values are skipped silently. A value that does not parse only
    /// drops its own sample: it is logged, reported in the returned
    /// [`Projection`], and the remaining counters are still emitted.
    pub fn project(&self, rule: &Sentence, ctx: &mut CollectorContext<'_>) -> Projection {
        let mut projection = Projection::default();
        let label_values = Self::label_values(rule, ctx.device);

        for counter in &COUNTER_PROPERTIES {
            let raw = rule.get(counter.property);
            if raw.is_empty() {
                continue;
            }

            let value = match parse_counter(raw) {
                Ok(v) => v,
                Err(e) => {
                    error!(
                        device = %ctx.device.name,
                        property = counter.property,
                        value = raw,
                        error = %e,
                        "error parsing firewall filter value"
                    );
                    projection.errors.push(FieldParseError {
                        property: counter.property,
                        value: raw.to_string(),
                        error: e,
                    });
                    continue;
                }
            };

            let desc = &self.descriptions[counter.property];
            ctx.sink.emit(Sample::counter(desc, value, label_values.clone()));
            projection.emitted += 1;
        }

        projection
    }

    fn label_values(rule: &Sentence, device: &Device) -> Vec<String> {
        let mut values = Vec::with_capacity(DEVICE_LABELS.len() + LABEL_PROPERTIES.len());
        values.push(device.name.clone());
        values.push(device.address.clone());
        values.extend(LABEL_PROPERTIES.iter().map(|p| rule.get(p).to_string()));
        values
    }
}

impl Default for FirewallCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for FirewallCollector {
    fn describe(&self, sink: &mut dyn DescSink) {
        for desc in self.descriptors() {
            sink.register(Arc::clone(desc));
        }
    }

    fn collect(&self, ctx: &mut CollectorContext<'_>) -> Result<(), CollectError> {
        let rules = self.fetch(ctx).map_err(|source| CollectError::Fetch {
            command: PRINT_COMMAND.to_string(),
            source,
        })?;

        for rule in &rules {
            self.project(rule, ctx);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routeros::MockClient;

    fn rule(fields: &[(&str, &str)]) -> Sentence {
        fields.iter().copied().collect()
    }

    fn device() -> Device {
        Device::new("edge-1", "192.0.2.1")
    }

    fn run(
        collector: &FirewallCollector,
        client: &mut MockClient,
    ) -> (Result<(), CollectError>, Vec<Sample>) {
        let device = device();
        let mut samples: Vec<Sample> = Vec::new();
        let mut ctx = CollectorContext::new(&device, client, &mut samples);
        let result = collector.collect(&mut ctx);
        (result, samples)
    }

    fn full_rule(chain: &str, bytes: &str, packets: &str) -> Sentence {
        rule(&[
            ("disabled", "false"),
            ("comment", "allow established"),
            ("chain", chain),
            ("action", "accept"),
            ("bytes", bytes),
            ("packets", packets),
        ])
    }

    #[test]
    fn test_describe() {
        let collector = FirewallCollector::new();
        let mut descs: Vec<Arc<Desc>> = Vec::new();
        collector.describe(&mut descs);

        let names: Vec<&str> = descs.iter().map(|d| d.fq_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "mikrotik_firewall_filter_bytes",
                "mikrotik_firewall_filter_packets"
            ]
        );
        for desc in &descs {
            assert_eq!(
                desc.label_names,
                vec!["name", "address", "disabled", "comment", "chain", "action"]
            );
        }
    }

    #[test]
    fn test_fetch_requests_proplist_once() {
        let collector = FirewallCollector::new();
        let mut client = MockClient::new().with_reply(PRINT_COMMAND, vec![]);

        let (result, samples) = run(&collector, &mut client);
        assert!(result.is_ok());
        assert!(samples.is_empty());
        assert_eq!(
            client.sent(),
            &[vec![
                "/ip/firewall/filter/print".to_string(),
                "=.proplist=disabled,comment,chain,action,bytes,packets".to_string(),
            ]]
        );
    }

    #[test]
    fn test_collect_one_sample_per_counter_per_rule() {
        let collector = FirewallCollector::new();
        let mut client = MockClient::new().with_reply(
            PRINT_COMMAND,
            vec![
                full_rule("input", "100", "1"),
                full_rule("forward", "200", "2"),
                full_rule("output", "300", "3"),
            ],
        );

        let (result, samples) = run(&collector, &mut client);
        assert!(result.is_ok());
        assert_eq!(samples.len(), 6);
        assert!(samples.iter().all(|s| s.kind == crate::metrics::MetricKind::Counter));

        // Device order, then counter order within a rule.
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![100.0, 1.0, 200.0, 2.0, 300.0, 3.0]);
        assert_eq!(samples[2].label("chain"), Some("forward"));
    }

    #[test]
    fn test_empty_counter_is_skipped() {
        let collector = FirewallCollector::new();
        let device = device();
        let mut client = MockClient::new();
        let mut samples: Vec<Sample> = Vec::new();
        let mut ctx = CollectorContext::new(&device, &mut client, &mut samples);

        let projection = collector.project(&full_rule("input", "", "1024"), &mut ctx);
        assert_eq!(projection.emitted, 1);
        assert!(projection.errors.is_empty());

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].desc.fq_name, "mikrotik_firewall_filter_packets");
        assert_eq!(samples[0].value, 1024.0);
    }

    #[test]
    fn test_absent_counter_is_skipped() {
        let collector = FirewallCollector::new();
        let mut client = MockClient::new()
            .with_reply(PRINT_COMMAND, vec![rule(&[("chain", "input"), ("packets", "7")])]);

        let (result, samples) = run(&collector, &mut client);
        assert!(result.is_ok());
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label("comment"), Some(""));
    }

    #[test]
    fn test_malformed_counter_only_drops_its_sample() {
        let collector = FirewallCollector::new();
        let device = device();
        let mut client = MockClient::new();
        let mut samples: Vec<Sample> = Vec::new();
        let mut ctx = CollectorContext::new(&device, &mut client, &mut samples);

        let projection = collector.project(&full_rule("input", "abc", "1024"), &mut ctx);
        assert_eq!(projection.emitted, 1);
        assert_eq!(projection.errors.len(), 1);
        assert_eq!(projection.errors[0].property, "bytes");
        assert_eq!(projection.errors[0].value, "abc");

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].desc.fq_name, "mikrotik_firewall_filter_packets");
    }

    #[test]
    fn test_overflowing_counter_is_dropped() {
        let collector = FirewallCollector::new();
        let device = device();
        let mut client = MockClient::new();
        let mut samples: Vec<Sample> = Vec::new();
        let mut ctx = CollectorContext::new(&device, &mut client, &mut samples);

        let projection = collector.project(&full_rule("input", "1e400", "0x10"), &mut ctx);
        assert_eq!(projection.emitted, 0);
        assert_eq!(projection.errors.len(), 2);
        assert_eq!(projection.errors[0].property, "bytes");
        assert_eq!(projection.errors[0].error, ValueError::OutOfRange);
        assert_eq!(projection.errors[1].property, "packets");
        assert!(matches!(projection.errors[1].error, ValueError::Invalid(_)));
        assert!(samples.is_empty());
    }

    #[test]
    fn test_parse_counter() {
        assert_eq!(parse_counter("1024"), Ok(1024.0));
        assert_eq!(parse_counter("1.5e3"), Ok(1500.0));
        assert_eq!(parse_counter("inf"), Ok(f64::INFINITY));
        assert_eq!(parse_counter("+Infinity"), Ok(f64::INFINITY));
        assert_eq!(parse_counter("-INF"), Ok(f64::NEG_INFINITY));
        assert_eq!(parse_counter("1e400"), Err(ValueError::OutOfRange));
        assert_eq!(parse_counter("-1e400"), Err(ValueError::OutOfRange));
        assert!(matches!(parse_counter("abc"), Err(ValueError::Invalid(_))));
    }

    #[test]
    fn test_malformed_counter_does_not_affect_other_rules() {
        let collector = FirewallCollector::new();
        let mut client = MockClient::new().with_reply(
            PRINT_COMMAND,
            vec![
                full_rule("input", "abc", "1024"),
                full_rule("forward", "10", "oops"),
                full_rule("output", "30", "3"),
            ],
        );

        let (result, samples) = run(&collector, &mut client);
        assert!(result.is_ok());
        assert_eq!(samples.len(), 4);
        let chains: Vec<&str> = samples.iter().filter_map(|s| s.label("chain")).collect();
        assert_eq!(chains, vec!["input", "forward", "output", "output"]);
    }

    #[test]
    fn test_fetch_error_emits_nothing() {
        let collector = FirewallCollector::new();
        let mut client = MockClient::new().with_error(PRINT_COMMAND, CommandError::Timeout);

        let (result, samples) = run(&collector, &mut client);
        assert_eq!(
            result,
            Err(CollectError::Fetch {
                command: PRINT_COMMAND.to_string(),
                source: CommandError::Timeout,
            })
        );
        assert!(samples.is_empty());

        let mut descs: Vec<Arc<Desc>> = Vec::new();
        collector.describe(&mut descs);
        assert_eq!(descs.len(), 2);
    }

    #[test]
    fn test_collect_is_idempotent() {
        let collector = FirewallCollector::new();
        let mut client = MockClient::new().with_reply(
            PRINT_COMMAND,
            vec![full_rule("input", "100", "1"), full_rule("forward", "", "2")],
        );

        let (_, first) = run(&collector, &mut client);
        let (_, second) = run(&collector, &mut client);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_label_order_is_fixed() {
        let collector = FirewallCollector::new();
        let shuffled = rule(&[
            ("packets", "5"),
            ("action", "drop"),
            ("chain", "forward"),
            ("comment", "block telnet"),
            ("disabled", "true"),
        ]);
        let mut client = MockClient::new().with_reply(PRINT_COMMAND, vec![shuffled]);

        let (_, samples) = run(&collector, &mut client);
        assert_eq!(samples.len(), 1);
        assert_eq!(
            samples[0].label_values,
            vec!["edge-1", "192.0.2.1", "true", "block telnet", "forward", "drop"]
        );
    }

    #[test]
    fn test_counter_value_is_forwarded_verbatim() {
        let collector = FirewallCollector::new();
        let mut client = MockClient::new()
            .with_reply(PRINT_COMMAND, vec![full_rule("input", "18446744073709551615", "0")]);

        let (_, samples) = run(&collector, &mut client);
        assert_eq!(samples[0].value, 18446744073709551615.0);
        assert_eq!(samples[1].value, 0.0);
    }
}
