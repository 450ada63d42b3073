//! Abstractions over the RouterOS command API.
//!
//! Collectors never talk to the network directly. They send one command per
//! cycle through a [`CommandClient`] and read back the `!re` sentences of the
//! reply. Sessions are opened by a [`Connector`], one per device per scrape.
//!
//! Two implementations ship with the crate:
//! - [`MockClient`] / [`MockConnector`] - scripted replies for tests
//! - [`ReplayClient`] / [`ReplayConnector`] - replies recorded as JSON files

pub mod mock;
pub mod replay;

use std::collections::HashMap;

use crate::config::Device;

pub use mock::{MockClient, MockConnector};
pub use replay::{ReplayClient, ReplayConnector};

/// Prefix of the API attribute word restricting a `print` to some properties.
pub const PROPLIST_PREFIX: &str = "=.proplist=";

/// Error type for RouterOS command execution.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// The device did not answer in time.
    Timeout,
    /// The session could not be established or broke mid-command.
    Transport(String),
    /// The device rejected the command (`!trap`).
    Trap(String),
    /// The device closed the session (`!fatal`).
    Fatal(String),
    /// The reply could not be decoded.
    MalformedReply(String),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Timeout => write!(f, "RouterOS: command timed out"),
            CommandError::Transport(msg) => write!(f, "RouterOS: {}", msg),
            CommandError::Trap(msg) => write!(f, "RouterOS trap: {}", msg),
            CommandError::Fatal(msg) => write!(f, "RouterOS fatal: {}", msg),
            CommandError::MalformedReply(msg) => write!(f, "RouterOS malformed reply: {}", msg),
        }
    }
}

impl std::error::Error for CommandError {}

/// One `!re` sentence of a reply: property name to raw string value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sentence {
    map: HashMap<String, String>,
}

impl Sentence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `property`, or `""` when the device omitted it.
    pub fn get(&self, property: &str) -> &str {
        self.map.get(property).map(String::as_str).unwrap_or("")
    }

    pub fn insert(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.map.insert(property.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drops every property not listed in `properties`.
    pub fn retain_properties(&mut self, properties: &[&str]) {
        self.map.retain(|k, _| properties.contains(&k.as_str()));
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Sentence {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for Sentence {
    fn from(map: HashMap<String, String>) -> Self {
        Self { map }
    }
}

/// Reply to a single command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    /// Data sentences in the order the device sent them.
    pub re: Vec<Sentence>,
}

/// An open command session with one device.
pub trait CommandClient {
    /// Runs one command. `words[0]` is the command path, the rest are
    /// attribute words such as `=.proplist=a,b`.
    fn run(&mut self, words: &[String]) -> Result<Reply, CommandError>;
}

impl<C: CommandClient + ?Sized> CommandClient for Box<C> {
    fn run(&mut self, words: &[String]) -> Result<Reply, CommandError> {
        (**self).run(words)
    }
}

/// Opens command sessions to devices.
pub trait Connector: Send + Sync {
    fn connect(&self, device: &Device) -> Result<Box<dyn CommandClient + Send>, CommandError>;
}

/// Builds the attribute word restricting a `print` to `properties`.
pub fn proplist_word<'a>(properties: impl IntoIterator<Item = &'a str>) -> String {
    let list: Vec<&str> = properties.into_iter().collect();
    format!("{}{}", PROPLIST_PREFIX, list.join(","))
}

/// Extracts the property list from a command's attribute words, if present.
pub(crate) fn requested_properties(words: &[String]) -> Option<Vec<&str>> {
    words
        .iter()
        .skip(1)
        .find_map(|w| w.strip_prefix(PROPLIST_PREFIX))
        .map(|list| list.split(',').filter(|p| !p.is_empty()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_missing_property_is_empty() {
        let s: Sentence = [("chain", "forward")].into_iter().collect();
        assert_eq!(s.get("chain"), "forward");
        assert_eq!(s.get("comment"), "");
    }

    #[test]
    fn test_sentence_retain_properties() {
        let mut s: Sentence = [("chain", "input"), ("bytes", "10"), (".id", "*1")]
            .into_iter()
            .collect();
        s.retain_properties(&["chain", "bytes"]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(".id"), "");
    }

    #[test]
    fn test_proplist_word() {
        assert_eq!(
            proplist_word(["disabled", "bytes"]),
            "=.proplist=disabled,bytes"
        );
    }

    #[test]
    fn test_requested_properties() {
        let words = vec![
            "/ip/firewall/filter/print".to_string(),
            "=.proplist=chain,bytes".to_string(),
        ];
        assert_eq!(requested_properties(&words), Some(vec!["chain", "bytes"]));

        let bare = vec!["/ip/firewall/filter/print".to_string()];
        assert_eq!(requested_properties(&bare), None);
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::Trap("no such command".to_string());
        assert_eq!(err.to_string(), "RouterOS trap: no such command");
        assert_eq!(
            CommandError::Timeout.to_string(),
            "RouterOS: command timed out"
        );
    }
}
