//! Replays RouterOS replies recorded as JSON files.
//!
//! A replay file maps command paths to the rows the device returned, or to a
//! trap message:
//!
//! ```json
//! {
//!   "/ip/firewall/filter/print": [
//!     {"chain": "forward", "action": "accept", "bytes": "1024", "packets": "8"}
//!   ],
//!   "/ip/firewall/nat/print": {"trap": "no such command prefix"}
//! }
//! ```
//!
//! [`ReplayConnector`] looks for `<dir>/<device name>.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::{CommandClient, CommandError, Connector, Reply, Sentence, requested_properties};
use crate::config::Device;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Recorded {
    Rows(Vec<HashMap<String, String>>),
    Trap { trap: String },
}

/// Command session answering from a recorded reply file.
#[derive(Debug, Clone)]
pub struct ReplayClient {
    commands: HashMap<String, Recorded>,
}

impl ReplayClient {
    /// Parses a replay document.
    pub fn from_json(json: &str) -> Result<Self, CommandError> {
        let commands = serde_json::from_str(json)
            .map_err(|e| CommandError::MalformedReply(e.to_string()))?;
        Ok(Self { commands })
    }

    /// Loads a replay file.
    pub fn from_file(path: &Path) -> Result<Self, CommandError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CommandError::Transport(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}

impl CommandClient for ReplayClient {
    fn run(&mut self, words: &[String]) -> Result<Reply, CommandError> {
        let path = words
            .first()
            .ok_or_else(|| CommandError::MalformedReply("empty command".to_string()))?;

        let rows = match self.commands.get(path) {
            Some(Recorded::Rows(rows)) => rows,
            Some(Recorded::Trap { trap }) => return Err(CommandError::Trap(trap.clone())),
            None => return Err(CommandError::Trap("no such command".to_string())),
        };

        let props = requested_properties(words);
        let re = rows
            .iter()
            .map(|row| {
                let mut sentence = Sentence::from(row.clone());
                if let Some(props) = &props {
                    sentence.retain_properties(props);
                }
                sentence
            })
            .collect();

        Ok(Reply { re })
    }
}

/// Opens [`ReplayClient`]s from a directory of per-device replay files.
#[derive(Debug, Clone)]
pub struct ReplayConnector {
    dir: PathBuf,
}

impl ReplayConnector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, device: &Device) -> PathBuf {
        self.dir.join(format!("{}.json", device.name))
    }
}

impl Connector for ReplayConnector {
    fn connect(&self, device: &Device) -> Result<Box<dyn CommandClient + Send>, CommandError> {
        let path = self.path_for(device);
        debug!(device = %device.name, path = %path.display(), "opening replay session");
        Ok(Box::new(ReplayClient::from_file(&path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const REPLAY: &str = r#"{
        "/ip/firewall/filter/print": [
            {".id": "*1", "chain": "input", "action": "accept", "bytes": "1024", "packets": "8"},
            {".id": "*2", "chain": "forward", "action": "drop", "bytes": "", "packets": "3"}
        ],
        "/ip/firewall/nat/print": {"trap": "no such command prefix"}
    }"#;

    fn words(w: &[&str]) -> Vec<String> {
        w.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_replay_rows_in_order() {
        let mut client = ReplayClient::from_json(REPLAY).unwrap();
        let reply = client.run(&words(&["/ip/firewall/filter/print"])).unwrap();

        assert_eq!(reply.re.len(), 2);
        assert_eq!(reply.re[0].get("chain"), "input");
        assert_eq!(reply.re[1].get("chain"), "forward");
    }

    #[test]
    fn test_replay_applies_proplist() {
        let mut client = ReplayClient::from_json(REPLAY).unwrap();
        let reply = client
            .run(&words(&["/ip/firewall/filter/print", "=.proplist=chain,bytes"]))
            .unwrap();

        assert_eq!(reply.re[0].len(), 2);
        assert_eq!(reply.re[0].get(".id"), "");
        assert_eq!(reply.re[0].get("bytes"), "1024");
    }

    #[test]
    fn test_replay_trap() {
        let mut client = ReplayClient::from_json(REPLAY).unwrap();
        let err = client.run(&words(&["/ip/firewall/nat/print"])).unwrap_err();
        assert_eq!(err, CommandError::Trap("no such command prefix".to_string()));

        let err = client.run(&words(&["/queue/simple/print"])).unwrap_err();
        assert_eq!(err, CommandError::Trap("no such command".to_string()));
    }

    #[test]
    fn test_replay_invalid_json() {
        let err = ReplayClient::from_json("{not json").unwrap_err();
        assert!(matches!(err, CommandError::MalformedReply(_)));
    }

    #[test]
    fn test_replay_connector_loads_device_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("edge-1.json")).unwrap();
        file.write_all(REPLAY.as_bytes()).unwrap();

        let connector = ReplayConnector::new(dir.path());
        let mut client = connector
            .connect(&Device::new("edge-1", "192.0.2.1"))
            .unwrap();
        let reply = client.run(&words(&["/ip/firewall/filter/print"])).unwrap();
        assert_eq!(reply.re.len(), 2);

        let missing = connector.connect(&Device::new("edge-2", "192.0.2.2"));
        assert!(matches!(missing, Err(CommandError::Transport(_))));
    }
}
