//! In-memory RouterOS sessions for testing collectors without a device.

use std::collections::HashMap;

use super::{CommandClient, CommandError, Connector, Reply, Sentence, requested_properties};
use crate::config::Device;

/// Scripted command session.
///
/// Replies are keyed by command path. Every command sent is recorded so tests
/// can check what a collector asked for.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    replies: HashMap<String, Result<Reply, CommandError>>,
    sent: Vec<Vec<String>>,
}

impl MockClient {
    /// Creates a session that traps on every command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `path` with the given sentences.
    pub fn with_reply(mut self, path: &str, re: Vec<Sentence>) -> Self {
        self.replies.insert(path.to_string(), Ok(Reply { re }));
        self
    }

    /// Answers `path` with an error.
    pub fn with_error(mut self, path: &str, error: CommandError) -> Self {
        self.replies.insert(path.to_string(), Err(error));
        self
    }

    /// Commands sent so far, in order.
    pub fn sent(&self) -> &[Vec<String>] {
        &self.sent
    }
}

impl CommandClient for MockClient {
    fn run(&mut self, words: &[String]) -> Result<Reply, CommandError> {
        self.sent.push(words.to_vec());

        let path = words
            .first()
            .ok_or_else(|| CommandError::MalformedReply("empty command".to_string()))?;

        let mut reply = self
            .replies
            .get(path)
            .cloned()
            .unwrap_or_else(|| Err(CommandError::Trap("no such command".to_string())))?;

        // A real device only returns what the proplist asked for.
        if let Some(props) = requested_properties(words) {
            for sentence in &mut reply.re {
                sentence.retain_properties(&props);
            }
        }

        Ok(reply)
    }
}

/// Hands out clones of per-device [`MockClient`]s.
///
/// Devices without a registered client fail to connect.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    clients: HashMap<String, MockClient>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device_name: &str, client: MockClient) -> Self {
        self.clients.insert(device_name.to_string(), client);
        self
    }
}

impl Connector for MockConnector {
    fn connect(&self, device: &Device) -> Result<Box<dyn CommandClient + Send>, CommandError> {
        match self.clients.get(&device.name) {
            Some(client) => Ok(Box::new(client.clone())),
            None => Err(CommandError::Transport(format!(
                "connection refused by {}",
                device.address
            ))),
        }
    }
}
