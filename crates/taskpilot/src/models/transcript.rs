use serde::{Deserialize, Serialize};

use super::message::Message;

/// Ordered chat history, serialized as a plain array of messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// One emitted frame: the full transcript plus the (cleared) prompt box
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptUpdate {
    pub messages: Transcript,
    pub prompt: String,
}

impl TranscriptUpdate {
    pub fn new(messages: Transcript) -> Self {
        Self {
            messages,
            prompt: String::new(),
        }
    }
}
