use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::MessageContent;

/// Unique message identifier. Generated ids start with the creation time in
/// milliseconds so lexical order roughly follows creation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub const GREETING: &'static str = "greeting";

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn generate() -> Self {
        Self(format!(
            "{:013}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        ))
    }

    pub fn greeting() -> Self {
        Self(Self::GREETING.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// One conversation entry. Fields are fixed at construction; the only late
/// addition is the response time of a bot reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    text: String,
    content: MessageContent,
    sender: Sender,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response_time: Option<Duration>,
}

impl Message {
    fn new(id: MessageId, sender: Sender, text: String, content: MessageContent) -> Self {
        Self {
            id,
            text,
            content,
            sender,
            timestamp: Utc::now(),
            response_time: None,
        }
    }

    /// User input is always shown verbatim.
    pub fn user(text: impl Into<String>) -> Self {
        let text = text.into();
        let content = MessageContent::plain(text.clone());
        Self::new(MessageId::generate(), Sender::User, text, content)
    }

    /// Bot text is classified into plain or structured content here, once.
    pub fn bot(text: impl Into<String>) -> Self {
        let text = text.into();
        let content = MessageContent::parse(&text);
        Self::new(MessageId::generate(), Sender::Bot, text, content)
    }

    pub fn greeting(text: impl Into<String>) -> Self {
        let text = text.into();
        let content = MessageContent::plain(text.clone());
        Self::new(MessageId::greeting(), Sender::Bot, text, content)
    }

    pub fn with_response_time(mut self, elapsed: Duration) -> Self {
        self.response_time = Some(elapsed);
        self
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn response_time(&self) -> Option<Duration> {
        self.response_time
    }
}
