//! Optimistic send: append the user's message, make one remote call, then
//! append whatever answer could be obtained.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{ChatError, Result};
use crate::fallback::FallbackSource;
use crate::message::Message;
use crate::store::MessageStore;
use crate::transport::Transport;

pub const APOLOGY_TEXT: &str = "Sorry, something went wrong. Please try again.";

/// Destination of the messages an exchange produces.
pub trait ConversationSink: Send + Sync {
    /// Returns false when the conversation is gone (reset or torn down); the
    /// message is dropped in that case.
    fn append(&self, message: Message) -> bool;
}

impl ConversationSink for Mutex<MessageStore> {
    fn append(&self, message: Message) -> bool {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(message);
        true
    }
}

/// Where the bot reply of an exchange came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Service,
    Fallback,
    Apology,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub source: ReplySource,
    pub response_time: Option<Duration>,
    /// False when the reply arrived after its conversation was discarded.
    pub applied: bool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-outstanding-request send pipeline.
///
/// The server-issued conversation id lives here, per instance, and is echoed
/// on every call after it was first seen.
pub struct SendPipeline {
    transport: Arc<dyn Transport>,
    fallback: Arc<dyn FallbackSource>,
    max_message_length: usize,
    in_flight: AtomicBool,
    conversation_id: Mutex<Option<String>>,
}

impl std::fmt::Debug for SendPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendPipeline")
            .field("max_message_length", &self.max_message_length)
            .field("in_flight", &self.is_in_flight())
            .field("conversation_id", &self.conversation_id())
            .finish()
    }
}

impl SendPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        fallback: Arc<dyn FallbackSource>,
        max_message_length: usize,
    ) -> Self {
        Self {
            transport,
            fallback,
            max_message_length,
            in_flight: AtomicBool::new(false),
            conversation_id: Mutex::new(None),
        }
    }

    pub fn max_message_length(&self) -> usize {
        self.max_message_length
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.conversation_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remember_conversation_id(&self, issued: Option<&str>) {
        if let Some(id) = issued {
            *self
                .conversation_id
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(id.to_string());
        }
    }

    /// Checks a draft without touching any state. Returns the trimmed query.
    /// The length limit applies to the text as typed, since that is what the
    /// log keeps.
    pub fn validate<'t>(&self, text: &'t str) -> Result<&'t str> {
        let query = text.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let len = text.chars().count();
        if len > self.max_message_length {
            return Err(ChatError::MessageTooLong {
                len,
                max: self.max_message_length,
            });
        }
        if self.is_in_flight() {
            return Err(ChatError::SendInFlight);
        }
        Ok(query)
    }

    /// Runs one exchange. Input problems are returned as errors before
    /// anything is appended; every other failure ends in a bot message.
    pub async fn submit(&self, text: &str, sink: &dyn ConversationSink) -> Result<Exchange> {
        let query = self.validate(text)?;
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(ChatError::SendInFlight)?;

        sink.append(Message::user(text));
        let started = Instant::now();
        let conversation_id = self.conversation_id();

        let (reply, source) = match self.transport.send(query, conversation_id.as_deref()).await {
            Ok(reply) => {
                self.remember_conversation_id(reply.conversation_id.as_deref());
                let elapsed = started.elapsed();
                tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "reply received");
                (
                    Message::bot(reply.text).with_response_time(elapsed),
                    ReplySource::Service,
                )
            }
            Err(err) => {
                self.remember_conversation_id(err.conversation_id());
                tracing::warn!(error = %err, "answering service failed, using fallback");
                match self.fallback.load().await {
                    Ok(text) => (Message::bot(text), ReplySource::Fallback),
                    Err(fallback_err) => {
                        tracing::warn!(error = %fallback_err, "fallback unavailable");
                        (Message::bot(APOLOGY_TEXT), ReplySource::Apology)
                    }
                }
            }
        };

        let response_time = reply.response_time();
        let applied = sink.append(reply);
        if !applied {
            tracing::debug!("conversation discarded while in flight, dropping reply");
        }

        Ok(Exchange {
            source,
            response_time,
            applied,
        })
    }
}
