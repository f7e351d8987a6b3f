//! Row formatting for the visible window.

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};

use crate::content::MessageContent;
use crate::message::{Message, MessageId, Sender};

/// `120ms` below one second, `1.5s` above.
pub fn format_response_time(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// 24-hour clock label, e.g. `14:05 hrs`.
pub fn format_clock<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{} hrs", at.format("%H:%M"))
}

pub fn response_footer(elapsed: Duration) -> String {
    format!("We took ⏱ {} to answer", format_response_time(elapsed))
}

/// Display-ready view of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub id: MessageId,
    pub sender: Sender,
    pub content: MessageContent,
    pub clock: String,
    pub footer: Option<String>,
}

impl MessageRow {
    pub fn from_message(message: &Message) -> Self {
        Self::at_local(message, &Local)
    }

    pub fn at_local<Tz: TimeZone>(message: &Message, tz: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let local: DateTime<Tz> = message.timestamp().with_timezone(tz);
        let footer = match message.sender() {
            Sender::Bot => message.response_time().map(response_footer),
            Sender::User => None,
        };
        Self {
            id: message.id().clone(),
            sender: message.sender(),
            content: message.content().clone(),
            clock: format_clock(&local),
            footer,
        }
    }
}

/// Visible rows plus the in-flight indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub rows: Vec<MessageRow>,
    pub loading: bool,
    pub has_older: bool,
}

impl Frame {
    pub fn build<'a>(
        messages: impl IntoIterator<Item = &'a Message>,
        loading: bool,
        has_older: bool,
    ) -> Self {
        Self {
            rows: messages.into_iter().map(MessageRow::from_message).collect(),
            loading,
            has_older,
        }
    }
}
