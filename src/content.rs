//! Message body variants.
//!
//! Bot replies may embed availability records of the form
//! `{"_id":"SpaceMountain","totalAvailability":12}` inside free text. The body
//! is classified once, when the message is created, so rendering never has to
//! re-scan the string.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Lists longer than this are laid out in two columns.
const SINGLE_COLUMN_MAX_ITEMS: usize = 6;

fn record_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\{"_id":"([^"]+)","totalAvailability":(\d+)\}"#).expect("record pattern is valid")
    })
}

fn stamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\d{2}:\d{2}\s*hrs").expect("stamp pattern is valid")
    })
}

fn footer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"We took \d+(\.\d+)?[ms]+ to answer").expect("footer pattern is valid")
    })
}

/// Body of a message, decided at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    PlainText { text: String },
    StructuredList(ListContent),
}

/// Availability list extracted from a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListContent {
    pub items: Vec<ListItem>,
    /// `HH:MM hrs` stamp found in the reply.
    pub stamp: Option<String>,
    /// `We took .. to answer` footer found in the reply.
    pub footer: Option<String>,
}

impl ListContent {
    pub fn two_columns(&self) -> bool {
        self.items.len() > SINGLE_COLUMN_MAX_ITEMS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Deserialize)]
struct AvailabilityRecord {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "totalAvailability")]
    total_availability: u64,
}

impl MessageContent {
    pub fn plain(text: impl Into<String>) -> Self {
        MessageContent::PlainText { text: text.into() }
    }

    /// Classifies a body. Anything that does not parse cleanly stays plain text.
    pub fn parse(text: &str) -> Self {
        match parse_list(text) {
            Some(list) => MessageContent::StructuredList(list),
            None => MessageContent::plain(text),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, MessageContent::StructuredList(_))
    }
}

fn parse_list(text: &str) -> Option<ListContent> {
    if !(text.contains("\"_id\"") && text.contains("\"totalAvailability\"")) {
        return None;
    }

    let mut items = Vec::new();
    for found in record_pattern().find_iter(text) {
        let record: AvailabilityRecord = match serde_json::from_str(found.as_str()) {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!(error = %err, "availability record did not parse, keeping raw text");
                return None;
            }
        };
        items.push(ListItem {
            label: humanize_label(&record.id),
            count: record.total_availability,
        });
    }

    if items.is_empty() {
        return None;
    }

    Some(ListContent {
        items,
        stamp: stamp_pattern().find(text).map(|m| m.as_str().to_string()),
        footer: footer_pattern().find(text).map(|m| m.as_str().to_string()),
    })
}

/// Splits a camel-cased identifier into words: `SpaceMountain` -> `Space Mountain`.
pub fn humanize_label(raw: &str) -> String {
    let mut label = String::with_capacity(raw.len() + 4);
    for ch in raw.chars() {
        if ch.is_ascii_uppercase() {
            label.push(' ');
        }
        label.push(ch);
    }
    label.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_availability_list() {
        let text = r#"Here you go: [{"_id":"SpaceMountain","totalAvailability":12},{"_id":"Dumbo","totalAvailability":3}] as of 14:05 hrs. We took 120ms to answer"#;

        let content = MessageContent::parse(text);

        let MessageContent::StructuredList(list) = content else {
            panic!("expected a structured list");
        };
        assert_eq!(
            list.items,
            vec![
                ListItem {
                    label: "Space Mountain".into(),
                    count: 12
                },
                ListItem {
                    label: "Dumbo".into(),
                    count: 3
                },
            ]
        );
        assert_eq!(list.stamp.as_deref(), Some("14:05 hrs"));
        assert_eq!(list.footer.as_deref(), Some("We took 120ms to answer"));
        assert!(!list.two_columns());
    }

    #[test]
    fn long_lists_use_two_columns() {
        let records: Vec<String> = (0..7)
            .map(|i| format!(r#"{{"_id":"Ride{i}","totalAvailability":{i}}}"#))
            .collect();
        let content = MessageContent::parse(&records.join(","));

        match content {
            MessageContent::StructuredList(list) => assert!(list.two_columns()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn plain_text_stays_plain() {
        assert_eq!(
            MessageContent::parse("3 rides open"),
            MessageContent::plain("3 rides open")
        );
    }

    #[test]
    fn markers_without_records_stay_plain() {
        let text = r#"fields "_id" and "totalAvailability" were missing"#;
        assert!(!MessageContent::parse(text).is_structured());
    }

    #[test]
    fn unparsable_record_falls_back_to_raw_text() {
        let text = r#"{"_id":"Huge","totalAvailability":99999999999999999999999}"#;
        assert_eq!(MessageContent::parse(text), MessageContent::plain(text));
    }

    #[test]
    fn humanizes_camel_case() {
        assert_eq!(humanize_label("BigThunderMountain"), "Big Thunder Mountain");
        assert_eq!(humanize_label("dumbo"), "dumbo");
    }
}
