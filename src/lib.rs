//! Client-side engine for an embeddable chat widget.
//!
//! The crate provides:
//! - A session lifecycle (`SessionController`) driven by debounced activity and an inactivity timeout.
//! - A bounded conversation log (`MessageStore`) with an incrementally paged view (`WindowedRenderer`).
//! - An optimistic `SendPipeline` with latency measurement, a local fallback and a final apology.
//! - `ChatWidget`, which wires the pieces together for one widget instance.

mod avatar;
mod config;
mod content;
mod debounce;
mod error;
mod fallback;
mod greeting;
mod input;
mod logging;
mod message;
mod pipeline;
mod render;
mod session;
mod store;
mod transport;
mod widget;
mod window;

#[cfg(feature = "persistence")]
pub use avatar::SqlBlobStore;
pub use avatar::{
    decode_data_url, encode_data_url, AvatarSlot, BlobStore, FileBlobStore, MemoryBlobStore,
    PROFILE_PICTURE_KEY,
};
pub use config::{AppConfig, FallbackConfig, StorageConfig, TransportConfig, WidgetConfig};
pub use content::{humanize_label, ListContent, ListItem, MessageContent};
pub use debounce::{ActivityDebouncer, Debouncer, DEFAULT_DEBOUNCE};
pub use error::{ChatError, Result};
pub use fallback::{FallbackSource, FileFallback, NoFallback, StaticFallback};
pub use greeting::{greeting_for_hour, salutation_for_hour, time_of_day_greeting};
pub use input::{InputBox, KeyAction, KeyPress};
pub use logging::init_tracing;
pub use message::{Message, MessageId, Sender};
pub use pipeline::{ConversationSink, Exchange, ReplySource, SendPipeline, APOLOGY_TEXT};
pub use render::{format_clock, format_response_time, response_footer, Frame, MessageRow};
pub use session::{
    Activation, SessionController, SessionSettings, SessionStatus, DEFAULT_INACTIVITY_TIMEOUT,
    MAX_CHECK_INTERVAL,
};
pub use store::{MessageStore, StoreChange, DEFAULT_MAX_MESSAGES};
pub use transport::{
    extract_reply_text, HttpTransport, StubReply, StubTransport, Transport, TransportReply,
};
pub use widget::ChatWidget;
pub use window::{WindowedRenderer, DEFAULT_BATCH_SIZE};
