//! Outcome messages emitted while sweeping.
//!
//! The dispatcher and batch job report every outcome (success, skip, failure)
//! as a leveled [`Message`] sent to a [`MessageSink`]. There is no other
//! signalling channel for per-record outcomes.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    /// Skips: no processors registered, none provided, none matching.
    Notice,
    /// A record was processed.
    Info,
    /// A processor failed for one record.
    Error,
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageLevel::Notice => "notice",
            MessageLevel::Info => "info",
            MessageLevel::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

impl Message {
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Notice,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.text)
    }
}

/// Destination for outcome messages.
pub trait MessageSink: Send + Sync {
    fn emit(&self, message: Message);
}

/// Forwards messages to `tracing`.
///
/// Notices are logged as warnings since `tracing` has no notice level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn emit(&self, message: Message) {
        match message.level {
            MessageLevel::Notice => tracing::warn!(level = "notice", "{}", message.text),
            MessageLevel::Info => tracing::info!("{}", message.text),
            MessageLevel::Error => tracing::error!("{}", message.text),
        }
    }
}

/// Collects messages in memory, in emission order.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Mutex<Vec<Message>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the messages emitted so far.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Drain all messages, leaving the log empty.
    pub fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of messages at the given level.
    pub fn count(&self, level: MessageLevel) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| m.level == level)
            .count()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageSink for MessageLog {
    fn emit(&self, message: Message) {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner).push(message);
    }
}

impl<S: MessageSink + ?Sized> MessageSink for std::sync::Arc<S> {
    fn emit(&self, message: Message) {
        (**self).emit(message);
    }
}
