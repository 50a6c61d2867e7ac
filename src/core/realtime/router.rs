//! Routing of inbound model events while a session is open.
//!
//! The router parses each raw message, appends conversational text to the
//! [`ConversationLog`], surfaces model errors, and turns the function calls of
//! a finished response into tool dispatches whose results are sent back on the
//! transport that delivered the response.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::base::{
    LogCallback, LogEntry, RealtimeErrorCallback, ToolCallCallback, ToolCallRecord,
    TranscriptRole,
};
use super::messages::{ClientEvent, ConversationItem, Response, ServerEvent};
use super::transport::Transport;
use crate::core::tools::{ToolArguments, ToolDispatcher};

/// Entries kept in the display log before the oldest are dropped.
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// Display order of the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl LogOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "newest_first" | "newest" => Some(Self::NewestFirst),
            "oldest_first" | "oldest" => Some(Self::OldestFirst),
            _ => None,
        }
    }
}

/// Bounded transcript in arrival order.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    entries: VecDeque<LogEntry>,
    order: LogOrder,
    capacity: usize,
}

impl ConversationLog {
    pub fn new(order: LogOrder, capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            order,
            capacity: capacity.max(1),
        }
    }

    pub fn order(&self) -> LogOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in display order.
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.order {
            LogOrder::OldestFirst => self.entries.iter().cloned().collect(),
            LogOrder::NewestFirst => self.entries.iter().rev().cloned().collect(),
        }
    }

    fn contains_final(&self, item_id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.is_final && e.item_id.as_deref() == Some(item_id))
    }

    fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Extend the streaming entry for the same item, or start a new one.
    fn append_delta(&mut self, role: TranscriptRole, item_id: Option<String>, delta: &str) -> LogEntry {
        if let Some(last) = self.entries.back_mut() {
            if !last.is_final && last.role == role && last.item_id == item_id {
                last.text.push_str(delta);
                return last.clone();
            }
        }
        let entry = LogEntry {
            role,
            text: delta.to_string(),
            is_final: false,
            item_id,
        };
        self.push(entry.clone());
        entry
    }

    /// Finalize the streaming entry for the item, or append a final entry.
    fn complete(&mut self, role: TranscriptRole, item_id: Option<String>, text: &str) -> LogEntry {
        let pending = self
            .entries
            .iter_mut()
            .rev()
            .find(|e| !e.is_final && e.role == role && e.item_id == item_id);
        if let Some(entry) = pending {
            entry.text = text.to_string();
            entry.is_final = true;
            return entry.clone();
        }
        let entry = LogEntry {
            role,
            text: text.to_string(),
            is_final: true,
            item_id,
        };
        self.push(entry.clone());
        entry
    }
}

/// What the router did with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Unparseable; logged and dropped
    Dropped,
    /// Lifecycle or otherwise informational
    Ignored,
    /// Conversational text appended to the log
    Logged,
    /// Model error surfaced to the error callback
    ErrorSurfaced,
    /// A finished response
    TurnComplete {
        /// Calls dispatched and answered
        processed: usize,
        /// Calls whose id was already answered
        skipped: usize,
        /// Whether a follow-up `response.create` was sent
        continued: bool,
    },
}

/// Routes inbound events of the current session.
pub struct SessionEventRouter {
    dispatcher: Arc<ToolDispatcher>,
    log: RwLock<ConversationLog>,
    answered: Mutex<HashSet<String>>,
    log_callback: RwLock<Option<LogCallback>>,
    tool_call_callback: RwLock<Option<ToolCallCallback>>,
    error_callback: RwLock<Option<RealtimeErrorCallback>>,
}

impl SessionEventRouter {
    pub fn new(dispatcher: Arc<ToolDispatcher>, order: LogOrder) -> Self {
        Self {
            dispatcher,
            log: RwLock::new(ConversationLog::new(order, DEFAULT_LOG_CAPACITY)),
            answered: Mutex::new(HashSet::new()),
            log_callback: RwLock::new(None),
            tool_call_callback: RwLock::new(None),
            error_callback: RwLock::new(None),
        }
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        &self.dispatcher
    }

    pub fn on_log(&self, callback: LogCallback) {
        *self.log_callback.write() = Some(callback);
    }

    pub fn on_tool_call(&self, callback: ToolCallCallback) {
        *self.tool_call_callback.write() = Some(callback);
    }

    pub fn on_error(&self, callback: RealtimeErrorCallback) {
        *self.error_callback.write() = Some(callback);
    }

    /// Conversation entries in display order.
    pub fn conversation(&self) -> Vec<LogEntry> {
        self.log.read().entries()
    }

    /// Forget answered call ids and the transcript for a fresh session.
    pub fn reset(&self) {
        self.answered.lock().clear();
        self.log.write().clear();
    }

    /// Handle one inbound message received on `channel`.
    pub async fn on_message(&self, channel: &dyn Transport, raw: &str) -> RouteOutcome {
        let event = match ServerEvent::parse(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(channel = %channel.channel_id(), "Dropping unparseable event: {}", e);
                return RouteOutcome::Dropped;
            }
        };

        match event {
            ServerEvent::InputTranscriptionCompleted {
                item_id,
                transcript,
            } => {
                let entry = self
                    .log
                    .write()
                    .complete(TranscriptRole::User, item_id, &transcript);
                self.emit_log(entry).await;
                RouteOutcome::Logged
            }
            ServerEvent::TextDelta { item_id, delta }
            | ServerEvent::AudioTranscriptDelta { item_id, delta } => {
                let entry = self
                    .log
                    .write()
                    .append_delta(TranscriptRole::Assistant, item_id, &delta);
                self.emit_log(entry).await;
                RouteOutcome::Logged
            }
            ServerEvent::TextDone { item_id, text }
            | ServerEvent::AudioTranscriptDone {
                item_id,
                transcript: text,
            } => {
                let entry = self
                    .log
                    .write()
                    .complete(TranscriptRole::Assistant, item_id, &text);
                self.emit_log(entry).await;
                RouteOutcome::Logged
            }
            ServerEvent::Error { error } => {
                warn!(
                    error_type = %error.error_type,
                    code = ?error.code,
                    "Model reported an error: {}",
                    error.message
                );
                let callback = self.error_callback.read().clone();
                if let Some(cb) = callback {
                    cb(error).await;
                }
                RouteOutcome::ErrorSurfaced
            }
            ServerEvent::ResponseDone { response } => self.complete_turn(channel, response).await,
            other => {
                debug!(event_type = other.event_type(), "Ignoring informational event");
                RouteOutcome::Ignored
            }
        }
    }

    async fn complete_turn(&self, channel: &dyn Transport, response: Response) -> RouteOutcome {
        let mut processed = 0;
        let mut skipped = 0;

        for item in response.output {
            if item.is_function_call() {
                match self.answer_call(channel, item).await {
                    CallOutcome::Answered => processed += 1,
                    CallOutcome::Duplicate => skipped += 1,
                    CallOutcome::SendFailed => {
                        return RouteOutcome::TurnComplete {
                            processed,
                            skipped,
                            continued: false,
                        };
                    }
                }
            } else if item.item_type == "message" {
                self.log_message_item(&item).await;
            }
        }

        let mut continued = false;
        if processed > 0 {
            match channel.send(&ClientEvent::response_create()).await {
                Ok(()) => continued = true,
                Err(e) => warn!(
                    channel = %channel.channel_id(),
                    "Failed to request the next response: {}",
                    e
                ),
            }
        }

        RouteOutcome::TurnComplete {
            processed,
            skipped,
            continued,
        }
    }

    async fn answer_call(&self, channel: &dyn Transport, item: ConversationItem) -> CallOutcome {
        let Some(call_id) = item.call_id.clone() else {
            warn!("Function call without call_id, skipping");
            return CallOutcome::Duplicate;
        };
        if !self.answered.lock().insert(call_id.clone()) {
            debug!(call_id = %call_id, "Call already answered, skipping");
            return CallOutcome::Duplicate;
        }

        let name = item.name.clone().unwrap_or_default();
        let arguments = item
            .arguments
            .map(ToolArguments::from)
            .unwrap_or_else(|| ToolArguments::Raw(String::new()));

        info!(call_id = %call_id, tool = %name, "Dispatching tool call");
        let result = self.dispatcher.dispatch(&name, arguments).await;

        let event = ClientEvent::function_call_output(&call_id, result.to_output_string());
        if let Err(e) = channel.send(&event).await {
            warn!(
                call_id = %call_id,
                channel = %channel.channel_id(),
                "Failed to send tool result: {}",
                e
            );
            return CallOutcome::SendFailed;
        }

        let callback = self.tool_call_callback.read().clone();
        if let Some(cb) = callback {
            cb(ToolCallRecord {
                call_id,
                name,
                success: result.is_success(),
                output: result.to_json(),
            })
            .await;
        }
        CallOutcome::Answered
    }

    async fn log_message_item(&self, item: &ConversationItem) {
        let Some(text) = item.text() else {
            return;
        };
        let role = match item.role.as_deref() {
            Some("user") => TranscriptRole::User,
            _ => TranscriptRole::Assistant,
        };
        let entry = {
            let mut log = self.log.write();
            if let Some(id) = item.id.as_deref() {
                if log.contains_final(id) {
                    return;
                }
            }
            log.complete(role, item.id.clone(), &text)
        };
        self.emit_log(entry).await;
    }

    async fn emit_log(&self, entry: LogEntry) {
        let callback = self.log_callback.read().clone();
        if let Some(cb) = callback {
            cb(entry).await;
        }
    }
}

enum CallOutcome {
    Answered,
    Duplicate,
    SendFailed,
}
