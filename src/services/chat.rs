//! Per-match chat session over the live channel.

use std::sync::Arc;

use tracing::info;

use crate::channels::{ChannelKey, ChannelManager, ChannelRegistry, Subscription};
use crate::error::{ClientError, ClientResult};
use crate::models::chat::{ChatMessage, ChatOutbound};
use crate::models::event::PushEvent;
use crate::repositories::ChatHistoryService;

/// What a chat consumer sees: messages, typing notices, and the server
/// closing the room. Raw channel noise never surfaces here.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Message(ChatMessage),
    Typing { username: String, is_typing: bool },
    /// The server refused or ended the conversation (match started, not a
    /// participant). Sends are rejected locally from then on.
    Closed { message: String },
}

/// One user's view of one match's chat: history plus the live stream.
/// Dropping the session leaves the room; the last session for a match closes
/// its channel.
pub struct ChatSession {
    match_id: i64,
    manager: ChannelManager,
    subscription: Subscription,
    history: Vec<ChatMessage>,
    closed: Option<String>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("match_id", &self.match_id)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Load persisted history, then join the live room. The registry's guard
    /// refreshes the credential before the connection attempt.
    pub async fn open(
        registry: &ChannelRegistry,
        history_service: Arc<dyn ChatHistoryService>,
        match_id: i64,
    ) -> ClientResult<ChatSession> {
        let history = history_service.list_messages(match_id).await?;
        let subscription = registry.subscribe(ChannelKey::Chat(match_id)).await?;
        let manager = registry.manager(ChannelKey::Chat(match_id)).await;
        info!(match_id, messages = history.len(), "chat session opened");
        Ok(Self {
            match_id,
            manager,
            subscription,
            history,
            closed: None,
        })
    }

    pub fn match_id(&self) -> i64 {
        self.match_id
    }

    /// Everything received so far, history first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Next chat event, appending messages to the local history. `None` once
    /// the subscription ends.
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        while let Some(event) = self.subscription.recv().await {
            match event {
                PushEvent::ChatMessage(message) => {
                    self.history.push(message.clone());
                    return Some(ChatEvent::Message(message));
                }
                PushEvent::Typing { username, is_typing } => {
                    return Some(ChatEvent::Typing { username, is_typing });
                }
                PushEvent::Error { message } => {
                    self.closed = Some(message.clone());
                    return Some(ChatEvent::Closed { message });
                }
                _ => {}
            }
        }
        None
    }

    /// Send a text message to the room.
    pub fn send(&self, text: &str) -> ClientResult<()> {
        self.ensure_open()?;
        self.manager.send(&ChatOutbound::message(text))
    }

    /// Broadcast the typing indicator.
    pub fn send_typing(&self, is_typing: bool) -> ClientResult<()> {
        self.ensure_open()?;
        self.manager.send(&ChatOutbound::typing(is_typing))
    }

    fn ensure_open(&self) -> ClientResult<()> {
        match &self.closed {
            Some(reason) => Err(ClientError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }
}
