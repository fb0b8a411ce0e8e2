//! Conversation session controller.
//!
//! Owns the client-side message list and drives one turn at a time:
//! append the user message, send the history, stream the reply into a
//! placeholder, then hand both messages to an ordered persistence queue.
//! Observers receive state snapshots through a `watch` channel.

use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ChatPersistence, ChatTransport, PersistenceError, TransportError};
use crate::db::models::Chat;
use crate::models::{ConversationMessage, Role, ToolInvocation};
use crate::transport::{DecodedMessage, StreamDecoder};

/// Characters of the first message used as the chat title
const TITLE_CHARS: usize = 50;
const UNTITLED: &str = "New Chat";

/// Where the current turn is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    UserAppended,
    AssistantThinking,
    AssistantStreaming,
    AssistantFinal,
    AssistantError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub messages: Vec<ConversationMessage>,
    pub current_chat_id: Option<String>,
    pub is_loading: bool,
    pub input_buffer: String,
    pub phase: TurnPhase,
    /// Bumped whenever the conversation is replaced; stale turns and saves
    /// compare against it
    generation: u64,
}

impl SessionState {
    fn message_mut(&mut self, id: &str) -> Option<&mut ConversationMessage> {
        self.messages.iter_mut().find(|msg| msg.id == id)
    }

    /// Drop whatever conversation is showing and start a new generation
    fn reset(&mut self) {
        self.generation += 1;
        self.messages.clear();
        self.current_chat_id = None;
        self.is_loading = false;
        self.phase = TurnPhase::Idle;
    }
}

/// State plus the channel that publishes it
struct Shared {
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionState>,
}

impl Shared {
    /// Apply `f`; observers are notified only when it returns `Some`
    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> Option<R>) -> Option<R> {
        let mut state = self.state.lock().unwrap();
        let out = f(&mut state)?;
        self.updates.send_replace(state.clone());
        Some(out)
    }

    /// Like [`update`](Self::update), but only while `generation` is current
    fn update_turn(&self, generation: u64, f: impl FnOnce(&mut SessionState)) -> bool {
        self.update(|state| {
            if state.generation != generation {
                return None;
            }
            f(state);
            Some(())
        })
        .is_some()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().unwrap().generation == generation
    }
}

enum PersistCommand {
    Save {
        role: Role,
        content: String,
        invocations: Vec<ToolInvocation>,
        title: String,
        generation: u64,
    },
    Attach {
        chat_id: Option<String>,
        generation: u64,
    },
    Flush(oneshot::Sender<()>),
}

enum TurnOutcome {
    Finished(DecodedMessage),
    /// The conversation was replaced mid-turn
    Abandoned,
}

/// Drives chat turns for one user session
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
    transport: Arc<dyn ChatTransport>,
    persistence: Arc<dyn ChatPersistence>,
    queue: mpsc::UnboundedSender<PersistCommand>,
    apology: Arc<str>,
}

impl SessionController {
    /// Must be called from within a Tokio runtime; the persistence worker is
    /// spawned here.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        persistence: Arc<dyn ChatPersistence>,
        apology: impl Into<String>,
    ) -> Self {
        let (updates, _) = watch::channel(SessionState::default());
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::default()),
            updates,
        });

        let (queue, commands) = mpsc::unbounded_channel();
        let worker = PersistenceWorker {
            persistence: persistence.clone(),
            shared: shared.clone(),
            chat_id: None,
            generation: 0,
        };
        tokio::spawn(worker.run(commands));

        Self {
            shared,
            transport,
            persistence,
            queue,
            apology: Arc::from(apology.into()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.updates.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.shared.state.lock().unwrap().clone()
    }

    pub fn set_input(&self, text: &str) {
        self.shared.update(|state| {
            state.input_buffer = text.to_string();
            Some(())
        });
    }

    /// Send whatever is in the input buffer
    pub async fn submit(&self) -> bool {
        let text = self.shared.state.lock().unwrap().input_buffer.clone();
        self.send(&text).await
    }

    /// Run one turn. Returns `false` without touching any state when `text`
    /// is blank or a turn is already in flight.
    pub async fn send(&self, text: &str) -> bool {
        let content = text.trim().to_string();
        let Some((history, generation)) = self.shared.update(|state| {
            if content.is_empty() || state.is_loading {
                return None;
            }
            state.messages.push(ConversationMessage::user(
                Uuid::new_v4().to_string(),
                content.clone(),
            ));
            state.input_buffer.clear();
            state.is_loading = true;
            state.phase = TurnPhase::UserAppended;
            Some((state.messages.clone(), state.generation))
        }) else {
            return false;
        };

        self.enqueue(PersistCommand::Save {
            role: Role::User,
            content: content.clone(),
            invocations: Vec::new(),
            title: chat_title(&content),
            generation,
        });

        let placeholder_id = Uuid::new_v4().to_string();
        self.shared.update_turn(generation, |state| {
            let mut placeholder = ConversationMessage::assistant(placeholder_id.clone(), "");
            placeholder.is_thinking = true;
            state.messages.push(placeholder);
            state.phase = TurnPhase::AssistantThinking;
        });

        match self.stream_reply(&history, &placeholder_id, generation).await {
            Ok(TurnOutcome::Finished(reply)) => self.finish_turn(generation, &placeholder_id, reply),
            Ok(TurnOutcome::Abandoned) => {
                debug!("Conversation replaced mid-turn; reply discarded");
            }
            Err(e) => {
                warn!(error = %e, "Chat request failed");
                let apology = self.apology.to_string();
                self.shared.update_turn(generation, |state| {
                    if let Some(msg) = state.message_mut(&placeholder_id) {
                        msg.content = apology;
                        msg.tool_invocations.clear();
                        msg.is_thinking = false;
                    }
                    state.is_loading = false;
                    state.phase = TurnPhase::AssistantError;
                });
            }
        }

        true
    }

    async fn stream_reply(
        &self,
        history: &[ConversationMessage],
        placeholder_id: &str,
        generation: u64,
    ) -> Result<TurnOutcome, TransportError> {
        let mut stream = self.transport.send(history).await?;
        let mut decoder = StreamDecoder::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(reply) = decoder.push(&chunk) {
                return Ok(TurnOutcome::Finished(reply));
            }

            let visible = decoder.visible_text();
            let live = if visible.is_empty() {
                self.shared.is_current(generation)
            } else {
                let visible = visible.to_string();
                self.shared.update_turn(generation, |state| {
                    if let Some(msg) = state.message_mut(placeholder_id) {
                        msg.content = visible;
                        msg.is_thinking = false;
                    }
                    state.phase = TurnPhase::AssistantStreaming;
                })
            };
            if !live {
                return Ok(TurnOutcome::Abandoned);
            }
        }

        Ok(decoder
            .finish()
            .map_or(TurnOutcome::Abandoned, TurnOutcome::Finished))
    }

    fn finish_turn(&self, generation: u64, placeholder_id: &str, reply: DecodedMessage) {
        let invocations: Vec<ToolInvocation> = reply.invocation.into_iter().collect();
        let content = reply.content;

        let applied = self.shared.update_turn(generation, |state| {
            if let Some(msg) = state.message_mut(placeholder_id) {
                msg.content = content.clone();
                msg.tool_invocations = invocations.clone();
                msg.is_thinking = false;
            }
            state.is_loading = false;
            state.phase = TurnPhase::AssistantFinal;
        });
        if !applied {
            return;
        }

        if content.is_empty() && invocations.is_empty() {
            debug!("Empty assistant reply; nothing to persist");
            return;
        }
        self.enqueue(PersistCommand::Save {
            role: Role::Assistant,
            title: chat_title(&content),
            content,
            invocations,
            generation,
        });
    }

    /// Replace the conversation with a stored chat
    pub async fn load_chat(&self, chat_id: &str) -> Result<(), PersistenceError> {
        let transcript = self.persistence.load_chat(chat_id).await?;
        let messages: Vec<ConversationMessage> = transcript
            .messages
            .into_iter()
            .map(ConversationMessage::from)
            .collect();

        let generation = self
            .shared
            .update(|state| {
                state.reset();
                state.messages = messages;
                state.current_chat_id = Some(transcript.chat.id.clone());
                Some(state.generation)
            })
            .unwrap_or_default();

        info!(chat_id = %transcript.chat.id, "Loaded chat");
        self.enqueue(PersistCommand::Attach {
            chat_id: Some(transcript.chat.id),
            generation,
        });
        Ok(())
    }

    /// Clear the conversation; the next message starts a new chat
    pub fn start_new_chat(&self) {
        let generation = self
            .shared
            .update(|state| {
                state.reset();
                Some(state.generation)
            })
            .unwrap_or_default();

        self.enqueue(PersistCommand::Attach {
            chat_id: None,
            generation,
        });
    }

    pub async fn list_chats(&self) -> Result<Vec<Chat>, PersistenceError> {
        self.persistence.list_chats().await
    }

    /// Delete a stored chat, leaving the conversation if it was showing
    pub async fn delete_chat(&self, chat_id: &str) -> Result<(), PersistenceError> {
        self.persistence.delete_chat(chat_id).await?;
        let showing = self.snapshot().current_chat_id.as_deref() == Some(chat_id);
        if showing {
            self.start_new_chat();
        }
        Ok(())
    }

    /// Wait until every queued persistence command has been handled
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.enqueue(PersistCommand::Flush(done));
        let _ = wait.await;
    }

    fn enqueue(&self, command: PersistCommand) {
        if self.queue.send(command).is_err() {
            warn!("Persistence worker has stopped; message not saved");
        }
    }
}

/// Title for a chat created from its first message
fn chat_title(first_message: &str) -> String {
    let title: String = first_message.trim().chars().take(TITLE_CHARS).collect();
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    }
}

/// Applies persistence commands one at a time, in the order they were queued
struct PersistenceWorker {
    persistence: Arc<dyn ChatPersistence>,
    shared: Arc<Shared>,
    chat_id: Option<String>,
    generation: u64,
}

impl PersistenceWorker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<PersistCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                PersistCommand::Save {
                    role,
                    content,
                    invocations,
                    title,
                    generation,
                } => {
                    self.save(role, &content, &invocations, &title, generation)
                        .await
                }
                PersistCommand::Attach {
                    chat_id,
                    generation,
                } => {
                    self.chat_id = chat_id;
                    self.generation = generation;
                }
                PersistCommand::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Persistence worker stopped");
    }

    async fn save(
        &mut self,
        role: Role,
        content: &str,
        invocations: &[ToolInvocation],
        title: &str,
        generation: u64,
    ) {
        if generation != self.generation {
            debug!(%role, "Dropping save for a conversation that was replaced");
            return;
        }

        let chat_id = match &self.chat_id {
            Some(id) => id.clone(),
            None => match self.persistence.create_chat(title).await {
                Ok(chat) => {
                    debug!(chat_id = %chat.id, "Created chat");
                    self.chat_id = Some(chat.id.clone());
                    self.shared.update(|state| {
                        (state.generation == generation).then(|| {
                            state.current_chat_id = Some(chat.id.clone());
                        })
                    });
                    chat.id
                }
                Err(e) => {
                    warn!(error = %e, %role, "Failed to create chat; message not saved");
                    return;
                }
            },
        };

        if let Err(e) = self
            .persistence
            .save_message(&chat_id, role, content, invocations)
            .await
        {
            warn!(error = %e, %chat_id, %role, "Failed to save message");
        }
    }
}
