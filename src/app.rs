use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::OllamaClient;
use crate::error::TransportError;
use crate::models::{ModelLoadState, ModelSelector, NO_MODELS_NOTICE};
use crate::session::{ChatSession, PendingTurn};

const PAGE: u16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

// --- Events for Async Communication ---
#[derive(Debug)]
pub enum AppEvent {
    ModelsLoaded(Vec<String>),
    ChatReply(Result<String, TransportError>),
    ChatFragment(String),
    ChatStreamEnd(Result<(), TransportError>),
}

/// Work the UI loop has to start after handling a key.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    LoadModels,
    SendTurn { turn: PendingTurn, stream: bool },
    Quit,
}

/// Vertical position of the conversation pane.
#[derive(Debug)]
pub struct ScrollState {
    offset: u16,
    follow: bool,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            offset: 0,
            follow: true,
        }
    }
}

impl ScrollState {
    pub fn follow_latest(&mut self) {
        self.follow = true;
    }

    pub fn is_following(&self) -> bool {
        self.follow
    }

    pub fn up(&mut self, amount: u16) {
        self.follow = false;
        self.offset = self.offset.saturating_sub(amount);
    }

    pub fn down(&mut self, amount: u16) {
        self.offset = self.offset.saturating_add(amount);
    }

    /// Clamps to `max` (the offset that shows the last line) and returns the
    /// offset to render with. Reaching the bottom resumes following.
    pub fn resolve(&mut self, max: u16) -> u16 {
        if self.follow || self.offset >= max {
            self.follow = true;
            self.offset = max;
        }
        self.offset
    }
}

pub struct App {
    pub input_mode: InputMode,
    pub models: ModelSelector,
    pub session: ChatSession,
    pub stream_replies: bool,
    pub status_message: String,
    pub scroll: ScrollState,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        App {
            input_mode: InputMode::Normal,
            models: ModelSelector::new(),
            session: ChatSession::new(),
            stream_replies: false,
            status_message: "Fetching models...".to_string(),
            scroll: ScrollState::default(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }
        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Editing => self.handle_editing_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('q') => return Some(Action::Quit),
            KeyCode::Char('j') | KeyCode::Down => {
                self.models.select_next();
                self.announce_model();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.models.select_previous();
                self.announce_model();
            }
            KeyCode::Enter => {
                if self.models.is_ready() {
                    self.input_mode = InputMode::Editing;
                    self.status_message = "Editing... Enter: Send, Esc: Stop typing.".to_string();
                } else {
                    self.status_message = "No model available yet.".to_string();
                }
            }
            KeyCode::Char('c') if self.models.is_ready() => {
                self.session.clear();
                self.scroll.follow_latest();
                self.status_message = "Chat cleared.".to_string();
            }
            KeyCode::Char('r') if self.models.state() == ModelLoadState::Error => {
                if self.models.retry() {
                    self.status_message = "Fetching models...".to_string();
                    return Some(Action::LoadModels);
                }
            }
            KeyCode::Char('s') => {
                self.stream_replies = !self.stream_replies;
                self.status_message = if self.stream_replies {
                    "Streaming replies on.".to_string()
                } else {
                    "Streaming replies off.".to_string()
                };
            }
            KeyCode::PageUp => self.scroll.up(PAGE),
            KeyCode::PageDown => self.scroll.down(PAGE),
            _ => {}
        }
        None
    }

    fn handle_editing_key(&mut self, key: KeyEvent) -> Option<Action> {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => return self.submit_prompt(),
            (KeyCode::Esc, _) => {
                self.input_mode = InputMode::Normal;
                self.status_message = "Press 'Enter' to type, 'c' to clear, 'q' to quit.".to_string();
            }
            (KeyCode::Backspace, _) => self.session.pop_char(),
            (KeyCode::Char(c), modifier) if modifier == KeyModifiers::NONE || modifier == KeyModifiers::SHIFT => {
                self.session.push_char(c);
            }
            (KeyCode::PageUp, _) => self.scroll.up(PAGE),
            (KeyCode::PageDown, _) => self.scroll.down(PAGE),
            _ => {}
        }
        None
    }

    fn submit_prompt(&mut self) -> Option<Action> {
        let Some(model) = self.models.selected() else {
            self.status_message = "Error: No model selected.".to_string();
            return None;
        };

        match self.session.submit(model) {
            Some(turn) => {
                self.status_message = format!("Asking {}...", turn.model);
                self.scroll.follow_latest();
                Some(Action::SendTurn {
                    turn,
                    stream: self.stream_replies,
                })
            }
            None if self.session.is_awaiting() => {
                self.status_message = format!("Waiting for {} to reply...", model);
                None
            }
            None => {
                self.status_message = "Cannot send an empty prompt.".to_string();
                None
            }
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ModelsLoaded(models) => {
                self.models.finish_loading(models);
                self.status_message = match self.models.state() {
                    ModelLoadState::Ready => format!(
                        "{} models loaded. Select: j/k, Chat: Enter",
                        self.models.models().len()
                    ),
                    _ => format!("{} Press 'r' to retry.", NO_MODELS_NOTICE),
                };
            }
            AppEvent::ChatReply(result) => {
                self.status_message = reply_status(result.is_ok());
                self.session.finish_turn(result);
                self.scroll.follow_latest();
            }
            AppEvent::ChatFragment(fragment) => {
                self.session.append_fragment(&fragment);
                self.scroll.follow_latest();
            }
            AppEvent::ChatStreamEnd(result) => {
                self.status_message = reply_status(result.is_ok());
                self.session.finish_stream(result);
                self.scroll.follow_latest();
            }
        }
    }

    fn announce_model(&mut self) {
        if let Some(model) = self.models.selected() {
            self.status_message = format!("Model: {}", model);
        }
    }
}

fn reply_status(ok: bool) -> String {
    if ok {
        "Response received.".to_string()
    } else {
        "Error occurred while chatting, details are in the log.".to_string()
    }
}

/// Runs `action` on a background task; its outcome comes back as an `AppEvent`.
pub fn spawn_action(client: &OllamaClient, events: &mpsc::Sender<AppEvent>, action: Action) {
    let client = client.clone();
    let events = events.clone();
    match action {
        Action::LoadModels => {
            tokio::spawn(async move {
                let models = client.list_models().await;
                send_event(&events, AppEvent::ModelsLoaded(models)).await;
            });
        }
        Action::SendTurn { turn, stream: false } => {
            tokio::spawn(async move {
                let result = client.chat(&turn.messages, &turn.model).await;
                send_event(&events, AppEvent::ChatReply(result)).await;
            });
        }
        Action::SendTurn { turn, stream: true } => {
            tokio::spawn(async move {
                let result = stream_reply(&client, &turn, &events).await;
                send_event(&events, AppEvent::ChatStreamEnd(result)).await;
            });
        }
        Action::Quit => {}
    }
}

async fn stream_reply(
    client: &OllamaClient,
    turn: &PendingTurn,
    events: &mpsc::Sender<AppEvent>,
) -> Result<(), TransportError> {
    let fragments = client.stream_chat(&turn.messages, &turn.model).await?;
    futures::pin_mut!(fragments);

    while let Some(fragment) = fragments.next().await {
        if events.send(AppEvent::ChatFragment(fragment?)).await.is_err() {
            debug!("UI loop is gone, dropping the rest of the stream");
            break;
        }
    }
    Ok(())
}

async fn send_event(events: &mpsc::Sender<AppEvent>, event: AppEvent) {
    if events.send(event).await.is_err() {
        warn!("failed to send event back to the UI loop");
    }
}
