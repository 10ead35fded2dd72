//! Application shell: wires the registry, store, and controller together and
//! drives them from a line-oriented REPL.
//!
//! All state mutation happens on this task; spawned stream tasks only send
//! events back through the controller's channel.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::backend::{SearchMode, SidecarClient};
use crate::chat::{ChatController, ChatEvent};
use crate::config::ShellConfig;
use crate::conversation::{ConversationStore, MessageId, Role};
use crate::error::Result;
use crate::session::{SessionId, SessionRegistry};
use crate::view::ConversationView;

/// What a just-applied stream event means for the visible session.
///
/// Computed per event against the session active at application time; never
/// cached, since the user may have switched tabs since the last chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Chunk for the visible session: echo it live.
    VisibleDelta(String),
    VisibleCompleted,
    VisibleCancelled,
    /// Error for the visible session's invocation.
    VisibleFailed(String),
    /// Event belonged to a background session.
    Background { session_id: SessionId, finished: bool },
    /// Nothing to show (e.g. headers arrived).
    Quiet,
}

pub struct App {
    registry: SessionRegistry,
    store: ConversationStore,
    controller: ChatController,
    event_rx: mpsc::UnboundedReceiver<ChatEvent>,
}

impl App {
    pub fn new(config: &ShellConfig) -> Self {
        let mut controller = ChatController::new();
        controller.set_search_mode(config.chat.search_mode);
        let event_rx = controller
            .take_event_rx()
            .expect("event receiver taken from a fresh controller");

        Self {
            registry: SessionRegistry::new(),
            store: ConversationStore::new(),
            controller,
            event_rx,
        }
    }

    pub fn connect_backend(&mut self, client: SidecarClient) {
        self.controller.connect(client);
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn controller(&self) -> &ChatController {
        &self.controller
    }

    pub fn view(&self) -> ConversationView<'_> {
        ConversationView::active(&self.registry, &self.store, &self.controller)
    }

    /// Send from the current UI surface. The originating session id is
    /// captured here, once, and stays fixed for the whole invocation.
    pub fn send(&mut self, text: &str) -> Result<MessageId> {
        let session_id = self.registry.active_id();
        self.controller.send(&mut self.store, session_id, text)
    }

    pub fn stop(&mut self) {
        self.controller.stop(self.registry.active_id());
    }

    pub fn clear(&mut self) {
        let session_id = self.registry.active_id();
        self.controller.clear(&mut self.store, session_id);
    }

    pub fn create_session(&mut self) -> SessionId {
        self.registry.create()
    }

    pub fn switch_session(&mut self, id: SessionId) {
        self.registry.switch(id);
    }

    /// Close a session: cancel its stream if one is draining, remove it from
    /// the registry, and release its log.
    pub fn close_session(&mut self, id: SessionId) {
        self.controller.stop(id);
        if self.registry.delete(id) {
            self.store.release(id);
        }
    }

    pub fn close_active_session(&mut self) {
        self.close_session(self.registry.active_id());
    }

    /// Apply one stream event and report how it relates to the visible
    /// session at this instant.
    pub fn handle_event(&mut self, event: ChatEvent) -> Update {
        let visible = event.session_id() == self.registry.active_id();

        let update = match (&event, visible) {
            (ChatEvent::Delta { text, .. }, true) => Update::VisibleDelta(text.clone()),
            (ChatEvent::Completed { .. }, true) => Update::VisibleCompleted,
            (ChatEvent::Cancelled { .. }, true) => Update::VisibleCancelled,
            (ChatEvent::Failed { error, .. }, true) => Update::VisibleFailed(error.clone()),
            (ChatEvent::Opened { .. }, true) => Update::Quiet,
            (_, false) => Update::Background {
                session_id: event.session_id(),
                finished: matches!(
                    event,
                    ChatEvent::Completed { .. }
                        | ChatEvent::Cancelled { .. }
                        | ChatEvent::Failed { .. }
                ),
            },
        };

        self.controller.apply(&mut self.store, event);
        update
    }

    /// Receive the next stream event (used by the REPL loop and tests).
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        self.event_rx.recv().await
    }

    /// REPL: lines from stdin multiplexed with stream events.
    pub async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("lightbot-shell (/help for commands)");
        self.prompt();

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    let Some(event) = event else { break };
                    let update = self.handle_event(event);
                    self.render_update(update);
                }
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.handle_line(line.trim()) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        self.controller.stop_all();
        Ok(())
    }

    fn render_update(&self, update: Update) {
        match update {
            Update::VisibleDelta(text) => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            Update::VisibleCompleted => {
                println!();
                self.prompt();
            }
            Update::VisibleCancelled => {
                println!("\n[stopped]");
                self.prompt();
            }
            Update::VisibleFailed(error) => {
                println!("\n[error] {error}");
                self.prompt();
            }
            Update::Background { session_id, finished } => {
                if finished {
                    println!("[background session {} finished]", short_id(session_id));
                }
            }
            Update::Quiet => {}
        }
    }

    /// Returns `false` when the REPL should exit.
    fn handle_line(&mut self, line: &str) -> bool {
        let parsed = Command::parse(line);
        let sent = matches!(parsed, Ok(Command::Send(_)));

        match parsed {
            Ok(Command::Empty) => {}
            Ok(Command::Quit) => return false,
            Ok(Command::Help) => print_help(),
            Ok(Command::New) => {
                let id = self.create_session();
                println!("[new session {}]", short_id(id));
            }
            Ok(Command::Close) => {
                self.close_active_session();
                println!("[closed; now on {}]", short_id(self.registry.active_id()));
            }
            Ok(Command::Switch(index)) => {
                match self.registry.sessions().get(index).map(|s| s.id()) {
                    Some(id) => {
                        self.switch_session(id);
                        self.replay_active();
                    }
                    None => println!("[no session at index {index}]"),
                }
            }
            Ok(Command::List) => self.print_sessions(),
            Ok(Command::Clear) => {
                self.clear();
                println!("[cleared]");
            }
            Ok(Command::Stop) => self.stop(),
            Ok(Command::Search(mode)) => {
                self.controller.set_search_mode(mode);
                println!("[search mode: {mode}]");
            }
            Ok(Command::Send(text)) => {
                if let Err(err) = self.send(text) {
                    println!("[error] {err}");
                }
            }
            Err(message) => println!("[error] {message}"),
        }

        if !sent {
            self.prompt();
        }
        true
    }

    /// Print the active session's full log, e.g. after switching back to a
    /// session whose stream finished (or is still draining) in the background.
    fn replay_active(&self) {
        let view = self.view();
        println!("[session {}]", short_id(view.session.id()));
        for message in view.messages {
            let prefix = match message.role() {
                Role::User => "you",
                Role::Assistant => "bot",
            };
            println!("{prefix}> {}", message.content());
        }
        if !view.streaming {
            self.prompt();
        }
    }

    fn print_sessions(&self) {
        let active = self.registry.active_id();
        for (index, session) in self.registry.sessions().iter().enumerate() {
            let marker = if session.id() == active { "*" } else { " " };
            let streaming = if self.controller.is_streaming(session.id()) {
                " (streaming)"
            } else {
                ""
            };
            println!(
                "{marker} [{index}] {} {}, {} messages{streaming}",
                short_id(session.id()),
                session.color().name,
                self.store.read(session.id()).len(),
            );
        }
    }

    fn prompt(&self) {
        print!("{}> ", short_id(self.registry.active_id()));
        let _ = std::io::stdout().flush();
    }
}

fn short_id(id: SessionId) -> String {
    let full = id.to_string();
    full.chars().take(8).collect()
}

fn print_help() {
    println!("  /new            create a session and switch to it");
    println!("  /close          close the active session");
    println!("  /switch <n>     switch to session at index n (see /list)");
    println!("  /list           list sessions");
    println!("  /clear          clear the active session's messages");
    println!("  /stop           cancel the active session's stream");
    println!("  /search <mode>  set web search mode (off|on|auto)");
    println!("  /quit           exit");
    println!("  anything else   send as a chat message");
}

/// A parsed REPL line.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Send(&'a str),
    New,
    Close,
    Switch(usize),
    List,
    Clear,
    Stop,
    Search(SearchMode),
    Help,
    Quit,
    Empty,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> std::result::Result<Self, String> {
        if line.is_empty() {
            return Ok(Command::Empty);
        }
        if !line.starts_with('/') {
            return Ok(Command::Send(line));
        }

        let mut parts = line.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or_default();

        match command {
            "/new" => Ok(Command::New),
            "/close" => Ok(Command::Close),
            "/switch" => arg
                .parse()
                .map(Command::Switch)
                .map_err(|_| format!("usage: /switch <index>, got '{arg}'")),
            "/list" => Ok(Command::List),
            "/clear" => Ok(Command::Clear),
            "/stop" => Ok(Command::Stop),
            "/search" => arg.parse().map(Command::Search),
            "/help" => Ok(Command::Help),
            "/quit" | "/exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{other}' (try /help)")),
        }
    }
}
