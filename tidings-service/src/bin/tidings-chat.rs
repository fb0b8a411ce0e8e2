//! Terminal chat client for the Tidings service.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use tidings_service::client::{
    ClientConfig, HttpChatTransport, HttpPersistence, SessionController, SessionState, TurnPhase,
    render_card,
};
use tidings_service::config;
use tidings_service::i18n::I18n;
use tidings_service::models::{ConversationMessage, Role};

const HELP: &str = "Commands: /new, /list, /load <id>, /delete <id>, /quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config: ClientConfig = config::load("tidings-chat", "TIDINGS_CHAT")?;
    debug!(server_url = %config.server_url, "Client configuration loaded");

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()?;
    let apology = I18n::new().get("en", "chat-apology", None);
    let session = SessionController::new(
        Arc::new(HttpChatTransport::new(
            http.clone(),
            &config.server_url,
            &config.token,
        )),
        Arc::new(HttpPersistence::new(http, &config.server_url, &config.token)),
        apology,
    );

    println!("Ask about the weather, Formula 1 or a stock. {}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/help", _) => println!("{}", HELP),
            ("/new", _) => {
                session.start_new_chat();
                println!("Started a new chat.");
            }
            ("/list", _) => match session.list_chats().await {
                Ok(chats) if chats.is_empty() => println!("No saved chats."),
                Ok(chats) => {
                    for chat in chats {
                        println!(
                            "  {}  {}  ({})",
                            chat.id,
                            chat.title,
                            chat.updated_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
                Err(e) => eprintln!("error: {}", e),
            },
            ("/load", id) if !id.trim().is_empty() => match session.load_chat(id.trim()).await {
                Ok(()) => print_transcript(&session.snapshot()),
                Err(e) => eprintln!("error: {}", e),
            },
            ("/delete", id) if !id.trim().is_empty() => {
                match session.delete_chat(id.trim()).await {
                    Ok(()) => println!("Deleted."),
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            (command, _) if command.starts_with('/') => println!("{}", HELP),
            _ => run_turn(&session, line).await?,
        }
    }

    session.flush().await;
    Ok(())
}

/// Send one message and print the reply as it streams in
async fn run_turn(session: &SessionController, text: &str) -> std::io::Result<()> {
    let mut updates = session.subscribe();
    let mut printer = ReplyPrinter::default();

    let turn = session.send(text);
    tokio::pin!(turn);
    loop {
        tokio::select! {
            sent = &mut turn => {
                if sent {
                    printer.render(&session.snapshot())?;
                }
                return Ok(());
            }
            Ok(()) = updates.changed() => {
                let state = updates.borrow_and_update().clone();
                printer.render(&state)?;
            }
        }
    }
}

/// Prints the growing assistant reply without repeating text already shown
#[derive(Default)]
struct ReplyPrinter {
    message_id: Option<String>,
    shown: String,
    finished: bool,
}

impl ReplyPrinter {
    fn render(&mut self, state: &SessionState) -> std::io::Result<()> {
        let Some(reply) = state
            .messages
            .last()
            .filter(|msg| msg.role == Role::Assistant && !msg.is_thinking)
        else {
            return Ok(());
        };

        let mut out = std::io::stdout();
        if self.message_id.as_deref() != Some(reply.id.as_str()) {
            self.message_id = Some(reply.id.clone());
            self.shown.clear();
            self.finished = false;
            write!(out, "assistant> ")?;
        }
        if self.finished {
            return Ok(());
        }

        if let Some(rest) = reply.content.strip_prefix(self.shown.as_str()) {
            write!(out, "{}", rest)?;
            self.shown = reply.content.clone();
        } else if !self.shown.starts_with(&reply.content) {
            // Replaced rather than extended, e.g. by the apology
            write!(out, "\n{}", reply.content)?;
            self.shown = reply.content.clone();
        }

        if matches!(
            state.phase,
            TurnPhase::AssistantFinal | TurnPhase::AssistantError
        ) {
            self.finished = true;
            writeln!(out)?;
            print_cards(reply);
        }
        out.flush()
    }
}

fn print_transcript(state: &SessionState) {
    for message in &state.messages {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        println!("{}> {}", speaker, message.content);
        print_cards(message);
    }
}

fn print_cards(message: &ConversationMessage) {
    for invocation in &message.tool_invocations {
        println!("{}", render_card(invocation));
    }
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tidings_service=warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
