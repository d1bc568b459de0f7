//! Terminal client for the board.
//!
//! Commands: `/rooms [category] [search]`, `/join <room-id>`,
//! `/new <category> <title>`, `/name <display name>`, `/status`, `/quit`.
//! Anything else is sent as a message to the joined room.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use anonboard::http_store::HttpStore;
use anonboard::types::{ChatRoom, Message, NewRoom, Profile};
use anonboard::validation::{validate_custom_category, validate_room_title};
use anonboard::view::{BoardView, ALL_CATEGORIES};
use anonboard::{ChatSession, MessageStore, RateLimitConfig, SessionEvent};

#[derive(Parser, Debug)]
#[command(name = "anonboard-client", about = "Anonymous chat board in the terminal")]
struct Args {
    /// Board server origin
    #[arg(long, env = "BOARD_URL", default_value = "http://localhost:5000")]
    server: String,

    /// Display name shown next to your messages
    #[arg(long, env = "BOARD_NAME")]
    name: String,

    /// Avatar (an emoji works well)
    #[arg(long, env = "BOARD_AVATAR", default_value = "🦉")]
    avatar: String,

    /// Room id to join on start
    #[arg(long)]
    room: Option<String>,

    /// Messages allowed per window
    #[arg(long, default_value_t = 5)]
    max_messages: u32,

    /// Base window length in milliseconds
    #[arg(long, default_value_t = 30_000)]
    window_ms: u64,

    /// Seconds between polls for new messages
    #[arg(long, default_value_t = 5)]
    poll_secs: u64,
}

enum Input {
    Line(Option<String>),
    Poll,
    Event(SessionEvent),
}

struct App {
    store: Arc<dyn MessageStore>,
    profile: Profile,
    limits: RateLimitConfig,
    lobby: BoardView,
    session: Option<ChatSession>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let profile = Profile::new(&args.name, &args.avatar)?;
    let limits = RateLimitConfig::new(args.max_messages, args.window_ms)?;
    let store: Arc<dyn MessageStore> =
        Arc::new(HttpStore::new(&args.server).context("failed to build HTTP client")?);

    let mut app = App {
        store,
        profile,
        limits,
        lobby: BoardView::new(),
        session: None,
    };
    app.refresh_lobby().await;
    println!(
        "Hi {} {}. {} rooms open. Type /rooms to list them.",
        app.profile.avatar,
        app.profile.display_name,
        app.lobby.rooms().len()
    );
    if let Some(room) = &args.room {
        app.join(room).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut poll = tokio::time::interval(Duration::from_secs(args.poll_secs.max(1)));

    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            _ = poll.tick() => Input::Poll,
            Some(event) = next_event(&mut app.session) => Input::Event(event),
        };

        match input {
            Input::Line(None) => break,
            Input::Line(Some(line)) => {
                if !app.handle_line(line.trim_end()).await {
                    break;
                }
            }
            Input::Poll => app.poll().await,
            Input::Event(event) => {
                if let Some(session) = app.session.as_mut() {
                    session.handle_event(event);
                    if !session.is_limited() {
                        println!("-- you can send messages again --");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn next_event(session: &mut Option<ChatSession>) -> Option<SessionEvent> {
    match session {
        Some(s) => s.next_event().await,
        None => std::future::pending().await,
    }
}

fn print_message(message: &Message) {
    println!(
        "[{}] {} {}: {}",
        message.timestamp.format("%H:%M"),
        message.user_avatar,
        message.user_name,
        message.content
    );
}

fn print_room(room: &ChatRoom) {
    println!(
        "  {}  {} /{}/ ({} messages, {} active)",
        room.id, room.title, room.category, room.message_count, room.active_users
    );
}

impl App {
    /// Returns false when the user asked to quit.
    async fn handle_line(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(3, ' ');
        match parts.next().unwrap_or("") {
            "/quit" => return false,
            "/rooms" => {
                self.refresh_lobby().await;
                let category = parts.next().unwrap_or(ALL_CATEGORIES);
                let query = parts.next().unwrap_or("");
                let rooms = self.lobby.rooms_filtered(category, query);
                if rooms.is_empty() {
                    println!("No discussions found.");
                }
                for room in rooms {
                    print_room(room);
                }
            }
            "/join" => match parts.next() {
                Some(id) => self.join(id.trim()).await,
                None => println!("Usage: /join <room-id>"),
            },
            "/new" => match (parts.next(), parts.next()) {
                (Some(category), Some(title)) => self.create_room(category, title).await,
                _ => println!("Usage: /new <category> <title>"),
            },
            "/name" => {
                let name = line.trim_start_matches("/name").trim();
                match self.profile.renamed(name, &self.profile.avatar) {
                    Ok(profile) => {
                        if let Some(session) = self.session.as_mut() {
                            session.update_profile(profile.clone());
                        }
                        println!("You are now {}", profile.display_name);
                        self.profile = profile;
                    }
                    Err(e) => println!("{}", e),
                }
            }
            "/status" => match &self.session {
                Some(session) => {
                    let status = session.status();
                    println!(
                        "limited: {}, remaining: {}s, penalty: {}x",
                        status.is_limited, status.remaining_time, status.current_multiplier
                    );
                }
                None => println!("Not in a room."),
            },
            _ => self.send(line).await,
        }
        true
    }

    async fn send(&mut self, line: &str) {
        let Some(session) = self.session.as_mut() else {
            println!("Join a room first: /rooms, then /join <room-id>");
            return;
        };
        match session.send_message(line).await {
            Ok(saved) => print_message(&saved),
            Err(e) => println!("! {}", e),
        }
    }

    async fn join(&mut self, room_id: &str) {
        self.refresh_lobby().await;
        let Some(room) = self.lobby.room(room_id).cloned() else {
            println!("No room with id {}", room_id);
            return;
        };

        // dropping the old session cancels its cooldown timer
        self.session = None;
        let mut session = match ChatSession::new(
            self.profile.clone(),
            &room.id,
            self.limits,
            self.store.clone(),
        ) {
            Ok(session) => session,
            Err(e) => {
                println!("! {}", e);
                return;
            }
        };

        println!("== {} /{}/ ==", room.title, room.category);
        match session.refresh().await {
            Ok(history) => history.iter().for_each(print_message),
            Err(e) => println!("! could not load messages: {}", e),
        }
        self.session = Some(session);
    }

    async fn create_room(&mut self, category: &str, title: &str) {
        self.refresh_lobby().await;
        let titles: Vec<&str> = self.lobby.rooms().iter().map(|r| r.title.as_str()).collect();
        let title = match validate_room_title(title, titles) {
            Ok(title) => title,
            Err(e) => {
                println!("! {}", e);
                return;
            }
        };

        let known = self.lobby.categories();
        let category = match known.iter().find(|c| c.as_str() == category) {
            Some(c) => c.clone(),
            None => match validate_custom_category(category, known.iter().map(String::as_str)) {
                Ok(c) => c,
                Err(e) => {
                    println!("! {}", e);
                    return;
                }
            },
        };

        match self.store.create_room(NewRoom::new(&title, &category)).await {
            Ok(room) => {
                let id = room.id.clone();
                self.lobby.add_room(room);
                self.join(&id).await;
            }
            Err(e) => println!("! {}", e),
        }
    }

    async fn poll(&mut self) {
        match self.session.as_mut() {
            Some(session) => match session.refresh().await {
                Ok(fresh) => fresh.iter().for_each(print_message),
                Err(e) => warn!("poll failed: {}", e),
            },
            None => self.refresh_lobby().await,
        }
    }

    async fn refresh_lobby(&mut self) {
        match self.store.rooms().await {
            Ok(rooms) => self.lobby.replace_rooms(rooms),
            Err(e) => warn!("could not load rooms: {}", e),
        }
    }
}
