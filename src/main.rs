use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ollama_chat::{
    app::{spawn_action, Action, App, AppEvent},
    client::OllamaClient,
    error::AppError,
    ui::ui,
};
use ratatui::prelude::*;
use std::{
    error::Error,
    fs::OpenOptions,
    io,
    sync::Mutex,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EVENT_CHANNEL_CAPACITY: usize = 100;
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const IDLE_SLEEP: Duration = Duration::from_millis(10);
const LOG_FILE_NAME: &str = "ollama-chat.log";

/// Logs go to a file in the temp directory since the terminal belongs to the
/// UI. `RUST_LOG` overrides the default `info` level.
fn init_logging() {
    let path = std::env::temp_dir().join(LOG_FILE_NAME);
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    info!("starting ollama-chat");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let client = OllamaClient::default();
    let mut app = App::new();

    // Fetch models immediately
    spawn_action(&client, &tx, Action::LoadModels);

    let res = run_app(&mut terminal, &mut app, &client, tx, rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = %err, "UI loop failed");
        eprintln!("TUI Error: {}", err);
    }
    info!("exiting");
    Ok(())
}

// --- Main Event Loop ---
async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    client: &OllamaClient,
    tx: mpsc::Sender<AppEvent>,
    mut rx: mpsc::Receiver<AppEvent>,
) -> Result<(), AppError> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(INPUT_POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match app.handle_key(key) {
                        Some(Action::Quit) => return Ok(()),
                        Some(action) => spawn_action(client, &tx, action),
                        None => {}
                    }
                }
            }
        }

        // Drain whatever the background tasks have reported.
        loop {
            match rx.try_recv() {
                Ok(event) => app.handle_event(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    app.status_message = "Critical Error: Async event channel disconnected.".to_string();
                    terminal.draw(|f| ui(f, app))?;
                    return Err(AppError::ChannelReceive);
                }
            }
        }

        tokio::time::sleep(IDLE_SLEEP).await;
    }
}
