mod auth;
mod controller;
mod logging;
mod model;
mod prefs;
mod settings;
mod view;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableFocusChange, EnableFocusChange, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{Mutex, RwLock};

use auth::AuthSession;
use controller::PlayerController;
use model::{PlayerScreenState, SpotifyClient};
use prefs::PrefStore;
use settings::AppSettings;
use view::PlayerView;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = logging::init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== spotiview starting ===");

    let prefs = Arc::new(PrefStore::open()?);
    let settings = AppSettings::load(&prefs);
    // Write the effective settings back so the file lists every key
    settings.store(&prefs)?;

    // The interactive authorization happens outside this app; we only need
    // its stored outcome
    let session = match AuthSession::load(&prefs) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{e:#}");
            return Err(e);
        }
    };
    let session = Arc::new(RwLock::new(session));
    let client = SpotifyClient::new(session)?;

    let state = Arc::new(Mutex::new(PlayerScreenState::new()));
    let controller = PlayerController::new(state.clone(), client, settings.clone(), prefs);

    tracing::info!("Starting TUI...");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    controller.resume().await;

    let res = run_app(&mut terminal, state, controller.clone(), &settings).await;

    controller.suspend().await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableFocusChange)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = ?err, "Application error");
    }

    tracing::info!("spotiview shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: Arc<Mutex<PlayerScreenState>>,
    controller: PlayerController,
    settings: &AppSettings,
) -> io::Result<()> {
    loop {
        let (snapshot, should_quit) = {
            let mut guard = state.lock().await;
            guard.expire_old_notice();
            (guard.clone(), guard.should_quit)
        };

        terminal.draw(|f| {
            PlayerView::render(f, &snapshot, settings);
        })?;

        // Short poll so polled updates show up promptly between key presses
        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => {
                    let _ = controller.handle_key_event(key).await;
                }
                // Terminal focus stands in for screen visibility: polling
                // runs only while someone is looking
                Event::FocusGained => controller.resume().await,
                Event::FocusLost => controller.suspend().await,
                _ => {}
            }
        }

        if should_quit {
            break;
        }
    }

    Ok(())
}
