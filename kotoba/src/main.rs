//! Japanese language-learning chat companion TUI.
//!
//! A vim-style terminal interface for chatting with AI conversation
//! partners who correct your Japanese and gloss their vocabulary.
//!
//! ```bash
//! GEMINI_API_KEY=... cargo run -p kotoba -- --data kotoba.json
//! ```

mod app;
mod events;
mod ui;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use kotoba_core::{Registry, Store};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, stdout};
use std::time::Duration;

use app::App;
use events::{handle_event, EventResult};
use ui::render::render;

const DEFAULT_DATA_PATH: &str = "kotoba.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let data_path = args
        .iter()
        .position(|a| a == "--data")
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
        .unwrap_or(DEFAULT_DATA_PATH)
        .to_string();

    let store = Store::new(&data_path);
    let registry = Registry::open(store).await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, App::new(registry)).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;

    if let Err(e) = result {
        eprintln!("Error: {e}");
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| render(f, &app))?;

        // Perform any deferred operation, redrawing first so the busy
        // status is visible while the call is in flight
        if let Some(action) = app.pending.take() {
            terminal.draw(|f| render(f, &app))?;
            app.perform(action).await;
            continue;
        }

        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            match handle_event(&mut app, ev) {
                EventResult::Quit => return Ok(()),
                EventResult::NeedsRedraw | EventResult::Continue => {}
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn print_help() {
    println!("kotoba - Japanese language-learning chat companion");
    println!();
    println!("USAGE:");
    println!("  kotoba [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help       Show this help message");
    println!("  --data <PATH>    Data file path (default: {DEFAULT_DATA_PATH})");
    println!();
    println!("ENVIRONMENT:");
    println!("  GEMINI_API_KEY   API key for generation (or set one with :key)");
    println!();
    println!("KEYS:");
    println!("  i                Insert mode (type a message or edit a field)");
    println!("  Enter            Send the accumulated turn");
    println!("  c / v            Correction detail / vocabulary glosses");
    println!("  :help            Full key reference");
}
