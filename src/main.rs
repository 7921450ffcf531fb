mod app;
mod config;
mod economy;
mod model;
mod scheduler;
mod storage;
mod ui;

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use app::{App, HostReadyHook};
use clap::Parser;
use config::{Cli, Config};
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use storage::FileStore;

use crate::ui::draw;

enum Event<I> {
    Input(I),
    Tick,
}

fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;
    if let Some(log_dir) = config.log_file.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("creating log dir {}", log_dir.display()))?;
    }
    init_tracing(&config)?;
    tracing::info!(data_dir = %config.data_dir.display(), "IDR Minier starting");

    loop {
        match launch(&config) {
            Ok(()) => break,
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "mounting failure");
                if !fallback_screen(&err)? {
                    return Err(err);
                }
                tracing::info!("rebooting after failure");
            }
        }
    }

    tracing::info!("IDR Minier exited");
    Ok(())
}

fn init_tracing(config: &Config) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("opening log file {}", config.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MINIER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();
    Ok(())
}

/// One process lifetime: load state, mount the terminal, run until quit.
fn launch(config: &Config) -> Result<()> {
    let store = FileStore::open(&config.data_dir)?;
    let ready_hook = HostReadyHook::new(config.ready_file.clone());
    let mut app = App::new(config, store, ready_hook, Instant::now());
    let mut terminal = match setup_terminal() {
        Ok(terminal) => terminal,
        Err(err) => {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            return Err(err);
        }
    };
    let res = run_app(&mut terminal, &mut app, config.frame_rate);
    restore_terminal(&mut terminal)?;
    res
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    frame_rate: Duration,
) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let running = Arc::new(AtomicBool::new(true));

    let input_tx = tx.clone();
    let input_running = Arc::clone(&running);
    thread::spawn(move || {
        while input_running.load(Ordering::Relaxed) {
            if !event::poll(Duration::from_millis(250)).unwrap_or(false) {
                continue;
            }
            match event::read() {
                Ok(CEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    if input_tx.send(Event::Input(key)).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => {}
            }
        }
    });

    let tick_running = Arc::clone(&running);
    thread::spawn(move || {
        while tick_running.load(Ordering::Relaxed) {
            if tx.send(Event::Tick).is_err() {
                break;
            }
            thread::sleep(frame_rate);
        }
    });

    let res = event_loop(terminal, app, &rx);
    running.store(false, Ordering::Relaxed);
    res
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    rx: &mpsc::Receiver<Event<event::KeyEvent>>,
) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;
        app.on_frame_rendered(Instant::now());

        match rx.recv()? {
            Event::Input(key) => {
                app.on_key(key, Instant::now());
            }
            Event::Tick => {
                app.on_tick(Instant::now());
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Static failure screen on the restored terminal. Returns `true` when the
/// user asks for a reboot.
fn fallback_screen(err: &anyhow::Error) -> Result<bool> {
    let mut stdout = io::stdout();
    writeln!(stdout)?;
    writeln!(stdout, "  CORE SYSTEM FAILURE")?;
    writeln!(stdout, "  The mining system could not be loaded: {err:#}")?;
    writeln!(stdout)?;
    write!(stdout, "  Press Enter to REBOOT, or type q and Enter to exit: ")?;
    stdout.flush()?;

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer)? == 0 {
        return Ok(false);
    }
    Ok(!answer.trim().eq_ignore_ascii_case("q"))
}
