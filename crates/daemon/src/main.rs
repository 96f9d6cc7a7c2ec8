mod config;
mod events;
mod host;
mod monitor;
mod tui;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use config::DaemonConfig;
use events::MonitorEvent;
use monitor::Monitor;
use tui::TuiState;

#[derive(Parser)]
#[command(name = "oscvars-daemon")]
#[command(about = "Keeps OSC variable groups in sync over UDP")]
struct Args {
    #[arg(short, long, default_value = "oscvars.json")]
    config: PathBuf,

    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(long, default_value_t = 100, help = "Delay before rebinding a receiver port, in ms")]
    settle_ms: u64,

    #[arg(long)]
    headless: bool,

    #[arg(long, help = "Write the group configuration back when quitting")]
    save_on_exit: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = DaemonConfig {
        config_path: args.config,
        tick_rate: args.tick_rate,
        settle_delay: Duration::from_millis(args.settle_ms),
        save_on_exit: args.save_on_exit,
    };

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let mut monitor = Monitor::new(config)?;

    if args.headless {
        log::info!("Monitoring {} group(s)", monitor.stats().group_count);
        monitor.run();
        log::info!("Daemon shutting down");
    } else {
        run_with_tui(&mut monitor)?;
    }

    Ok(())
}

fn log_event(tui_state: &mut TuiState, event: MonitorEvent) {
    let message = event.to_string();
    match event.level() {
        log::Level::Error => tui_state.log_error(message),
        log::Level::Warn => tui_state.log_warn(message),
        _ => tui_state.log_info(message),
    }
}

fn run_with_tui(monitor: &mut Monitor) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = monitor.running();
    let mut tui_state = TuiState::new();

    while running.load(Ordering::SeqCst) {
        monitor.tick_once();

        for event in monitor.drain_events() {
            log_event(&mut tui_state, event);
        }

        if event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let groups = monitor.group_infos();
                    let selected = tui_state.selected(&groups).map(|g| g.name.clone());

                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            running.store(false, Ordering::SeqCst);
                        }
                        KeyCode::Up => tui_state.select_prev(groups.len()),
                        KeyCode::Down => tui_state.select_next(groups.len()),
                        KeyCode::Char('s') => monitor.save(),
                        KeyCode::Char('l') => monitor.try_reload(),
                        KeyCode::Char('r') => {
                            if let Some(name) = selected {
                                monitor.reset_group(&name);
                            }
                        }
                        KeyCode::Char('e') => {
                            if let Some(name) = selected {
                                monitor.resend_group(&name);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        let stats = monitor.stats();
        let groups = monitor.group_infos();
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &stats, &groups);
        })?;
    }

    monitor.shutdown();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
