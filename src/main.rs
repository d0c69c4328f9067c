use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use crossterm::event::{
    poll as event_poll, read as event_read, Event as CrosstermEvent, KeyCode, KeyEvent,
    KeyEventKind,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use shell_panel::app::Session;
use shell_panel::config::PanelConfig;
use shell_panel::input::key_translator::{is_close_key, key_to_editor_key};
use shell_panel::model::TextBuffer;
use shell_panel::services::log_dirs;
use shell_panel::services::terminal_modes::{self, TerminalModes};
use shell_panel::services::tracing_setup;
use shell_panel::view::{render_panel, PanelStatus, PanelViewState};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// An interactive shell in a terminal panel
#[derive(Parser, Debug)]
#[command(name = "shell-panel")]
#[command(about = "Run a shell behind a line-editing panel", long_about = None)]
#[command(version)]
struct Args {
    /// Shell program to run (default: from config, else the platform shell)
    #[arg(long, value_name = "PROGRAM")]
    shell: Option<String>,

    /// Argument passed to the shell (repeatable)
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Working directory for the shell
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to log file (default: the per-user state directory)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,

    /// Print the config and log locations and exit
    #[arg(long)]
    show_paths: bool,
}

/// Config file (explicit, else the default location if present) with the
/// command line applied on top.
fn load_config(args: &Args) -> AnyhowResult<PanelConfig> {
    let mut config = match &args.config {
        Some(path) => PanelConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match PanelConfig::default_path().filter(|p| p.exists()) {
            Some(path) => PanelConfig::load_from_file(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => PanelConfig::default(),
        },
    };

    if let Some(shell) = &args.shell {
        config.shell = Some(shell.clone());
        config.args = args.args.clone();
    } else if !args.args.is_empty() {
        config.args = args.args.clone();
    }
    if let Some(cwd) = &args.cwd {
        config.working_dir = Some(cwd.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> AnyhowResult<()> {
    let args = Args::parse();

    if args.show_paths {
        log_dirs::print_all_paths();
        return Ok(());
    }

    let config = load_config(&args)?;

    if args.dump_config {
        let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
        println!("{}", json);
        return Ok(());
    }

    let log_file = args.log_file.clone().unwrap_or_else(log_dirs::main_log_path);
    if let Err(e) = tracing_setup::init_global(&log_file) {
        eprintln!("Warning: logging disabled ({}): {}", log_file.display(), e);
    }
    log_dirs::cleanup_stale_logs();
    tracing::info!("shell-panel starting");

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        terminal_modes::emergency_cleanup();
        original_hook(panic);
    }));

    let command = config.shell_command();
    let mut session = Session::start(&command, config.session_options(), TextBuffer::new());
    let status = PanelStatus {
        shell: command.to_string(),
        pid: session.pid(),
    };

    let mut modes = TerminalModes::enable().context("Failed to set up terminal")?;
    let mut terminal =
        Terminal::new(CrosstermBackend::new(stdout())).context("Failed to create terminal")?;

    let result = run_event_loop(&mut session, &mut terminal, &status);

    session.on_panel_close();
    modes.undo();
    tracing::info!("shell-panel exiting");
    result
}

fn run_event_loop(
    session: &mut Session<TextBuffer>,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    status: &PanelStatus,
) -> AnyhowResult<()> {
    const FRAME_DURATION: Duration = Duration::from_millis(16);
    const IDLE_POLL: Duration = Duration::from_millis(50);

    let mut view = PanelViewState::new();
    let mut last_render = Instant::now();
    let mut needs_render = true;
    let mut page_rows: usize = 1;

    loop {
        if session.pump() {
            needs_render = true;
        }

        if needs_render && last_render.elapsed() >= FRAME_DURATION {
            let state = session.state();
            terminal.draw(|frame| {
                let area = frame.area();
                let layout =
                    render_panel(frame, area, session.surface_mut(), state, status, &mut view);
                page_rows = (layout.text_area.height as usize).max(1);
            })?;
            last_render = Instant::now();
            needs_render = false;
        }

        let timeout = if needs_render {
            FRAME_DURATION.saturating_sub(last_render.elapsed())
        } else {
            IDLE_POLL
        };
        if !event_poll(timeout)? {
            continue;
        }

        match event_read()? {
            CrosstermEvent::Key(key_event) => {
                if key_event.kind == KeyEventKind::Release {
                    continue;
                }
                if is_close_key(key_event.code, key_event.modifiers) {
                    tracing::info!("Close requested");
                    return Ok(());
                }
                handle_key_event(session, &mut view, key_event, page_rows);
                needs_render = true;
            }
            CrosstermEvent::Paste(text) => {
                session.paste(&text);
                needs_render = true;
            }
            CrosstermEvent::Resize(_, _) => needs_render = true,
            _ => {}
        }
    }
}

fn handle_key_event(
    session: &mut Session<TextBuffer>,
    view: &mut PanelViewState,
    key_event: KeyEvent,
    page_rows: usize,
) {
    let lines = session.surface().line_count();
    match key_event.code {
        KeyCode::PageUp => view.scroll_by(-(page_rows as isize), lines),
        KeyCode::PageDown => view.scroll_by(page_rows as isize, lines),
        code => {
            if let Some(key) = key_to_editor_key(code, key_event.modifiers) {
                let outcome = session.handle_key(key);
                tracing::trace!("Key {:?} -> {:?}", key, outcome);
            }
        }
    }
}
