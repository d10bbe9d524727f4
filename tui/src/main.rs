//! Webserve TUI Entry Point
//!
//! Launches the terminal chat client.
//!
//! Usage:
//!   webserve-tui [OPTIONS]
//!
//! Options:
//!   --url <URL>              Streaming endpoint (ws:// or wss://)
//!   --model <MODEL>          Model id shown in the header and exports
//!   --temperature <T>        Temperature recorded in exports
//!   --stop-grace-ms <MS>     How long Esc waits for the server (0 = forever)
//!   --dark                   Start in dark mode
//!   --export-dir <DIR>       Where Ctrl+E writes exports
//!   -c, --config <FILE>      Configuration file

use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webserve_core::config::{default_config_path, load_config_from_path, ConfigOverrides};
use webserve_tui::App;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "webserve-tui")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Streaming endpoint URL
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Model id (shown in the header and written to exports)
    #[arg(short = 'm', long, value_name = "MODEL")]
    model: Option<String>,

    /// Sampling temperature recorded in exports
    #[arg(short = 't', long, value_name = "T")]
    temperature: Option<f64>,

    /// Milliseconds a stop request waits for the next update (0 = no limit)
    #[arg(long, value_name = "MS")]
    stop_grace_ms: Option<u64>,

    /// Start in dark mode
    #[arg(long)]
    dark: bool,

    /// Directory for exported conversations
    #[arg(long, value_name = "DIR")]
    export_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "WEBSERVE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log file (the terminal is busy with the UI)
    #[arg(long, env = "WEBSERVE_LOG_FILE", value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "WEBSERVE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            stop_grace_ms: self.stop_grace_ms,
            dark_mode: self.dark.then_some(true),
            export_dir: self.export_dir.clone(),
        }
    }
}

/// Default log file: `$XDG_STATE_HOME/webserve/tui.log`, else the temp dir
fn default_log_path() -> PathBuf {
    dirs::state_dir()
        .map(|dir| dir.join("webserve").join("tui.log"))
        .unwrap_or_else(|| std::env::temp_dir().join("webserve-tui.log"))
}

/// Initialize logging into `path`
fn init_logging(path: &Path, level: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {parent:?}"))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {path:?}"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("webserve_tui={level},webserve_core={level}"))
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .with(filter)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_path = args.log_file.clone().unwrap_or_else(default_log_path);
    init_logging(&log_path, &args.log_level)?;

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path)?;
    args.overrides().apply(&mut config)?;

    tracing::info!(
        source = %config.source(),
        url = %config.transport.url,
        "Configuration loaded"
    );

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("Error: webserve-tui requires a terminal (TTY)");
        eprintln!();
        eprintln!("This usually means:");
        eprintln!("  • Running in a non-interactive environment (CI, container)");
        eprintln!("  • SSH without -t flag");
        eprintln!("  • Piped stdin/stdout");
        std::process::exit(1);
    }

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = App::connect(&config);
    let result = app.run(&mut terminal).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}
