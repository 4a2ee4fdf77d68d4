//! lab-announce CLI entry point.
//!
//! Runs the announcement bridge once against a lab server and prints the
//! resulting toasts, or inspects the stored settings and dismissal state.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use lab_announcements::config_section::single;
use lab_announcements::{
    announcements_state_path_in, settings_path_in, AnnouncementBridge, ConfigSection, FetchNews,
    HttpAnnouncementSource, JsonConfigSection, LogLinkOpener, SettingsFile, StatePatch,
};
use lab_notifications::{
    NotificationId, NotificationStore, NotificationUi, Toast, ToastConfig, ToastRenderer,
};
use log::info;

#[derive(Parser, Debug)]
#[command(name = "lab-announce")]
#[command(about = "Fetch JupyterLab news and update announcements")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Directory holding settings.json and announcements.json
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch announcements once and print them
    Fetch {
        /// Base URL of the lab server
        #[arg(long, default_value = "http://localhost:8888")]
        base_url: String,
    },

    /// Show or change settings
    Settings {
        /// Fetch official news: true, false or none
        #[arg(long)]
        fetch_news: Option<FetchNews>,

        /// Check for new versions
        #[arg(long)]
        check_for_updates: Option<bool>,

        /// Silence toasts
        #[arg(long)]
        do_not_disturb: Option<bool>,
    },

    /// Show stored announcement state
    State {
        /// Clear the seen/dismissed flags of one announcement
        #[arg(long)]
        reset: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Prints toasts to stdout.
struct TerminalRenderer;

impl ToastRenderer for TerminalRenderer {
    fn show(&self, toast: &Toast) {
        println!("{}", render(toast));
    }

    fn replace(&self, toast: &Toast) {
        println!("{} (updated)", render(toast));
    }

    fn close(&self, _id: &NotificationId) {}
}

fn render(toast: &Toast) -> String {
    let mut out = format!("[{}] {}", toast.kind, toast.lines.join(" / "));
    for button in &toast.buttons {
        out.push_str(&format!("  [{}]", button.label));
    }
    out
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let config_dir = cli.config_dir.unwrap_or_else(lab_announcements::config_dir);

    match cli.command {
        Commands::Fetch { base_url } => fetch(config_dir, base_url).await,
        Commands::Settings {
            fetch_news,
            check_for_updates,
            do_not_disturb,
        } => settings(config_dir, fetch_news, check_for_updates, do_not_disturb),
        Commands::State { reset, json } => state(config_dir, reset, json).await,
    }
}

async fn fetch(config_dir: PathBuf, base_url: String) -> anyhow::Result<()> {
    info!("Fetching announcements from {}", base_url);

    let settings = Arc::new(SettingsFile::load(settings_path_in(&config_dir)));
    let state_path = announcements_state_path_in(&config_dir);
    let config = Arc::new(JsonConfigSection::open(state_path).await);
    let source = Arc::new(HttpAnnouncementSource::new(base_url));

    let store = NotificationStore::new();
    let ui = NotificationUi::new(store.clone(), Arc::new(TerminalRenderer), ToastConfig::default());
    ui.set_do_not_disturb(settings.get().do_not_disturb_mode);

    let bridge = AnnouncementBridge::new(&store, config, source, settings.clone(), Arc::new(LogLinkOpener))?;
    bridge.start().await;
    bridge.flush().await;

    if settings.get().fetch_news == FetchNews::None {
        println!();
        println!("Answer with: lab-announce settings --fetch-news true|false");
    }

    println!();
    println!("{}", ui.center().header());
    for entry in ui.center().entries() {
        println!(
            "  {} [{}] {}",
            entry.created_at.format("%H:%M:%S"),
            entry.kind,
            entry.lines.join(" / ")
        );
    }
    Ok(())
}

fn settings(
    config_dir: PathBuf,
    fetch_news: Option<FetchNews>,
    check_for_updates: Option<bool>,
    do_not_disturb: Option<bool>,
) -> anyhow::Result<()> {
    let file = SettingsFile::load(settings_path_in(&config_dir));
    if let Some(value) = fetch_news {
        file.set_fetch_news(value)?;
    }
    if let Some(value) = check_for_updates {
        file.set_check_for_updates(value)?;
    }
    if let Some(value) = do_not_disturb {
        file.set_do_not_disturb_mode(value)?;
    }
    println!("{}", serde_json::to_string_pretty(&file.get())?);
    Ok(())
}

async fn state(config_dir: PathBuf, reset: Option<String>, json: bool) -> anyhow::Result<()> {
    let section = JsonConfigSection::open(announcements_state_path_in(&config_dir)).await;
    if let Some(id) = reset {
        section.update(single(id.clone(), StatePatch::reset())).await?;
        info!("Reset announcement {}", id);
    }

    let data = section.data().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }
    if data.is_empty() {
        println!("No announcement state stored in {:?}", section.path());
        return Ok(());
    }
    for (id, state) in &data {
        println!(
            "{:<40} seen={:<5} dismissed={}",
            id, state.seen, state.dismissed
        );
    }
    Ok(())
}
