use anyhow::{Context, Result, bail};
use arboard::Clipboard;
use clap::{Parser, Subcommand};
use cliplog::backup;
use cliplog::display::format_entry;
use cliplog::{
    AgeCriterion, CleanupOptions, ClipboardManager, Clock, Command, Config, Notification,
    SqliteStore, SystemClock, TimeUnit, Timestamp,
};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;

#[derive(Parser)]
#[command(name = "cliplog")]
#[command(version)]
#[command(about = "clipboard history with profiles, macros and cleanup")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record clipboard changes until interrupted
    Watch,
    /// Print history of the active profile, newest first
    Print {
        /// Only entries containing this text (case-insensitive)
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Record text as if it had been copied (reads stdin if no args)
    Add {
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Clear history of the active profile
    Clear,
    /// Remove old, duplicate or oversized entries
    Cleanup {
        /// Remove entries older than this many units
        #[arg(long, conflicts_with = "before")]
        older_than: Option<u32>,
        /// minutes, hours, days, weeks, months or years
        #[arg(long, default_value = "days")]
        unit: String,
        /// Remove entries older than this date ("HH:MM DD-MM-YYYY")
        #[arg(long)]
        before: Option<String>,
        /// Keep only the newest copy of each value
        #[arg(long)]
        duplicates: bool,
        /// Remove entries longer than this many characters
        #[arg(long, value_name = "CHARS", num_args = 0..=1, default_missing_value = "0")]
        bigger_than: Option<usize>,
        /// Write the history as it was before cleanup to this file
        #[arg(long)]
        backup: Option<PathBuf>,
    },
    /// Write history of the active profile to a backup file
    Export { path: PathBuf },
    /// Merge a backup file into the active profile
    Import {
        path: PathBuf,
        /// Replace the current history instead of merging
        #[arg(long = "override")]
        override_all: bool,
    },
    /// Manage profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Manage macro slots of the active profile
    Macro {
        #[command(subcommand)]
        action: MacroAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    List,
    Create { name: String },
    Switch { name: String },
    Remove { name: String },
}

#[derive(Subcommand)]
enum MacroAction {
    /// Pin the n-th history entry (1 = newest) to a slot
    Set {
        slot: u8,
        #[arg(default_value_t = 1)]
        entry: usize,
    },
    /// Print the value pinned to a slot
    Get { slot: u8 },
    /// Print every pinned slot
    List,
    Clear,
    Enable,
    Disable,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;
    let store = SqliteStore::open(&config.database_path())?;
    let mut manager = ClipboardManager::new(config, Box::new(store), Box::new(SystemClock))?;

    match cli.command {
        Commands::Watch => {
            #[cfg(target_os = "linux")]
            {
                if std::env::var("DISPLAY").is_err() && std::env::var("WAYLAND_DISPLAY").is_err() {
                    bail!("No display server available (neither X11 nor Wayland)");
                }
            }
            watch(&mut manager).await?;
        }
        Commands::Print { search } => print_history(&manager, search.as_deref()),
        Commands::Add { text } => {
            let text = if text.is_empty() {
                use std::io::{self, Read};
                let mut buffer = String::new();
                io::stdin().read_to_string(&mut buffer)?;
                buffer
            } else {
                text.join(" ")
            };
            manager.handle(Command::ClipboardChanged(text))?;
            manager.flush();
        }
        Commands::Clear => {
            manager.handle(Command::ClearHistory)?;
            println!("History of `{}` cleared", manager.profiles().active_name());
        }
        Commands::Cleanup {
            older_than,
            unit,
            before,
            duplicates,
            bigger_than,
            backup,
        } => {
            let age = match (older_than, before) {
                (Some(amount), None) => Some(AgeCriterion::Ago {
                    amount,
                    unit: unit.parse::<TimeUnit>().map_err(anyhow::Error::msg)?,
                }),
                (None, Some(date)) => match Timestamp::parse(&date) {
                    Some(at) => Some(AgeCriterion::Before(at)),
                    None => bail!("Invalid date `{date}`, expected HH:MM DD-MM-YYYY"),
                },
                _ => None,
            };
            let options = CleanupOptions {
                remove_old: age.is_some(),
                age,
                remove_duplicates: duplicates,
                remove_big: bigger_than.is_some(),
                // 0 asks for the configured threshold
                size_threshold: bigger_than.filter(|&chars| chars > 0),
                backup: backup.is_some(),
            };
            if !options.any_requested() {
                bail!("Nothing to clean; pass --older-than, --before, --duplicates or --bigger-than");
            }

            for notification in manager.handle(Command::Cleanup(options))? {
                match notification {
                    Notification::BackupCreated(document) => {
                        if let Some(path) = &backup {
                            backup::write_document(path, &document)?;
                            println!("Backup written to {}", path.display());
                        }
                    }
                    Notification::CleanupFinished(report) => {
                        for warning in &report.warnings {
                            eprintln!("Warning: {warning}");
                        }
                        println!("Cleanup: {}", report.summary());
                    }
                    _ => {}
                }
            }
        }
        Commands::Export { path } => {
            let entries = manager.entries();
            backup::write_file(&path, &entries)?;
            println!("Exported {} entries to {}", entries.len(), path.display());
        }
        Commands::Import { path, override_all } => {
            let document = backup::read_file(&path)?;
            let notifications = manager.handle(Command::ImportBackup {
                document,
                override_all,
            })?;
            if let Some(Notification::BackupImported { imported, dropped }) = notifications.last() {
                println!("Imported {imported} entries ({dropped} malformed records skipped)");
            }
        }
        Commands::Profile { action } => profile_command(&mut manager, action)?,
        Commands::Macro { action } => macro_command(&mut manager, action)?,
    }

    Ok(())
}

async fn watch(manager: &mut ClipboardManager) -> Result<()> {
    let mut clipboard = Clipboard::new().context("Failed to access clipboard")?;
    let mut interval =
        tokio::time::interval(Duration::from_millis(manager.config().poll_interval_ms));
    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut last_seen: Option<String> = None;

    info!(
        "watching clipboard for profile `{}`",
        manager.profiles().active_name()
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = poll_clipboard(manager, &mut clipboard, &mut last_seen) {
                    warn!("poll error: {e:#}");
                }
            }
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
    }

    // other invocations may have cleared or switched meanwhile
    manager.reload()?;
    manager.flush();
    Ok(())
}

fn poll_clipboard(
    manager: &mut ClipboardManager,
    clipboard: &mut Clipboard,
    last_seen: &mut Option<String>,
) -> Result<()> {
    let text = match clipboard.get_text() {
        Ok(text) => text,
        Err(arboard::Error::ContentNotAvailable) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if last_seen.as_deref() == Some(text.as_str()) {
        return Ok(());
    }
    *last_seen = Some(text.clone());
    manager.reload()?;
    manager.handle(Command::ClipboardChanged(text))?;
    Ok(())
}

fn print_history(manager: &ClipboardManager, search: Option<&str>) {
    let config = manager.config();
    let now = SystemClock.now();
    let entries = manager.search(search.unwrap_or(""));
    for entry in entries.into_iter().take(config.max_print_entries) {
        println!("{}", format_entry(entry, now, config.max_display_length));
    }
}

fn profile_command(manager: &mut ClipboardManager, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::List => {
            let profiles = manager.profiles();
            for name in profiles.profiles() {
                let marker = if name == profiles.active_name() { "*" } else { " " };
                println!("{marker} {name}");
            }
        }
        ProfileAction::Create { name } => {
            manager.handle(Command::CreateProfile(name.clone()))?;
            println!("Created and switched to `{name}`");
        }
        ProfileAction::Switch { name } => {
            manager.handle(Command::SwitchProfile(name.clone()))?;
            println!("Switched to `{name}`");
        }
        ProfileAction::Remove { name } => {
            manager.handle(Command::RemoveProfile(name.clone()))?;
            println!("Removed `{name}`");
        }
    }
    Ok(())
}

fn macro_command(manager: &mut ClipboardManager, action: MacroAction) -> Result<()> {
    match action {
        MacroAction::Set { slot, entry } => {
            if entry == 0 {
                bail!("Entries are numbered from 1");
            }
            manager.handle(Command::OpenView)?;
            manager.handle(Command::NavigateDown(entry - 1))?;
            if manager.view().active_index() != Some(entry - 1) {
                bail!("History has no entry {entry}");
            }
            manager.handle(Command::AssignMacro(slot))?;
            manager.handle(Command::CloseView)?;
            println!("Slot {slot} set");
        }
        MacroAction::Get { slot } => {
            let notifications = manager.handle(Command::PlayMacro(slot))?;
            match notifications.first() {
                Some(Notification::Paste(value)) => println!("{value}"),
                _ if !manager.profiles().macros().is_enabled() => bail!("Macros are disabled"),
                _ => bail!("Slot {slot} is empty"),
            }
        }
        MacroAction::List => {
            let macros = manager.profiles().macros();
            let max = manager.config().max_display_length;
            for (slot, value) in macros.slots() {
                println!("{slot}: {}", cliplog::display::truncate_to_fit(value, max));
            }
            if !macros.is_enabled() {
                println!("(disabled)");
            }
        }
        MacroAction::Clear => {
            manager.handle(Command::ClearMacros)?;
        }
        MacroAction::Enable => {
            manager.handle(Command::SetMacrosEnabled(true))?;
        }
        MacroAction::Disable => {
            manager.handle(Command::SetMacrosEnabled(false))?;
        }
    }
    Ok(())
}
