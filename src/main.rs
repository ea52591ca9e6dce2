//! CLI entry point for session-keeper.

mod cli;

use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{ArchiveAction, Command, ConfigAction, MemoryAction, MessagesAction};
use session_keeper::archive::ArchiveStore;
use session_keeper::config::{load_config, resolve_state_dir, Config, SupervisionConfig};
use session_keeper::jules::{JulesClient, SessionSource};
use session_keeper::keeper::{describe_session, LogKind, PassOutcome, Scheduler, SessionKeeper};
use session_keeper::store::{ConfigStore, JsonFileStore, MemoryStore};
use session_keeper::supervisor::{route, HttpGateway};

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    let config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(msg) = dispatch(args.command, &config).await {
        eprintln!("error: {msg}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn dispatch(command: Command, config: &Config) -> Result<(), String> {
    let state_dir = resolve_state_dir(config);
    match command {
        Command::Run => run_scheduler(config, &state_dir).await,
        Command::Once => run_once(config, &state_dir).await,
        Command::Serve { listen } => serve(config, listen).await,
        Command::Sessions => list_sessions(config, &state_dir).await,
        Command::Config { action } => edit_config(action, &open_store(&state_dir)?),
        Command::Messages { action } => edit_messages(action, &open_store(&state_dir)?),
        Command::Memory { action } => edit_memory(action, &open_store(&state_dir)?),
        Command::Archive { action } => edit_archive(action, &state_dir),
    }
}

fn api_timeout(config: &Config) -> Duration {
    Duration::from_secs(config.network.api_timeout_secs)
}

fn open_store(state_dir: &Path) -> Result<JsonFileStore, String> {
    JsonFileStore::open(state_dir)
        .map_err(|e| format!("failed to open state dir {}: {e}", state_dir.display()))
}

fn open_archive(state_dir: &Path) -> Result<ArchiveStore, String> {
    ArchiveStore::open(state_dir)
        .map_err(|e| format!("failed to open archive in {}: {e}", state_dir.display()))
}

fn jules_client(config: &Config) -> Result<JulesClient, String> {
    if config.jules.api_key.is_empty() {
        return Err(
            "No Jules API key configured. Set jules.api_key in keeper.toml or the JULES_API_KEY env var."
                .to_string(),
        );
    }
    Ok(JulesClient::new(
        &config.jules.base_url,
        &config.jules.api_key,
        api_timeout(config),
    ))
}

fn build_keeper(config: &Config, state_dir: &Path) -> Result<SessionKeeper, String> {
    let source = Arc::new(jules_client(config)?);
    let store = Arc::new(open_store(state_dir)?);
    let archive = Arc::new(open_archive(state_dir)?);
    let gateway = Arc::new(HttpGateway::new(api_timeout(config)));
    Ok(SessionKeeper::new(source, gateway, store.clone(), store).with_archive(archive))
}

// ---------------------------------------------------------------------------
// Auto-pilot
// ---------------------------------------------------------------------------

async fn run_scheduler(config: &Config, state_dir: &Path) -> Result<(), String> {
    let keeper = Arc::new(build_keeper(config, state_dir)?);
    let settings = open_store(state_dir)?
        .load_config()
        .map_err(|e| e.to_string())?;
    if !settings.is_enabled {
        info!("auto-pilot is disabled; passes are skipped until `session-keeper config enable`");
    }

    let scheduler = Scheduler::start(keeper);
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for Ctrl-C: {e}"))?;
    info!("interrupt received; stopping auto-pilot");
    scheduler.cancel();
    scheduler.join().await;
    Ok(())
}

async fn run_once(config: &Config, state_dir: &Path) -> Result<(), String> {
    let keeper = build_keeper(config, state_dir)?;
    let outcome = keeper.run_pass().await;
    for entry in keeper.log_entries().iter().rev() {
        println!(
            "{} {:<6} {}",
            entry.time.format("%H:%M:%S"),
            kind_label(entry.kind),
            entry.message
        );
    }
    match outcome {
        PassOutcome::Completed(report) => {
            let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
            println!("{json}");
            Ok(())
        }
        PassOutcome::Disabled => {
            println!("auto-pilot is disabled; run `session-keeper config enable` first");
            Ok(())
        }
        PassOutcome::Skipped => Ok(()),
        PassOutcome::Failed(reason) => Err(reason),
    }
}

fn kind_label(kind: LogKind) -> &'static str {
    match kind {
        LogKind::Info => "info",
        LogKind::Action => "action",
        LogKind::Skip => "skip",
        LogKind::Error => "error",
    }
}

async fn serve(config: &Config, listen: Option<String>) -> Result<(), String> {
    let listen = listen.unwrap_or_else(|| config.server.listen.clone());
    let gateway = Arc::new(HttpGateway::new(api_timeout(config)));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; shutting down gateway");
        }
        shutdown_tx.send_replace(true);
    });
    route::serve(&listen, gateway, shutdown_rx).await
}

async fn list_sessions(config: &Config, state_dir: &Path) -> Result<(), String> {
    let client = jules_client(config)?;
    let archived = open_archive(state_dir)?
        .load()
        .map_err(|e| e.to_string())?;
    let sessions = client.list_sessions().await.map_err(|e| e.to_string())?;
    if sessions.is_empty() {
        println!("no sessions");
    }
    for session in &sessions {
        let marker = if archived.contains(&session.id) {
            " (archived)"
        } else {
            ""
        };
        println!("{}{marker}", describe_session(session));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// State editing
// ---------------------------------------------------------------------------

/// Validate and persist an edited config.
fn save_settings(store: &dyn ConfigStore, settings: &SupervisionConfig) -> Result<(), String> {
    settings.validate().map_err(|e| e.to_string())?;
    store.save_config(settings).map_err(|e| e.to_string())
}

fn load_settings(store: &dyn ConfigStore) -> Result<SupervisionConfig, String> {
    store.load_config().map_err(|e| e.to_string())
}

fn edit_config(action: ConfigAction, store: &dyn ConfigStore) -> Result<(), String> {
    let mut settings = load_settings(store)?;
    match action {
        ConfigAction::Show => {
            if !settings.supervisor_api_key.is_empty() {
                settings.supervisor_api_key = "********".to_string();
            }
            let json = serde_json::to_string_pretty(&settings).map_err(|e| e.to_string())?;
            println!("{json}");
            return Ok(());
        }
        ConfigAction::Set { key, value } => {
            settings
                .apply_setting(&key, &value)
                .map_err(|e| e.to_string())?;
        }
        ConfigAction::Enable => settings.is_enabled = true,
        ConfigAction::Disable => settings.is_enabled = false,
    }
    save_settings(store, &settings)?;
    println!("saved");
    Ok(())
}

fn edit_messages(action: MessagesAction, store: &dyn ConfigStore) -> Result<(), String> {
    let mut settings = load_settings(store)?;
    match action {
        MessagesAction::List { session } => {
            let messages = match session.as_deref() {
                Some(id) => settings.custom_messages.get(id).cloned().unwrap_or_default(),
                None => settings.messages.clone(),
            };
            if messages.is_empty() {
                println!("(no messages)");
            }
            for message in messages {
                println!("{message}");
            }
            return Ok(());
        }
        MessagesAction::Add { message, session } => {
            let mut messages = match session.as_deref() {
                Some(id) => settings.custom_messages.get(id).cloned().unwrap_or_default(),
                None => settings.messages.clone(),
            };
            messages.push(message);
            settings.set_messages(session.as_deref(), messages);
        }
        MessagesAction::Clear { session } => match session.as_deref() {
            Some(id) => {
                settings.custom_messages.remove(id);
            }
            None => settings.set_messages(None, Vec::new()),
        },
    }
    save_settings(store, &settings)?;
    println!("saved");
    Ok(())
}

fn edit_memory(action: MemoryAction, store: &dyn MemoryStore) -> Result<(), String> {
    let mut memory = store.load_memory().map_err(|e| e.to_string())?;
    match action {
        MemoryAction::Show { session } => {
            let json = match session.as_deref() {
                Some(id) => match memory.get(id) {
                    Some(entry) => serde_json::to_string_pretty(entry),
                    None => {
                        println!("no memory for {id}");
                        return Ok(());
                    }
                },
                None => serde_json::to_string_pretty(&memory),
            }
            .map_err(|e| e.to_string())?;
            println!("{json}");
            Ok(())
        }
        MemoryAction::Clear { session } => {
            match session.as_deref() {
                Some(id) => {
                    if memory.remove(id).is_none() {
                        println!("no memory for {id}");
                        return Ok(());
                    }
                }
                None => memory.clear(),
            }
            store.save_memory(&memory).map_err(|e| e.to_string())?;
            println!("cleared");
            Ok(())
        }
    }
}

fn edit_archive(action: ArchiveAction, state_dir: &Path) -> Result<(), String> {
    let archive = open_archive(state_dir)?;
    match action {
        ArchiveAction::Add { session_id } => {
            let added = archive.archive(&session_id).map_err(|e| e.to_string())?;
            println!(
                "{}",
                if added { "archived" } else { "already archived" }
            );
        }
        ArchiveAction::Remove { session_id } => {
            let removed = archive.unarchive(&session_id).map_err(|e| e.to_string())?;
            println!("{}", if removed { "unarchived" } else { "not archived" });
        }
        ArchiveAction::List => {
            for id in archive.load().map_err(|e| e.to_string())? {
                println!("{id}");
            }
        }
    }
    Ok(())
}
