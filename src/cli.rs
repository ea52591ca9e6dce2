//! CLI argument parsing via clap.

use clap::{Parser, Subcommand};

/// Keeps Jules coding sessions moving: resumes, approves plans, and nudges idle agents.
#[derive(Debug, Parser)]
#[command(name = "session-keeper", version)]
pub struct Args {
    /// Path to config file (default: ./keeper.toml or ~/.config/session-keeper/keeper.toml).
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Run the auto-pilot until Ctrl-C.
    Run,
    /// Run a single supervision pass and print what it did.
    Once,
    /// Serve the supervisor gateway over HTTP.
    Serve {
        /// Listen address (overrides `server.listen`).
        #[arg(long = "listen")]
        listen: Option<String>,
    },
    /// List sessions with their state.
    Sessions,
    /// Inspect or edit the auto-pilot settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage nudge messages.
    Messages {
        #[command(subcommand)]
        action: MessagesAction,
    },
    /// Inspect or clear supervisor memory.
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
    /// Hide sessions from the auto-pilot.
    Archive {
        #[command(subcommand)]
        action: ArchiveAction,
    },
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the stored settings as JSON (API key masked).
    Show,
    /// Set one setting, e.g. `checkIntervalSeconds 60`.
    Set { key: String, value: String },
    /// Turn the auto-pilot on.
    Enable,
    /// Turn the auto-pilot off.
    Disable,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum MessagesAction {
    /// Print the global list, or one session's custom list.
    List {
        #[arg(long = "session")]
        session: Option<String>,
    },
    /// Append a message.
    Add {
        message: String,
        #[arg(long = "session")]
        session: Option<String>,
    },
    /// Empty a session list so it falls back to the global list. The global
    /// list must keep at least one message.
    Clear {
        #[arg(long = "session")]
        session: Option<String>,
    },
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum MemoryAction {
    /// Print stored memory for every session, or one.
    Show { session: Option<String> },
    /// Forget memory for one session, or all of it.
    Clear { session: Option<String> },
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum ArchiveAction {
    Add { session_id: String },
    Remove { session_id: String },
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let args = Args::parse_from(["session-keeper", "once", "--verbose", "-c", "k.toml"]);
        assert_eq!(args.command, Command::Once);
        assert!(args.verbose);
        assert_eq!(args.config.as_deref(), Some("k.toml"));
    }

    #[test]
    fn config_set_takes_key_and_value() {
        let args = Args::parse_from(["session-keeper", "config", "set", "checkIntervalSeconds", "60"]);
        assert_eq!(
            args.command,
            Command::Config {
                action: ConfigAction::Set {
                    key: "checkIntervalSeconds".into(),
                    value: "60".into()
                }
            }
        );
    }

    #[test]
    fn messages_add_accepts_session_scope() {
        let args = Args::parse_from([
            "session-keeper",
            "messages",
            "add",
            "Keep going",
            "--session",
            "s1",
        ]);
        assert_eq!(
            args.command,
            Command::Messages {
                action: MessagesAction::Add {
                    message: "Keep going".into(),
                    session: Some("s1".into())
                }
            }
        );
    }

    #[test]
    fn serve_listen_is_optional() {
        let args = Args::parse_from(["session-keeper", "serve"]);
        assert_eq!(args.command, Command::Serve { listen: None });
        let args = Args::parse_from(["session-keeper", "serve", "--listen", "0.0.0.0:8080"]);
        assert_eq!(
            args.command,
            Command::Serve {
                listen: Some("0.0.0.0:8080".into())
            }
        );
    }

    #[test]
    fn memory_clear_without_session_means_all() {
        let args = Args::parse_from(["session-keeper", "memory", "clear"]);
        assert_eq!(
            args.command,
            Command::Memory {
                action: MemoryAction::Clear { session: None }
            }
        );
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Args::try_parse_from(["session-keeper"]).is_err());
    }
}
