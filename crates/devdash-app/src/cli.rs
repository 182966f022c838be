use clap::{Parser, Subcommand};
use std::path::PathBuf;

use devdash_terminal::Subsystem;

/// CLI arguments for devdash
#[derive(Parser)]
#[command(name = "devdash")]
#[command(about = "Developer dashboard - interactive terminal sessions hosted in tmux")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (default: ~/.devdash/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// tmux binary to use, overriding the config file
    #[arg(long, value_name = "PATH", env = "DEVDASH_TMUX", global = true)]
    pub tmux: Option<String>,

    /// Enable debug logging in ~/.devdash/logs/devdash.log
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Destroy sessions left behind by a previous run
    Reap,
    /// List live dashboard sessions
    List,
    /// Launch (or re-adopt) a session
    Launch {
        /// Subsystem: assistant, secondary-assistant, database, shell
        subsystem: Subsystem,
        /// Session ID (defaults to a fresh UUID)
        #[arg(long)]
        id: Option<String>,
        /// Working directory (defaults to the current directory)
        #[arg(short = 'd', long)]
        dir: Option<PathBuf>,
        /// Pane columns
        #[arg(long, default_value = "120")]
        cols: u16,
        /// Pane rows
        #[arg(long, default_value = "40")]
        rows: u16,
        /// Resume token for subsystems that support resuming
        #[arg(long, value_name = "TOKEN")]
        resume: Option<String>,
    },
    /// Print the current view of a live session
    View {
        subsystem: Subsystem,
        /// Session ID
        id: String,
        /// Pane columns
        #[arg(long, default_value = "120")]
        cols: u16,
        /// Pane rows
        #[arg(long, default_value = "40")]
        rows: u16,
        /// Lines to scroll up from the bottom
        #[arg(long, default_value = "0")]
        scroll: usize,
    },
    /// Type raw text into a session (\r, \n, \t, \e and \\ escapes allowed)
    Send {
        subsystem: Subsystem,
        /// Session ID
        id: String,
        /// Text to send
        text: String,
    },
    /// Send key events to a session (e.g. enter, ctrl+c, esc, pgup)
    Keys {
        subsystem: Subsystem,
        /// Session ID
        id: String,
        /// Keys to send, in order
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Follow a session's output until it exits or Ctrl-C
    Watch {
        subsystem: Subsystem,
        /// Session ID
        id: String,
        /// Pane columns
        #[arg(long, default_value = "120")]
        cols: u16,
        /// Pane rows
        #[arg(long, default_value = "40")]
        rows: u16,
    },
    /// Stop a session and destroy its tmux session
    Kill {
        subsystem: Subsystem,
        /// Session ID
        id: String,
    },
}

/// Expand the backslash escapes accepted by `send`
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('e') => out.push('\x1b'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
