// Terminal session management
//
// Hosts interactive programs (AI assistants, database clients, shells) inside
// dashboard panes. Each session is a detached tmux session that the dashboard
// creates, captures, resizes, types into and tears down; sessions survive a
// dashboard detach and are re-adopted by name on the next start.

mod backend;
mod config;
mod error;
mod journal;
pub mod keys;
mod reaper;
mod registry;
pub mod resume;
mod session;
mod tmux_backend;
pub mod viewport;

// Re-export public API
pub use backend::{LaunchSpec, Multiplexer};
pub use config::{
    LaunchConfig, ResumeConfig, Subsystem, SubsystemConfig, SubsystemTable, TimingConfig,
};
pub use error::{Result, TerminalError};
pub use journal::SessionJournal;
pub use keys::{Delivery, Key, NamedKey};
pub use reaper::reap_orphans;
pub use registry::SessionRegistry;
pub use session::{multiplexer_name, KeyOutcome, SessionCallback, SessionState, TerminalSession};
pub use tmux_backend::TmuxMultiplexer;
pub use viewport::ScrollbackViewport;

// Constants
/// Global namespace of every multiplexer session this application creates
pub const APP_PREFIX: &str = "devdash-";
/// Placeholder geometry used until the UI reports a real pane size
pub const DEFAULT_WIDTH: u16 = 80;
pub const DEFAULT_HEIGHT: u16 = 24;
pub const MIN_WIDTH: u16 = 10;
pub const MIN_HEIGHT: u16 = 5;
