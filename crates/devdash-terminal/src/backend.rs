/// Multiplexer abstraction: the only outbound boundary of the session manager
use async_trait::async_trait;
use std::path::PathBuf;

use super::error::Result;
use super::keys::NamedKey;

/// Everything needed to create one detached multiplexer session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub work_dir: PathBuf,
    /// Extra environment for the hosted program
    pub env: Vec<(String, String)>,
    /// Program and its arguments; never empty
    pub program: Vec<String>,
}

/// Command surface of an external terminal multiplexer.
/// Sessions are addressed only by name.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Check whether a session with exactly this name is alive.
    /// `Err` means the multiplexer could not be asked, not that the session is gone
    async fn has_session(&self, name: &str) -> Result<bool>;

    /// Create a new detached session
    async fn new_session(&self, spec: &LaunchSpec) -> Result<()>;

    /// Capture the visible pane plus `scrollback` lines of history,
    /// including escape codes
    async fn capture_pane(&self, name: &str, scrollback: usize) -> Result<String>;

    /// Current window geometry as (width, height)
    async fn window_size(&self, name: &str) -> Result<(u16, u16)>;

    /// Switch the window to manual sizing and resize it
    async fn resize_window(&self, name: &str, width: u16, height: u16) -> Result<()>;

    /// Deliver a window-change signal to the pane's process group
    async fn signal_resize(&self, name: &str) -> Result<()>;

    /// Type text verbatim into the pane
    async fn send_literal(&self, name: &str, text: &str) -> Result<()>;

    /// Send a named key through the multiplexer's key table
    async fn send_named(&self, name: &str, key: NamedKey) -> Result<()>;

    /// Destroy a session
    async fn kill_session(&self, name: &str) -> Result<()>;

    /// Names of all live sessions
    async fn list_sessions(&self) -> Result<Vec<String>>;

    /// Backend name for debugging
    fn backend_name(&self) -> &str;
}
