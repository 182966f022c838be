/// Tmux-based multiplexer backend
use super::backend::{LaunchSpec, Multiplexer};
use super::error::{Result, TerminalError};
use super::keys::NamedKey;
use async_trait::async_trait;
use tokio::process::Command;

/// Terminal type forced on hosted programs so they render colour
const TERM: &str = "xterm-256color";

/// Multiplexer backed by the external `tmux` binary
#[derive(Debug, Clone)]
pub struct TmuxMultiplexer {
    binary: String,
}

impl TmuxMultiplexer {
    /// Create a backend for the given tmux binary without probing it
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Create a backend and verify the binary runs
    pub async fn detect(binary: impl Into<String>) -> Result<Self> {
        let backend = Self::new(binary);
        let output = Command::new(&backend.binary)
            .arg("-V")
            .output()
            .await
            .map_err(|e| TerminalError::Unavailable(format!("{}: {}", backend.binary, e)))?;
        if !output.status.success() {
            return Err(TerminalError::Unavailable(format!(
                "`{} -V` failed - ensure tmux is installed and working",
                backend.binary
            )));
        }
        log::debug!(
            "Using {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(backend)
    }

    /// Exact-match target; a bare name lets tmux fall back to prefix matching
    fn exact(name: &str) -> String {
        format!("={}", name)
    }

    /// Exact-match target for the active pane of a session
    fn pane(name: &str) -> String {
        format!("={}:", name)
    }

    /// Run a tmux command and return stdout
    async fn run_tmux_command(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary).args(args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TerminalError::CommandFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Get the pid of the process running in the session's pane
    async fn pane_pid(&self, name: &str) -> Result<i32> {
        let target = Self::pane(name);
        let output = self
            .run_tmux_command(&["display-message", "-p", "-t", target.as_str(), "#{pane_pid}"])
            .await?;
        output
            .trim()
            .parse()
            .map_err(|_| TerminalError::Parse(format!("pane pid '{}'", output.trim())))
    }
}

impl Default for TmuxMultiplexer {
    fn default() -> Self {
        Self::new("tmux")
    }
}

#[async_trait]
impl Multiplexer for TmuxMultiplexer {
    async fn has_session(&self, name: &str) -> Result<bool> {
        // a non-zero exit means "no such session"; failing to run tmux at all
        // says nothing about the session
        let output = Command::new(&self.binary)
            .args(["has-session", "-t", Self::exact(name).as_str()])
            .output()
            .await?;
        Ok(output.status.success())
    }

    async fn new_session(&self, spec: &LaunchSpec) -> Result<()> {
        let width = spec.width.to_string();
        let height = spec.height.to_string();
        let work_dir = spec.work_dir.to_string_lossy();

        let mut env = vec![format!("TERM={}", TERM), "COLORTERM=truecolor".to_string()];
        env.extend(spec.env.iter().map(|(k, v)| format!("{}={}", k, v)));

        let mut args: Vec<&str> = vec![
            "new-session",
            "-d",
            "-s",
            spec.name.as_str(),
            "-x",
            width.as_str(),
            "-y",
            height.as_str(),
            "-c",
            &*work_dir,
        ];
        for var in &env {
            args.push("-e");
            args.push(var);
        }
        args.push("--");
        args.extend(spec.program.iter().map(String::as_str));

        self.run_tmux_command(&args).await?;
        Ok(())
    }

    async fn capture_pane(&self, name: &str, scrollback: usize) -> Result<String> {
        let target = Self::pane(name);
        let start = format!("-{}", scrollback);
        self.run_tmux_command(&["capture-pane", "-p", "-e", "-t", target.as_str(), "-S", start.as_str()])
            .await
    }

    async fn window_size(&self, name: &str) -> Result<(u16, u16)> {
        let target = Self::pane(name);
        let output = self
            .run_tmux_command(&[
                "display-message",
                "-p",
                "-t",
                target.as_str(),
                "#{window_width} #{window_height}",
            ])
            .await?;
        parse_window_size(&output)
    }

    async fn resize_window(&self, name: &str, width: u16, height: u16) -> Result<()> {
        let target = Self::pane(name);
        // manual sizing stops tmux from snapping back to attached clients
        self.run_tmux_command(&["set-option", "-w", "-t", target.as_str(), "window-size", "manual"])
            .await?;
        let (width, height) = (width.to_string(), height.to_string());
        self.run_tmux_command(&[
            "resize-window",
            "-t",
            target.as_str(),
            "-x",
            width.as_str(),
            "-y",
            height.as_str(),
        ])
        .await?;
        Ok(())
    }

    async fn signal_resize(&self, name: &str) -> Result<()> {
        let pid = self.pane_pid(name).await?;
        if pid <= 0 {
            return Err(TerminalError::Parse(format!("pane pid {}", pid)));
        }
        // pane processes lead their own process group; signal the group so
        // full-screen children redraw too
        let rc = unsafe { libc::kill(-pid, libc::SIGWINCH) };
        if rc != 0 {
            let rc = unsafe { libc::kill(pid, libc::SIGWINCH) };
            if rc != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }
        Ok(())
    }

    async fn send_literal(&self, name: &str, text: &str) -> Result<()> {
        let target = Self::pane(name);
        self.run_tmux_command(&["send-keys", "-t", target.as_str(), "-l", "--", text])
            .await?;
        Ok(())
    }

    async fn send_named(&self, name: &str, key: NamedKey) -> Result<()> {
        let target = Self::pane(name);
        self.run_tmux_command(&["send-keys", "-t", target.as_str(), key.tmux_name()])
            .await?;
        Ok(())
    }

    async fn kill_session(&self, name: &str) -> Result<()> {
        let target = Self::exact(name);
        self.run_tmux_command(&["kill-session", "-t", target.as_str()])
            .await?;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        match self.run_tmux_command(&["ls", "-F", "#{session_name}"]).await {
            Ok(output) => Ok(output
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            // no server running means no sessions
            Err(TerminalError::CommandFailed { stderr, .. }) => {
                log::debug!("tmux ls: {}", stderr);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn backend_name(&self) -> &str {
        "tmux"
    }
}

/// Parse `display-message` output of the form "<width> <height>"
fn parse_window_size(output: &str) -> Result<(u16, u16)> {
    let mut fields = output.split_whitespace().map(str::parse::<u16>);
    match (fields.next(), fields.next(), fields.next()) {
        (Some(Ok(width)), Some(Ok(height)), None) => Ok((width, height)),
        _ => Err(TerminalError::Parse(format!("window size '{}'", output.trim()))),
    }
}
