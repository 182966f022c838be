#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use devdash_terminal::{
    LaunchConfig, LaunchSpec, Multiplexer, NamedKey, SessionRegistry, Subsystem, TerminalError,
    TimingConfig,
};

/// Something delivered to a fake pane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Literal(String),
    Named(NamedKey),
}

/// Observable state of the fake multiplexer
#[derive(Debug, Default)]
pub struct FakeState {
    pub live: BTreeSet<String>,
    pub created: Vec<LaunchSpec>,
    pub killed: Vec<String>,
    pub resized: Vec<(String, u16, u16)>,
    pub signals: Vec<String>,
    pub sent: Vec<(String, Sent)>,
    pub screens: HashMap<String, String>,
    /// Window geometry of sessions created or resized through the fake
    pub sizes: HashMap<String, (u16, u16)>,
    /// Number of capture-pane calls, failed ones included
    pub captures: usize,
    pub fail_create: bool,
    /// Liveness checks fail as if tmux could not be run
    pub fail_liveness: bool,
}

/// In-memory multiplexer that records every call
#[derive(Debug, Default)]
pub struct FakeMultiplexer {
    state: Mutex<FakeState>,
}

impl FakeMultiplexer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Pretend a session already exists, e.g. left over from a previous run
    pub fn add_live(&self, name: &str) {
        self.state().live.insert(name.to_string());
    }

    /// Pretend the hosted program exited
    pub fn vanish(&self, name: &str) {
        self.state().live.remove(name);
    }

    pub fn set_screen(&self, name: &str, content: &str) {
        self.state().screens.insert(name.to_string(), content.to_string());
    }

    /// Pretend a session of the given size already exists
    pub fn add_live_sized(&self, name: &str, width: u16, height: u16) {
        let mut state = self.state();
        state.live.insert(name.to_string());
        state.sizes.insert(name.to_string(), (width, height));
    }

    pub fn capture_count(&self) -> usize {
        self.state().captures
    }

    pub fn create_count(&self) -> usize {
        self.state().created.len()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.state().sent.iter().map(|(_, s)| s.clone()).collect()
    }
}

fn failed(command: &str, stderr: &str) -> TerminalError {
    TerminalError::CommandFailed {
        command: command.to_string(),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl Multiplexer for FakeMultiplexer {
    async fn has_session(&self, name: &str) -> devdash_terminal::Result<bool> {
        let state = self.state();
        if state.fail_liveness {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "too many open files").into());
        }
        Ok(state.live.contains(name))
    }

    async fn new_session(&self, spec: &LaunchSpec) -> devdash_terminal::Result<()> {
        let mut state = self.state();
        if state.fail_create {
            return Err(failed("new-session", "server exited unexpectedly"));
        }
        if !state.live.insert(spec.name.clone()) {
            return Err(failed("new-session", &format!("duplicate session: {}", spec.name)));
        }
        state.sizes.insert(spec.name.clone(), (spec.width, spec.height));
        state.created.push(spec.clone());
        Ok(())
    }

    async fn capture_pane(&self, name: &str, _scrollback: usize) -> devdash_terminal::Result<String> {
        let mut state = self.state();
        state.captures += 1;
        if !state.live.contains(name) {
            return Err(failed("capture-pane", "can't find session"));
        }
        Ok(state.screens.get(name).cloned().unwrap_or_default())
    }

    async fn window_size(&self, name: &str) -> devdash_terminal::Result<(u16, u16)> {
        self.state()
            .sizes
            .get(name)
            .copied()
            .ok_or_else(|| failed("display-message", "can't find session"))
    }

    async fn resize_window(&self, name: &str, width: u16, height: u16) -> devdash_terminal::Result<()> {
        let mut state = self.state();
        state.resized.push((name.to_string(), width, height));
        state.sizes.insert(name.to_string(), (width, height));
        Ok(())
    }

    async fn signal_resize(&self, name: &str) -> devdash_terminal::Result<()> {
        self.state().signals.push(name.to_string());
        Ok(())
    }

    async fn send_literal(&self, name: &str, text: &str) -> devdash_terminal::Result<()> {
        self.state()
            .sent
            .push((name.to_string(), Sent::Literal(text.to_string())));
        Ok(())
    }

    async fn send_named(&self, name: &str, key: NamedKey) -> devdash_terminal::Result<()> {
        self.state().sent.push((name.to_string(), Sent::Named(key)));
        Ok(())
    }

    async fn kill_session(&self, name: &str) -> devdash_terminal::Result<()> {
        let mut state = self.state();
        state.killed.push(name.to_string());
        if state.live.remove(name) {
            Ok(())
        } else {
            Err(failed("kill-session", "can't find session"))
        }
    }

    async fn list_sessions(&self) -> devdash_terminal::Result<Vec<String>> {
        Ok(self.state().live.iter().cloned().collect())
    }

    fn backend_name(&self) -> &str {
        "fake"
    }
}

/// Production periods; tests run on the paused tokio clock
pub fn test_timings() -> TimingConfig {
    TimingConfig {
        capture_interval_ms: 100,
        monitor_interval_ms: 500,
        escape_window_ms: 300,
        scrollback_lines: 500,
    }
}

pub fn registry(mux: &Arc<FakeMultiplexer>) -> SessionRegistry {
    SessionRegistry::new(mux.clone()).with_timings(test_timings())
}

pub fn shell_launch() -> LaunchConfig {
    LaunchConfig::new(Subsystem::Shell, PathBuf::from("/tmp/project"))
        .with_command("bash", vec!["--norc".to_string()])
}

pub fn assistant_launch() -> LaunchConfig {
    LaunchConfig::new(Subsystem::Assistant, PathBuf::from("/tmp/project"))
}
