use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::json;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::backend::{LaunchSpec, Multiplexer};
use super::config::{LaunchConfig, TimingConfig};
use super::error::{Result, TerminalError};
use super::journal::SessionJournal;
use super::keys::{self, Delivery, Key, KeyAction, NamedKey, ScrollDirection};
use super::resume;
use super::viewport::ScrollbackViewport;
use super::{DEFAULT_HEIGHT, DEFAULT_WIDTH, MIN_HEIGHT, MIN_WIDTH};

/// Callback invoked from a background loop
pub type SessionCallback = Arc<dyn Fn() + Send + Sync>;

/// Terminal session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing launched yet
    Idle,
    /// Start requested before the real pane size was known
    PendingStart,
    /// Multiplexer session live, background loops running
    Running,
    /// Stopped, or the hosted program went away
    Exited,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::PendingStart => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Result of routing a key event to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyOutcome {
    /// The session handled the key; the UI should not
    pub consumed: bool,
    /// The user asked to leave terminal mode (double Escape)
    pub exit_requested: bool,
}

/// Mutable session fields, shared with the background loops
struct SessionInner {
    width: u16,
    height: u16,
    state: SessionState,
    content: String,
    viewport: ScrollbackViewport,
    /// Caller-signalled busy state; pins the view to the live tail
    processing: bool,
    pending_resume: Option<String>,
    /// Stop signal of the current loop run
    stop: Option<CancellationToken>,
    /// Armed double-escape timer and its generation
    pending_escape: Option<(u64, CancellationToken)>,
    escape_generation: u64,
}

#[derive(Default)]
struct Callbacks {
    on_output: Option<SessionCallback>,
    on_exit: Option<SessionCallback>,
}

/// One interactive program hosted in a detached multiplexer session
pub struct TerminalSession {
    session_id: String,
    multiplexer_name: String,
    launch: LaunchConfig,
    timings: TimingConfig,
    mux: Arc<dyn Multiplexer>,
    journal: Option<Arc<SessionJournal>>,
    inner: RwLock<SessionInner>,
    callbacks: Mutex<Callbacks>,
    /// Serialises start / resize / stop across their multiplexer calls
    lifecycle: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for TerminalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSession")
            .field("session_id", &self.session_id)
            .field("multiplexer_name", &self.multiplexer_name)
            .field("backend", &self.mux.backend_name())
            .field("state", &self.state())
            .finish()
    }
}

/// Multiplexer name for a session: prefix plus the first 8 characters of the
/// id, with tmux target separators replaced
pub fn multiplexer_name(prefix: &str, session_id: &str) -> String {
    let short: String = session_id
        .chars()
        .take(8)
        .map(|c| if c == '.' || c == ':' { '_' } else { c })
        .collect();
    format!("{}{}", prefix, short)
}

fn default_launcher() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|shell| !shell.is_empty())
        .unwrap_or_else(|| "/bin/bash".to_string())
}

impl TerminalSession {
    pub(crate) fn new(
        session_id: String,
        launch: LaunchConfig,
        mux: Arc<dyn Multiplexer>,
        timings: TimingConfig,
        journal: Option<Arc<SessionJournal>>,
    ) -> Self {
        let multiplexer_name = multiplexer_name(&launch.prefix, &session_id);
        Self {
            session_id,
            multiplexer_name,
            launch,
            timings,
            mux,
            journal,
            inner: RwLock::new(SessionInner {
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
                state: SessionState::Idle,
                content: String::new(),
                viewport: ScrollbackViewport::new(),
                processing: false,
                pending_resume: None,
                stop: None,
                pending_escape: None,
                escape_generation: 0,
            }),
            callbacks: Mutex::new(Callbacks::default()),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn callbacks(&self) -> MutexGuard<'_, Callbacks> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn journal(&self, event: &str, details: serde_json::Value) {
        if let Some(journal) = &self.journal {
            journal.note(&self.session_id, &self.multiplexer_name, event, details);
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn multiplexer_name(&self) -> &str {
        &self.multiplexer_name
    }

    pub fn launch_config(&self) -> &LaunchConfig {
        &self.launch
    }

    pub fn state(&self) -> SessionState {
        self.read().state
    }

    /// Current geometry as (width, height)
    pub fn size(&self) -> (u16, u16) {
        let inner = self.read();
        (inner.width, inner.height)
    }

    /// Line count of the last snapshot
    pub fn line_count(&self) -> usize {
        self.read().viewport.total_lines()
    }

    pub fn scroll_offset(&self) -> usize {
        self.read().viewport.scroll_offset()
    }

    /// Last raw snapshot, escape codes included
    pub fn content(&self) -> String {
        self.read().content.clone()
    }

    /// Rendered visible window
    pub fn view(&self) -> String {
        let inner = self.read();
        inner
            .viewport
            .render(inner.width as usize, inner.height as usize)
    }

    /// Install the output and exit callbacks, replacing any previous ones
    pub fn set_callbacks(&self, on_output: Option<SessionCallback>, on_exit: Option<SessionCallback>) {
        let mut callbacks = self.callbacks();
        callbacks.on_output = on_output;
        callbacks.on_exit = on_exit;
    }

    /// While processing, every refresh pins the view to the bottom
    pub fn set_processing(&self, processing: bool) {
        let mut inner = self.write_inner();
        inner.processing = processing;
        if processing {
            inner.viewport.to_bottom();
        }
    }

    pub fn scroll_up(&self, lines: usize) {
        let mut inner = self.write_inner();
        let height = inner.height as usize;
        inner.viewport.scroll_up(lines, height);
    }

    pub fn scroll_down(&self, lines: usize) {
        self.write_inner().viewport.scroll_down(lines);
    }

    pub fn scroll_to_bottom(&self) {
        self.write_inner().viewport.to_bottom();
    }

    /// Ask the multiplexer whether the backing session exists, without
    /// touching state. A liveness check tmux cannot answer counts as not alive.
    pub async fn is_alive(&self) -> bool {
        match self.mux.has_session(&self.multiplexer_name).await {
            Ok(alive) => alive,
            Err(e) => {
                log::debug!("has-session {}: {}", self.multiplexer_name, e);
                false
            }
        }
    }

    /// Start the session, reusing a live multiplexer session of the same name.
    ///
    /// With the placeholder 80x24 geometry the launch is deferred until
    /// [`set_size`](Self::set_size) reports a real size.
    pub async fn start(self: &Arc<Self>, resume_token: Option<&str>) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        match self.state() {
            SessionState::Running => return Ok(()),
            SessionState::Exited => return Err(TerminalError::Exited(self.session_id.clone())),
            SessionState::Idle | SessionState::PendingStart => {}
        }
        self.reconcile_or_create(resume_token.map(str::to_string)).await
    }

    /// Single path for both adopting a live session and creating a new one.
    /// Caller holds the lifecycle guard.
    async fn reconcile_or_create(self: &Arc<Self>, resume_token: Option<String>) -> Result<()> {
        let (width, height) = self.size();

        if self.mux.has_session(&self.multiplexer_name).await? {
            // nobody reported a size yet: keep the live window as it is
            let (width, height) = if (width, height) == (DEFAULT_WIDTH, DEFAULT_HEIGHT) {
                self.adopt_live_size().await.unwrap_or((width, height))
            } else {
                (width, height)
            };
            log::info!(
                "Reusing live session {} for {}",
                self.multiplexer_name,
                self.session_id
            );
            self.apply_size(width, height).await;
            self.enter_running();
            self.journal("reuse", json!({ "width": width, "height": height }));
            return Ok(());
        }

        if (width, height) == (DEFAULT_WIDTH, DEFAULT_HEIGHT) {
            {
                let mut inner = self.write_inner();
                inner.state = SessionState::PendingStart;
                inner.pending_resume = resume_token;
            }
            log::debug!("Deferring launch of {} until size is known", self.multiplexer_name);
            self.journal("defer", json!({}));
            return Ok(());
        }

        let spec = self.launch_spec(width, height, resume_token.as_deref());
        if let Err(e) = self.mux.new_session(&spec).await {
            log::warn!("Launch of {} failed: {}", self.multiplexer_name, e);
            self.journal("launch_failed", json!({ "error": e.to_string() }));
            return Err(TerminalError::LaunchFailed {
                name: self.multiplexer_name.clone(),
                source: Box::new(e),
            });
        }

        log::info!(
            "Launched {} ({}x{}) in {}: {}",
            self.multiplexer_name,
            width,
            height,
            self.launch.work_dir.display(),
            spec.program.join(" ")
        );
        self.apply_size(width, height).await;
        self.enter_running();
        self.journal(
            "launch",
            json!({ "width": width, "height": height, "program": spec.program }),
        );
        Ok(())
    }

    /// Take over the geometry of a live window as the session size
    async fn adopt_live_size(&self) -> Option<(u16, u16)> {
        let (width, height) = match self.mux.window_size(&self.multiplexer_name).await {
            Ok(size) => size,
            Err(e) => {
                log::debug!("Window size of {} unknown: {}", self.multiplexer_name, e);
                return None;
            }
        };
        let width = width.max(MIN_WIDTH);
        let height = height.max(MIN_HEIGHT);

        let mut inner = self.write_inner();
        inner.width = width;
        inner.height = height;
        inner.viewport.clamp(height as usize);
        Some((width, height))
    }

    /// Build the launch command, appending resume arguments when the token
    /// checks out
    fn launch_spec(&self, width: u16, height: u16, resume_token: Option<&str>) -> LaunchSpec {
        let mut program = if self.launch.command.is_empty() {
            vec![default_launcher()]
        } else {
            vec![self.launch.command.clone()]
        };
        program.extend(self.launch.args.iter().cloned());

        if let (Some(token), Some(resume)) = (resume_token, &self.launch.resume) {
            if let Some(args) =
                resume::resume_args(resume, &self.launch.work_dir, &self.session_id, token)
            {
                program.extend(args);
            }
        }

        LaunchSpec {
            name: self.multiplexer_name.clone(),
            width,
            height,
            work_dir: self.launch.work_dir.clone(),
            env: self
                .launch
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            program,
        }
    }

    /// Push geometry to the multiplexer and poke the hosted program. Best effort.
    async fn apply_size(&self, width: u16, height: u16) {
        if let Err(e) = self
            .mux
            .resize_window(&self.multiplexer_name, width, height)
            .await
        {
            log::warn!("Resize of {} failed: {}", self.multiplexer_name, e);
            return;
        }
        if let Err(e) = self.mux.signal_resize(&self.multiplexer_name).await {
            log::debug!("SIGWINCH to {} failed: {}", self.multiplexer_name, e);
        }
    }

    /// Open a fresh stop signal and launch the capture and monitor loops
    fn enter_running(self: &Arc<Self>) {
        let stop = CancellationToken::new();
        {
            let mut inner = self.write_inner();
            inner.state = SessionState::Running;
            inner.pending_resume = None;
            inner.stop = Some(stop.clone());
        }
        tokio::spawn(Arc::clone(self).capture_loop(stop.clone()));
        tokio::spawn(Arc::clone(self).monitor_loop(stop));
    }

    /// Report the real pane size. Clamped to at least 10x5.
    ///
    /// Triggers a deferred launch, or resizes a running session.
    pub async fn set_size(self: &Arc<Self>, width: u16, height: u16) -> Result<()> {
        let width = width.max(MIN_WIDTH);
        let height = height.max(MIN_HEIGHT);

        let _guard = self.lifecycle.lock().await;
        let (state, pending_resume) = {
            let mut inner = self.write_inner();
            if (inner.width, inner.height) == (width, height) {
                return Ok(());
            }
            inner.width = width;
            inner.height = height;
            inner.viewport.clamp(height as usize);
            (inner.state, inner.pending_resume.clone())
        };

        match state {
            SessionState::PendingStart if (width, height) != (DEFAULT_WIDTH, DEFAULT_HEIGHT) => {
                self.reconcile_or_create(pending_resume).await
            }
            SessionState::Running => {
                self.apply_size(width, height).await;
                self.journal("resize", json!({ "width": width, "height": height }));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Refresh the captured content once. Returns whether it changed.
    pub async fn refresh(&self) -> Result<bool> {
        let snapshot = self
            .mux
            .capture_pane(&self.multiplexer_name, self.timings.scrollback_lines)
            .await?;
        Ok(self.apply_snapshot(snapshot))
    }

    fn apply_snapshot(&self, snapshot: String) -> bool {
        let mut inner = self.write_inner();
        if inner.processing {
            inner.viewport.to_bottom();
        }
        if inner.content == snapshot {
            return false;
        }
        let height = inner.height as usize;
        inner.viewport.set_content(&snapshot, height);
        inner.content = snapshot;
        true
    }

    async fn capture_loop(self: Arc<Self>, stop: CancellationToken) {
        let mut ticker = tokio::time::interval(self.timings.capture_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let captured = tokio::select! {
                _ = stop.cancelled() => break,
                captured = self.mux.capture_pane(&self.multiplexer_name, self.timings.scrollback_lines) => captured,
            };

            match captured {
                Ok(snapshot) => {
                    if self.apply_snapshot(snapshot) {
                        let on_output = self.callbacks().on_output.clone();
                        if let Some(on_output) = on_output {
                            on_output();
                        }
                    }
                }
                Err(e) => {
                    if self.state() != SessionState::Running {
                        break;
                    }
                    log::debug!("Capture of {} failed: {}", self.multiplexer_name, e);
                }
            }
        }
        log::debug!("Capture loop for {} finished", self.multiplexer_name);
    }

    async fn monitor_loop(self: Arc<Self>, stop: CancellationToken) {
        let mut ticker = tokio::time::interval(self.timings.monitor_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let alive = tokio::select! {
                _ = stop.cancelled() => break,
                alive = self.mux.has_session(&self.multiplexer_name) => alive,
            };

            let alive = match alive {
                Ok(alive) => alive,
                Err(e) => {
                    // skip the tick; only a definite "no such session" ends it
                    log::debug!("Liveness check of {} failed: {}", self.multiplexer_name, e);
                    continue;
                }
            };
            if !alive {
                if self.mark_exited() {
                    log::info!("Session {} exited", self.multiplexer_name);
                    self.journal("exit", json!({}));
                    let on_exit = self.callbacks().on_exit.clone();
                    if let Some(on_exit) = on_exit {
                        on_exit();
                    }
                }
                break;
            }
        }
        log::debug!("Monitor loop for {} finished", self.multiplexer_name);
    }

    /// Running -> Exited; true only for the caller that made the transition
    fn mark_exited(&self) -> bool {
        let mut inner = self.write_inner();
        if inner.state != SessionState::Running {
            return false;
        }
        inner.state = SessionState::Exited;
        if let Some((_, timer)) = inner.pending_escape.take() {
            timer.cancel();
        }
        true
    }

    /// Stop the session: cancel the loops and destroy the multiplexer
    /// session. Safe to call any number of times.
    pub async fn stop(&self) {
        let _guard = self.lifecycle.lock().await;
        let stop = {
            let mut inner = self.write_inner();
            inner.state = SessionState::Exited;
            inner.pending_resume = None;
            if let Some((_, timer)) = inner.pending_escape.take() {
                timer.cancel();
            }
            inner.stop.take()
        };
        if let Some(stop) = stop {
            stop.cancel();
            self.journal("stop", json!({}));
        }
        if let Err(e) = self.mux.kill_session(&self.multiplexer_name).await {
            log::debug!("kill-session {}: {}", self.multiplexer_name, e);
        }
    }

    /// Send raw input. A no-op unless the session is running.
    pub async fn write(&self, bytes: &[u8]) -> Result<()> {
        if self.state() != SessionState::Running {
            return Ok(());
        }
        self.deliver(keys::translate_bytes(bytes)).await
    }

    pub async fn write_str(&self, text: &str) -> Result<()> {
        self.write(text.as_bytes()).await
    }

    async fn deliver(&self, delivery: Delivery) -> Result<()> {
        let sent = match &delivery {
            Delivery::Literal(text) if text.is_empty() => return Ok(()),
            Delivery::Literal(text) => self.mux.send_literal(&self.multiplexer_name, text).await,
            Delivery::Named(key) => self.mux.send_named(&self.multiplexer_name, *key).await,
        };
        match sent {
            // the session went away underneath us
            Err(_) if self.state() != SessionState::Running => Ok(()),
            other => other,
        }
    }

    /// Route a UI key event.
    ///
    /// Paging keys scroll locally. Escape is debounced when the subsystem
    /// enables double-escape exit. Everything else is delivered to the
    /// hosted program.
    pub async fn handle_key(self: &Arc<Self>, key: &Key) -> Result<KeyOutcome> {
        let consumed = KeyOutcome { consumed: true, exit_requested: false };

        match keys::classify(key) {
            KeyAction::Scroll(direction) => {
                let page = self.size().1 as usize;
                match direction {
                    ScrollDirection::Up => self.scroll_up(page),
                    ScrollDirection::Down => self.scroll_down(page),
                }
                Ok(consumed)
            }
            _ if self.state() != SessionState::Running => Ok(KeyOutcome::default()),
            KeyAction::Escape if self.launch.double_escape_exit => Ok(self.debounce_escape()),
            KeyAction::Escape => {
                self.deliver(Delivery::Named(NamedKey::Escape)).await?;
                Ok(consumed)
            }
            KeyAction::Deliver(delivery) => {
                self.deliver(delivery).await?;
                Ok(consumed)
            }
        }
    }

    /// First Escape arms a timer; a second one inside the window cancels it
    /// and requests exit. An expired timer forwards exactly one Escape.
    fn debounce_escape(self: &Arc<Self>) -> KeyOutcome {
        let mut inner = self.write_inner();

        if let Some((_, timer)) = inner.pending_escape.take() {
            timer.cancel();
            return KeyOutcome { consumed: true, exit_requested: true };
        }

        // child of the stop signal so stopping the session disarms it
        let timer = match &inner.stop {
            Some(stop) => stop.child_token(),
            None => return KeyOutcome::default(),
        };
        inner.escape_generation += 1;
        let generation = inner.escape_generation;
        inner.pending_escape = Some((generation, timer.clone()));
        drop(inner);

        let session = Arc::clone(self);
        let window = self.timings.escape_window();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(window) => {
                    let fire = {
                        let mut inner = session.write_inner();
                        let ours = matches!(inner.pending_escape, Some((g, _)) if g == generation);
                        if ours {
                            inner.pending_escape = None;
                        }
                        ours && inner.state == SessionState::Running
                    };
                    if fire {
                        if let Err(e) = session.deliver(Delivery::Named(NamedKey::Escape)).await {
                            log::debug!("Forwarding Escape to {} failed: {}", session.multiplexer_name, e);
                        }
                    }
                }
            }
        });

        KeyOutcome { consumed: true, exit_requested: false }
    }
}
