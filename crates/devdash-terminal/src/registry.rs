use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::json;

use super::backend::Multiplexer;
use super::config::{LaunchConfig, TimingConfig};
use super::error::Result;
use super::journal::SessionJournal;
use super::reaper;
use super::session::TerminalSession;
use super::APP_PREFIX;

/// All terminal sessions of the dashboard, keyed by session id.
///
/// One registry is created at startup and handed to every subsystem. The map
/// lock is only held for the map operation itself, never across a
/// multiplexer call.
pub struct SessionRegistry {
    mux: Arc<dyn Multiplexer>,
    timings: TimingConfig,
    journal: Option<Arc<SessionJournal>>,
    sessions: Mutex<HashMap<String, Arc<TerminalSession>>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("backend", &self.mux.backend_name())
            .field("timings", &self.timings)
            .field("sessions", &self.len())
            .finish()
    }
}

impl SessionRegistry {
    /// Create a registry with default timings and no journal
    pub fn new(mux: Arc<dyn Multiplexer>) -> Self {
        Self {
            mux,
            timings: TimingConfig::default(),
            journal: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_timings(mut self, timings: TimingConfig) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_journal(mut self, journal: SessionJournal) -> Self {
        self.journal = Some(Arc::new(journal));
        self
    }

    pub fn multiplexer(&self) -> &Arc<dyn Multiplexer> {
        &self.mux
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<TerminalSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the session for `session_id`, creating it from `launch` if absent.
    /// An existing session keeps its original launch configuration.
    pub fn get_or_create(&self, session_id: &str, launch: LaunchConfig) -> Arc<TerminalSession> {
        let mut sessions = self.sessions();
        if let Some(existing) = sessions.get(session_id) {
            let registered = existing.launch_config();
            if registered.subsystem != launch.subsystem || registered.prefix != launch.prefix {
                log::warn!(
                    "Session {} is registered as {} ({}); ignoring {} launch request",
                    session_id,
                    registered.subsystem,
                    existing.multiplexer_name(),
                    launch.subsystem
                );
            }
            return Arc::clone(existing);
        }

        log::debug!("Registering {} session {}", launch.subsystem, session_id);
        let session = Arc::new(TerminalSession::new(
            session_id.to_string(),
            launch,
            Arc::clone(&self.mux),
            self.timings,
            self.journal.clone(),
        ));
        sessions.insert(session_id.to_string(), Arc::clone(&session));
        session
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<TerminalSession>> {
        self.sessions().get(session_id).cloned()
    }

    /// Stop and forget a session. Returns false if it was not registered.
    pub async fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions().remove(session_id);
        match removed {
            Some(session) => {
                session.stop().await;
                true
            }
            None => false,
        }
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Stop every registered session, leaving them registered as exited
    pub async fn stop_all(&self) {
        let sessions: Vec<Arc<TerminalSession>> = self.sessions().values().cloned().collect();
        for session in sessions {
            session.stop().await;
        }
    }

    /// Destroy leftover sessions from a previous run of the application
    pub async fn reap_orphans(&self) -> Result<usize> {
        let reaped = reaper::reap_orphans(self.mux.as_ref(), APP_PREFIX).await?;
        if let Some(journal) = &self.journal {
            journal.note("", APP_PREFIX, "reap", json!({ "count": reaped }));
        }
        Ok(reaped)
    }
}
