use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use devdash_terminal::{
    Key, SessionRegistry, SessionState, Subsystem, TerminalSession, APP_PREFIX, DEFAULT_HEIGHT,
    DEFAULT_WIDTH,
};

use crate::cli::{unescape, Commands};
use crate::config::DashboardConfig;

/// Shared state for one CLI invocation
pub struct App {
    pub config: DashboardConfig,
    pub registry: SessionRegistry,
    pub work_dir: PathBuf,
}

/// 80x24 is the "size not yet known" placeholder: a session given that size
/// waits for a real one, which a one-shot launch never reports
fn launch_size(cols: u16, rows: u16) -> Result<(u16, u16)> {
    if (cols, rows) == (DEFAULT_WIDTH, DEFAULT_HEIGHT) {
        anyhow::bail!(
            "{}x{} is reserved as the unknown-size placeholder; pick another --cols/--rows",
            DEFAULT_WIDTH,
            DEFAULT_HEIGHT
        );
    }
    Ok((cols, rows))
}

enum SessionEvent {
    Output,
    Exit,
}

impl App {
    fn session(&self, subsystem: Subsystem, id: &str, dir: Option<PathBuf>) -> Arc<TerminalSession> {
        let work_dir = dir.unwrap_or_else(|| self.work_dir.clone());
        let launch = self.config.subsystems.launch(subsystem, work_dir);
        self.registry.get_or_create(id, launch)
    }

    /// Attach to an existing tmux session without ever creating one
    async fn adopt(&self, subsystem: Subsystem, id: &str, size: Option<(u16, u16)>) -> Result<Arc<TerminalSession>> {
        let session = self.session(subsystem, id, None);
        if !session.is_alive().await {
            anyhow::bail!(
                "No live {} session '{}' ({})",
                subsystem,
                id,
                session.multiplexer_name()
            );
        }
        if let Some((cols, rows)) = size {
            session.set_size(cols, rows).await?;
        }
        session.start(None).await?;
        Ok(session)
    }
}

impl Commands {
    pub async fn execute(&self, app: &App) -> Result<String> {
        match self {
            Commands::Reap => {
                let reaped = app.registry.reap_orphans().await?;
                Ok(format!("Reaped {} orphaned session(s)", reaped))
            }
            Commands::List => {
                let names: Vec<String> = app
                    .registry
                    .multiplexer()
                    .list_sessions()
                    .await?
                    .into_iter()
                    .filter(|name| name.starts_with(APP_PREFIX))
                    .collect();
                if names.is_empty() {
                    return Ok("No live sessions".dimmed().to_string());
                }
                let mut output = format!("{} live session(s):\n", names.len());
                for name in names {
                    output.push_str(&format!("  {}\n", name.green()));
                }
                Ok(output.trim_end().to_string())
            }
            Commands::Launch { subsystem, id, dir, cols, rows, resume } => {
                let (cols, rows) = launch_size(*cols, *rows)?;
                let id = id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                let session = app.session(*subsystem, &id, dir.clone());
                session.set_size(cols, rows).await?;
                session
                    .start(resume.as_deref())
                    .await
                    .with_context(|| format!("Failed to launch {} session", subsystem))?;

                let state = match session.state() {
                    SessionState::Running => "running".green(),
                    other => other.to_string().yellow(),
                };
                Ok(format!(
                    "Session {} ({}) {}",
                    id.bold(),
                    session.multiplexer_name(),
                    state
                ))
            }
            Commands::View { subsystem, id, cols, rows, scroll } => {
                let session = app.adopt(*subsystem, id, Some((*cols, *rows))).await?;
                session.refresh().await?;
                session.scroll_up(*scroll);
                Ok(session.view())
            }
            Commands::Send { subsystem, id, text } => {
                let session = app.adopt(*subsystem, id, None).await?;
                session.write_str(&unescape(text)).await?;
                Ok(format!("Sent {} byte(s) to {}", text.len(), session.multiplexer_name()))
            }
            Commands::Keys { subsystem, id, keys } => {
                let keys = keys
                    .iter()
                    .map(|k| k.parse::<Key>().map_err(|e| anyhow::anyhow!(e)))
                    .collect::<Result<Vec<Key>>>()?;
                let session = app.adopt(*subsystem, id, None).await?;

                let mut exit_requested = false;
                for key in &keys {
                    let outcome = session.handle_key(key).await?;
                    exit_requested |= outcome.exit_requested;
                }
                // a lone Escape is forwarded once its debounce window closes
                if keys.contains(&Key::Esc) && !exit_requested {
                    tokio::time::sleep(app.config.timings.escape_window() * 2).await;
                }

                let mut output = format!("Sent {} key(s) to {}", keys.len(), session.multiplexer_name());
                if exit_requested {
                    output.push_str(&format!(" ({})", "exit requested".yellow()));
                }
                Ok(output)
            }
            Commands::Watch { subsystem, id, cols, rows } => {
                let session = app.adopt(*subsystem, id, Some((*cols, *rows))).await?;
                watch(&session).await
            }
            Commands::Kill { subsystem, id } => {
                let session = app.session(*subsystem, id, None);
                let name = session.multiplexer_name().to_string();
                if !session.is_alive().await {
                    app.registry.remove(id).await;
                    return Ok(format!("No live session {}", name));
                }
                app.registry.remove(id).await;
                Ok(format!("Killed {}", name.red()))
            }
        }
    }
}

/// Redraw on every output change until the session exits or Ctrl-C
async fn watch(session: &Arc<TerminalSession>) -> Result<String> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let on_output = {
        let tx = tx.clone();
        Arc::new(move || {
            let _ = tx.send(SessionEvent::Output);
        })
    };
    let on_exit = Arc::new(move || {
        let _ = tx.send(SessionEvent::Exit);
    });
    session.set_callbacks(Some(on_output), Some(on_exit));

    redraw(session);
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(SessionEvent::Output) => redraw(session),
                Some(SessionEvent::Exit) | None => {
                    return Ok(format!("{} exited", session.multiplexer_name()).yellow().to_string());
                }
            },
            _ = tokio::signal::ctrl_c() => {
                session.set_callbacks(None, None);
                return Ok(format!("Detached from {}", session.multiplexer_name()));
            }
        }
    }
}

fn redraw(session: &TerminalSession) {
    print!("\x1b[H\x1b[2J{}", session.view());
    println!();
}
