use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::APP_PREFIX;

/// Dashboard subsystems that host interactive sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    /// Primary AI coding assistant pane
    Assistant,
    /// Second assistant pane, independent of the first
    SecondaryAssistant,
    /// Database client
    Database,
    /// Plain shell
    Shell,
}

impl Subsystem {
    pub const ALL: [Subsystem; 4] = [
        Subsystem::Assistant,
        Subsystem::SecondaryAssistant,
        Subsystem::Database,
        Subsystem::Shell,
    ];

    /// Multiplexer name prefix; every prefix lives under [`APP_PREFIX`]
    pub fn prefix(&self) -> String {
        let short = match self {
            Subsystem::Assistant => "ai",
            Subsystem::SecondaryAssistant => "ai2",
            Subsystem::Database => "db",
            Subsystem::Shell => "sh",
        };
        format!("{}{}-", APP_PREFIX, short)
    }
}

impl std::str::FromStr for Subsystem {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "assistant" | "ai" => Ok(Self::Assistant),
            "secondary_assistant" | "ai2" => Ok(Self::SecondaryAssistant),
            "database" | "db" => Ok(Self::Database),
            "shell" | "sh" => Ok(Self::Shell),
            _ => Err(anyhow::anyhow!(
                "Invalid subsystem: '{}'. Valid options: 'assistant', 'secondary-assistant', 'database', 'shell'",
                s
            )),
        }
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assistant => write!(f, "assistant"),
            Self::SecondaryAssistant => write!(f, "secondary-assistant"),
            Self::Database => write!(f, "database"),
            Self::Shell => write!(f, "shell"),
        }
    }
}

/// How a subsystem resumes a previous conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeConfig {
    /// Arguments appended to the launch command; `{token}` is substituted
    pub args: Vec<String>,
    /// Path template of the transcript that proves the token is resumable.
    /// Placeholders: `{token}`, `{session_id}`, `{work_dir_slug}`; a leading
    /// `~` expands to `$HOME`
    pub transcript: String,
}

/// Per-subsystem launch settings, as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemConfig {
    /// Program to launch; empty means the default launcher (the user's shell)
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Double Escape leaves terminal mode; a single Escape reaches the program
    #[serde(default)]
    pub double_escape_exit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<ResumeConfig>,
}

impl SubsystemConfig {
    pub fn defaults_for(subsystem: Subsystem) -> Self {
        match subsystem {
            Subsystem::Assistant | Subsystem::SecondaryAssistant => Self {
                command: "claude".to_string(),
                args: Vec::new(),
                env: BTreeMap::new(),
                double_escape_exit: true,
                resume: Some(ResumeConfig {
                    args: vec!["--resume".to_string(), "{token}".to_string()],
                    transcript: "~/.claude/projects/{work_dir_slug}/{token}.jsonl".to_string(),
                }),
            },
            Subsystem::Database => Self {
                command: "psql".to_string(),
                args: Vec::new(),
                env: BTreeMap::new(),
                double_escape_exit: false,
                resume: None,
            },
            Subsystem::Shell => Self {
                command: String::new(),
                args: Vec::new(),
                env: BTreeMap::new(),
                double_escape_exit: false,
                resume: None,
            },
        }
    }

    /// Launch configuration for one session of this subsystem
    pub fn launch(&self, subsystem: Subsystem, work_dir: impl Into<PathBuf>) -> LaunchConfig {
        LaunchConfig {
            subsystem,
            prefix: subsystem.prefix(),
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            work_dir: work_dir.into(),
            double_escape_exit: self.double_escape_exit,
            resume: self.resume.clone(),
        }
    }
}

fn default_assistant() -> SubsystemConfig {
    SubsystemConfig::defaults_for(Subsystem::Assistant)
}

fn default_secondary_assistant() -> SubsystemConfig {
    SubsystemConfig::defaults_for(Subsystem::SecondaryAssistant)
}

fn default_database() -> SubsystemConfig {
    SubsystemConfig::defaults_for(Subsystem::Database)
}

fn default_shell() -> SubsystemConfig {
    SubsystemConfig::defaults_for(Subsystem::Shell)
}

/// Settings for every subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemTable {
    #[serde(default = "default_assistant")]
    pub assistant: SubsystemConfig,
    #[serde(default = "default_secondary_assistant")]
    pub secondary_assistant: SubsystemConfig,
    #[serde(default = "default_database")]
    pub database: SubsystemConfig,
    #[serde(default = "default_shell")]
    pub shell: SubsystemConfig,
}

impl SubsystemTable {
    pub fn get(&self, subsystem: Subsystem) -> &SubsystemConfig {
        match subsystem {
            Subsystem::Assistant => &self.assistant,
            Subsystem::SecondaryAssistant => &self.secondary_assistant,
            Subsystem::Database => &self.database,
            Subsystem::Shell => &self.shell,
        }
    }

    pub fn launch(&self, subsystem: Subsystem, work_dir: impl Into<PathBuf>) -> LaunchConfig {
        self.get(subsystem).launch(subsystem, work_dir)
    }
}

impl Default for SubsystemTable {
    fn default() -> Self {
        Self {
            assistant: default_assistant(),
            secondary_assistant: default_secondary_assistant(),
            database: default_database(),
            shell: default_shell(),
        }
    }
}

/// Everything a session needs to launch its hosted program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub subsystem: Subsystem,
    /// Multiplexer name prefix
    pub prefix: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub work_dir: PathBuf,
    pub double_escape_exit: bool,
    pub resume: Option<ResumeConfig>,
}

impl LaunchConfig {
    /// Default launch settings for a subsystem
    pub fn new(subsystem: Subsystem, work_dir: impl Into<PathBuf>) -> Self {
        SubsystemConfig::defaults_for(subsystem).launch(subsystem, work_dir)
    }

    pub fn with_command(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.command = command.into();
        self.args = args;
        self
    }

    pub fn with_double_escape_exit(mut self, enabled: bool) -> Self {
        self.double_escape_exit = enabled;
        self
    }

    pub fn with_resume(mut self, resume: Option<ResumeConfig>) -> Self {
        self.resume = resume;
        self
    }
}

/// Background loop periods and capture window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub capture_interval_ms: u64,
    pub monitor_interval_ms: u64,
    pub escape_window_ms: u64,
    /// History lines captured above the visible pane
    pub scrollback_lines: usize,
}

impl TimingConfig {
    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms.max(1))
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms.max(1))
    }

    pub fn escape_window(&self) -> Duration {
        Duration::from_millis(self.escape_window_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            capture_interval_ms: 100,
            monitor_interval_ms: 500,
            escape_window_ms: 300,
            scrollback_lines: 500,
        }
    }
}
