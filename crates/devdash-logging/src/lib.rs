// Logging module - dashboard directories and diagnostic log file
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use anyhow::{Result, Context};

/// Name of the diagnostic log inside the logs directory
pub const LOG_FILE_NAME: &str = "devdash.log";

fn home_dir() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Failed to get home directory")?;
    Ok(PathBuf::from(home_dir))
}

fn ensure_dir(dir: PathBuf, what: &str) -> Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {} directory", what))?;
    }
    Ok(dir)
}

/// Get or create the base dashboard directory (~/.devdash)
/// Holds the config file and the logs directory
pub fn get_devdash_dir() -> Result<PathBuf> {
    ensure_dir(home_dir()?.join(".devdash"), "devdash")
}

/// Get or create the logs directory (~/.devdash/logs)
pub fn get_logs_dir() -> Result<PathBuf> {
    ensure_dir(get_devdash_dir()?.join("logs"), "logs")
}

/// Filter used when RUST_LOG is not set
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Route the `log` facade to `<logs_dir>/devdash.log`.
///
/// The dashboard owns the terminal, so nothing is written to stderr.
/// RUST_LOG overrides the default filter. Returns the log file path.
pub fn init_logging_in(logs_dir: &Path, verbose: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(logs_dir)
        .context("Failed to create logs directory")?;

    let path = logs_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter(verbose)))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} [{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
        .context("Logger already initialized")?;

    Ok(path)
}

/// Initialize logging into the default logs directory
pub fn init_logging(verbose: bool) -> Result<PathBuf> {
    init_logging_in(&get_logs_dir()?, verbose)
}
