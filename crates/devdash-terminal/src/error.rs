use thiserror::Error;

/// Errors surfaced by terminal sessions and the multiplexer backend.
///
/// Unexpected termination of a hosted program is not an error: it is reported
/// through the session's exit callback.
#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("failed to launch session '{name}': {source}")]
    LaunchFailed {
        name: String,
        #[source]
        source: Box<TerminalError>,
    },

    #[error("multiplexer command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("multiplexer unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected multiplexer output: {0}")]
    Parse(String),

    #[error("session '{0}' has exited; remove it and create a new one")]
    Exited(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TerminalError>;
