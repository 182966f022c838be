//! Resume-token validation.
//!
//! A token is only passed to the hosted program when the transcript it refers
//! to exists and is non-empty. Anything else means a fresh start.

use std::path::{Path, PathBuf};

use super::config::ResumeConfig;

/// Slug used by assistants to key per-project state: every character that is
/// not alphanumeric or `-` becomes `-`.
pub fn work_dir_slug(work_dir: &Path) -> String {
    work_dir
        .to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Expand a transcript template into a concrete path
pub fn transcript_path(template: &str, work_dir: &Path, session_id: &str, token: &str) -> PathBuf {
    let expanded = template
        .replace("{token}", token)
        .replace("{session_id}", session_id)
        .replace("{work_dir_slug}", &work_dir_slug(work_dir));

    match expanded.strip_prefix("~/") {
        Some(rest) => match home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(expanded),
        },
        None => PathBuf::from(expanded),
    }
}

fn has_transcript(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Arguments to append for a resumed launch, or `None` to start fresh
pub fn resume_args(
    resume: &ResumeConfig,
    work_dir: &Path,
    session_id: &str,
    token: &str,
) -> Option<Vec<String>> {
    if token.trim().is_empty() {
        return None;
    }
    let transcript = transcript_path(&resume.transcript, work_dir, session_id, token);
    if !has_transcript(&transcript) {
        log::info!(
            "No transcript at {} for resume token {}; starting fresh",
            transcript.display(),
            token
        );
        return None;
    }
    Some(
        resume
            .args
            .iter()
            .map(|arg| arg.replace("{token}", token))
            .collect(),
    )
}
