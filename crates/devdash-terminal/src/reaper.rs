use super::backend::Multiplexer;
use super::error::Result;

/// Destroy every multiplexer session whose name starts with `prefix`.
///
/// Run once at startup: a previous run may have crashed or been killed
/// without cleaning up, and the dashboard cannot tell a detach from a crash.
/// Sessions outside the prefix are never touched. Returns the number of
/// sessions destroyed.
pub async fn reap_orphans(mux: &dyn Multiplexer, prefix: &str) -> Result<usize> {
    let mut reaped = 0;
    for name in mux.list_sessions().await? {
        if !name.starts_with(prefix) {
            continue;
        }
        match mux.kill_session(&name).await {
            Ok(()) => {
                log::info!("Reaped orphaned session {}", name);
                reaped += 1;
            }
            Err(e) => log::warn!("Failed to reap {}: {}", name, e),
        }
    }
    Ok(reaped)
}
