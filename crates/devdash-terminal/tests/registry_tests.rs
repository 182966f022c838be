mod common;

use std::sync::Arc;

use common::{assistant_launch, registry, shell_launch, FakeMultiplexer};
use devdash_terminal::{SessionJournal, SessionRegistry, SessionState};
use tempfile::TempDir;

#[cfg(test)]
mod registry_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let mux = FakeMultiplexer::new();
        let registry = registry(&mux);

        let first = registry.get_or_create("7c1d0e2f-aaaa", assistant_launch());
        // a second call keeps the original launch configuration
        let second = registry.get_or_create("7c1d0e2f-aaaa", shell_launch());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.multiplexer_name(), "devdash-ai-7c1d0e2f");
        assert_eq!(second.launch_config().command, "claude");
        assert_eq!(registry.len(), 1);
        assert_eq!(mux.create_count(), 0);
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let mux = FakeMultiplexer::new();
        let registry = registry(&mux);

        assert!(registry.get("missing").is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_session_ids_are_sorted() {
        let mux = FakeMultiplexer::new();
        let registry = registry(&mux);
        registry.get_or_create("zeta", shell_launch());
        registry.get_or_create("alpha", shell_launch());
        registry.get_or_create("mid", assistant_launch());

        assert_eq!(registry.session_ids(), vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_stops_session() {
        let mux = FakeMultiplexer::new();
        let registry = registry(&mux);
        let session = registry.get_or_create("gone", shell_launch());
        session.set_size(100, 30).await.unwrap();
        session.start(None).await.unwrap();

        assert!(registry.remove("gone").await);
        assert_eq!(session.state(), SessionState::Exited);
        assert!(mux.state().killed.contains(&"devdash-sh-gone".to_string()));
        assert!(registry.get("gone").is_none());

        assert!(!registry.remove("gone").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_then_recreate_launches_again() {
        let mux = FakeMultiplexer::new();
        let registry = registry(&mux);
        let session = registry.get_or_create("again", shell_launch());
        session.set_size(100, 30).await.unwrap();
        session.start(None).await.unwrap();
        registry.remove("again").await;

        let fresh = registry.get_or_create("again", shell_launch());
        assert!(!Arc::ptr_eq(&session, &fresh));
        fresh.set_size(100, 30).await.unwrap();
        fresh.start(None).await.unwrap();
        assert_eq!(fresh.state(), SessionState::Running);
        assert_eq!(mux.create_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all() {
        let mux = FakeMultiplexer::new();
        let registry = registry(&mux);
        for id in ["one", "two", "three"] {
            let session = registry.get_or_create(id, shell_launch());
            session.set_size(100, 30).await.unwrap();
            session.start(None).await.unwrap();
        }
        assert_eq!(mux.state().live.len(), 3);

        registry.stop_all().await;
        assert!(mux.state().live.is_empty());
        assert_eq!(registry.len(), 3);
        for id in registry.session_ids() {
            assert_eq!(registry.get(&id).unwrap().state(), SessionState::Exited);
        }
    }

    #[tokio::test]
    async fn test_reap_only_touches_own_prefix() {
        let mux = FakeMultiplexer::new();
        for name in ["devdash-ai-1", "devdash-sh-2", "work", "devdash"] {
            mux.add_live(name);
        }
        let registry = registry(&mux);

        let reaped = registry.reap_orphans().await.unwrap();
        assert_eq!(reaped, 2);

        let live: Vec<String> = mux.state().live.iter().cloned().collect();
        assert_eq!(live, vec!["devdash".to_string(), "work".to_string()]);
    }

    #[tokio::test]
    async fn test_reap_with_no_sessions() {
        let mux = FakeMultiplexer::new();
        let registry = registry(&mux);
        assert_eq!(registry.reap_orphans().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_journal_records_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let journal = SessionJournal::open(temp_dir.path()).unwrap();
        let path = journal.path().to_path_buf();
        let mux = FakeMultiplexer::new();
        let registry = SessionRegistry::new(mux.clone())
            .with_timings(common::test_timings())
            .with_journal(journal);

        let session = registry.get_or_create("logged", shell_launch());
        session.start(None).await.unwrap();
        session.set_size(90, 30).await.unwrap();
        session.stop().await;

        let content = std::fs::read_to_string(&path).unwrap();
        let events: Vec<String> = content
            .lines()
            .map(|line| {
                let entry: serde_json::Value = serde_json::from_str(line).unwrap();
                assert_eq!(entry["multiplexer_name"], "devdash-sh-logged");
                entry["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(events, vec!["defer", "launch", "stop"]);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_yields_one_session() {
        let mux = FakeMultiplexer::new();
        let registry = Arc::new(registry(&mux));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get_or_create("shared", shell_launch()) })
            })
            .collect();

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_start_creates_once() {
        let mux = FakeMultiplexer::new();
        let registry = Arc::new(registry(&mux));
        let session = registry.get_or_create("race", shell_launch());
        session.set_size(100, 30).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.start(None).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(mux.create_count(), 1);
        session.stop().await;
    }
}
