use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;

use crate::domains::git::{GitCli, VersionControl, WorktreeManager};
use crate::domains::sessions::SessionRegistry;
use crate::domains::settings::CoreSettings;
use crate::domains::splits::SplitCoordinator;
use crate::domains::terminal::{ProcessSessionBridge, TmuxBridge};
use crate::domains::trash::TrashArchive;
use crate::infrastructure::database::Database;

/// The wired set of components a transport layer talks to. Cloning is cheap;
/// every component shares the same database pool and adapters.
#[derive(Clone)]
pub struct CoreServices {
    pub settings: CoreSettings,
    pub database: Database,
    pub sessions: SessionRegistry,
    pub splits: SplitCoordinator,
    pub trash: TrashArchive,
}

impl CoreServices {
    /// Opens the database named by `settings` and wires the tmux and git
    /// adapters.
    pub fn open(settings: CoreSettings) -> anyhow::Result<Self> {
        settings.validate().context("Invalid settings")?;
        let database = Database::new(Some(settings.database_path.clone()))?;
        let timeout = settings.command_timeout();

        let tmux = TmuxBridge::new(settings.tmux_binary.clone(), timeout);
        if !tmux.is_available() {
            warn!(
                "'{}' not found on PATH; sessions cannot be started until it is installed",
                settings.tmux_binary
            );
        }
        let git = GitCli::new(settings.git_binary.clone(), timeout);

        let services = Self::with_adapters(settings, database, Arc::new(tmux), Arc::new(git));
        info!(
            "Core services ready (database {})",
            services.database.path().display()
        );
        Ok(services)
    }

    /// Wires the components over caller-supplied adapters.
    pub fn with_adapters(
        settings: CoreSettings,
        database: Database,
        bridge: Arc<dyn ProcessSessionBridge>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        let worktrees = WorktreeManager::new(vcs, settings.worktree_dir_suffix.clone());
        let sessions = SessionRegistry::new(database.clone(), bridge, worktrees, &settings);
        let splits = SplitCoordinator::new(sessions.clone());
        let trash = TrashArchive::new(sessions.clone(), &settings);
        Self {
            settings,
            database,
            sessions,
            splits,
            trash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sessions::NewSession;
    use crate::test_support::{FakeProcessBridge, FakeVcs};
    use tempfile::TempDir;

    #[test]
    fn open_rejects_invalid_settings() {
        let temp = TempDir::new().unwrap();
        let settings = CoreSettings {
            database_path: temp.path().join("core.db"),
            trash_retention_days: 0,
            ..CoreSettings::default()
        };
        assert!(CoreServices::open(settings).is_err());
        assert!(!temp.path().join("core.db").exists());
    }

    #[test]
    fn open_creates_database_file() {
        let temp = TempDir::new().unwrap();
        let settings = CoreSettings {
            database_path: temp.path().join("nested").join("core.db"),
            tmux_binary: "tabwerk-missing-tmux".to_string(),
            ..CoreSettings::default()
        };
        let services = CoreServices::open(settings).unwrap();
        assert!(services.database.path().exists());
        assert!(services.sessions.list("alice", &[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn components_share_one_store() {
        let temp = TempDir::new().unwrap();
        let settings = CoreSettings {
            database_path: temp.path().join("core.db"),
            default_working_directory: Some(temp.path().to_path_buf()),
            ..CoreSettings::default()
        };
        let database = Database::new(Some(settings.database_path.clone())).unwrap();
        let services = CoreServices::with_adapters(
            settings,
            database,
            Arc::new(FakeProcessBridge::default()),
            Arc::new(FakeVcs::default()),
        );

        let session = services
            .sessions
            .create(
                "alice",
                NewSession {
                    name: "shell".to_string(),
                    ..NewSession::default()
                },
            )
            .await
            .unwrap();
        let layout = services
            .splits
            .create_split(
                "alice",
                &session.id,
                crate::domains::splits::SplitDirection::Vertical,
                None,
            )
            .await
            .unwrap();
        assert_eq!(layout.members.len(), 2);
        assert!(services.trash.list("alice").unwrap().is_empty());
    }
}
