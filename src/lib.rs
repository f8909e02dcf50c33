//! Lifecycle coordination for persistent terminal sessions: sessions backed
//! by detached multiplexer processes, optional git worktrees, split-pane
//! groups and a recoverable trash for worktree-backed sessions.
//!
//! Transport layers are expected to depend on [`CoreServices`] and map the
//! component errors through their `kind()`.

pub mod domains;
pub mod errors;
pub mod infrastructure;
pub mod logging;
pub mod services;
pub mod shared;

#[cfg(test)]
mod test_support;

pub use domains::git::{GitCli, VcsError, VersionControl, WorktreeError, WorktreeManager};
pub use domains::sessions::{
    NewSession, Session, SessionError, SessionPatch, SessionRegistry, SessionStatus,
    WorktreeRequest,
};
pub use domains::settings::{CoreSettings, SettingsError};
pub use domains::splits::{
    PaneLayout, SplitCoordinator, SplitDirection, SplitError, SplitLayout, SplitRemoval,
};
pub use domains::terminal::{ControlSequence, ProcessError, ProcessSessionBridge, TmuxBridge};
pub use domains::trash::{
    FolderChoice, RestoreRequest, SweepReport, TrashArchive, TrashError, TrashItem,
};
pub use errors::ErrorKind;
pub use infrastructure::database::{Database, Folder, FolderMethods};
pub use services::CoreServices;
