pub mod cli;
pub mod worktrees;

pub use cli::{GitCli, VcsError, VersionControl, WorktreeAddOptions};
pub use worktrees::{CreatedWorktree, WorktreeError, WorktreeManager, sanitize_branch_name};
