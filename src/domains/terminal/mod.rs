pub mod bridge;
pub mod tmux;

pub use bridge::{ControlSequence, ProcessError, ProcessSessionBridge};
pub use tmux::TmuxBridge;
