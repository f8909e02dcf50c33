pub mod coordinator;
pub mod db_splits;
pub mod entity;
pub mod errors;
pub mod layout;

pub use coordinator::SplitCoordinator;
pub use entity::{PaneLayout, SplitDirection, SplitGroup, SplitLayout, SplitMember, SplitRemoval};
pub use errors::SplitError;
