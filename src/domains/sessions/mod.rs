pub mod db_sessions;
pub mod entity;
pub mod errors;
pub mod lifecycle;
pub mod registry;

pub use entity::{NewSession, Session, SessionPatch, SessionStatus, WorktreeRequest};
pub use errors::SessionError;
pub use registry::SessionRegistry;
