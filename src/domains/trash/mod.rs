pub mod archive;
pub mod db_trash;
pub mod entity;
pub mod errors;
pub mod resolver;

pub use archive::TrashArchive;
pub use entity::{
    FolderChoice, RestoreRequest, SweepReport, TrashItem, TrashResourceType,
    WorktreeTrashMetadata,
};
pub use errors::TrashError;
