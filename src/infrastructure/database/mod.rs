pub mod connection;
pub mod db_folders;
pub mod db_schema;
pub mod timestamps;

pub use connection::Database;
pub use db_folders::{Folder, FolderMethods, RepositoryRecord};
pub use db_schema::initialize_schema;
