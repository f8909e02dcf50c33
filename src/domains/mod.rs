pub mod git;
pub mod sessions;
pub mod settings;
pub mod splits;
pub mod terminal;
pub mod trash;
