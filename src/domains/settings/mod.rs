pub mod types;

pub use types::{CoreSettings, SettingsError};
