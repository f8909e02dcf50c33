pub mod saga;

pub use saga::{CompensationReport, Saga};
