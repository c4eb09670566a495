//! Configuration and dependency wiring.

pub mod dependencies;
pub mod settings;

pub use dependencies::{connect_index, ConnectionMode, Dependencies};
pub use settings::IndexerConfig;
