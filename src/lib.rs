pub mod backends;
pub mod base_config;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod health;
pub mod initializer;
pub mod operator;
pub mod runner;
pub mod sequencer;
pub mod state;
pub mod unseal;
pub mod vault;

pub use config::Settings;
pub use error::BootstrapError;
pub use sequencer::{BootstrapReady, BootstrapSequencer};
