pub mod config;
pub mod error;
pub mod prefs;
pub mod types;

pub use config::ParleyConfig;
pub use error::{ParleyError, Result};
pub use prefs::Preferences;
pub use types::*;
