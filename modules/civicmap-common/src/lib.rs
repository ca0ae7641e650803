pub mod config;
pub mod demo;
pub mod error;
pub mod types;

pub use config::Config;
pub use demo::{demo_issues, DEMO_ID_PREFIX};
pub use error::CivicMapError;
pub use types::*;
