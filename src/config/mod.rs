//! Configuration loading and management.

pub mod loader;
pub mod model;

pub use loader::{load, load_and_validate, load_from_path};
pub use model::{AppConfig, Quality};
