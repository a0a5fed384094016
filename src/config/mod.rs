//! Configuration module for the voice link client.
//!
//! Provides `AppConfig` (top-level settings), the `[transport]` and `[audio]`
//! sections, `AppPaths` for the cross-platform config directory, and TOML
//! persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, AudioConfig, TransportConfig};
