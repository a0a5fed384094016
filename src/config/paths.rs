//! Where voice-link keeps its `settings.toml`.
//!
//! The file lives in a `voice-link` directory under the platform config
//! root reported by `dirs`:
//!
//!   Windows: %APPDATA%\voice-link\settings.toml
//!   macOS:   ~/Library/Application Support/voice-link/settings.toml
//!   Linux:   ~/.config/voice-link/settings.toml
//!
//! Nothing else is written to disk.

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-link";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
