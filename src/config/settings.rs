//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Missing keys fall back to their defaults, so a partial `settings.toml` is
//! valid.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::capture::DEFAULT_FILTER_ALPHA;
use crate::audio::jitter::DEFAULT_PLAYBACK_BUFFER_MS;
use crate::audio::{CaptureConfig, DeviceSelection, PlaybackConfig};
use crate::transport::websocket::validate_url;

// ---------------------------------------------------------------------------
// TransportConfig
// ---------------------------------------------------------------------------

/// Where to connect and how long to wait for the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// WebSocket endpoint of the peer (`ws://` or `wss://`).
    pub url: String,
    /// Seconds to wait for the WebSocket handshake before giving up.
    pub connect_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8081/ws".into(),
            connect_timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Device selection and pipeline sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name — `None` means the system default.
    pub input_device: Option<String>,
    /// Output device name — `None` means the system default.
    pub output_device: Option<String>,
    /// Fixed engine block size in frames — `None` lets the device choose.
    pub block_size: Option<u32>,
    /// Capture low-pass smoothing coefficient, in `(0, 1]`.  Lower is
    /// smoother.
    pub filter_alpha: f32,
    /// Capacity of the lock-free playback ring in milliseconds.  Audio that
    /// arrives while it is full waits in a staging queue.
    pub playback_buffer_ms: u32,
    /// Transport frames buffered between the capture callback and the
    /// network task.
    pub capture_queue_frames: usize,
    /// Start the session with the microphone muted.
    pub start_muted: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            block_size: None,
            filter_alpha: DEFAULT_FILTER_ALPHA,
            playback_buffer_ms: DEFAULT_PLAYBACK_BUFFER_MS,
            capture_queue_frames: 50,
            start_muted: false,
        }
    }
}

impl AudioConfig {
    pub fn device_selection(&self) -> DeviceSelection {
        DeviceSelection {
            input: self.input_device.clone(),
            output: self.output_device.clone(),
            block_size: self.block_size,
        }
    }

    /// Capture parameters for an input device running at `native_rate`.
    pub fn capture(&self, native_rate: u32) -> CaptureConfig {
        CaptureConfig {
            filter_alpha: self.filter_alpha,
            ..CaptureConfig::new(native_rate)
        }
    }

    /// Playback parameters for an output device running at `native_rate`.
    pub fn playback(&self, native_rate: u32) -> PlaybackConfig {
        PlaybackConfig {
            buffer_ms: self.playback_buffer_ms,
            ..PlaybackConfig::new(native_rate)
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_link::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Peer connection settings.
    pub transport: TransportConfig,
    /// Device and pipeline settings.
    pub audio: AudioConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns `true` when no `settings.toml` file exists yet.
    pub fn is_first_run() -> bool {
        !AppPaths::new().settings_file.exists()
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.transport.url)
            .with_context(|| format!("transport.url = {:?}", self.transport.url))?;
        ensure!(
            self.transport.connect_timeout_secs > 0,
            "transport.connect_timeout_secs must be positive"
        );

        let alpha = self.audio.filter_alpha;
        ensure!(
            alpha > 0.0 && alpha <= 1.0,
            "audio.filter_alpha must be in (0, 1], got {alpha}"
        );
        ensure!(
            self.audio.playback_buffer_ms > 0,
            "audio.playback_buffer_ms must be positive"
        );
        ensure!(
            self.audio.capture_queue_frames > 0,
            "audio.capture_queue_frames must be positive"
        );
        if let Some(frames) = self.audio.block_size {
            ensure!(frames > 0, "audio.block_size must be positive");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
