//! Client configuration.

use std::path::Path;

use rdesk_core::{CaptureConfig, FULL_DESKTOP_SCREEN_ID, ScreenId, Size};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Capture loop settings.
    pub capture: CaptureSection,
    /// Displays of the loopback host.
    pub screens: Vec<ScreenConfig>,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Capture loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    /// `"synthetic"` for generated screens, `"platform"` for the native
    /// capturer.
    pub backend: String,
    /// Screen to stream; -1 is the whole desktop.
    pub screen_id: ScreenId,
    /// Target frames per second.
    pub target_fps: u32,
    /// Stop after this many frames; 0 runs until interrupted.
    pub max_frames: u64,
    /// Place captured pixels in shared memory.
    pub use_shared_memory: bool,
}

/// One loopback display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
    /// Optional log file.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSection::default(),
            screens: vec![
                ScreenConfig {
                    title: "Primary".into(),
                    width: 1280,
                    height: 720,
                },
                ScreenConfig {
                    title: "Secondary".into(),
                    width: 800,
                    height: 600,
                },
            ],
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            backend: "synthetic".into(),
            screen_id: FULL_DESKTOP_SCREEN_ID,
            target_fps: 30,
            max_frames: 90,
            use_shared_memory: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────

impl CaptureSection {
    pub fn to_capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            target_fps: self.target_fps,
            screen_id: self.screen_id,
            max_frames: (self.max_frames > 0).then_some(self.max_frames),
        }
    }
}

impl ScreenConfig {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let cfg = Self::default();
        let text = toml::to_string_pretty(&cfg).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ClientConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("target_fps"));
        assert!(text.contains("[[screens]]"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ClientConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.capture.target_fps, 30);
        assert_eq!(parsed.capture.screen_id, FULL_DESKTOP_SCREEN_ID);
        assert_eq!(parsed.screens, cfg.screens);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: ClientConfig = toml::from_str(
            r#"
            [capture]
            screen_id = 1
            max_frames = 0

            [[screens]]
            title = "Only"
            width = 320
            height = 200
            "#,
        )
        .unwrap();

        assert_eq!(parsed.capture.target_fps, 30);
        assert_eq!(parsed.capture.backend, "synthetic");
        assert_eq!(parsed.capture.to_capture_config().max_frames, None);
        assert_eq!(parsed.capture.to_capture_config().screen_id, 1);
        assert_eq!(parsed.screens.len(), 1);
        assert_eq!(parsed.screens[0].size(), Size::new(320, 200));
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn unknown_sections_are_ignored() {
        let parsed: ClientConfig = toml::from_str(
            r#"
            [display]
            width = 1920
            height = 1080
            "#,
        )
        .unwrap();
        assert_eq!(parsed.screens.len(), 2);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = ClientConfig::load(Path::new("/nonexistent/rdesk-client.toml"));
        assert_eq!(cfg.capture.max_frames, 90);
    }

    #[test]
    fn write_default_produces_loadable_file() {
        let path = std::env::temp_dir().join(format!("rdesk-client-{}.toml", std::process::id()));
        ClientConfig::write_default(&path).unwrap();
        let cfg = ClientConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.screens.len(), 2);
    }
}
