use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::core::Rect;
use crate::ui::style::{AnnotationStyle, StyleOverrides};

/// Runtime configuration, read from an optional JSON file
///
/// Every field has a default, so `{}` is a valid config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    /// Lifetime of a temporary `act` box
    pub dismiss_after_ms: u64,
    /// Wait after activating the target before trusting its geometry
    pub settle_delay_ms: u64,
    /// Minimum spacing between processed pointer-downs
    pub click_throttle_ms: u64,
    /// Whether `observe` draws a persistent box for absolute regions
    pub show_observe_box: bool,
    pub temporary_style: StyleOverrides,
    pub persistent_style: StyleOverrides,
    /// Candidate caption fonts, first readable one wins
    pub caption_font_paths: Vec<PathBuf>,
    pub caption_font_px: f32,
    /// Display frames for the headless platform; first is primary
    pub headless_displays: Vec<Rect>,
}

impl BeaconConfig {
    pub const DEFAULT_DISMISS_MS: u64 = 5000;
    pub const MIN_DISMISS_MS: u64 = 250;
    pub const MAX_DISMISS_MS: u64 = 120_000;
    pub const DEFAULT_SETTLE_MS: u64 = 500;
    pub const MAX_SETTLE_MS: u64 = 5000;
    pub const DEFAULT_THROTTLE_MS: u64 = 300;
    pub const MAX_THROTTLE_MS: u64 = 5000;
    pub const DEFAULT_CAPTION_PX: f32 = 14.0;
    pub const MIN_CAPTION_PX: f32 = 8.0;
    pub const MAX_CAPTION_PX: f32 = 72.0;

    /// Loads and sanitizes a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.sanitized())
    }

    /// Defaults when `path` is `None`
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Clamps every value into its supported range
    pub fn sanitized(mut self) -> Self {
        self.dismiss_after_ms = self
            .dismiss_after_ms
            .clamp(Self::MIN_DISMISS_MS, Self::MAX_DISMISS_MS);
        self.settle_delay_ms = self.settle_delay_ms.min(Self::MAX_SETTLE_MS);
        self.click_throttle_ms = self.click_throttle_ms.min(Self::MAX_THROTTLE_MS);
        self.caption_font_px = if self.caption_font_px.is_finite() {
            self.caption_font_px
                .clamp(Self::MIN_CAPTION_PX, Self::MAX_CAPTION_PX)
        } else {
            Self::DEFAULT_CAPTION_PX
        };
        self.headless_displays.retain(|frame| frame.w > 0 && frame.h > 0);
        self
    }

    pub fn dismiss_after(&self) -> Duration {
        Duration::from_millis(self.dismiss_after_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn click_throttle(&self) -> Duration {
        Duration::from_millis(self.click_throttle_ms)
    }

    pub fn temporary_style(&self) -> AnnotationStyle {
        self.temporary_style.apply(AnnotationStyle::temporary())
    }

    pub fn persistent_style(&self) -> AnnotationStyle {
        self.persistent_style.apply(AnnotationStyle::persistent())
    }
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            dismiss_after_ms: Self::DEFAULT_DISMISS_MS,
            settle_delay_ms: Self::DEFAULT_SETTLE_MS,
            click_throttle_ms: Self::DEFAULT_THROTTLE_MS,
            show_observe_box: true,
            temporary_style: StyleOverrides::default(),
            persistent_style: StyleOverrides::default(),
            caption_font_paths: default_font_paths(),
            caption_font_px: Self::DEFAULT_CAPTION_PX,
            headless_displays: Vec::new(),
        }
    }
}

fn default_font_paths() -> Vec<PathBuf> {
    [
        r"C:\Windows\Fonts\segoeui.ttf",
        r"C:\Windows\Fonts\arial.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = BeaconConfig::default();
        assert_eq!(config.dismiss_after(), Duration::from_secs(5));
        assert_eq!(config.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.click_throttle(), Duration::from_millis(300));
        assert!(config.show_observe_box);
    }

    #[test]
    fn empty_object_is_default() {
        let config: BeaconConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BeaconConfig::default());
    }

    #[test]
    fn load_reads_and_sanitizes_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "dismiss_after_ms": 10,
                "click_throttle_ms": 150,
                "caption_font_px": 500.0,
                "headless_displays": [{{"x": 0, "y": 0, "w": 800, "h": 600}}, {{"x": 0, "y": 0, "w": 0, "h": 10}}],
                "persistent_style": {{"line_width": 5.0}}
            }}"#
        )
        .unwrap();

        let config = BeaconConfig::load(file.path()).unwrap();
        assert_eq!(config.dismiss_after_ms, BeaconConfig::MIN_DISMISS_MS);
        assert_eq!(config.click_throttle_ms, 150);
        assert_eq!(config.caption_font_px, BeaconConfig::MAX_CAPTION_PX);
        assert_eq!(config.headless_displays, vec![Rect::new(0, 0, 800, 600)]);
        assert_eq!(config.persistent_style().line_width, 5.0);
        assert_eq!(config.temporary_style(), AnnotationStyle::temporary());
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            BeaconConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            BeaconConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));
        assert_eq!(
            BeaconConfig::load_or_default(None).unwrap(),
            BeaconConfig::default()
        );
    }
}
