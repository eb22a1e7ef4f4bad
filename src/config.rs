//! User configuration, stored as JSON under the platform config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::{UploadPolicy, DEFAULT_MAX_UPLOAD_BYTES};
use crate::error::ConfigError;
use crate::shape::ShapeKind;
use crate::style::{Color, HighlightStyle, ShapeStyle, StyleState, TextStyle};
use crate::tool::ToolMode;

const APP_DIR: &str = "doc-annotate";
const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Tool active when a file is opened.
    pub default_tool: ToolMode,
    /// `None` disables the upload size cap.
    pub max_upload_bytes: Option<u64>,
    pub shape_style: ShapeStyle,
    pub text_style: TextStyle,
    pub highlight: HighlightStyle,
    pub cover_color: Color,
    /// TTF/OTF used to draw text into exported images.
    pub font_path: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_tool: ToolMode::Draw(ShapeKind::Rectangle),
            max_upload_bytes: Some(DEFAULT_MAX_UPLOAD_BYTES),
            shape_style: ShapeStyle::default(),
            text_style: TextStyle::default(),
            highlight: HighlightStyle::default(),
            cover_color: Color::BLACK,
            font_path: None,
        }
    }
}

impl EditorConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the default location. A missing file gives the defaults;
    /// a broken one is reported and ignored.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => {
                log::info!("loaded config from {}", path.display());
                config
            }
            Err(err) => {
                log::warn!("{err}; using defaults");
                Self::default()
            }
        }
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_bytes: self.max_upload_bytes,
        }
    }

    pub fn style_defaults(&self) -> StyleState {
        StyleState {
            shape: self.shape_style,
            text: self.text_style.clone(),
            highlight: self.highlight,
            cover: self.cover_color,
        }
    }
}
