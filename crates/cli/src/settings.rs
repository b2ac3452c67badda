use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use faceveil_core::concealment::domain::concealment_config::{
    ConcealmentShape, DEFAULT_BLOCK_SIZE, DEFAULT_FEATHER_RADIUS, DEFAULT_OPACITY,
    DEFAULT_STRENGTH,
};
use faceveil_core::detection::infrastructure::onnx_face_analyzer::DEFAULT_CONFIDENCE;
use faceveil_core::shared::constants::DEFAULT_SIMILARITY_THRESHOLD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Circle,
    Ellipse,
    #[value(alias = "rect")]
    Rectangle,
    Mosaic,
    Pixelate,
}

impl From<Shape> for ConcealmentShape {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Circle => ConcealmentShape::Circle,
            Shape::Ellipse => ConcealmentShape::Ellipse,
            Shape::Rectangle => ConcealmentShape::Rectangle,
            Shape::Mosaic => ConcealmentShape::Mosaic,
            Shape::Pixelate => ConcealmentShape::Pixelate,
        }
    }
}

/// Job parameters that persist between runs. Missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub shape: Shape,
    pub strength: u32,
    pub feather: u32,
    pub opacity: f32,
    pub block_size: u32,
    pub threshold: f32,
    pub confidence: f64,
    pub whitelist_dir: Option<PathBuf>,
    pub models_dir: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub workers: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shape: Shape::Circle,
            strength: DEFAULT_STRENGTH,
            feather: DEFAULT_FEATHER_RADIUS,
            opacity: DEFAULT_OPACITY,
            block_size: DEFAULT_BLOCK_SIZE,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            confidence: DEFAULT_CONFIDENCE,
            whitelist_dir: None,
            models_dir: None,
            ffmpeg: None,
            workers: None,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceVeil").join("settings.json"))
    }

    /// Reads the user's settings file; a missing or unreadable one gives defaults.
    pub fn load() -> Self {
        Self::default_path()
            .filter(|path| path.is_file())
            .and_then(|path| match Self::load_from(&path) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    log::warn!("Ignoring settings file {}: {e}", path.display());
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Reads an explicitly requested settings file; any failure is an error.
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("cannot read settings {}: {e}", path.display()))?;
        let settings = serde_json::from_str(&json)
            .map_err(|e| format!("invalid settings {}: {e}", path.display()))?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
