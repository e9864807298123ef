//! Run configuration.
//!
//! Every field has a compiled-in default matching the Atlantic MIS study; a
//! JSON file may override any subset of them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::TwoSlopeNorm;
use crate::data::filter::LongitudeBand;
use crate::data::model::StageInterval;
use crate::data::pipeline::Pipeline;

/// Panels in the figure grid (3 rows × 2 columns).
pub const PANEL_COUNT: usize = 6;

/// Largest figure edge, pixels.
pub const MAX_FIGURE_EDGE: u32 = 8192;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorScaleConfig {
    pub center: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for ColorScaleConfig {
    fn default() -> Self {
        Self {
            center: 0.3,
            min: -0.5,
            max: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FigureSize {
    pub width: u32,
    pub height: u32,
}

impl Default for FigureSize {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// The two core databases, merged in this order.
    pub sources: Vec<PathBuf>,
    /// Inclusive `[west, east]` longitude window.
    pub longitude_band: [f64; 2],
    /// Stage intervals in assignment order.
    pub stages: Vec<StageInterval>,
    pub min_group_size: usize,
    pub color_scale: ColorScaleConfig,
    /// Stage labels in panel order, row-major.
    pub display_order: Vec<String>,
    pub figure: FigureSize,
    /// Write the rendered figure here as PNG.
    pub output: Option<PathBuf>,
    pub show_window: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                PathBuf::from("Oliver2010_core_database.csv"),
                PathBuf::from("additional_core_database.csv"),
            ],
            longitude_band: [LongitudeBand::ATLANTIC.west, LongitudeBand::ATLANTIC.east],
            stages: vec![
                StageInterval::new("MIS1", 0.0, 5.0),
                StageInterval::new("MIS2", 19.0, 24.0),
                StageInterval::new("MIS4", 61.0, 66.0),
                StageInterval::new("MIS5d", 108.0, 114.0),
                StageInterval::new("MIS5e", 120.0, 130.0),
                StageInterval::new("MIS6", 137.0, 142.0),
            ],
            min_group_size: 3,
            color_scale: ColorScaleConfig::default(),
            display_order: ["MIS1", "MIS2", "MIS5e", "MIS6", "MIS5d", "MIS4"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            figure: FigureSize::default(),
            output: None,
            show_window: true,
        }
    }
}

impl AppConfig {
    /// Read and validate a JSON config. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.to_path_buf(),
            source,
        })?;
        let config: AppConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path_ref.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("no sources given".into()));
        }
        let [west, east] = self.longitude_band;
        if west > east {
            return Err(ConfigError::Invalid(format!(
                "longitude band [{west}, {east}] is reversed"
            )));
        }
        for stage in &self.stages {
            if stage.min_age > stage.max_age {
                return Err(ConfigError::Invalid(format!("stage {stage} is reversed")));
            }
        }
        let c = &self.color_scale;
        if !(c.min < c.center && c.center < c.max) {
            return Err(ConfigError::Invalid(format!(
                "color scale needs min < center < max, got {} / {} / {}",
                c.min, c.center, c.max
            )));
        }
        if self.display_order.len() != PANEL_COUNT {
            return Err(ConfigError::Invalid(format!(
                "display order needs {PANEL_COUNT} stages, got {}",
                self.display_order.len()
            )));
        }
        let mut seen = HashSet::new();
        for label in &self.display_order {
            if !self.stages.iter().any(|s| &s.label == label) {
                return Err(ConfigError::Invalid(format!(
                    "display order names unknown stage '{label}'"
                )));
            }
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "display order repeats stage '{label}'"
                )));
            }
        }
        let FigureSize { width, height } = self.figure;
        if !(1..=MAX_FIGURE_EDGE).contains(&width) || !(1..=MAX_FIGURE_EDGE).contains(&height) {
            return Err(ConfigError::Invalid(format!(
                "figure size {width}x{height} must be within 1..={MAX_FIGURE_EDGE} on each edge"
            )));
        }
        Ok(())
    }

    pub fn pipeline(&self) -> Pipeline {
        let [west, east] = self.longitude_band;
        Pipeline::new(
            LongitudeBand { west, east },
            self.stages.clone(),
            self.min_group_size,
        )
    }

    pub fn norm(&self) -> TwoSlopeNorm {
        let c = &self.color_scale;
        TwoSlopeNorm::new(c.center, c.min, c.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(body: &str) -> tempfile::TempPath {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(body.as_bytes()).unwrap();
        temp.into_temp_path()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.stages.len(), 6);
        assert_eq!(cfg.pipeline().min_group_size, 3);
        assert_eq!(cfg.norm(), TwoSlopeNorm::new(0.3, -0.5, 1.5));
    }

    #[test]
    fn load_overrides_only_given_fields() {
        let path = write_config(r#"{ "output": "atlantic.png", "show_window": false }"#);
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.output, Some(PathBuf::from("atlantic.png")));
        assert!(!cfg.show_window);
        assert_eq!(cfg.display_order, AppConfig::default().display_order);
    }

    #[test]
    fn load_reads_custom_stages() {
        let path = write_config(
            r#"{
                "stages": [
                    {"label": "A", "min_age": 0, "max_age": 1},
                    {"label": "B", "min_age": 2, "max_age": 3},
                    {"label": "C", "min_age": 4, "max_age": 5},
                    {"label": "D", "min_age": 6, "max_age": 7},
                    {"label": "E", "min_age": 8, "max_age": 9},
                    {"label": "F", "min_age": 10, "max_age": 11}
                ],
                "display_order": ["F", "E", "D", "C", "B", "A"]
            }"#,
        );
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.pipeline().stages[5], StageInterval::new("F", 10.0, 11.0));
    }

    #[test]
    fn unknown_display_stage_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.display_order[0] = "MIS3".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn repeated_display_stage_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.display_order = vec!["MIS1".to_string(); PANEL_COUNT];
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("repeats stage 'MIS1'"));
    }

    #[test]
    fn oversized_figure_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.figure = FigureSize {
            width: 100_000,
            height: 100_000,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        cfg.figure.width = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn display_order_needs_six_panels() {
        let mut cfg = AppConfig::default();
        cfg.display_order.pop();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn color_scale_must_bracket_center() {
        let mut cfg = AppConfig::default();
        cfg.color_scale.center = 2.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_fields_are_a_parse_error() {
        let path = write_config(r#"{ "longitude": [0, 1] }"#);
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
