//! Pipeline configuration: input/output locations and series labels.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{OvershootError, Result};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base directory the data and figure directories are resolved against
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub figures_dir: PathBuf,
    pub trends_file: String,
    pub figure_name: String,
    /// `Record` label of the total ecological footprint rows
    pub footprint_label: String,
    /// `Record` label of the total biocapacity rows
    pub biocapacity_label: String,
    /// First year shown on the chart's x-axis
    pub display_start: i32,
    /// Last year shown on the chart's x-axis
    pub display_end: i32,
    /// Divisor converting debt in days into debt in years
    pub days_per_year: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            data_dir: PathBuf::from("data"),
            figures_dir: PathBuf::from("figures"),
            trends_file: "Country_Trends.csv".to_string(),
            figure_name: "Evolution_ecological_debt.png".to_string(),
            footprint_label: "EFConsTotGHA".to_string(),
            biocapacity_label: "BiocapTotGHA".to_string(),
            display_start: 1961,
            display_end: 2025,
            days_per_year: 365.25,
        }
    }
}

impl PipelineConfig {
    pub fn trends_path(&self) -> PathBuf {
        self.root.join(&self.data_dir).join(&self.trends_file)
    }

    pub fn figures_path(&self) -> PathBuf {
        self.root.join(&self.figures_dir)
    }

    pub fn figure_path(&self) -> PathBuf {
        self.figures_path().join(&self.figure_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.footprint_label.trim().is_empty() || self.biocapacity_label.trim().is_empty() {
            return Err(OvershootError::InvalidParameter(
                "record labels must not be empty".into(),
            ));
        }
        if self.footprint_label == self.biocapacity_label {
            return Err(OvershootError::InvalidParameter(format!(
                "footprint and biocapacity labels are both '{}'",
                self.footprint_label
            )));
        }
        if self.display_end <= self.display_start {
            return Err(OvershootError::InvalidParameter(format!(
                "display window {}..{} is empty",
                self.display_start, self.display_end
            )));
        }
        if !(self.days_per_year.is_finite() && self.days_per_year > 0.0) {
            return Err(OvershootError::InvalidParameter(format!(
                "days_per_year must be positive, got {}",
                self.days_per_year
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = PipelineConfig {
            root: PathBuf::from("/srv/eco"),
            ..PipelineConfig::default()
        };
        assert_eq!(
            config.trends_path(),
            PathBuf::from("/srv/eco/data/Country_Trends.csv")
        );
        assert_eq!(
            config.figure_path(),
            PathBuf::from("/srv/eco/figures/Evolution_ecological_debt.png")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"figures_dir": "out", "display_end": 2030}"#).unwrap();
        assert_eq!(config.figures_dir, PathBuf::from("out"));
        assert_eq!(config.display_end, 2030);
        assert_eq!(config.footprint_label, "EFConsTotGHA");
        assert!((config.days_per_year - 365.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_identical_labels() {
        let config = PipelineConfig {
            biocapacity_label: "EFConsTotGHA".into(),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(OvershootError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_window() {
        let config = PipelineConfig {
            display_start: 2025,
            display_end: 2025,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
