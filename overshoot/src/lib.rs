//! Ecological overshoot day and cumulative ecological debt, computed from
//! global biocapacity and ecological footprint time series.
//!
//! The pipeline is strictly linear:
//! [`load_annual_records`] → [`determine_overshoot_day`] →
//! [`calculate_ecological_debt`] → [`DebtChart::from_records`].
//! Every stage borrows the previous table and returns a new one with extra
//! columns, so re-running it on the same input yields identical output.

use thiserror::Error;

pub mod boundary;
pub mod chart;
pub mod config;
pub mod debt;
pub mod loader;
pub mod overshoot_day;

pub use boundary::{union_boundaries, Boundary};
pub use chart::{Bar, DebtChart};
pub use config::PipelineConfig;
pub use debt::{calculate_ecological_debt, DebtRecord, DebtTable};
pub use loader::{load_annual_records, read_annual_records, AnnualRecord, AnnualTable, YearTotals};
pub use overshoot_day::{
    days_in_year, determine_overshoot_day, is_leap_year, OvershootDate, OvershootRecord,
};

#[derive(Error, Debug)]
pub enum OvershootError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("year {year} has no '{label}' total")]
    MissingRecord { year: i32, label: String },
    #[error("ecological footprint is zero in {year}; overshoot day is undefined")]
    ZeroFootprint { year: i32 },
    #[error("no year overshoots its biocapacity; ecological debt cannot be accumulated")]
    NoOvershoot,
    #[error("no footprint or biocapacity totals found")]
    EmptyTable,
    #[error("years are not contiguous: {previous} is followed by {next}")]
    YearGap { previous: i32, next: i32 },
    #[error("years are not strictly increasing: {previous} is followed by {next}")]
    UnorderedYears { previous: i32, next: i32 },
    #[error("invalid {field} in {year}: {value}")]
    InvalidValue {
        year: i32,
        field: &'static str,
        value: f64,
    },
    #[error("overshoot day {day} of {year} has no calendar date")]
    DayOutOfRange { year: i32, day: f64 },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, OvershootError>;

/// Run the numeric stages on the trends CSV named by `config`.
///
/// Rendering is left to the caller; a failure in any stage aborts before a
/// table is returned.
pub fn run_pipeline(config: &PipelineConfig, boundary: Option<Boundary>) -> Result<DebtTable> {
    config.validate()?;
    let annual = load_annual_records(&config.trends_path(), config, boundary)?;
    let overshoot = determine_overshoot_day(&annual)?;
    calculate_ecological_debt(&overshoot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_run_pipeline_from_config_root() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(
            data.join("Country_Trends.csv"),
            "year,Record,Total\n\
             1961,EFConsTotGHA,100\n\
             1961,BiocapTotGHA,120\n\
             1962,EFConsTotGHA,150\n\
             1962,BiocapTotGHA,120\n",
        )
        .unwrap();

        let config = PipelineConfig {
            root: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let table = run_pipeline(&config, None).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.first_overshoot_year(), Some(1962));
        assert!((table.final_cumulative_debt() - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_run_pipeline_rejects_invalid_config() {
        let config = PipelineConfig {
            days_per_year: 0.0,
            ..PipelineConfig::default()
        };
        let err = run_pipeline(&config, None).unwrap_err();
        assert!(matches!(err, OvershootError::InvalidParameter(_)));
    }
}
