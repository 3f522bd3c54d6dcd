//! Build the annual records table from labelled yearly totals.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{Boundary, OvershootError, PipelineConfig, Result};

/// One year of global totals, in global hectares.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YearTotals {
    pub year: i32,
    pub eco_footprint: f64,
    pub biocapacity: f64,
}

#[derive(Clone, Debug)]
pub struct AnnualRecord {
    pub year: i32,
    pub eco_footprint: f64,
    pub biocapacity: f64,
    pub geometry: Option<Boundary>,
}

/// Annual records ordered by year, one row per calendar year without gaps.
#[derive(Clone, Debug)]
pub struct AnnualTable {
    records: Vec<AnnualRecord>,
}

impl AnnualTable {
    /// Validate and wrap yearly totals, attaching `geometry` to every row.
    pub fn from_totals(totals: Vec<YearTotals>, geometry: Option<Boundary>) -> Result<Self> {
        if totals.is_empty() {
            return Err(OvershootError::EmptyTable);
        }
        for pair in totals.windows(2) {
            let (previous, next) = (pair[0].year, pair[1].year);
            if next <= previous {
                return Err(OvershootError::UnorderedYears { previous, next });
            }
            if next != previous + 1 {
                return Err(OvershootError::YearGap { previous, next });
            }
        }
        for row in &totals {
            check_total(row.year, "ecological footprint", row.eco_footprint)?;
            check_total(row.year, "biocapacity", row.biocapacity)?;
        }

        let records = totals
            .into_iter()
            .map(|row| AnnualRecord {
                year: row.year,
                eco_footprint: row.eco_footprint,
                biocapacity: row.biocapacity,
                geometry: geometry.clone(),
            })
            .collect();
        Ok(Self { records })
    }

    pub fn records(&self) -> &[AnnualRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.records.iter().map(|r| r.year)
    }
}

fn check_total(year: i32, field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(OvershootError::InvalidValue { year, field, value })
    }
}

#[derive(Debug, Deserialize)]
struct TrendRow {
    year: i32,
    #[serde(rename = "Record")]
    record: String,
    #[serde(rename = "Total")]
    total: Option<f64>,
}

#[derive(Default)]
struct PendingYear {
    footprint: Option<Option<f64>>,
    biocapacity: Option<Option<f64>>,
}

/// Load the trends CSV at `path` into an [`AnnualTable`].
pub fn load_annual_records(
    path: &Path,
    config: &PipelineConfig,
    geometry: Option<Boundary>,
) -> Result<AnnualTable> {
    debug!("Reading trends from {}", path.display());
    let file = File::open(path)?;
    read_annual_records(file, config, geometry)
}

/// Read labelled totals from any CSV source.
///
/// Rows whose `Record` label is neither the footprint nor the biocapacity
/// label are ignored. A repeated (year, label) pair keeps its first value.
pub fn read_annual_records<R: Read>(
    source: R,
    config: &PipelineConfig,
    geometry: Option<Boundary>,
) -> Result<AnnualTable> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
    let mut years: BTreeMap<i32, PendingYear> = BTreeMap::new();

    for row in reader.deserialize::<TrendRow>() {
        let row = row?;
        let is_footprint = row.record == config.footprint_label;
        if !is_footprint && row.record != config.biocapacity_label {
            continue;
        }
        let pending = years.entry(row.year).or_default();
        let slot = if is_footprint {
            &mut pending.footprint
        } else {
            &mut pending.biocapacity
        };
        if slot.is_some() {
            warn!(
                "Duplicate '{}' row for {}; keeping the first",
                row.record, row.year
            );
            continue;
        }
        *slot = Some(row.total);
    }

    if years.is_empty() {
        return Err(OvershootError::EmptyTable);
    }

    let mut totals = Vec::with_capacity(years.len());
    for (year, pending) in years {
        let eco_footprint = pending
            .footprint
            .flatten()
            .ok_or_else(|| missing(year, &config.footprint_label))?;
        let biocapacity = pending
            .biocapacity
            .flatten()
            .ok_or_else(|| missing(year, &config.biocapacity_label))?;
        totals.push(YearTotals {
            year,
            eco_footprint,
            biocapacity,
        });
    }

    let table = AnnualTable::from_totals(totals, geometry)?;
    debug!("Loaded {} annual records", table.len());
    Ok(table)
}

fn missing(year: i32, label: &str) -> OvershootError {
    OvershootError::MissingRecord {
        year,
        label: label.to_string(),
    }
}
