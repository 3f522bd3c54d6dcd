//! Figure data for the cumulative debt bar chart.
//!
//! Drawing is done by the CLI; this module only decides what is drawn.

use serde::Serialize;

use crate::{DebtTable, PipelineConfig};

pub const TITLE: &str = "Evolution of the humanity ecological debt";
pub const X_LABEL: &str = "Year";
pub const Y_LABEL: &str = "Cumulated ecological debt (years)";

/// Tick spacing as (major, minor), in axis units.
pub const X_TICKS: (f64, f64) = (10.0, 5.0);
pub const Y_TICKS: (f64, f64) = (5.0, 1.0);

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Bar {
    pub year: i32,
    /// Cumulative debt in years
    pub value: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct DebtChart {
    pub bars: Vec<Bar>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub legend: String,
    /// Cumulative debt of the last row, in years
    pub final_debt_years: f64,
}

impl DebtChart {
    pub fn from_records(table: &DebtTable, config: &PipelineConfig) -> Self {
        let bars: Vec<Bar> = table
            .records()
            .iter()
            .map(|r| Bar {
                year: r.year(),
                value: r.cumulative_debt / config.days_per_year,
            })
            .collect();

        let final_debt_years = bars.last().map_or(0.0, |b| b.value);
        let horizon = table
            .records()
            .last()
            .map_or(config.display_end, |r| r.year() + 1);
        let legend = format!(
            "Cumulated debt before {}: {:.2} years",
            horizon, final_debt_years
        );

        let y_max = bars.iter().map(|b| b.value).fold(0.0_f64, f64::max);
        let y_min = bars.iter().map(|b| b.value).fold(0.0_f64, f64::min);
        // Round the top up to a major tick and leave room for the legend.
        let y_top = ((y_max * 1.1) / Y_TICKS.0).ceil().max(1.0) * Y_TICKS.0;

        Self {
            bars,
            x_range: (config.display_start as f64, config.display_end as f64),
            y_range: (y_min, y_top),
            legend,
            final_debt_years,
        }
    }

    /// Bars falling inside the display window.
    pub fn visible_bars(&self) -> impl Iterator<Item = &Bar> + '_ {
        let (start, end) = self.x_range;
        self.bars
            .iter()
            .filter(move |b| (b.year as f64) >= start && (b.year as f64) <= end)
    }
}
