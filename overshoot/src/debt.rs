//! Annual and cumulative ecological debt, in days.
//!
//! Debt starts accruing in the first year whose overshoot day falls before
//! year end. From then on every overshooting year adds the days it overshot
//! by, and every surplus year repays up to its surplus, never more than what
//! is still owed.

use std::ops::RangeInclusive;

use tracing::debug;

use crate::{OvershootError, OvershootRecord, Result};

#[derive(Clone, Debug)]
pub struct DebtRecord {
    pub overshoot: OvershootRecord,
    /// Debt incurred this year in days; negative when debt is repaid and NaN
    /// before the first overshoot year.
    pub annual_debt: f64,
    /// Sum of `annual_debt` over all previous years, NaN counted as zero.
    pub cumulative_debt: f64,
}

impl DebtRecord {
    pub fn year(&self) -> i32 {
        self.overshoot.year()
    }
}

#[derive(Clone, Debug)]
pub struct DebtTable {
    records: Vec<DebtRecord>,
    first_overshoot: usize,
}

impl DebtTable {
    pub fn records(&self) -> &[DebtRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_overshoot_year(&self) -> Option<i32> {
        self.records.get(self.first_overshoot).map(DebtRecord::year)
    }

    /// First and last year of the table.
    ///
    /// A table always holds its first overshoot year, so it is never empty.
    pub fn year_range(&self) -> RangeInclusive<i32> {
        let first = self.records[0].year();
        let last = self.records[self.records.len() - 1].year();
        first..=last
    }

    /// Cumulative debt carried into the last year of the table, in days.
    pub fn final_cumulative_debt(&self) -> f64 {
        self.records.last().map_or(0.0, |r| r.cumulative_debt)
    }
}

/// Accumulate the ecological debt ledger over `records`, which must be
/// ordered by year.
pub fn calculate_ecological_debt(records: &[OvershootRecord]) -> Result<DebtTable> {
    let over: Vec<f64> = records.iter().map(OvershootRecord::over).collect();
    let first_overshoot = over
        .iter()
        .position(|&o| o < 0.0)
        .ok_or(OvershootError::NoOvershoot)?;

    let mut debt = vec![f64::NAN; records.len()];
    // Left-to-right sum of debt[..i]; the NaN prefix contributes nothing.
    let mut ledger = 0.0_f64;
    for i in first_overshoot..records.len() {
        let owed = ledger.abs();
        debt[i] = if over[i] < 0.0 || over[i] < owed {
            over[i]
        } else {
            owed
        };
        ledger += debt[i];
    }

    let mut cumulative = 0.0;
    let out: Vec<DebtRecord> = records
        .iter()
        .zip(debt)
        .map(|(record, d)| {
            let annual_debt = negate(d);
            let row = DebtRecord {
                overshoot: record.clone(),
                annual_debt,
                cumulative_debt: cumulative,
            };
            if !annual_debt.is_nan() {
                cumulative += annual_debt;
            }
            row
        })
        .collect();

    let table = DebtTable {
        records: out,
        first_overshoot,
    };
    debug!(
        "Debt accrues from {:?}; carried into final year: {:.2} days",
        table.first_overshoot_year(),
        table.final_cumulative_debt()
    );
    Ok(table)
}

// -0.0 would otherwise surface for years that neither owe nor repay.
fn negate(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        -value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{determine_overshoot_day, AnnualTable, YearTotals};

    fn run(rows: &[(i32, f64, f64)]) -> Result<DebtTable> {
        let totals = rows
            .iter()
            .map(|&(year, eco_footprint, biocapacity)| YearTotals {
                year,
                eco_footprint,
                biocapacity,
            })
            .collect();
        let annual = AnnualTable::from_totals(totals, None)?;
        let overshoot = determine_overshoot_day(&annual)?;
        calculate_ecological_debt(&overshoot)
    }

    fn annual(table: &DebtTable) -> Vec<f64> {
        table.records().iter().map(|r| r.annual_debt).collect()
    }

    fn cumulative(table: &DebtTable) -> Vec<f64> {
        table.records().iter().map(|r| r.cumulative_debt).collect()
    }

    #[test]
    fn test_three_year_scenario() {
        let table = run(&[
            (1961, 100.0, 120.0),
            (1962, 150.0, 120.0),
            (1963, 200.0, 100.0),
        ])
        .unwrap();

        let days: Vec<f64> = table
            .records()
            .iter()
            .map(|r| r.overshoot.overshoot_day)
            .collect();
        assert!((days[0] - 438.0).abs() < 1e-9);
        assert!((days[1] - 292.0).abs() < 1e-9);
        assert!((days[2] - 182.5).abs() < 1e-9);

        let annual = annual(&table);
        assert!(annual[0].is_nan());
        assert!((annual[1] - 73.0).abs() < 1e-9);
        assert!((annual[2] - 182.5).abs() < 1e-9);

        assert_eq!(cumulative(&table), vec![0.0, 0.0, 73.0]);
        assert_eq!(table.first_overshoot_year(), Some(1962));
        assert_eq!(table.final_cumulative_debt(), 73.0);
        assert_eq!(table.year_range(), 1961..=1963);
    }

    #[test]
    fn test_partial_repayment() {
        // over: +35 (no debt yet), -10, -5, +3 (1964 has 366 days)
        let table = run(&[
            (1961, 365.0, 400.0),
            (1962, 365.0, 355.0),
            (1963, 365.0, 360.0),
            (1964, 366.0, 369.0),
        ])
        .unwrap();

        let annual = annual(&table);
        assert!(annual[0].is_nan());
        assert_eq!(&annual[1..], &[10.0, 5.0, -3.0]);
        assert_eq!(cumulative(&table), vec![0.0, 0.0, 10.0, 15.0]);

        let outstanding: f64 = annual.iter().filter(|v| !v.is_nan()).sum();
        assert_eq!(outstanding, 12.0);
    }

    #[test]
    fn test_repayment_is_capped_at_outstanding_debt() {
        // over: -10, +20 (repays only 10), +5 (nothing left to repay)
        let table = run(&[
            (1961, 365.0, 355.0),
            (1962, 365.0, 385.0),
            (1963, 365.0, 370.0),
        ])
        .unwrap();
        assert_eq!(annual(&table), vec![10.0, -10.0, 0.0]);
        assert_eq!(cumulative(&table), vec![0.0, 10.0, 0.0]);
        assert!(table.records()[2].annual_debt.is_sign_positive());
    }

    #[test]
    fn test_exact_repayment_clears_debt() {
        let table = run(&[
            (1961, 365.0, 355.0),
            (1962, 365.0, 375.0),
            (1963, 365.0, 360.0),
        ])
        .unwrap();
        assert_eq!(annual(&table), vec![10.0, -10.0, 5.0]);
        assert_eq!(cumulative(&table), vec![0.0, 10.0, 0.0]);
    }

    #[test]
    fn test_owed_days_accumulate_from_zero() {
        // Every year overshoots, so the ledger only grows.
        let table = run(&[
            (1961, 365.0, 345.0),
            (1962, 365.0, 335.0),
            (1963, 365.0, 325.0),
        ])
        .unwrap();
        assert_eq!(annual(&table), vec![20.0, 30.0, 40.0]);
        assert_eq!(cumulative(&table), vec![0.0, 20.0, 50.0]);
        assert_eq!(table.year_range(), 1961..=1963);
    }

    #[test]
    fn test_first_cumulative_is_always_zero() {
        let table = run(&[(1961, 365.0, 300.0), (1962, 365.0, 300.0)]).unwrap();
        assert_eq!(table.records()[0].cumulative_debt, 0.0);
        assert_eq!(table.records()[0].annual_debt, 65.0);
        assert_eq!(table.records()[1].cumulative_debt, 65.0);
    }

    #[test]
    fn test_no_overshoot_is_an_error() {
        let err = run(&[(1961, 100.0, 120.0), (1962, 100.0, 100.0)]).unwrap_err();
        assert!(matches!(err, OvershootError::NoOvershoot));
    }

    #[test]
    fn test_rerun_is_bit_identical() {
        let rows: Vec<(i32, f64, f64)> = (0..64)
            .map(|i| {
                let year = 1961 + i;
                let eco = 7.0e9 + (i as f64) * 3.1e8;
                let bio = 9.5e9 + ((i * 7 % 11) as f64) * 1.3e8;
                (year, eco, bio)
            })
            .collect();
        let first = run(&rows).unwrap();
        let second = run(&rows).unwrap();
        for (a, b) in first.records().iter().zip(second.records()) {
            assert_eq!(a.annual_debt.to_bits(), b.annual_debt.to_bits());
            assert_eq!(a.cumulative_debt.to_bits(), b.cumulative_debt.to_bits());
            assert_eq!(
                a.overshoot.overshoot_day.to_bits(),
                b.overshoot.overshoot_day.to_bits()
            );
        }
    }
}
