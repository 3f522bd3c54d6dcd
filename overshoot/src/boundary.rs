//! Shared boundary geometry attached to every annual record.
//!
//! The boundary is descriptive only: no stage reads it when computing
//! overshoot days or debt.

use std::sync::Arc;

use geo::{BooleanOps, MultiPolygon};

/// A unioned boundary shared by reference across all rows of a table.
pub type Boundary = Arc<MultiPolygon<f64>>;

/// Union a set of country shapes into a single boundary.
pub fn union_boundaries<'a, I>(shapes: I) -> Boundary
where
    I: IntoIterator<Item = &'a MultiPolygon<f64>>,
{
    let merged = shapes
        .into_iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, shape| acc.union(shape));
    Arc::new(merged)
}
