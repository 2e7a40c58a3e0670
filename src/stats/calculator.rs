//! Statistics Calculator Module
//! Per-school means, the environment/growth join and the correlation matrix.

use crate::data::matcher::canonical_eq;
use crate::data::{Field, Measured, School, SchoolTable};
use log::warn;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use thiserror::Error;

/// At or below this many observations a correlation is descriptive only.
pub const DESCRIPTIVE_ONLY_MAX_OBSERVATIONS: usize = 5;

#[derive(Error, Debug, PartialEq)]
pub enum StatsError {
    #[error("No records for school {school}; its mean is undefined")]
    EmptyGroup { school: String },
    #[error("Field '{field}' is not available for school {school}")]
    UnknownField { field: Field, school: String },
    #[error("No fields requested for correlation")]
    NoFields,
}

/// Per-school averages of one record type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub school: String,
    pub count: usize,
    /// Mean of every field; NaN when no record had a value for the field.
    pub means: BTreeMap<Field, f64>,
}

/// Environment and growth averages of one school.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    pub school: String,
    pub environment_samples: usize,
    pub growth_individuals: usize,
    pub means: BTreeMap<Field, f64>,
}

/// A per-school row of field means.
pub trait FieldRow {
    fn school(&self) -> &str;
    fn mean(&self, field: Field) -> Option<f64>;
}

impl FieldRow for SummaryRow {
    fn school(&self) -> &str {
        &self.school
    }

    fn mean(&self, field: Field) -> Option<f64> {
        self.means.get(&field).copied()
    }
}

impl FieldRow for MergedRow {
    fn school(&self) -> &str {
        &self.school
    }

    fn mean(&self, field: Field) -> Option<f64> {
        self.means.get(&field).copied()
    }
}

/// Pearson correlation between fields, one observation per school.
///
/// The study has four schools, so each coefficient rests on four points.
/// With `observations <= 5` the values describe these schools only and carry
/// no inferential weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub fields: Vec<Field>,
    /// Row-major, `fields.len()` × `fields.len()`. NaN where undefined.
    pub values: Vec<Vec<f64>>,
    pub observations: usize,
}

impl CorrelationMatrix {
    pub fn get(&self, a: Field, b: Field) -> Option<f64> {
        let i = self.fields.iter().position(|f| *f == a)?;
        let j = self.fields.iter().position(|f| *f == b)?;
        Some(self.values[i][j])
    }

    pub fn is_descriptive_only(&self) -> bool {
        self.observations <= DESCRIPTIVE_ONLY_MAX_OBSERVATIONS
    }
}

/// Experiment overview: target EC and number of individuals per growth sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewRow {
    pub school: String,
    /// None when the sheet name is not a configured school.
    pub target_ec: Option<f64>,
    pub individuals: usize,
}

/// Stateless statistical transforms over loaded tables.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Mean of the present (non-NaN) values; NaN if none are present.
    pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
        let present: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
        if present.is_empty() {
            return f64::NAN;
        }
        present.iter().mean()
    }

    /// One row of field means per school, in table order.
    ///
    /// A school with zero records fails with [`StatsError::EmptyGroup`].
    pub fn summarize<R: Measured>(
        table: &SchoolTable<Vec<R>>,
    ) -> Result<Vec<SummaryRow>, StatsError> {
        table
            .iter()
            .map(|(school, records)| {
                if records.is_empty() {
                    return Err(StatsError::EmptyGroup {
                        school: school.to_string(),
                    });
                }
                let means = R::fields()
                    .iter()
                    .map(|&field| (field, Self::mean(records.iter().map(|r| r.value(field)))))
                    .collect();
                Ok(SummaryRow {
                    school: school.to_string(),
                    count: records.len(),
                    means,
                })
            })
            .collect()
    }

    /// Inner join on school: only schools with both kinds of data survive.
    ///
    /// School names are compared up to canonical Unicode equivalence. Output
    /// follows the order of `environment`.
    pub fn merge(environment: &[SummaryRow], growth: &[SummaryRow]) -> Vec<MergedRow> {
        let merged: Vec<MergedRow> = environment
            .iter()
            .filter_map(|env| {
                let grow = growth
                    .iter()
                    .find(|g| canonical_eq(&g.school, &env.school))?;
                let mut means = env.means.clone();
                means.extend(grow.means.iter().map(|(f, v)| (*f, *v)));
                Some(MergedRow {
                    school: env.school.clone(),
                    environment_samples: env.count,
                    growth_individuals: grow.count,
                    means,
                })
            })
            .collect();

        let dropped = (environment.len() + growth.len()).saturating_sub(2 * merged.len());
        if dropped > 0 {
            warn!("Join dropped {} school row(s) present on one side only", dropped);
        }
        merged
    }

    /// Pearson correlation matrix of `fields` across `rows`.
    ///
    /// Pairs where either value is NaN are left out of that coefficient. The
    /// diagonal is 1.0; off-diagonal entries are clamped to [-1, 1] and are NaN
    /// when fewer than two pairs remain or a field is constant.
    pub fn correlate<R: FieldRow>(
        rows: &[R],
        fields: &[Field],
    ) -> Result<CorrelationMatrix, StatsError> {
        if fields.is_empty() {
            return Err(StatsError::NoFields);
        }

        let columns: Vec<Vec<f64>> = fields
            .iter()
            .map(|&field| {
                rows.iter()
                    .map(|row| {
                        row.mean(field).ok_or_else(|| StatsError::UnknownField {
                            field,
                            school: row.school().to_string(),
                        })
                    })
                    .collect::<Result<Vec<f64>, StatsError>>()
            })
            .collect::<Result<_, _>>()?;

        let n = fields.len();
        let mut values = vec![vec![f64::NAN; n]; n];
        for i in 0..n {
            values[i][i] = 1.0;
            for j in (i + 1)..n {
                let r = Self::pearson(&columns[i], &columns[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        let matrix = CorrelationMatrix {
            fields: fields.to_vec(),
            values,
            observations: rows.len(),
        };
        if matrix.is_descriptive_only() {
            warn!(
                "Correlation over {} school(s) is descriptive only",
                matrix.observations
            );
        }
        Ok(matrix)
    }

    /// Pearson coefficient over the pairs where both values are present.
    pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
        let (x, y): (Vec<f64>, Vec<f64>) = xs
            .iter()
            .zip(ys)
            .filter(|(a, b)| !a.is_nan() && !b.is_nan())
            .map(|(a, b)| (*a, *b))
            .unzip();
        if x.len() < 2 {
            return f64::NAN;
        }

        let cov = x.iter().covariance(y.iter());
        let denom = x.iter().std_dev() * y.iter().std_dev();
        if denom == 0.0 || !denom.is_finite() {
            return f64::NAN;
        }
        (cov / denom).clamp(-1.0, 1.0)
    }

    /// Overview row per growth sheet, in sheet order.
    pub fn overview<R>(schools: &[School], growth: &SchoolTable<Vec<R>>) -> Vec<OverviewRow> {
        growth
            .iter()
            .map(|(name, records)| OverviewRow {
                school: name.to_string(),
                target_ec: schools
                    .iter()
                    .find(|s| canonical_eq(&s.name, name))
                    .map(|s| s.target_ec),
                individuals: records.len(),
            })
            .collect()
    }
}
