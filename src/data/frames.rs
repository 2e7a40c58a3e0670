//! Frame builders for the presentation layer.
//! Turns loaded records and computed summaries into Polars DataFrames.

use super::model::{EnvironmentRecord, Field, GrowthRecord, SchoolTable};
use crate::stats::{CorrelationMatrix, MergedRow, SummaryRow};
use polars::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Unknown school: {0}")]
    UnknownSchool(String),
}

/// Which schools a raw-data view covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SchoolSelection {
    #[default]
    All,
    One(String),
}

impl SchoolSelection {
    pub fn includes(&self, school: &str) -> bool {
        match self {
            SchoolSelection::All => true,
            SchoolSelection::One(name) => name == school,
        }
    }

    fn check<T>(&self, table: &SchoolTable<T>) -> Result<(), FrameError> {
        match self {
            SchoolSelection::One(name) if !table.contains(name) => {
                Err(FrameError::UnknownSchool(name.clone()))
            }
            _ => Ok(()),
        }
    }
}

pub struct Frames;

impl Frames {
    /// Environment samples of the selected schools, school order then file order.
    ///
    /// Output columns: [school, time, temperature, humidity, ph, ec]
    pub fn environment(
        table: &SchoolTable<Vec<EnvironmentRecord>>,
        selection: &SchoolSelection,
    ) -> Result<DataFrame, FrameError> {
        selection.check(table)?;
        let records: Vec<&EnvironmentRecord> = table
            .iter()
            .filter(|(school, _)| selection.includes(school))
            .flat_map(|(_, records)| records.iter())
            .collect();

        let df = DataFrame::new(vec![
            Column::new(
                "school".into(),
                records.iter().map(|r| r.school.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "time".into(),
                records.iter().map(|r| r.time.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                Field::Temperature.key().into(),
                records.iter().map(|r| r.temperature).collect::<Vec<_>>(),
            ),
            Column::new(
                Field::Humidity.key().into(),
                records.iter().map(|r| r.humidity).collect::<Vec<_>>(),
            ),
            Column::new(
                Field::Ph.key().into(),
                records.iter().map(|r| r.ph).collect::<Vec<_>>(),
            ),
            Column::new(
                Field::Ec.key().into(),
                records.iter().map(|r| r.ec).collect::<Vec<_>>(),
            ),
        ])?;
        Ok(df)
    }

    /// Growth measurements of the selected schools.
    ///
    /// Output columns: [school, weight, leaf_count, shoot_length]
    pub fn growth(
        table: &SchoolTable<Vec<GrowthRecord>>,
        selection: &SchoolSelection,
    ) -> Result<DataFrame, FrameError> {
        selection.check(table)?;
        let records: Vec<&GrowthRecord> = table
            .iter()
            .filter(|(school, _)| selection.includes(school))
            .flat_map(|(_, records)| records.iter())
            .collect();

        let df = DataFrame::new(vec![
            Column::new(
                "school".into(),
                records.iter().map(|r| r.school.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                Field::Weight.key().into(),
                records.iter().map(|r| r.weight).collect::<Vec<_>>(),
            ),
            Column::new(
                Field::LeafCount.key().into(),
                records.iter().map(|r| r.leaf_count).collect::<Vec<_>>(),
            ),
            Column::new(
                Field::ShootLength.key().into(),
                records.iter().map(|r| r.shoot_length).collect::<Vec<_>>(),
            ),
        ])?;
        Ok(df)
    }

    /// Output columns: [school, count, <field>...]
    pub fn summary(rows: &[SummaryRow]) -> Result<DataFrame, FrameError> {
        let mut columns = vec![
            Column::new(
                "school".into(),
                rows.iter().map(|r| r.school.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "count".into(),
                rows.iter().map(|r| r.count as u64).collect::<Vec<_>>(),
            ),
        ];
        let fields: Vec<Field> = rows
            .first()
            .map(|r| r.means.keys().copied().collect())
            .unwrap_or_default();
        columns.extend(fields.into_iter().map(|field| {
            Column::new(
                field.key().into(),
                rows.iter()
                    .map(|r| r.means.get(&field).copied().unwrap_or(f64::NAN))
                    .collect::<Vec<_>>(),
            )
        }));
        Ok(DataFrame::new(columns)?)
    }

    /// Output columns: [school, environment_samples, growth_individuals, <field>...]
    pub fn merged(rows: &[MergedRow], fields: &[Field]) -> Result<DataFrame, FrameError> {
        let mut columns = vec![
            Column::new(
                "school".into(),
                rows.iter().map(|r| r.school.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "environment_samples".into(),
                rows.iter()
                    .map(|r| r.environment_samples as u64)
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "growth_individuals".into(),
                rows.iter()
                    .map(|r| r.growth_individuals as u64)
                    .collect::<Vec<_>>(),
            ),
        ];
        columns.extend(fields.iter().map(|field| {
            Column::new(
                field.key().into(),
                rows.iter()
                    .map(|r| r.means.get(field).copied().unwrap_or(f64::NAN))
                    .collect::<Vec<_>>(),
            )
        }));
        Ok(DataFrame::new(columns)?)
    }

    /// Heatmap-ready matrix. Output columns: [field, <field>...]
    pub fn correlation(matrix: &CorrelationMatrix) -> Result<DataFrame, FrameError> {
        let mut columns = vec![Column::new(
            "field".into(),
            matrix
                .fields
                .iter()
                .map(|f| f.key().to_string())
                .collect::<Vec<_>>(),
        )];
        columns.extend(matrix.fields.iter().enumerate().map(|(j, field)| {
            Column::new(
                field.key().into(),
                matrix.values.iter().map(|row| row[j]).collect::<Vec<_>>(),
            )
        }));
        Ok(DataFrame::new(columns)?)
    }

    /// Rows of a frame with a `school` column belonging to one school.
    pub fn filter_by_school(df: &DataFrame, school: &str) -> Result<DataFrame, FrameError> {
        let filtered = df
            .clone()
            .lazy()
            .filter(col("school").eq(lit(school)))
            .collect()?;
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SchoolTable<Vec<GrowthRecord>> {
        let rec = |school: &str, weight: f64| GrowthRecord {
            school: school.to_string(),
            weight,
            leaf_count: 4.0,
            shoot_length: 30.0,
        };
        [
            ("송도고".to_string(), vec![rec("송도고", 1.0), rec("송도고", 2.0)]),
            ("하늘고".to_string(), vec![rec("하늘고", 3.0)]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn growth_frame_respects_selection() {
        let all = Frames::growth(&table(), &SchoolSelection::All).unwrap();
        assert_eq!(all.height(), 3);

        let one = Frames::growth(&table(), &SchoolSelection::One("하늘고".into())).unwrap();
        assert_eq!(one.height(), 1);
        assert_eq!(
            Frames::filter_by_school(&all, "송도고").unwrap().height(),
            2
        );
    }

    #[test]
    fn unknown_school_selection_is_an_error() {
        let err = Frames::growth(&table(), &SchoolSelection::One("없는고".into())).unwrap_err();
        assert!(matches!(err, FrameError::UnknownSchool(name) if name == "없는고"));
    }
}
