//! Data Loader Module
//! Loads the per-school environment CSVs (Polars) and the growth workbook.

use super::matcher::{nfc, MatchError, NameMatcher};
use super::model::{EnvironmentRecord, GrowthRecord, School, SchoolTable};
use super::workbook;
use log::{debug, info, warn};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name suffix of each school's environment log.
pub const DEFAULT_ENVIRONMENT_SUFFIX: &str = "_환경데이터.csv";
/// Workbook holding one growth sheet per school.
pub const DEFAULT_GROWTH_WORKBOOK: &str = "4개교_생육결과데이터.xlsx";

/// Columns every environment CSV must carry.
pub const ENVIRONMENT_COLUMNS: [&str; 5] = ["time", "temperature", "humidity", "ph", "ec"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Missing data file '{file}'{}", .school.as_deref().map(|s| format!(" for school {s}")).unwrap_or_default())]
    MissingFile { school: Option<String>, file: String },
    #[error("Cannot read sheet '{sheet}' in {file}: {reason}")]
    MissingSheet {
        sheet: String,
        file: String,
        reason: String,
    },
    #[error("{source_name} is missing required column '{column}'")]
    Schema { source_name: String, column: String },
    #[error("Failed to load CSV {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: PolarsError,
    },
    #[error("Failed to open workbook {file}: {source}")]
    Workbook {
        file: String,
        #[source]
        source: calamine::XlsxError,
    },
    #[error(transparent)]
    Directory(MatchError),
    #[error("No schools to load")]
    NoSchools,
}

impl LoaderError {
    /// School this error belongs to, when it is specific to one.
    pub fn school(&self) -> Option<&str> {
        match self {
            LoaderError::MissingFile { school, .. } => school.as_deref(),
            LoaderError::MissingSheet { sheet, .. } => Some(sheet),
            _ => None,
        }
    }
}

/// One school whose environment data could not be loaded.
#[derive(Debug)]
pub struct SchoolFailure {
    pub school: String,
    pub error: LoaderError,
}

/// Result of loading every school's environment log.
///
/// Schools load independently: a failure for one school is recorded in
/// `failures` and the remaining schools are still read.
#[derive(Debug, Default)]
pub struct EnvironmentLoad {
    pub records: SchoolTable<Vec<EnvironmentRecord>>,
    pub failures: Vec<SchoolFailure>,
}

impl EnvironmentLoad {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The loaded table, or the first per-school failure if any school is missing.
    pub fn into_complete(self) -> Result<SchoolTable<Vec<EnvironmentRecord>>, LoaderError> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.records),
        }
    }
}

/// Handle on the directory holding the study's data files.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dir: PathBuf,
    environment_suffix: String,
}

impl DataLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            environment_suffix: DEFAULT_ENVIRONMENT_SUFFIX.to_string(),
        }
    }

    pub fn with_environment_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.environment_suffix = suffix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn environment_suffix(&self) -> &str {
        &self.environment_suffix
    }

    /// Logical file name of a school's environment log.
    pub fn environment_file_name(&self, school: &str) -> String {
        format!("{}{}", school, self.environment_suffix)
    }

    fn matcher(&self) -> Result<NameMatcher, LoaderError> {
        NameMatcher::index(&self.dir).map_err(LoaderError::Directory)
    }

    /// Load the environment log of every school, in the given order.
    ///
    /// Only a problem with the directory itself fails the whole call; missing
    /// or malformed files are reported per school in the returned value.
    pub fn load_environment(&self, schools: &[School]) -> Result<EnvironmentLoad, LoaderError> {
        if schools.is_empty() {
            return Err(LoaderError::NoSchools);
        }
        let matcher = self.matcher()?;
        let mut load = EnvironmentLoad::default();

        for school in schools {
            let file = self.environment_file_name(&school.name);
            let result = match matcher.resolve(&file) {
                Ok(path) => read_environment_csv(path, &school.name),
                Err(_) => Err(LoaderError::MissingFile {
                    school: Some(school.name.clone()),
                    file,
                }),
            };

            match result {
                Ok(records) => {
                    debug!("{}: {} environment samples", school.name, records.len());
                    load.records.insert(school.name.clone(), records);
                }
                Err(error) => {
                    warn!("{}", error);
                    load.failures.push(SchoolFailure {
                        school: school.name.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            "Loaded environment data for {}/{} schools",
            load.records.len(),
            schools.len()
        );
        Ok(load)
    }

    /// Load the growth workbook; every sheet is one school.
    pub fn load_growth(
        &self,
        file_name: &str,
    ) -> Result<SchoolTable<Vec<GrowthRecord>>, LoaderError> {
        let matcher = self.matcher()?;
        let path = matcher
            .resolve(file_name)
            .map_err(|_| LoaderError::MissingFile {
                school: None,
                file: file_name.to_string(),
            })?;

        let growth = workbook::read_growth_workbook(path)?;
        info!(
            "Loaded growth data for {} schools from {}",
            growth.len(),
            path.display()
        );
        Ok(growth)
    }
}

/// Parse one environment CSV and tag every row with `school`.
pub fn read_environment_csv(path: &Path, school: &str) -> Result<Vec<EnvironmentRecord>, LoaderError> {
    let file = path.display().to_string();
    let csv_err = |source: PolarsError| LoaderError::Csv {
        file: file.clone(),
        source,
    };

    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(10000))
        .with_ignore_errors(true)
        .finish()
        .and_then(|lazy| lazy.collect())
        .map_err(csv_err)?;

    let columns = resolve_columns(&df, &ENVIRONMENT_COLUMNS, &file)?;
    let [time, temperature, humidity, ph, ec] = columns;

    let time = text_column(&df, &time).map_err(csv_err)?;
    let temperature = float_column(&df, &temperature).map_err(csv_err)?;
    let humidity = float_column(&df, &humidity).map_err(csv_err)?;
    let ph = float_column(&df, &ph).map_err(csv_err)?;
    let ec = float_column(&df, &ec).map_err(csv_err)?;

    let records = (0..df.height())
        .map(|i| EnvironmentRecord {
            school: school.to_string(),
            time: time[i].clone(),
            temperature: temperature[i],
            humidity: humidity[i],
            ph: ph[i],
            ec: ec[i],
        })
        .collect();

    Ok(records)
}

/// Map each required column to the DataFrame's actual header.
///
/// Headers are compared after trimming whitespace and a leading BOM, in NFC.
fn resolve_columns<const N: usize>(
    df: &DataFrame,
    required: &[&str; N],
    source_name: &str,
) -> Result<[String; N], LoaderError> {
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut resolved: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, wanted) in resolved.iter_mut().zip(required) {
        let wanted = nfc(wanted);
        *slot = headers
            .iter()
            .find(|h| nfc(h.trim_start_matches('\u{feff}').trim()) == wanted)
            .cloned()
            .ok_or_else(|| LoaderError::Schema {
                source_name: source_name.to_string(),
                column: wanted.clone(),
            })?;
    }
    Ok(resolved)
}

/// Numeric column as f64; nulls and unparseable cells become NaN.
fn float_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let values = df.column(name)?.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

fn text_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<String>> {
    let values = df.column(name)?.cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_environment_rows_in_file_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("env.csv");
        fs::write(
            &path,
            "time,temperature,humidity,ph,ec\n\
             2025-05-26 10:00,21.5,60.1,6.2,1.1\n\
             2025-05-26 09:00,20.5,,6.0,0.9\n",
        )
        .unwrap();

        let records = read_environment_csv(&path, "송도고").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].time, "2025-05-26 10:00");
        assert_eq!(records[1].time, "2025-05-26 09:00");
        assert_eq!(records[0].school, "송도고");
        assert!((records[0].temperature - 21.5).abs() < 1e-12);
        assert!(records[1].humidity.is_nan());
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("env.csv");
        fs::write(&path, "time,temperature,humidity,ph\n2025-05-26,21.5,60.1,6.2\n").unwrap();

        let err = read_environment_csv(&path, "아라고").unwrap_err();
        match err {
            LoaderError::Schema { column, .. } => assert_eq!(column, "ec"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_school_list_is_rejected() {
        let dir = TempDir::new().unwrap();
        let loader = DataLoader::new(dir.path());
        assert!(matches!(
            loader.load_environment(&[]),
            Err(LoaderError::NoSchools)
        ));
    }

    #[test]
    fn missing_file_error_names_the_school() {
        let err = LoaderError::MissingFile {
            school: Some("동산고".into()),
            file: "동산고_환경데이터.csv".into(),
        };
        assert_eq!(err.school(), Some("동산고"));
        assert!(err.to_string().contains("동산고_환경데이터.csv"));
    }
}
