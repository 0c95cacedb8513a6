//! Patient record parsed from a blood-test CSV file

use crate::error::{BloodwiseError, Result};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Column holding the patient's name
pub const NAME_COLUMN: &str = "Name";

/// One patient's blood-test values
///
/// Values keep the column order of the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub name: String,
    values: Vec<(String, f64)>,
}

impl PatientRecord {
    pub fn new(name: impl Into<String>, values: Vec<(String, f64)>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Read the first data row of a CSV file
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BloodwiseError::InputFile(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(100))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        Self::from_dataframe(&df)
    }

    /// Read the first data row of in-memory CSV content
    pub fn from_csv_bytes(data: &[u8]) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(100))
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(data))
            .finish()?;

        Self::from_dataframe(&df)
    }

    /// Extract the first row: `Name` plus every other column as `f64`
    ///
    /// Empty, unparseable and non-finite cells are rejected.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        if df.height() == 0 {
            return Err(BloodwiseError::InputFile("CSV contains no data rows".to_string()));
        }
        if df.height() > 1 {
            debug!(rows = df.height(), "Multiple rows in input, using the first");
        }

        let name_series = df
            .column(NAME_COLUMN)
            .map_err(|_| BloodwiseError::ModelInput(format!("missing column '{}'", NAME_COLUMN)))?
            .as_materialized_series()
            .cast(&DataType::String)
            .map_err(|e| BloodwiseError::ModelInput(e.to_string()))?;
        let name = name_series
            .str()
            .map_err(|e| BloodwiseError::ModelInput(e.to_string()))?
            .get(0)
            .ok_or_else(|| BloodwiseError::ModelInput("patient name is empty".to_string()))?
            .to_string();

        let mut values = Vec::with_capacity(df.width().saturating_sub(1));
        for col_name in df.get_column_names() {
            if col_name.as_str() == NAME_COLUMN {
                continue;
            }
            let series = df
                .column(col_name.as_str())
                .map_err(|_| BloodwiseError::ModelInput(format!("missing column '{}'", col_name)))?
                .as_materialized_series()
                .cast(&DataType::Float64)
                .map_err(|_| non_numeric(col_name.as_str()))?;
            let value = series
                .f64()
                .map_err(|_| non_numeric(col_name.as_str()))?
                .get(0)
                .filter(|v| v.is_finite())
                .ok_or_else(|| non_numeric(col_name.as_str()))?;
            values.push((col_name.to_string(), value));
        }

        Ok(Self { name, values })
    }

    /// Feature values in source column order
    pub fn values(&self) -> &[(String, f64)] {
        &self.values
    }

    /// Look up a single test value
    pub fn get(&self, feature: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == feature)
            .map(|(_, value)| *value)
    }

    /// Build a model input row
    ///
    /// With `feature_names` the row follows the model's column order and
    /// extra columns are ignored; without them the record must provide
    /// exactly `n_features` values, taken in file order.
    pub fn feature_row(&self, feature_names: Option<&[String]>, n_features: usize) -> Result<Array1<f64>> {
        match feature_names {
            Some(names) => names
                .iter()
                .map(|name| {
                    self.get(name).ok_or_else(|| {
                        BloodwiseError::ModelInput(format!("missing feature column '{}'", name))
                    })
                })
                .collect(),
            None => {
                if self.values.len() != n_features {
                    return Err(BloodwiseError::ModelInput(format!(
                        "expected {} feature columns, got {}",
                        n_features,
                        self.values.len()
                    )));
                }
                Ok(self.values.iter().map(|(_, value)| *value).collect())
            }
        }
    }
}

fn non_numeric(column: &str) -> BloodwiseError {
    BloodwiseError::ModelInput(format!("column '{}' is not numeric", column))
}
