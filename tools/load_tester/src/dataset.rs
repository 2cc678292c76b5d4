use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use rand::Rng;
use thiserror::Error;

use crate::sampler::{target_model_for, SampledRequest};

/// Column holding the categorical label that selects the target model.
pub const LABEL_COLUMN: &str = "State";

/// Leading identifier/label columns that are not part of the feature vector.
pub const NON_FEATURE_COLUMNS: usize = 3;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open dataset {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dataset: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset has no `{0}` column")]
    MissingLabelColumn(&'static str),

    #[error("dataset has {0} columns, feature columns start after the first three")]
    NoFeatureColumns(usize),

    #[error("dataset has no rows")]
    Empty,
}

/// Immutable in-memory copy of the reference CSV.
///
/// Fields are kept as the exact text found in the file so the request body
/// carries the same numeric formatting the model was trained on.
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    headers: StringRecord,
    label_index: usize,
    rows: Vec<StringRecord>,
}

impl ReferenceDataset {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Parse a header row followed by data rows. Every row must have as many
    /// fields as the header.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let label_index = headers
            .iter()
            .position(|h| h == LABEL_COLUMN)
            .ok_or(DatasetError::MissingLabelColumn(LABEL_COLUMN))?;
        if headers.len() <= NON_FEATURE_COLUMNS {
            return Err(DatasetError::NoFeatureColumns(headers.len()));
        }

        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        if rows.is_empty() {
            return Err(DatasetError::Empty);
        }

        Ok(Self {
            headers,
            label_index,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature_headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().skip(NON_FEATURE_COLUMNS)
    }

    pub fn feature_count(&self) -> usize {
        self.headers.len() - NON_FEATURE_COLUMNS
    }

    pub fn row(&self, index: usize) -> Option<&StringRecord> {
        self.rows.get(index)
    }

    pub fn label<'a>(&self, row: &'a StringRecord) -> &'a str {
        &row[self.label_index]
    }

    /// Build the request for one row: its features joined with `,` and the
    /// model named after its label.
    pub fn request_for(&self, row: &StringRecord) -> SampledRequest {
        let features: Vec<&str> = row.iter().skip(NON_FEATURE_COLUMNS).collect();
        SampledRequest {
            data: features.join(","),
            target_model: target_model_for(self.label(row)),
        }
    }

    /// Draw one row uniformly at random, with replacement.
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> SampledRequest {
        // `from_reader` rejects datasets without rows, so the range is never empty.
        let index = rng.gen_range(0..self.rows.len());
        self.request_for(&self.rows[index])
    }
}
