//! Run-scoped CSV hand-off between pipeline steps.
//!
//! Each run owns its own set of files, so an overlapping run can never
//! clobber another run's intermediate state. A missing file reads back as an
//! empty batch: that is what downstream steps see when an upstream scrape
//! failed before writing anything.

use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::StepError;

#[derive(Debug, Clone)]
pub struct HandoffPaths {
    dir: PathBuf,
    run_id: String,
}

impl HandoffPaths {
    pub fn new(dir: PathBuf, run_id: impl Into<String>) -> Self {
        Self {
            dir,
            run_id: run_id.into(),
        }
    }

    pub fn raw_oil(&self) -> PathBuf {
        self.dir.join(format!("raw_oil_{}.csv", self.run_id))
    }

    pub fn transformed_oil(&self) -> PathBuf {
        self.dir.join(format!("transformed_oil_{}.csv", self.run_id))
    }

    pub fn raw_stock(&self) -> PathBuf {
        self.dir.join(format!("raw_stock_{}.csv", self.run_id))
    }

    pub fn transformed_stock(&self) -> PathBuf {
        self.dir.join(format!("transformed_stock_{}.csv", self.run_id))
    }

    /// Best-effort removal of this run's files once the chain is done.
    pub fn cleanup(&self) {
        for path in [
            self.raw_oil(),
            self.transformed_oil(),
            self.raw_stock(),
            self.transformed_stock(),
        ] {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!("could not remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

pub fn raw_oil_schema() -> Schema {
    Schema::from_iter([
        Field::new("type".into(), DataType::String),
        Field::new("price".into(), DataType::Float64),
        Field::new("datetime".into(), DataType::String),
    ])
}

/// `open` and `price` land as page text; reading them as Float64 with
/// ignore_errors is the coercion step, so anything unparseable becomes null.
pub fn raw_stock_schema() -> Schema {
    Schema::from_iter([
        Field::new("ticker".into(), DataType::String),
        Field::new("open".into(), DataType::Float64),
        Field::new("price".into(), DataType::Float64),
        Field::new("datetime".into(), DataType::String),
    ])
}

pub fn transformed_oil_schema() -> Schema {
    Schema::from_iter([
        Field::new("type".into(), DataType::String),
        Field::new("price".into(), DataType::Float64),
        Field::new("datetime".into(), DataType::String),
        Field::new("price_change".into(), DataType::Float64),
        Field::new("normalized_price".into(), DataType::Float64),
    ])
}

pub fn transformed_stock_schema() -> Schema {
    Schema::from_iter([
        Field::new("ticker".into(), DataType::String),
        Field::new("open".into(), DataType::Float64),
        Field::new("price".into(), DataType::Float64),
        Field::new("datetime".into(), DataType::String),
        Field::new("average_stock_price".into(), DataType::Float64),
        Field::new("stock_change".into(), DataType::Float64),
    ])
}

pub fn write_batch(path: &Path, frame: &mut DataFrame) -> Result<(), StepError> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(frame)?;
    Ok(())
}

pub fn read_batch(path: &Path, schema: Schema) -> Result<DataFrame, StepError> {
    if !path.exists() {
        warn!(
            "hand-off file {} is missing; treating it as an empty batch",
            path.display()
        );
        return Ok(DataFrame::empty_with_schema(&schema));
    }

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_ignore_errors(true)
        .with_schema_overwrite(Some(Arc::new(schema)))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(frame)
}
