//! Dataset file parsing
//!
//! The live dataset is delimited text with a header row. Column names are
//! matched case-insensitively, so both `cep,logradouro,...` and the upper-case
//! `CEP,LOGRADOURO,...` header work. Only `cep` is required.

use crate::error::{CepError, FilesystemError, Result};
use crate::record::{Cep, Record};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
struct DatasetRow {
    cep: String,
    #[serde(default)]
    logradouro: Option<String>,
    #[serde(default)]
    complemento: Option<String>,
    #[serde(default)]
    bairro: Option<String>,
    #[serde(default)]
    localidade: Option<String>,
    #[serde(default)]
    uf: Option<String>,
    #[serde(default)]
    ibge: Option<String>,
}

impl DatasetRow {
    fn into_record(self, cep: Cep) -> Record {
        Record {
            cep,
            street: non_empty(self.logradouro),
            complement: non_empty(self.complemento),
            district: non_empty(self.bairro),
            locality: non_empty(self.localidade),
            region: non_empty(self.uf),
            ibge_code: non_empty(self.ibge),
        }
    }
}

/// Parse the dataset file at `path`
#[instrument(skip_all, fields(path = %path.display()))]
pub fn parse_file(path: &Path, delimiter: u8) -> Result<Vec<Record>> {
    let file = File::open(path).map_err(|source| FilesystemError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let records = parse_reader(file, delimiter)?;
    info!(records = records.len(), "Parsed dataset");
    Ok(records)
}

/// Parse dataset text from any reader
pub fn parse_reader<R: Read>(reader: R, delimiter: u8) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers().map_err(csv_error)?;
    let headers = csv::StringRecord::from(
        headers
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect::<Vec<_>>(),
    );
    debug!(?headers, "Dataset header");

    let mut records = Vec::new();
    let mut raw = csv::StringRecord::new();
    while reader.read_record(&mut raw).map_err(csv_error)? {
        let line = raw.position().map(|p| p.line()).unwrap_or_default();
        let row: DatasetRow = raw
            .deserialize(Some(&headers))
            .map_err(|e| CepError::parse(line, e.to_string()))?;
        let cep = Cep::parse(&row.cep)
            .map_err(|_| CepError::parse(line, format!("invalid CEP '{}'", row.cep)))?;
        records.push(row.into_record(cep));
    }

    Ok(records)
}

fn csv_error(e: csv::Error) -> CepError {
    let line = e.position().map(|p| p.line()).unwrap_or_default();
    CepError::parse(line, e.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
