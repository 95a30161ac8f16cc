//! CSV import/export of incidence matrices
//!
//! Layout: the header row holds an empty cell followed by the column labels;
//! every data row starts with its row label. Binary matrices are written as
//! `0`/`1`, real matrices with their shortest round-trip decimal form.

use super::matrix::IncidenceMatrix;
use crate::error::{Result, TopicFcaError};
use csv::{ReaderBuilder, WriterBuilder};
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// A value that can live in an incidence CSV cell
pub trait CsvCell: Copy + Sized {
    fn to_cell(&self) -> String;

    /// Parse a cell; `row`/`column` name the cell in error messages
    fn parse_cell(value: &str, row: &str, column: &str) -> Result<Self>;
}

impl CsvCell for bool {
    fn to_cell(&self) -> String {
        if *self { "1" } else { "0" }.to_string()
    }

    fn parse_cell(value: &str, row: &str, column: &str) -> Result<Self> {
        match value.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(TopicFcaError::NonBinaryEntry {
                row: row.to_string(),
                column: column.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl CsvCell for f64 {
    fn to_cell(&self) -> String {
        self.to_string()
    }

    fn parse_cell(value: &str, row: &str, column: &str) -> Result<Self> {
        value.trim().parse::<f64>().map_err(|_| TopicFcaError::MalformedCsv {
            path: String::new(),
            reason: format!(
                "non-numeric entry {:?} at row {:?}, column {:?}",
                value, row, column
            ),
        })
    }
}

/// Write a matrix to a CSV file, index column included
pub fn write_csv<T: CsvCell>(matrix: &IncidenceMatrix<T>, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv_to(matrix, file)?;
    debug!("Wrote {}x{} matrix to {}", matrix.nrows(), matrix.ncols(), path.display());
    Ok(())
}

/// Write a matrix as CSV to any writer
pub fn write_csv_to<T: CsvCell, W: Write>(matrix: &IncidenceMatrix<T>, writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().flexible(false).from_writer(writer);

    let mut header = Vec::with_capacity(matrix.ncols() + 1);
    header.push(String::new());
    header.extend(matrix.col_labels().iter().cloned());
    wtr.write_record(&header)?;

    for (r, label) in matrix.row_labels().iter().enumerate() {
        let mut record = Vec::with_capacity(matrix.ncols() + 1);
        record.push(label.clone());
        for c in 0..matrix.ncols() {
            record.push(matrix.get(r, c).to_cell());
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Read a matrix from a CSV file, failing on malformed content
pub fn read_csv<T: CsvCell>(path: &Path) -> Result<IncidenceMatrix<T>> {
    let file = std::fs::File::open(path)?;
    read_csv_from(file, &path.display().to_string())
}

/// Read a matrix from CSV text; `source` names the input in errors
pub fn read_csv_from<T: CsvCell, R: Read>(reader: R, source: &str) -> Result<IncidenceMatrix<T>> {
    let malformed = |reason: String| TopicFcaError::MalformedCsv {
        path: source.to_string(),
        reason,
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = rdr.records();

    let header = records
        .next()
        .ok_or_else(|| malformed("missing header row".to_string()))??;
    check_delimiter(&header).map_err(malformed)?;
    let col_labels: Vec<String> = header.iter().skip(1).map(|s| s.to_string()).collect();
    let width = header.len();

    let mut row_labels = Vec::new();
    let mut data = Vec::new();
    for (i, record) in records.enumerate() {
        let record = record?;
        if record.len() != width {
            return Err(malformed(format!(
                "row {} has {} fields, expected {}",
                i + 1,
                record.len(),
                width
            )));
        }

        let label = record.get(0).unwrap_or_default().to_string();
        for (value, column) in record.iter().skip(1).zip(&col_labels) {
            let cell = T::parse_cell(value, &label, column).map_err(|e| match e {
                TopicFcaError::MalformedCsv { reason, .. } => malformed(reason),
                other => other,
            })?;
            data.push(cell);
        }
        row_labels.push(label);
    }

    IncidenceMatrix::new(row_labels, col_labels, data)
}

/// A header parsed into a single field that still holds `;` or a tab was
/// written with another delimiter. Labels may contain either character once
/// the header has split on commas.
fn check_delimiter(header: &csv::StringRecord) -> std::result::Result<(), String> {
    if header.len() == 1 && header.iter().any(|field| field.contains(';') || field.contains('\t')) {
        return Err("unexpected delimiter, expected ','".to_string());
    }
    Ok(())
}
