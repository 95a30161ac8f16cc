//! Labeled dense matrix used for document-topic and term-topic incidences

use crate::error::{Result, TopicFcaError};
use indexmap::IndexSet;

/// Dense row-major matrix with string row and column labels.
///
/// Labels are unique; `row_index`/`col_index` give the position of a label.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidenceMatrix<T> {
    row_labels: IndexSet<String>,
    col_labels: IndexSet<String>,
    data: Vec<T>,
}

impl<T: Copy> IncidenceMatrix<T> {
    /// Build a matrix from labels and row-major data
    pub fn new<R, C>(row_labels: R, col_labels: C, data: Vec<T>) -> Result<Self>
    where
        R: IntoIterator<Item = String>,
        C: IntoIterator<Item = String>,
    {
        let row_labels = unique_labels(row_labels)?;
        let col_labels = unique_labels(col_labels)?;
        let expected = row_labels.len() * col_labels.len();
        if data.len() != expected {
            return Err(TopicFcaError::DimensionMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            row_labels,
            col_labels,
            data,
        })
    }

    /// Build a matrix from one `Vec` per row
    pub fn from_rows<R, C>(row_labels: R, col_labels: C, rows: Vec<Vec<T>>) -> Result<Self>
    where
        R: IntoIterator<Item = String>,
        C: IntoIterator<Item = String>,
    {
        let col_labels: Vec<String> = col_labels.into_iter().collect();
        let ncols = col_labels.len();
        let mut data = Vec::with_capacity(rows.len() * ncols);
        for row in rows {
            if row.len() != ncols {
                return Err(TopicFcaError::DimensionMismatch {
                    expected: ncols,
                    actual: row.len(),
                });
            }
            data.extend(row);
        }
        Self::new(row_labels, col_labels, data)
    }

    /// Matrix of `fill` values
    pub fn filled<R, C>(row_labels: R, col_labels: C, fill: T) -> Result<Self>
    where
        R: IntoIterator<Item = String>,
        C: IntoIterator<Item = String>,
    {
        let row_labels = unique_labels(row_labels)?;
        let col_labels = unique_labels(col_labels)?;
        let data = vec![fill; row_labels.len() * col_labels.len()];
        Ok(Self {
            row_labels,
            col_labels,
            data,
        })
    }

    pub fn nrows(&self) -> usize {
        self.row_labels.len()
    }

    pub fn ncols(&self) -> usize {
        self.col_labels.len()
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row_labels(&self) -> &IndexSet<String> {
        &self.row_labels
    }

    pub fn col_labels(&self) -> &IndexSet<String> {
        &self.col_labels
    }

    pub fn row_index(&self, label: &str) -> Option<usize> {
        self.row_labels.get_index_of(label)
    }

    pub fn col_index(&self, label: &str) -> Option<usize> {
        self.col_labels.get_index_of(label)
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.ncols() + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        let ncols = self.ncols();
        self.data[row * ncols + col] = value;
    }

    /// Entry addressed by labels
    pub fn get_by_label(&self, row: &str, col: &str) -> Option<T> {
        Some(self.get(self.row_index(row)?, self.col_index(col)?))
    }

    pub fn row(&self, row: usize) -> &[T] {
        let ncols = self.ncols();
        &self.data[row * ncols..(row + 1) * ncols]
    }

    /// Rows in order; yields nothing when the matrix has no columns
    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        let ncols = self.ncols();
        let nrows = if ncols == 0 { 0 } else { self.nrows() };
        (0..nrows).map(move |r| &self.data[r * ncols..(r + 1) * ncols])
    }

    pub fn values(&self) -> &[T] {
        &self.data
    }

    /// Entrywise transform keeping the labels
    pub fn map<U: Copy, F: FnMut(T) -> U>(&self, f: F) -> IncidenceMatrix<U> {
        IncidenceMatrix {
            row_labels: self.row_labels.clone(),
            col_labels: self.col_labels.clone(),
            data: self.data.iter().copied().map(f).collect(),
        }
    }

    /// Same values under new row labels, e.g. document ids replaced by paths
    pub fn with_row_labels<R>(&self, row_labels: R) -> Result<Self>
    where
        R: IntoIterator<Item = String>,
    {
        let row_labels = unique_labels(row_labels)?;
        if row_labels.len() != self.nrows() {
            return Err(TopicFcaError::DimensionMismatch {
                expected: self.nrows(),
                actual: row_labels.len(),
            });
        }
        Ok(Self {
            row_labels,
            col_labels: self.col_labels.clone(),
            data: self.data.clone(),
        })
    }
}

impl IncidenceMatrix<bool> {
    /// Number of `true` entries
    pub fn count_true(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

fn unique_labels<I: IntoIterator<Item = String>>(labels: I) -> Result<IndexSet<String>> {
    let mut set = IndexSet::new();
    for label in labels {
        if let Some(dup) = set.replace(label) {
            return Err(TopicFcaError::DuplicateLabel(dup));
        }
    }
    Ok(set)
}

/// Labels `0..n` as strings, the column universe of topic matrices
pub fn index_labels(n: usize) -> impl Iterator<Item = String> {
    (0..n).map(|i| i.to_string())
}
