//! Tab-separated sensor recordings.
//!
//! A recording has no header line. Every non-blank line is one sample and
//! every tab-separated cell is one numeric column. The column count is
//! fixed by the first sample; later lines must match it.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Sensor channels consumed by detection.
pub const SENSOR_CHANNELS: usize = 23;

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("recording: no samples")]
    Empty,
    #[error("recording: {found} columns found, {required} required")]
    InsufficientColumns { found: usize, required: usize },
    #[error("recording: line {line} has {found} columns, expected {expected}")]
    RaggedRow {
        line: usize,
        found: usize,
        expected: usize,
    },
    #[error("recording: line {line}, column {column}: invalid number {value:?}")]
    InvalidValue {
        line: usize,
        column: usize,
        value: String,
    },
    #[error("recording: more than {limit} samples")]
    TooManyRows { limit: usize },
    #[error("recording: io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bounds applied while reading a recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseLimits {
    /// Fewest columns the first sample may have.
    pub min_columns: usize,
    /// Most samples accepted. `None` is unbounded.
    pub max_rows: Option<usize>,
}

/// Row-major numeric matrix, one row per sample in temporal order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMatrix {
    columns: usize,
    data: Vec<f64>,
}

impl SampleMatrix {
    /// Build from explicit rows. All rows must share the first row's width.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, RecordingError> {
        let columns = rows.first().map(Vec::len).ok_or(RecordingError::Empty)?;
        let mut data = Vec::with_capacity(rows.len() * columns);
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != columns {
                return Err(RecordingError::RaggedRow {
                    line: idx + 1,
                    found: row.len(),
                    expected: columns,
                });
            }
            data.extend(row);
        }
        Ok(Self { columns, data })
    }

    /// Parse tab-separated text.
    pub fn parse(text: &str) -> Result<Self, RecordingError> {
        Self::parse_with(text, &ParseLimits::default())
    }

    pub fn parse_with(text: &str, limits: &ParseLimits) -> Result<Self, RecordingError> {
        Self::from_reader(text.as_bytes(), limits)
    }

    pub fn load(path: &Path) -> Result<Self, RecordingError> {
        Self::load_with(path, &ParseLimits::default())
    }

    /// Stream a recording from disk, stopping at the first line that breaks
    /// `limits`.
    pub fn load_with(path: &Path, limits: &ParseLimits) -> Result<Self, RecordingError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), limits)
    }

    /// Read samples line by line. The first sample fixes the column count and
    /// is checked against `limits.min_columns` before anything else is read.
    pub fn from_reader<R: BufRead>(
        mut reader: R,
        limits: &ParseLimits,
    ) -> Result<Self, RecordingError> {
        let mut columns = 0usize;
        let mut rows = 0usize;
        let mut data = Vec::new();
        let mut line = String::new();
        let mut line_no = 0usize;

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;
            let content = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
            if content.trim().is_empty() {
                continue;
            }
            if let Some(limit) = limits.max_rows {
                if rows >= limit {
                    return Err(RecordingError::TooManyRows { limit });
                }
            }

            let start = data.len();
            for (col, cell) in content.split('\t').enumerate() {
                let cell = cell.trim();
                let value = cell
                    .parse::<f64>()
                    .map_err(|_| RecordingError::InvalidValue {
                        line: line_no,
                        column: col + 1,
                        value: cell.to_string(),
                    })?;
                data.push(value);
            }
            let found = data.len() - start;
            if columns == 0 {
                if found < limits.min_columns {
                    return Err(RecordingError::InsufficientColumns {
                        found,
                        required: limits.min_columns,
                    });
                }
                columns = found;
            } else if found != columns {
                return Err(RecordingError::RaggedRow {
                    line: line_no,
                    found,
                    expected: columns,
                });
            }
            rows += 1;
        }

        if rows == 0 {
            return Err(RecordingError::Empty);
        }
        Ok(Self { columns, data })
    }

    pub fn rows(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.data.len() / self.columns
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.columns..(index + 1) * self.columns]
    }

    /// Contiguous rows `[start, start + len)` as a flat slice.
    pub fn row_span(&self, start: usize, len: usize) -> &[f64] {
        &self.data[start * self.columns..(start + len) * self.columns]
    }

    /// Keep only the leading `count` columns.
    pub fn leading_columns(&self, count: usize) -> Result<Self, RecordingError> {
        if self.columns < count {
            return Err(RecordingError::InsufficientColumns {
                found: self.columns,
                required: count,
            });
        }
        if self.columns == count {
            return Ok(self.clone());
        }
        let data = self
            .data
            .chunks_exact(self.columns)
            .flat_map(|row| row[..count].iter().copied())
            .collect();
        Ok(Self {
            columns: count,
            data,
        })
    }

    /// Split off the trailing column as integer labels.
    ///
    /// Returns the remaining columns and one label per row. Label cells are
    /// truncated toward zero; negative values clamp to zero.
    pub fn split_label_column(&self) -> Result<(Self, Vec<u32>), RecordingError> {
        if self.columns < 2 {
            return Err(RecordingError::InsufficientColumns {
                found: self.columns,
                required: 2,
            });
        }
        let width = self.columns - 1;
        let mut data = Vec::with_capacity(self.rows() * width);
        let mut labels = Vec::with_capacity(self.rows());
        for row in self.data.chunks_exact(self.columns) {
            data.extend_from_slice(&row[..width]);
            labels.push(row[width].max(0.0) as u32);
        }
        Ok((
            Self {
                columns: width,
                data,
            },
            labels,
        ))
    }

    /// Keep the rows for which `keep` returns true.
    pub fn retain_rows(&self, keep: &[bool]) -> Self {
        let data = self
            .data
            .chunks_exact(self.columns)
            .zip(keep)
            .filter(|(_, k)| **k)
            .flat_map(|(row, _)| row.iter().copied())
            .collect();
        Self {
            columns: self.columns,
            data,
        }
    }
}
