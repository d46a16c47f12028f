use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use nalgebra::DMatrix;

use crate::sampling::Sample;

/// Writes whitespace-separated column tables, one row per index, no header.
pub struct FieldWriter;

impl FieldWriter {
    pub fn columns_to_string(columns: &[&[f64]]) -> Result<String> {
        let rows = columns.first().map(|c| c.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().position(|c| c.len() != rows) {
            return Err(anyhow!(
                "column {} has {} rows, expected {}",
                bad,
                columns[bad].len(),
                rows
            ));
        }

        let mut table = String::new();
        for row in 0..rows {
            for (idx, column) in columns.iter().enumerate() {
                if idx > 0 {
                    table.push(' ');
                }
                let _ = write!(table, "{}", column[row]);
            }
            table.push('\n');
        }
        Ok(table)
    }

    /// Radius column followed by one value column per sample.
    pub fn samples_to_string(samples: &[Sample]) -> Result<String> {
        let first = samples
            .first()
            .ok_or_else(|| anyhow!("no samples to write"))?;
        if let Some(bad) = samples.iter().position(|s| s.radii != first.radii) {
            return Err(anyhow!("sample {} uses a different radius grid", bad));
        }

        let mut columns: Vec<&[f64]> = Vec::with_capacity(samples.len() + 1);
        columns.push(first.radii.as_slice());
        for sample in samples {
            columns.push(sample.field.as_slice());
        }
        Self::columns_to_string(&columns)
    }

    pub fn write_columns(columns: &[&[f64]], path: &Path) -> Result<()> {
        let table = Self::columns_to_string(columns)?;
        write_text(&table, path)
    }

    pub fn write_samples(samples: &[Sample], path: &Path) -> Result<()> {
        let table = Self::samples_to_string(samples)?;
        write_text(&table, path)
    }
}

fn write_text(text: &str, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create output file {:?}", path))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(text.as_bytes())
        .with_context(|| format!("write output file {:?}", path))?;
    writer
        .flush()
        .with_context(|| format!("flush output file {:?}", path))
}

/// Formats a matrix row by row between banner lines, for debug logs.
pub struct MatrixDisplay<'a>(pub &'a DMatrix<f64>);

impl fmt::Display for MatrixDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const BANNER: &str = "#--------------------------------------------------#";
        writeln!(f, "{BANNER}")?;
        for row in self.0.row_iter() {
            for value in row.iter() {
                write!(f, "{value:.6e}  ")?;
            }
            writeln!(f)?;
        }
        write!(f, "{BANNER}")
    }
}
