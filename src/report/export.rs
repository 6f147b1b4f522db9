use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use flate2::Compression;
use flate2::write::GzEncoder;
use rust_xlsxwriter::{ColNum, Format, RowNum, Workbook, XlsxError};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::reconcile::Table;
use crate::shared_interface::AlertLevel;

/// Header of the appended prediction column.
pub const ALERT_COLUMN: &str = "predicted_alert";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Could not write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Could not write JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not write spreadsheet: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("Table does not fit in a worksheet")]
    SheetLimit,
    #[error("I/O error while exporting: {0}")]
    IO(#[from] std::io::Error),
    #[error("{rows} rows but {labels} predictions")]
    LengthMismatch { rows: usize, labels: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Tsv,
    JsonLines,
    Xlsx,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "tsv" => Ok(ExportFormat::Tsv),
            "jsonl" | "json" => Ok(ExportFormat::JsonLines),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => Err(format!("unknown export format \"{}\" (expected csv, tsv, jsonl or xlsx)", other)),
        }
    }
}

impl ExportFormat {
    /// Guess from the file name, looking through a trailing `.gz`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let mut path = path.to_path_buf();
        if is_gzip(&path) {
            path.set_extension("");
        }
        path.extension()?.to_str()?.parse().ok()
    }
}

pub fn is_gzip(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("gz"))
}

/// One worksheet with a bold header row. Cells holding finite numbers are
/// written as numbers, everything else as text.
fn workbook_bytes(table: &Table, labels: &[AlertLevel]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    let headers = table.headers.iter().map(String::as_str).chain(std::iter::once(ALERT_COLUMN));
    for (col, header) in headers.enumerate() {
        let col = ColNum::try_from(col).map_err(|_| ExportError::SheetLimit)?;
        sheet.write_string_with_format(0, col, header, &bold)?;
    }

    for (row_idx, (row, label)) in table.rows.iter().zip(labels).enumerate() {
        let row_num = RowNum::try_from(row_idx + 1).map_err(|_| ExportError::SheetLimit)?;
        let cells = row.iter().map(String::as_str).chain(std::iter::once(label.as_str()));

        for (col, cell) in cells.enumerate() {
            let col = ColNum::try_from(col).map_err(|_| ExportError::SheetLimit)?;
            match fast_float::parse::<f64, _>(cell.trim()) {
                Ok(number) if number.is_finite() => sheet.write_number(row_num, col, number)?,
                _ if cell.is_empty() => continue,
                _ => sheet.write_string(row_num, col, cell)?,
            };
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Write `table` plus one prediction column.
pub fn write_export<W: Write>(writer: W, table: &Table, labels: &[AlertLevel], format: ExportFormat) -> Result<(), ExportError> {
    if table.len() != labels.len() {
        return Err(ExportError::LengthMismatch { rows: table.len(), labels: labels.len() });
    }

    match format {
        ExportFormat::Csv | ExportFormat::Tsv => {
            let delimiter = if format == ExportFormat::Tsv { b'\t' } else { b',' };
            let mut csv_writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(writer);

            csv_writer.write_record(table.headers.iter().map(String::as_str).chain(std::iter::once(ALERT_COLUMN)))?;
            for (row, label) in table.rows.iter().zip(labels) {
                csv_writer.write_record(row.iter().map(String::as_str).chain(std::iter::once(label.as_str())))?;
            }
            csv_writer.flush()?;
        }
        ExportFormat::JsonLines => {
            let mut writer = writer;
            for (row, label) in table.rows.iter().zip(labels) {
                let mut object = Map::with_capacity(row.len() + 1);
                for (header, cell) in table.headers.iter().zip(row) {
                    object.insert(header.clone(), Value::String(cell.clone()));
                }
                object.insert(ALERT_COLUMN.to_string(), Value::String(label.as_str().to_string()));

                serde_json::to_writer(&mut writer, &object)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        ExportFormat::Xlsx => {
            let mut writer = writer;
            writer.write_all(&workbook_bytes(table, labels)?)?;
            writer.flush()?;
        }
    }
    Ok(())
}

/// Write the export into `file`, gzip-compressed when `gzip` is set.
pub fn write_export_file(file: File, gzip: bool, table: &Table, labels: &[AlertLevel], format: ExportFormat) -> Result<(), ExportError> {
    let writer = BufWriter::new(file);
    if gzip {
        let mut gz_writer = GzEncoder::new(writer, Compression::fast());
        write_export(&mut gz_writer, table, labels, format)?;
        gz_writer.finish()?.flush()?;
    } else {
        write_export(writer, table, labels, format)?;
    }
    Ok(())
}
