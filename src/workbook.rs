use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{Data, Range, Reader, Sheets, open_workbook_auto};
use tracing::debug;

use crate::error::UploadError;
use crate::metadata::{CellValue, Row};

pub trait RowSource {
    fn sheet_names(&self) -> Vec<String>;
    fn sheet_rows(&mut self, sheet: &str) -> Result<Vec<Row>, UploadError>;
}

pub struct Workbook {
    path: PathBuf,
    sheets: Sheets<BufReader<File>>,
}

impl Workbook {
    pub fn open(path: &Path) -> Result<Self, UploadError> {
        let sheets = open_workbook_auto(path).map_err(|err| UploadError::Spreadsheet {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            sheets,
        })
    }
}

impl RowSource for Workbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    fn sheet_rows(&mut self, sheet: &str) -> Result<Vec<Row>, UploadError> {
        let range = self
            .sheets
            .worksheet_range(sheet)
            .map_err(|err| UploadError::Spreadsheet {
                path: self.path.clone(),
                message: format!("sheet {sheet}: {err}"),
            })?;
        let rows = rows_from_range(&range);
        debug!(sheet, rows = rows.len(), "sheet loaded");
        Ok(rows)
    }
}

pub fn rows_from_range(range: &Range<Data>) -> Vec<Row> {
    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let fields: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(col, cell)| {
            cell_value(cell)
                .to_text()
                .unwrap_or_else(|| format!("Unnamed: {col}"))
        })
        .collect();
    let fields = dedupe_headers(fields);

    lines
        .map(|line| {
            fields
                .iter()
                .zip(line.iter())
                .map(|(field, cell)| (field.clone(), cell_value(cell)))
                .collect()
        })
        .collect()
}

fn dedupe_headers(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .map(|name| {
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name
            } else {
                let renamed = format!("{name}.{count}");
                debug!(header = %name, %renamed, "duplicate header renamed");
                renamed
            };
            *count += 1;
            unique
        })
        .collect()
}

pub fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Error(_) => CellValue::Empty,
        Data::String(value) => CellValue::Text(value.clone()),
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Float(value) => CellValue::Number(*value),
        Data::Bool(value) => CellValue::Bool(*value),
        Data::DateTime(value) if value.is_duration() => CellValue::Number(value.as_f64()),
        Data::DateTime(value) => value
            .as_datetime()
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(value.as_f64())),
        Data::DateTimeIso(value) => CellValue::Text(value.clone()),
        Data::DurationIso(value) => CellValue::Text(value.clone()),
    }
}
