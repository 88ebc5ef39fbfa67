//! Turns pasted text or an uploaded file into `BulkRow`s.
//!
//! Both modes reduce their input to a grid of trimmed cells, then share one
//! contract: row 0 is the header and must pass schema validation before any
//! data row is accepted; every data row gets a fresh id and its values are
//! placed by header position; columns matching no field are dropped.

use crate::bulk::schema::validate_headers;
use crate::bulk::xlsx;
use crate::error::AppError;
use common::model::bulk_row::BulkRow;
use common::model::field::Field;
use common::model::schema::SchemaReport;
use log::debug;
use regex::Regex;
use uuid::Uuid;

const XLSX_MAGIC: &[u8] = b"PK\x03\x04";
const LEGACY_XLS_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Header names that fill `BulkRow::recipient_email` when no field uses them.
const RECIPIENT_HEADERS: [&str; 3] = ["email", "recipient email", "recipient_email"];

/// Rows accepted from one parse, with the header report that admitted them.
#[derive(Debug, Clone)]
pub struct ParsedRows {
    pub rows: Vec<BulkRow>,
    pub report: SchemaReport,
}

/// Parses pasted text.
///
/// Lines end at `\r\n`, `\n` or a lone `\r`. Each line picks its own
/// delimiter: tab if it has one, else comma (read with CSV quoting), else
/// runs of two or more spaces. A line with none of them is a single cell.
/// Blank lines are skipped.
pub fn parse_text(text: &str, fields: &[Field]) -> Result<ParsedRows, AppError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let multi_space = Regex::new(r" {2,}").map_err(|e| AppError::Parse(e.to_string()))?;
    let line_break = Regex::new(r"\r\n|\r|\n").map_err(|e| AppError::Parse(e.to_string()))?;

    let mut grid = Vec::new();
    for line in line_break.split(text) {
        if line.trim().is_empty() {
            continue;
        }
        grid.push(split_line(line, &multi_space)?);
    }
    rows_from_grid(grid, fields)
}

/// Parses an uploaded file: the first sheet of an `.xlsx` workbook, or
/// delimited UTF-8 text otherwise.
pub fn parse_file(bytes: &[u8], fields: &[Field]) -> Result<ParsedRows, AppError> {
    if bytes.is_empty() {
        return Err(AppError::Parse("the file is empty".to_string()));
    }
    let grid = if bytes.starts_with(XLSX_MAGIC) {
        xlsx::read_first_sheet(bytes)?
    } else if bytes.starts_with(LEGACY_XLS_MAGIC) {
        return Err(AppError::Parse(
            "legacy .xls workbooks are not supported, save the sheet as .xlsx or .csv"
                .to_string(),
        ));
    } else {
        read_delimited(bytes)?
    };
    rows_from_grid(grid, fields)
}

/// Validates the header row of `grid` and maps the remaining rows onto
/// `fields`. Fully blank rows are ignored.
pub fn rows_from_grid(grid: Vec<Vec<String>>, fields: &[Field]) -> Result<ParsedRows, AppError> {
    let mut lines = grid
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()));

    let headers: Vec<String> = match lines.next() {
        Some(headers) => headers.iter().map(|h| h.trim().to_string()).collect(),
        None => return Err(AppError::Parse("the input is empty".to_string())),
    };

    let report = validate_headers(&headers, fields);
    if !report.valid {
        return Err(AppError::Schema(report));
    }

    let columns: Vec<(String, Option<usize>)> = fields
        .iter()
        .filter(|f| f.is_editable())
        .map(|f| {
            let label = f.label.trim();
            (f.id.clone(), headers.iter().position(|h| h == label))
        })
        .collect();
    let recipient_column = recipient_column(&headers, fields);

    let rows: Vec<BulkRow> = lines
        .map(|cells| {
            let mut row = BulkRow::new(Uuid::new_v4().to_string());
            for (field_id, index) in &columns {
                let value = index
                    .and_then(|i| cells.get(i))
                    .map(|c| c.trim().to_string())
                    .unwrap_or_default();
                row.values.insert(field_id.clone(), value);
            }
            row.recipient_email = recipient_column
                .and_then(|i| cells.get(i))
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty());
            row
        })
        .collect();

    if rows.is_empty() {
        return Err(AppError::Parse(
            "no data rows found below the header".to_string(),
        ));
    }
    debug!("parsed {} rows against {} fields", rows.len(), columns.len());
    Ok(ParsedRows { rows, report })
}

fn recipient_column(headers: &[String], fields: &[Field]) -> Option<usize> {
    headers.iter().position(|h| {
        RECIPIENT_HEADERS.contains(&h.to_lowercase().as_str())
            && !fields.iter().any(|f| f.label.trim() == h)
    })
}

fn split_line(line: &str, multi_space: &Regex) -> Result<Vec<String>, AppError> {
    let cells: Vec<String> = if line.contains('\t') {
        line.split('\t').map(str::to_string).collect()
    } else if line.contains(',') {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes());
        match reader.records().next() {
            Some(record) => record
                .map_err(|e| AppError::Parse(e.to_string()))?
                .iter()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        }
    } else if multi_space.is_match(line.trim()) {
        multi_space.split(line.trim()).map(str::to_string).collect()
    } else {
        vec![line.to_string()]
    };
    Ok(cells.into_iter().map(|c| c.trim().to_string()).collect())
}

/// Picks the most frequent of `, ; \t |` in the header line; comma when none
/// occurs.
fn detect_delimiter(header_line: &str) -> u8 {
    let mut best = (b',', 0);
    for candidate in [b',', b';', b'\t', b'|'] {
        let count = header_line.bytes().filter(|&b| b == candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

fn read_delimited(bytes: &[u8]) -> Result<Vec<Vec<String>>, AppError> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        AppError::Parse("the file is neither a spreadsheet nor UTF-8 text".to_string())
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let header_line = text
        .split(|c: char| c == '\r' || c == '\n')
        .find(|l| !l.trim().is_empty())
        .unwrap_or("");
    let delimiter = detect_delimiter(header_line);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AppError::Parse(e.to_string()))?;
        grid.push(record.iter().map(|c| c.trim().to_string()).collect());
    }
    Ok(grid)
}
