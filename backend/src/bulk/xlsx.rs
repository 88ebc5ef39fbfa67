//! Minimal reader for the first sheet of an `.xlsx` workbook.
//!
//! Only cell text is extracted: shared strings, inline strings, booleans and
//! the raw text of numeric cells. Formatting, formulas and dates-as-serials are
//! taken verbatim from the cached `<v>` value.

use crate::error::AppError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::result::ZipError;
use zip::ZipArchive;

const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const FALLBACK_SHEET: &str = "xl/worksheets/sheet1.xml";

/// Sheet limits of Excel itself; references beyond them are malformed.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;
/// Decompressed size accepted for a single workbook part.
const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;
/// Cells in the returned grid, gaps included.
const MAX_GRID_CELLS: usize = 2_000_000;

/// Decodes the first worksheet of `bytes` into rows of cell text.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<Vec<String>>, AppError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::Parse(format!("unreadable workbook: {e}")))?;

    let sheet_path = first_sheet_path(&mut archive)?;
    let shared = match read_entry(&mut archive, SHARED_STRINGS)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let sheet = read_entry(&mut archive, &sheet_path)?
        .ok_or_else(|| AppError::Parse(format!("workbook has no sheet at '{sheet_path}'")))?;
    parse_sheet(&sheet, &shared)
}

fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, AppError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(AppError::Parse(format!("failed to read '{name}': {e}"))),
    };
    let mut xml = String::new();
    file.by_ref()
        .take(MAX_ENTRY_BYTES + 1)
        .read_to_string(&mut xml)
        .map_err(|e| AppError::Parse(format!("failed to read '{name}': {e}")))?;
    if xml.len() as u64 > MAX_ENTRY_BYTES {
        return Err(AppError::Parse(format!(
            "'{name}' is larger than {MAX_ENTRY_BYTES} bytes once decompressed"
        )));
    }
    Ok(Some(xml))
}

fn xml_error(e: impl std::fmt::Display) -> AppError {
    AppError::Parse(format!("malformed workbook xml: {e}"))
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, AppError> {
    for a in e.attributes() {
        let a = a.map_err(xml_error)?;
        if a.key.local_name().as_ref() == local {
            return Ok(Some(a.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

/// Resolves the first `<sheet>` of the workbook through its relationship id.
fn first_sheet_path(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<String, AppError> {
    let Some(workbook) = read_entry(archive, WORKBOOK)? else {
        return Ok(FALLBACK_SHEET.to_string());
    };

    let mut rel_id = None;
    let mut reader = XmlReader::from_str(&workbook);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                rel_id = attr(&e, b"id")?;
                break;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let (Some(rel_id), Some(rels)) = (rel_id, read_entry(archive, WORKBOOK_RELS)?) else {
        return Ok(FALLBACK_SHEET.to_string());
    };

    let mut reader = XmlReader::from_str(&rels);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attr(&e, b"Id")?.as_deref() == Some(rel_id.as_str()) {
                    if let Some(target) = attr(&e, b"Target")? {
                        return Ok(match target.strip_prefix('/') {
                            Some(absolute) => absolute.to_string(),
                            None => format!("xl/{target}"),
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(FALLBACK_SHEET.to_string())
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, AppError> {
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic runs repeat the text in another script.
    let mut in_phonetic = false;

    let mut reader = XmlReader::from_str(xml);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => current.push_str(&t.unescape().map_err(xml_error)?),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Zero-based column index of a reference like `AB12`; `None` when the
/// reference has no column letters.
fn column_index(cell_ref: &str) -> Result<Option<usize>, AppError> {
    let mut index = 0usize;
    for b in cell_ref.bytes().take_while(u8::is_ascii_alphabetic) {
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add((b.to_ascii_uppercase() - b'A' + 1) as usize))
            .filter(|&i| i <= MAX_COLUMNS)
            .ok_or_else(|| {
                AppError::Parse(format!("cell reference '{cell_ref}' is beyond column XFD"))
            })?;
    }
    Ok(index.checked_sub(1))
}

/// Zero-based row index from a `<row r="..">` attribute.
fn row_index(r: &str) -> Result<usize, AppError> {
    match r.trim().parse::<usize>() {
        Ok(n) if (1..=MAX_ROWS).contains(&n) => Ok(n - 1),
        _ => Err(AppError::Parse(format!("invalid row number '{r}'"))),
    }
}

fn check_position(row: usize, column: usize) -> Result<(), AppError> {
    if row >= MAX_ROWS || column >= MAX_COLUMNS {
        return Err(AppError::Parse(
            "the sheet extends beyond the largest supported size".to_string(),
        ));
    }
    Ok(())
}

struct PendingCell {
    column: usize,
    kind: Option<String>,
    text: String,
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, AppError> {
    let mut grid: HashMap<usize, HashMap<usize, String>> = HashMap::new();
    let mut current_row = 0usize;
    let mut next_row = 0usize;
    let mut next_column = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut capture = false;

    let mut reader = XmlReader::from_str(xml);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    current_row = match attr(&e, b"r")? {
                        Some(r) => row_index(&r)?,
                        None => next_row,
                    };
                    check_position(current_row, 0)?;
                    next_row = current_row + 1;
                    next_column = 0;
                }
                b"c" => {
                    let column = match attr(&e, b"r")? {
                        Some(r) => column_index(&r)?.unwrap_or(next_column),
                        None => next_column,
                    };
                    check_position(current_row, column)?;
                    next_column = column + 1;
                    cell = Some(PendingCell {
                        column,
                        kind: attr(&e, b"t")?,
                        text: String::new(),
                    });
                }
                b"v" | b"t" => capture = cell.is_some(),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let column = match attr(&e, b"r")? {
                    Some(r) => column_index(&r)?.unwrap_or(next_column),
                    None => next_column,
                };
                check_position(current_row, column)?;
                next_column = column + 1;
            }
            Event::Text(t) if capture => {
                if let Some(cell) = cell.as_mut() {
                    cell.text.push_str(&t.unescape().map_err(xml_error)?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" => {
                    if let Some(done) = cell.take() {
                        let value = resolve_cell(&done, shared)?;
                        if !value.is_empty() {
                            grid.entry(current_row).or_default().insert(done.column, value);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    // Only non-empty cells were kept, so trailing blank rows and columns are
    // already gone; what remains is padded out to a rectangle per row.
    let height = grid.keys().max().map(|r| r + 1).unwrap_or(0);
    let padded: usize = height
        + grid
            .values()
            .map(|cells| cells.keys().max().map_or(0, |c| c + 1))
            .sum::<usize>();
    if padded > MAX_GRID_CELLS {
        return Err(AppError::Parse(format!(
            "the sheet spans more than {MAX_GRID_CELLS} cells"
        )));
    }
    let rows = (0..height)
        .map(|r| {
            let cells = grid.remove(&r).unwrap_or_default();
            let width = cells.keys().max().map(|c| c + 1).unwrap_or(0);
            (0..width)
                .map(|c| cells.get(&c).cloned().unwrap_or_default())
                .collect()
        })
        .collect();
    Ok(rows)
}

fn resolve_cell(cell: &PendingCell, shared: &[String]) -> Result<String, AppError> {
    match cell.kind.as_deref() {
        Some("s") => {
            let index: usize = cell.text.trim().parse().map_err(|_| {
                AppError::Parse(format!("invalid shared string index '{}'", cell.text))
            })?;
            shared
                .get(index)
                .cloned()
                .ok_or_else(|| AppError::Parse(format!("shared string {index} out of range")))
        }
        Some("b") => Ok(if cell.text.trim() == "1" { "TRUE" } else { "FALSE" }.to_string()),
        _ => Ok(cell.text.clone()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Builds a workbook whose first sheet is `sheet_xml`.
    pub(crate) fn workbook(sheet_xml: &str, shared_strings: &[&str]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let sst: String = shared_strings
            .iter()
            .map(|s| format!("<si><t>{s}</t></si>"))
            .collect();
        let entries = [
            (
                WORKBOOK,
                r#"<?xml version="1.0"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Data" sheetId="1" r:id="rId7"/><sheet name="Other" sheetId="2" r:id="rId8"/></sheets></workbook>"#.to_string(),
            ),
            (
                WORKBOOK_RELS,
                r#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId8" Type="worksheet" Target="worksheets/sheet2.xml"/><Relationship Id="rId7" Type="worksheet" Target="worksheets/data.xml"/></Relationships>"#.to_string(),
            ),
            (
                SHARED_STRINGS,
                format!(r#"<?xml version="1.0"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{sst}</sst>"#),
            ),
            ("xl/worksheets/data.xml", sheet_xml.to_string()),
            (
                "xl/worksheets/sheet2.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Wrong</t></is></c></row></sheetData></worksheet>"#.to_string(),
            ),
        ];
        for (name, body) in entries {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn reads_shared_inline_and_numeric_cells_from_first_sheet() {
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
            <row r="2"><c r="A2" t="inlineStr"><is><t>Alice &amp; Co</t></is></c><c r="B2"><v>45292</v></c></row>
        </sheetData></worksheet>"#;
        let bytes = workbook(sheet, &["Name", "Date"]);
        let grid = read_first_sheet(&bytes).unwrap();
        assert_eq!(grid[0], vec!["Name", "Date"]);
        assert_eq!(grid[1], vec!["Alice & Co", "45292"]);
    }

    #[test]
    fn gaps_become_empty_cells() {
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="inlineStr"><is><t>Name</t></is></c><c r="C1" t="b"><v>1</v></c></row>
            <row r="3"><c r="B3" t="inlineStr"><is><t>x</t></is></c></row>
        </sheetData></worksheet>"#;
        let grid = read_first_sheet(&workbook(sheet, &[])).unwrap();
        assert_eq!(grid[0], vec!["Name", "", "TRUE"]);
        assert!(grid[1].is_empty());
        assert_eq!(grid[2], vec!["", "x"]);
    }

    #[test]
    fn column_letters_map_to_indexes() {
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("Z9").unwrap(), Some(25));
        assert_eq!(column_index("AA10").unwrap(), Some(26));
        assert_eq!(column_index("XFD1").unwrap(), Some(16_383));
        assert_eq!(column_index("12").unwrap(), None);
    }

    #[test]
    fn columns_past_xfd_are_rejected_without_overflow() {
        assert!(matches!(column_index("XFE1"), Err(AppError::Parse(_))));
        assert!(matches!(
            column_index("ZZZZZZZZZZZZZZZZ1"),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn far_away_cell_references_are_parse_errors() {
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="ZZZZZ1" t="inlineStr"><is><t>Name</t></is></c></row>
            <row r="30000000"><c r="A30000000" t="inlineStr"><is><t>x</t></is></c></row>
        </sheetData></worksheet>"#;
        let err = read_first_sheet(&workbook(sheet, &[])).unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));

        let sheet = r#"<worksheet><sheetData>
            <row r="30000000"><c t="inlineStr"><is><t>x</t></is></c></row>
        </sheetData></worksheet>"#;
        let err = read_first_sheet(&workbook(sheet, &[])).unwrap_err();
        assert!(err.to_string().contains("30000000"));
    }

    #[test]
    fn sparse_grids_beyond_the_cell_budget_are_rejected() {
        // Each row claims a cell in the last column, forcing wide padding.
        let rows: String = (1..=200)
            .map(|r| format!(r#"<row r="{r}"><c r="XFD{r}" t="inlineStr"><is><t>x</t></is></c></row>"#))
            .collect();
        let sheet = format!("<worksheet><sheetData>{rows}</sheetData></worksheet>");
        let err = read_first_sheet(&workbook(&sheet, &[])).unwrap_err();
        assert!(err.to_string().contains("cells"));
    }

    #[test]
    fn empty_cells_do_not_widen_the_grid() {
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="inlineStr"><is><t>Name</t></is></c><c r="XFD1"><v></v></c></row>
            <row r="900000"><c r="A900000"><v></v></c></row>
        </sheetData></worksheet>"#;
        let grid = read_first_sheet(&workbook(sheet, &[])).unwrap();
        assert_eq!(grid, vec![vec!["Name".to_string()]]);
    }

    #[test]
    fn broken_archive_is_a_parse_error() {
        let err = read_first_sheet(b"PK\x03\x04not really a zip").unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }
}
