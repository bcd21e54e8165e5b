//! Tabular source loading.
//!
//! [`load`] materializes a whole file into an ordered `Vec<SourceRow>`.
//! The format is either declared by the mapping document or inferred from the
//! lower-cased file extension:
//!
//! - `csv`, `txt` → comma-delimited text with a header row. Cells stay strings;
//!   empty cells become null.
//! - `xlsx`, `xls` → first worksheet, first row is the header.
//! - `json`, `ndjson` → newline-delimited objects first, falling back to a
//!   single JSON document (array of objects, column-oriented object, or one
//!   flat object).

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
};

use calamine::{Data, DataType, Reader, open_workbook_auto};
use encoding_rs::Encoding;
use log::debug;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::{
    data::{Value, format_iso_datetime},
    error::LoadError,
    io_utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Excel,
    Json,
}

impl SourceFormat {
    /// Maps a declared format or file extension to a loader.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "csv" | "txt" => Some(SourceFormat::Csv),
            "xlsx" | "xls" => Some(SourceFormat::Excel),
            "json" | "ndjson" => Some(SourceFormat::Json),
            _ => None,
        }
    }

    /// Declared format wins; otherwise the extension of `path` decides.
    pub fn resolve(path: &Path, declared: Option<SourceFormat>) -> Result<Self, LoadError> {
        if let Some(format) = declared {
            return Ok(format);
        }
        let token = io_utils::extension_token(path).unwrap_or_default();
        SourceFormat::from_token(&token).ok_or_else(|| LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
            format: token,
        })
    }
}

/// One source record: column name → raw value, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRow {
    fields: Vec<(String, Value)>,
}

impl SourceRow {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    /// Value for `column`; absent columns read as null.
    pub fn get(&self, column: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .unwrap_or(NULL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

impl FromIterator<(String, Value)> for SourceRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Reads `path` completely and returns its rows in file order.
pub fn load(
    path: &Path,
    declared: Option<SourceFormat>,
    encoding: Option<&'static Encoding>,
) -> Result<Vec<SourceRow>, LoadError> {
    let format = SourceFormat::resolve(path, declared)?;
    debug!("Loading {:?} as {:?}", path, format);
    match format {
        SourceFormat::Csv => load_csv(path, io_utils::resolve_encoding(encoding)),
        SourceFormat::Excel => load_excel(path),
        SourceFormat::Json => load_json(path),
    }
}

fn unreadable(path: &Path, source: std::io::Error) -> LoadError {
    LoadError::FileUnreadable {
        path: path.to_path_buf(),
        source,
    }
}

fn load_csv(path: &Path, encoding: &'static Encoding) -> Result<Vec<SourceRow>, LoadError> {
    let mut reader = io_utils::open_csv_reader_from_path(path, io_utils::DEFAULT_CSV_DELIMITER)
        .map_err(|err| unreadable(path, err))?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .map_err(|reason| LoadError::malformed(path, format!("header row: {reason}")))?;
    if headers.is_empty() {
        return Err(LoadError::malformed(path, "missing header row"));
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record
            .map_err(|err| LoadError::malformed(path, format!("row {}: {err}", idx + 2)))?;
        if record.len() > headers.len() {
            return Err(LoadError::malformed(
                path,
                format!(
                    "row {} has {} fields but the header has {}",
                    idx + 2,
                    record.len(),
                    headers.len()
                ),
            ));
        }
        let decoded = io_utils::decode_record(&record, encoding)
            .map_err(|reason| LoadError::malformed(path, format!("row {}: {reason}", idx + 2)))?;
        // Short rows read as null in their missing trailing columns.
        let cells = decoded.into_iter().map(Some).chain(std::iter::repeat(None));
        let row = headers
            .iter()
            .zip(cells)
            .map(|(header, cell)| {
                let value = match cell {
                    Some(cell) if !cell.is_empty() => Value::String(cell),
                    _ => Value::Null,
                };
                (header.clone(), value)
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn load_excel(path: &Path) -> Result<Vec<SourceRow>, LoadError> {
    if !path.exists() {
        return Err(unreadable(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        ));
    }
    let mut workbook = open_workbook_auto(path).map_err(|err| LoadError::malformed(path, err))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::malformed(path, "workbook has no worksheets"))?
        .map_err(|err| LoadError::malformed(path, err))?;

    let mut sheet_rows = range.rows();
    let headers = sheet_rows
        .next()
        .map(|cells| cells.iter().map(header_text).collect::<Vec<_>>())
        .ok_or_else(|| LoadError::malformed(path, "missing header row"))?;

    Ok(sheet_rows
        .map(|cells| {
            headers
                .iter()
                .zip(cells.iter())
                .map(|(header, cell)| (header.clone(), excel_value(cell)))
                .collect()
        })
        .collect())
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn excel_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::Integer(*i),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Boolean(*b),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| Value::String(format_iso_datetime(&dt)))
            .unwrap_or_else(|| Value::String(cell.to_string())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
    }
}

fn load_json(path: &Path) -> Result<Vec<SourceRow>, LoadError> {
    let raw = fs::read_to_string(path).map_err(|err| unreadable(path, err))?;
    match parse_json_lines(&raw) {
        Some(mut objects) if objects.len() == 1 && is_column_oriented(&objects[0]) => {
            debug!("{:?} holds a single column-oriented object", path);
            Ok(objects.pop().map(columns_to_rows).unwrap_or_default())
        }
        Some(objects) => Ok(objects.into_iter().map(object_to_row).collect()),
        None => {
            debug!("{:?} is not line-delimited JSON, parsing as a single document", path);
            parse_json_document(&raw).map_err(|reason| LoadError::malformed(path, reason))
        }
    }
}

/// Every non-blank line must be a JSON object, otherwise `None`.
fn parse_json_lines(raw: &str) -> Option<Vec<JsonMap<String, JsonValue>>> {
    let mut objects = Vec::new();
    for line in raw.lines().filter(|line| !line.trim().is_empty()) {
        match serde_json::from_str::<JsonValue>(line) {
            Ok(JsonValue::Object(object)) => objects.push(object),
            _ => return None,
        }
    }
    if objects.is_empty() { None } else { Some(objects) }
}

fn parse_json_document(raw: &str) -> Result<Vec<SourceRow>, String> {
    let document: JsonValue = serde_json::from_str(raw).map_err(|err| err.to_string())?;
    match document {
        JsonValue::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                JsonValue::Object(object) => Ok(object_to_row(object)),
                other => Err(format!(
                    "array element {idx} is {} instead of an object",
                    json_kind(&other)
                )),
            })
            .collect(),
        JsonValue::Object(object) if is_column_oriented(&object) => Ok(columns_to_rows(object)),
        JsonValue::Object(object) => Ok(vec![object_to_row(object)]),
        other => Err(format!(
            "expected an array or object, found {}",
            json_kind(&other)
        )),
    }
}

/// An object is read as columns only when every value is an array of one
/// common length, or every value is an object over one common key set.
/// Any other object, nested fields included, is a single record.
fn is_column_oriented(object: &JsonMap<String, JsonValue>) -> bool {
    let mut values = object.values();
    match values.next() {
        Some(JsonValue::Array(first)) => values.all(|value| {
            matches!(value, JsonValue::Array(cells) if cells.len() == first.len())
        }),
        Some(JsonValue::Object(first)) => values.all(|value| {
            matches!(value, JsonValue::Object(cells)
                if cells.len() == first.len() && cells.keys().all(|key| first.contains_key(key)))
        }),
        _ => false,
    }
}

/// `{col: [v0, v1]}` or `{col: {"0": v0, "1": v1}}` → one row per position/index key.
fn columns_to_rows(object: JsonMap<String, JsonValue>) -> Vec<SourceRow> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut index_keys: Vec<String> = Vec::new();
    let mut columns: Vec<(String, HashMap<String, JsonValue>)> = Vec::with_capacity(object.len());
    for (column, cells) in object {
        let cells: Vec<(String, JsonValue)> = match cells {
            JsonValue::Array(values) => values
                .into_iter()
                .enumerate()
                .map(|(idx, value)| (idx.to_string(), value))
                .collect(),
            JsonValue::Object(map) => map.into_iter().collect(),
            _ => Vec::new(),
        };
        for (key, _) in &cells {
            if seen.insert(key.clone()) {
                index_keys.push(key.clone());
            }
        }
        columns.push((column, cells.into_iter().collect()));
    }
    // Object keys arrive in lexical order; pandas-style index keys are positions.
    if index_keys.iter().all(|key| key.parse::<u64>().is_ok()) {
        index_keys.sort_by_key(|key| key.parse::<u64>().unwrap_or_default());
    }
    index_keys
        .iter()
        .map(|key| {
            columns
                .iter_mut()
                .map(|(column, cells)| {
                    let value = cells.remove(key).map(json_to_value).unwrap_or(Value::Null);
                    (column.clone(), value)
                })
                .collect()
        })
        .collect()
}

fn object_to_row(object: JsonMap<String, JsonValue>) -> SourceRow {
    object
        .into_iter()
        .map(|(key, value)| (key, json_to_value(value)))
        .collect()
}

fn json_to_value(value: JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        JsonValue::String(s) => Value::String(s),
        nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => Value::String(nested.to_string()),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn format_tokens_cover_declared_and_extension_forms() {
        assert_eq!(SourceFormat::from_token("CSV"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_token("txt"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_token("xls"), Some(SourceFormat::Excel));
        assert_eq!(SourceFormat::from_token("ndjson"), Some(SourceFormat::Json));
        assert_eq!(SourceFormat::from_token("parquet"), None);
    }

    #[test]
    fn declared_format_overrides_extension() {
        let path = Path::new("export.dat");
        assert_eq!(
            SourceFormat::resolve(path, Some(SourceFormat::Json)).unwrap(),
            SourceFormat::Json
        );
        assert!(matches!(
            SourceFormat::resolve(path, None),
            Err(LoadError::UnsupportedFormat { format, .. }) if format == "dat"
        ));
    }

    #[test]
    fn csv_rows_keep_order_and_null_empty_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("people.CSV");
        fs::write(&path, "id,name,city\n1,Ada,\n2,\"Grace, H\",NYC\n").unwrap();
        let rows = load(&path, None, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), &Value::from("1"));
        assert_eq!(rows[0].get("city"), &Value::Null);
        assert_eq!(rows[1].get("name"), &Value::from("Grace, H"));
        assert_eq!(rows[1].get("missing"), &Value::Null);
        assert_eq!(rows[1].columns().collect::<Vec<_>>(), vec!["id", "name", "city"]);
    }

    #[test]
    fn csv_rows_with_extra_fields_are_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "id,name\n1,Ada,extra\n").unwrap();
        assert!(matches!(
            load(&path, None, None),
            Err(LoadError::MalformedContent { .. })
        ));
    }

    #[test]
    fn short_csv_rows_pad_missing_columns_with_null() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.csv");
        fs::write(&path, "id,name,city\n1,Ada,London\n2,Grace\n3\n").unwrap();
        let rows = load(&path, None, None).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get("name"), &Value::from("Grace"));
        assert_eq!(rows[1].get("city"), &Value::Null);
        assert!(rows[1].contains("city"));
        assert_eq!(rows[2].get("name"), &Value::Null);
        assert_eq!(rows[2].columns().collect::<Vec<_>>(), vec!["id", "name", "city"]);
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        assert!(matches!(
            load(&path, None, None),
            Err(LoadError::FileUnreadable { .. })
        ));
    }

    #[test]
    fn ndjson_lines_are_parsed_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");
        fs::write(
            &path,
            "{\"id\": 1, \"score\": 2.5, \"ok\": true}\n\n{\"id\": 2, \"tags\": [\"a\"]}\n",
        )
        .unwrap();
        let rows = load(&path, None, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), &Value::Integer(1));
        assert_eq!(rows[0].get("score"), &Value::Float(2.5));
        assert_eq!(rows[0].get("ok"), &Value::Boolean(true));
        assert_eq!(rows[1].get("tags"), &Value::from("[\"a\"]"));
        assert!(!rows[1].contains("score"));
    }

    #[test]
    fn json_document_fallback_handles_arrays_and_columns() {
        let dir = tempdir().unwrap();
        let array = dir.path().join("array.json");
        fs::write(&array, "[\n  {\"id\": 1},\n  {\"id\": 2}\n]\n").unwrap();
        let rows = load(&array, None, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("id"), &Value::Integer(2));

        let columns = dir.path().join("columns.json");
        fs::write(
            &columns,
            "{\"id\": {\"0\": 1, \"1\": 2}, \"name\": {\"0\": \"a\", \"1\": \"b\"}}",
        )
        .unwrap();
        let rows = load(&columns, None, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("name"), &Value::from("b"));
    }

    #[test]
    fn column_oriented_rows_follow_numeric_index_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.json");
        let ids = (0..12)
            .map(|idx| format!("\"{idx}\": {idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        fs::write(&path, format!("{{\"id\": {{{ids}}}}}")).unwrap();
        let rows = load(&path, None, None).unwrap();
        let ids = rows.iter().map(|row| row.get("id").clone()).collect::<Vec<_>>();
        assert_eq!(ids, (0..12).map(Value::Integer).collect::<Vec<_>>());

        let arrays = dir.path().join("arrays.json");
        fs::write(&arrays, "{\"id\": [1, 2, 3], \"name\": [\"a\", null, \"c\"]}").unwrap();
        let rows = load(&arrays, None, None).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get("name"), &Value::Null);
    }

    #[test]
    fn record_with_mismatched_nested_fields_stays_one_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("record.json");
        fs::write(
            &path,
            "{\"address\": {\"city\": \"Paris\"}, \"tags\": [\"a\", \"b\"]}\n",
        )
        .unwrap();
        let rows = load(&path, None, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("address"), &Value::from("{\"city\":\"Paris\"}"));
        assert_eq!(rows[0].get("tags"), &Value::from("[\"a\",\"b\"]"));
    }

    #[test]
    fn json_scalars_are_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scalar.json");
        fs::write(&path, "42 43").unwrap();
        assert!(matches!(
            load(&path, None, None),
            Err(LoadError::MalformedContent { .. })
        ));
    }

    /// Minimal single-sheet workbook: inline strings, numbers, a boolean and a
    /// cell styled with the built-in short-date format.
    fn write_xlsx(path: &Path, sheet_rows: &str) {
        use std::io::Write;
        use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#
                    .to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                    .to_string(),
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="People" sheetId="1" r:id="rId1"/></sheets></workbook>"#
                    .to_string(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#
                    .to_string(),
            ),
            (
                "xl/styles.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#
                    .to_string(),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_rows}</sheetData></worksheet>"#
                ),
            ),
        ];

        let mut writer = ZipWriter::new(fs::File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in parts {
            writer.start_file(name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn inline(cell: &str, text: &str) -> String {
        format!(r#"<c r="{cell}" t="inlineStr"><is><t>{text}</t></is></c>"#)
    }

    #[test]
    fn excel_first_sheet_maps_typed_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("people.xlsx");
        let header = format!(
            r#"<row r="1">{}{}{}{}</row>"#,
            inline("A1", " id "),
            inline("B1", "name"),
            inline("C1", "joined"),
            inline("D1", "active"),
        );
        let first = format!(
            r#"<row r="2"><c r="A2"><v>1</v></c>{}<c r="C2" s="1"><v>45292</v></c><c r="D2" t="b"><v>1</v></c></row>"#,
            inline("B2", "Ada"),
        );
        let second = r#"<row r="3"><c r="A3"><v>2.5</v></c></row>"#;
        write_xlsx(&path, &format!("{header}{first}{second}"));

        let rows = load(&path, None, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].columns().collect::<Vec<_>>(),
            vec!["id", "name", "joined", "active"]
        );
        assert!(match rows[0].get("id") {
            Value::Integer(id) => *id == 1,
            Value::Float(id) => *id == 1.0,
            _ => false,
        });
        assert_eq!(rows[0].get("name"), &Value::from("Ada"));
        assert_eq!(rows[0].get("joined"), &Value::from("2024-01-01T00:00:00"));
        assert_eq!(rows[0].get("active"), &Value::Boolean(true));
        assert_eq!(rows[1].get("id"), &Value::Float(2.5));
        assert_eq!(rows[1].get("name"), &Value::Null);
    }

    #[test]
    fn unreadable_workbook_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, "not a zip archive").unwrap();
        assert!(matches!(
            load(&path, None, None),
            Err(LoadError::MalformedContent { .. })
        ));
    }
}
