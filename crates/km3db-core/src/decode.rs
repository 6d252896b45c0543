// Tab-separated result decoding
//
// The web API answers in TSV: first line = header with field names, one
// record per line after that, trailing empty lines ignored. Three
// renditions of a payload: the raw text, header-derived dynamic records,
// and a rectangular table. Known record shapes decode through serde.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload has no header line.
    #[error("empty payload, no header line")]
    MissingHeader,

    /// A data line has a different field count than the header.
    #[error("line {line}: expected {expected} fields, got {got}")]
    FieldCount {
        line: usize,
        expected: usize,
        got: usize,
    },

    /// Tabular or typed parsing failed.
    #[error("TSV parsing failed: {0}")]
    Csv(#[from] csv::Error),
}

/// How query results get decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// Header-derived records, one per data line.
    Records,
    /// A rectangular column-oriented table.
    Table,
}

/// A decoded query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// The body text as received.
    Raw(String),
    Records(Vec<Record>),
    Table(Table),
}

impl QueryResult {
    /// The raw body text, if this result was not decoded further.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Raw(text) => Some(text),
            _ => None,
        }
    }

    pub fn records(&self) -> Option<&[Record]> {
        match self {
            Self::Records(records) => Some(records),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&Table> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }
}

/// One record of a tabular result.
///
/// Field names come from the header line, lower-cased; the field list is
/// shared between all records of one payload. Values stay strings —
/// typing is the consumer's call.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Arc<[String]>,
    values: Vec<String>,
}

impl Record {
    /// The (lower-cased) field names.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Value of `field`, or `None` if the header has no such field.
    pub fn get(&self, field: &str) -> Option<&str> {
        let idx = self.fields.iter().position(|f| f == field)?;
        self.values.get(idx).map(String::as_str)
    }

    /// All values, in header order.
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// A rectangular, column-oriented view of a TSV payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// The column names, as sent by the server.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .filter_map(|row| row.get(idx).map(String::as_str))
                .collect(),
        )
    }
}

/// Decode TSV text into one [`Record`] per data line.
///
/// Empty lines are skipped; a line with the wrong field count is a hard
/// error.
pub fn to_records(text: &str) -> Result<Vec<Record>, DecodeError> {
    let mut lines = text.lines();
    let header = lines.next().ok_or(DecodeError::MissingHeader)?;
    let fields: Arc<[String]> = header.split_whitespace().map(str::to_lowercase).collect();
    if fields.is_empty() {
        return Err(DecodeError::MissingHeader);
    }

    let mut records = Vec::new();
    for (line_no, line) in lines.enumerate() {
        if line.is_empty() {
            continue;
        }
        let values: Vec<String> = line.split('\t').map(str::to_owned).collect();
        if values.len() != fields.len() {
            return Err(DecodeError::FieldCount {
                line: line_no + 2,
                expected: fields.len(),
                got: values.len(),
            });
        }
        records.push(Record {
            fields: Arc::clone(&fields),
            values,
        });
    }
    Ok(records)
}

/// Decode TSV text into a [`Table`].
pub fn to_table(text: &str) -> Result<Table, DecodeError> {
    if text.trim().is_empty() {
        return Err(DecodeError::MissingHeader);
    }
    let mut reader = tsv_reader(text);
    let columns = reader.headers()?.iter().map(str::to_owned).collect();
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_owned).collect());
    }
    Ok(Table { columns, rows })
}

/// Decode TSV text into typed records via serde.
///
/// Column names are matched against the serde field names (or renames)
/// of `T`.
pub fn to_typed<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, DecodeError> {
    let mut reader = tsv_reader(text);
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(DecodeError::from)
}

fn tsv_reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .from_reader(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    const SAMPLE: &str = "OID\tDOM_ID\tFLOOR\nD1\t123\t0\nD2\t456\t13\n\n";

    #[test]
    fn records_lowercase_the_header_fields() {
        let records = to_records(SAMPLE).expect("sample decodes");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields(), ["oid", "dom_id", "floor"]);
        assert_eq!(records[0].get("oid"), Some("D1"));
        assert_eq!(records[0].get("dom_id"), Some("123"));
        assert_eq!(records[0].get("floor"), Some("0"));
        assert_eq!(records[1].get("oid"), Some("D2"));
        assert_eq!(records[0].get("nope"), None);
    }

    #[test]
    fn records_skip_trailing_empty_lines() {
        let records = to_records("A\tB\n1\t2\n\n\n").expect("sample decodes");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn records_reject_a_short_row() {
        let err = to_records("A\tB\n1\n").expect_err("short row must fail");
        assert!(matches!(
            err,
            DecodeError::FieldCount {
                line: 2,
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn records_reject_an_empty_payload() {
        assert!(matches!(to_records(""), Err(DecodeError::MissingHeader)));
    }

    #[test]
    fn table_keeps_the_header_case() {
        let table = to_table(SAMPLE).expect("sample decodes");
        assert_eq!(table.columns(), ["OID", "DOM_ID", "FLOOR"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1], ["D2", "456", "13"]);
        assert_eq!(table.column("DOM_ID"), Some(vec!["123", "456"]));
        assert_eq!(table.column("nope"), None);
    }

    #[test]
    fn typed_rows_decode_through_serde() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Row {
            #[serde(rename = "OID")]
            oid: String,
            #[serde(rename = "DOM_ID")]
            dom_id: u32,
            #[serde(rename = "FLOOR")]
            floor: u32,
        }

        let rows: Vec<Row> = to_typed(SAMPLE).expect("sample decodes");
        assert_eq!(
            rows[0],
            Row {
                oid: "D1".into(),
                dom_id: 123,
                floor: 0
            }
        );
    }

    #[test]
    fn typed_rows_reject_non_numeric_values() {
        #[derive(Debug, Deserialize)]
        struct Row {
            #[allow(dead_code)]
            #[serde(rename = "DOM_ID")]
            dom_id: u32,
        }

        let result: Result<Vec<Row>, _> = to_typed("DOM_ID\nnot-a-number\n");
        assert!(matches!(result, Err(DecodeError::Csv(_))));
    }
}
